//! Scripted generator for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use wyrm_core::{Generator, Result, WyrmError};

/// A mock generator that doesn't require a model server.
///
/// Every prompt it receives is kept for inspection.
pub struct MockGenerator {
    response: String,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Always answer with `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fail as if the model server were down.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if self.fail {
            return Err(WyrmError::generation_unavailable("connection refused"));
        }
        Ok(self.response.clone())
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_response_and_capture() {
        let generator = MockGenerator::new("tar -xzf archive.tar.gz");
        let out = generator.generate("extract an archive").await.unwrap();

        assert_eq!(out, "tar -xzf archive.tar.gz");
        assert_eq!(generator.prompts(), vec!["extract an archive"]);
    }

    #[tokio::test]
    async fn test_failing() {
        let generator = MockGenerator::failing();
        let err = generator.generate("anything").await.unwrap_err();

        assert_eq!(err.error_code(), "GENERATION_UNAVAILABLE");
        assert_eq!(generator.prompts().len(), 1);
    }
}
