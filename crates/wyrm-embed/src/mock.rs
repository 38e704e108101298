//! Deterministic embedder for tests.

use async_trait::async_trait;

use wyrm_core::{Embedder, Result, WyrmError};

use crate::onnx::l2_normalize;

/// A mock embedder that doesn't require actual models.
///
/// Each lowercase word is hashed into one bucket of the vector, so texts
/// sharing words land close together in cosine space.
pub struct MockEmbedder {
    dimension: usize,

    /// Any batch containing this substring fails with an embedding error.
    fail_marker: Option<String>,
}

impl MockEmbedder {
    /// Create a new mock embedder with the MiniLM dimension.
    pub fn new() -> Self {
        Self::with_dimension(384)
    }

    /// Create a mock embedder with a custom dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            fail_marker: None,
        }
    }

    /// Fail every call whose input contains `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                    (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
                });
            embedding[(hash % self.dimension as u64) as usize] += 1.0;
        }
        l2_normalize(embedding)
    }

    fn check(&self, text: &str) -> Result<()> {
        match &self.fail_marker {
            Some(marker) if text.contains(marker.as_str()) => Err(WyrmError::embedding(format!(
                "mock failure on marker '{}'",
                marker
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                self.check(text)?;
                Ok(self.vector(text))
            })
            .collect()
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.check(text)?;
        Ok(self.vector(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
