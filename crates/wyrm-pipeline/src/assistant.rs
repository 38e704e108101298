//! Query-time orchestration.

use std::sync::Arc;

use tracing::{error, info, warn};

use wyrm_core::{Embedder, Generator, Result, VectorIndex, WyrmError};
use wyrm_query::{PromptTemplate, Retriever, RetrieverConfig};

use crate::session::SessionRecorder;

/// Prefix of the response returned when generation fails.
pub const ERROR_MARKER: &str = "[ERROR]";

/// Answers queries: retrieve context, compose a prompt, generate, record.
pub struct Assistant<E, I, G> {
    retriever: Retriever<E, I>,
    generator: Arc<G>,
    template: PromptTemplate,
    recorder: SessionRecorder,
}

impl<E, I, G> Assistant<E, I, G>
where
    E: Embedder,
    I: VectorIndex,
    G: Generator,
{
    /// Create a new assistant.
    pub fn new(
        embedder: Arc<E>,
        index: Arc<I>,
        generator: Arc<G>,
        recorder: SessionRecorder,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            retriever: Retriever::new(embedder, index, config),
            generator,
            template: PromptTemplate::default(),
            recorder,
        }
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Answer one query.
    ///
    /// A generator failure is returned as an `[ERROR] Generation failed: ..`
    /// response. The exchange is recorded either way. Retrieval failures are
    /// returned as errors and nothing is recorded.
    pub async fn ask(&self, query: &str) -> Result<String> {
        let context = self.retriever.retrieve_default(query).await?;
        let prompt = self.template.compose(&context, query);

        let response = match self.generator.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                let reason = match e {
                    WyrmError::GenerationUnavailable { message } => message,
                    other => other.to_string(),
                };
                error!("Generation failed: {}", reason);
                format!("{} Generation failed: {}", ERROR_MARKER, reason)
            }
        };

        info!("User Query: {:?} AI Response: {:?}", query, response);

        if let Err(e) = self.recorder.record(query, &response) {
            warn!("Failed to record session: {}", e);
        }

        Ok(response)
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    /// Model identifier of the generator.
    pub fn model(&self) -> &str {
        self.generator.model()
    }
}
