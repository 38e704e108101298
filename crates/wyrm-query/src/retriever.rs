//! Query-time context retrieval.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use wyrm_core::{Embedder, Result, RetrievalResult, VectorIndex, WyrmError};

/// Context returned when the index has nothing to offer.
pub const NO_CONTEXT_MESSAGE: &str = "No relevant context found. Please try rephrasing your query.";

/// Configuration for retrieval.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Number of chunks fetched per query.
    pub top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

impl From<&wyrm_core::RetrievalConfig> for RetrieverConfig {
    fn from(config: &wyrm_core::RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
        }
    }
}

/// Embeds a query and fetches the nearest chunks from the index.
pub struct Retriever<E, I> {
    /// Embedding model.
    embedder: Arc<E>,

    /// Vector index.
    index: Arc<I>,

    config: RetrieverConfig,
}

impl<E, I> Retriever<E, I>
where
    E: Embedder,
    I: VectorIndex,
{
    /// Create a new retriever.
    pub fn new(embedder: Arc<E>, index: Arc<I>, config: RetrieverConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Configured number of chunks per query.
    pub fn top_k(&self) -> usize {
        self.config.top_k
    }

    /// Ranked matches for `query`, best first.
    pub async fn retrieve_matches(&self, query: &str, top_k: usize) -> Result<RetrievalResult> {
        if top_k == 0 {
            return Err(WyrmError::invalid_argument("top_k must be positive"));
        }

        let start = Instant::now();

        let query_embedding = self.embedder.embed_query(query).await?;
        let matches = self.index.query(&query_embedding, top_k).await?;

        debug!(
            "Retrieved {} matches in {}ms: {:?}",
            matches.len(),
            start.elapsed().as_millis(),
            matches.iter().map(|m| m.id.as_str()).collect::<Vec<_>>()
        );

        Ok(RetrievalResult { matches })
    }

    /// Newline-joined context for `query`, or [`NO_CONTEXT_MESSAGE`] when
    /// the index returns nothing.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<String> {
        let result = self.retrieve_matches(query, top_k).await?;

        if result.is_empty() {
            warn!("No relevant context found for query: {:?}", query);
            return Ok(NO_CONTEXT_MESSAGE.to_string());
        }

        info!("Retrieved {} context chunks", result.matches.len());
        Ok(result.context())
    }

    /// [`Self::retrieve`] with the configured `top_k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<String> {
        self.retrieve(query, self.config.top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyrm_embed::MockEmbedder;
    use wyrm_store::{MemoryIndex, SqliteIndex};

    async fn seeded(index: &impl VectorIndex, embedder: &MockEmbedder) {
        for (id, text) in [
            ("ls.txt_0", "ls lists directory contents"),
            ("tar.txt_0", "tar creates and extracts archive files"),
            ("grep.txt_0", "grep searches files for lines matching a pattern"),
        ] {
            let v = embedder.embed_query(text).await.unwrap();
            index.upsert(id, &v, text).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_sentinel() {
        let embedder = Arc::new(MockEmbedder::new());
        let index = Arc::new(SqliteIndex::open_memory(384).unwrap());
        let retriever = Retriever::new(embedder, index, RetrieverConfig::default());

        let context = retriever.retrieve("how do I list files", 3).await.unwrap();
        assert_eq!(
            context,
            "No relevant context found. Please try rephrasing your query."
        );
    }

    #[tokio::test]
    async fn test_context_in_ranking_order() {
        let embedder = Arc::new(MockEmbedder::new());
        let index = Arc::new(MemoryIndex::new(384));
        seeded(index.as_ref(), &embedder).await;

        let retriever = Retriever::new(embedder, index, RetrieverConfig::default());
        let result = retriever
            .retrieve_matches("list directory contents", 2)
            .await
            .unwrap();

        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.matches[0].id, "ls.txt_0");

        let context = retriever.retrieve("list directory contents", 2).await.unwrap();
        let lines: Vec<_> = context.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ls lists directory contents");
    }

    #[tokio::test]
    async fn test_top_k_caps_results() {
        let embedder = Arc::new(MockEmbedder::new());
        let index = Arc::new(SqliteIndex::open_memory(384).unwrap());
        seeded(index.as_ref(), &embedder).await;

        let retriever = Retriever::new(embedder, index, RetrieverConfig { top_k: 10 });
        let context = retriever.retrieve_default("files").await.unwrap();
        assert_eq!(context.lines().count(), 3);
        assert_eq!(retriever.top_k(), 10);
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected() {
        let retriever = Retriever::new(
            Arc::new(MockEmbedder::new()),
            Arc::new(MemoryIndex::new(384)),
            RetrieverConfig::default(),
        );
        let err = retriever.retrieve("anything", 0).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let retriever = Retriever::new(
            Arc::new(MockEmbedder::new().failing_on("boom")),
            Arc::new(MemoryIndex::new(384)),
            RetrieverConfig::default(),
        );
        assert!(retriever.retrieve("boom", 3).await.is_err());
    }
}
