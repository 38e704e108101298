//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::{Result, WyrmError};
use crate::types::{document_id_of, IndexEntry, IndexStats, QueryMatch};

/// Embedding model trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of document texts, one vector per input in order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Persistent nearest-neighbour index over chunk embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert an entry, or replace the entry with the same id.
    async fn upsert(&self, id: &str, embedding: &[f32], document: &str) -> Result<()>;

    /// Upsert many entries.
    async fn upsert_batch(&self, entries: &[IndexEntry]) -> Result<()> {
        for entry in entries {
            self.upsert(&entry.id, &entry.embedding, &entry.document)
                .await?;
        }
        Ok(())
    }

    /// Top-k entries by increasing distance. Empty index yields an empty vec.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<QueryMatch>>;

    /// Remove every entry belonging to a document. Returns the number removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Swap a document's entries for `entries`.
    ///
    /// Every vector is checked before anything is removed. Implementations
    /// that can do so apply the delete and the writes atomically.
    async fn replace_document(&self, document_id: &str, entries: &[IndexEntry]) -> Result<usize> {
        for entry in entries {
            self.check_dimension(&entry.embedding)?;
        }
        let removed = self.delete_document(document_id).await?;
        self.upsert_batch(entries).await?;
        Ok(removed)
    }

    /// Index statistics.
    async fn stats(&self) -> Result<IndexStats>;

    /// Dimension every stored vector must have.
    fn dimension(&self) -> usize;

    /// Reject a vector whose length differs from the index dimension.
    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension() {
            return Err(WyrmError::DimensionMismatch {
                expected: self.dimension(),
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

/// Build an entry for a bare `upsert` call, deriving the parent document.
pub fn entry_for(id: &str, embedding: &[f32], document: &str) -> IndexEntry {
    IndexEntry {
        id: id.to_string(),
        document_id: document_id_of(id).to_string(),
        embedding: embedding.to_vec(),
        document: document.to_string(),
    }
}

/// Generative model trait.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier used for every call.
    fn model(&self) -> &str;
}

/// Chunking configuration.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Words per chunk.
    pub chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 100 }
    }
}

/// Chunking strategy trait.
pub trait Chunker: Send + Sync {
    /// Chunk text content into pieces.
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>>;
}

/// Raw chunk data before identity assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    /// Chunk text content.
    pub content: String,

    /// Word count.
    pub word_count: usize,

    /// Offset of the first word within the document (0-based).
    pub start_word: usize,
}
