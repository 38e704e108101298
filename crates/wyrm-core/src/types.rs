//! Core domain types for the wyrm pipeline.

use serde::{Deserialize, Serialize};

/// A named unit of source text, usually one reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier derived from the source name (e.g. `ls.txt`).
    pub id: String,

    /// Full text of the document.
    pub content: String,
}

impl Document {
    /// Create a new document.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    /// Build the chunks of this document from already-split texts.
    pub fn chunks(&self, texts: Vec<String>) -> Vec<Chunk> {
        texts
            .into_iter()
            .enumerate()
            .map(|(idx, content)| Chunk::new(&self.id, idx as u32, content))
            .collect()
    }
}

/// A contiguous word-bounded slice of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Parent document identifier.
    pub document_id: String,

    /// Index within the document (0-based).
    pub index: u32,

    /// Chunk text content.
    pub content: String,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(document_id: &str, index: u32, content: impl Into<String>) -> Self {
        Self {
            document_id: document_id.to_string(),
            index,
            content: content.into(),
        }
    }

    /// Corpus-wide identity: `"{document_id}_{index}"`.
    pub fn id(&self) -> String {
        chunk_id(&self.document_id, self.index)
    }
}

/// Format a chunk identity.
pub fn chunk_id(document_id: &str, index: u32) -> String {
    format!("{}_{}", document_id, index)
}

/// Recover the parent document id from a chunk identity.
///
/// Identities without a numeric `_N` suffix are their own document.
pub fn document_id_of(chunk_id: &str) -> &str {
    match chunk_id.rsplit_once('_') {
        Some((doc, seq)) if !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()) => doc,
        _ => chunk_id,
    }
}

/// A persisted (identity, vector, text) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Chunk identity.
    pub id: String,

    /// Parent document identifier.
    pub document_id: String,

    /// Embedding vector.
    pub embedding: Vec<f32>,

    /// Chunk text.
    pub document: String,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id(),
            document_id: chunk.document_id.clone(),
            embedding,
            document: chunk.content.clone(),
        }
    }
}

/// A ranked match returned by an index query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Chunk identity.
    pub id: String,

    /// Chunk text.
    pub document: String,

    /// Cosine distance to the query (lower is closer).
    pub distance: f32,
}

/// Ordered top-k matches for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Matches in ranking order, best first.
    pub matches: Vec<QueryMatch>,
}

impl RetrievalResult {
    /// Whether the index returned nothing.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Flatten matched texts into one newline-joined context string.
    pub fn context(&self) -> String {
        self.matches
            .iter()
            .map(|m| m.document.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Statistics about the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of entries (chunks).
    pub entries: u64,

    /// Number of distinct parent documents.
    pub documents: u64,

    /// Embedding dimension.
    pub dimension: usize,

    /// Storage size in bytes (0 for memory-backed indexes).
    pub storage_bytes: u64,
}

/// One (query, response) exchange in the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub query: String,
    pub response: String,
}

impl SessionRecord {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
        }
    }
}

impl std::fmt::Display for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "You: {}\nAI: {}\n\n", self.query, self.response)
    }
}
