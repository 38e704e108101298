//! wyrm-chunk - Chunking strategies
//!
//! Splits a document into bounded-size text units for embedding.
//!
//! # Chunkers
//!
//! - [`WordChunker`]: groups whitespace-delimited words into consecutive,
//!   non-overlapping windows of a fixed size.
//!
//! # Example
//!
//! ```rust
//! use wyrm_chunk::{ChunkConfig, Chunker, WordChunker};
//!
//! let chunker = WordChunker::new();
//! let config = ChunkConfig { chunk_size: 2 };
//! let chunks = chunker.chunk("ls lists directory contents", &config).unwrap();
//! assert_eq!(chunks[1].content, "directory contents");
//! ```

mod word;

pub use word::{chunk_text, WordChunker};

// Re-export types for convenience
pub use wyrm_core::{ChunkConfig, ChunkData, Chunker};
