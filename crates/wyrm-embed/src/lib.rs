//! wyrm-embed - Embedding model wrappers
//!
//! This crate provides ONNX-based sentence embeddings (all-MiniLM-L6-v2 by
//! default) behind the [`Embedder`] trait.
//!
//! # Features
//!
//! - ONNX Runtime inference on the blocking thread pool
//! - Mean pooling with attention mask and L2 normalization
//! - Batch embedding support
//! - [`GuardedEmbedder`]: per-call timeout and bounded retry
//! - [`MockEmbedder`]: deterministic bag-of-words vectors for tests

mod guarded;
mod mock;
mod onnx;

pub use guarded::GuardedEmbedder;
pub use mock::MockEmbedder;
pub use onnx::OnnxEmbedder;

// Re-export the Embedder trait for convenience
pub use wyrm_core::Embedder;
