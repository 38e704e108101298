//! wyrm-query - Retrieval and prompt composition
//!
//! This crate turns a user query into a prompt for the generator:
//!
//! - [`Retriever`] embeds the query, asks the index for the nearest chunks
//!   and joins their texts into one context string.
//! - [`PromptTemplate`] places that context and the query into a fixed
//!   instruction template.
//!
//! # Example
//!
//! ```rust,ignore
//! use wyrm_query::{compose_prompt, Retriever, RetrieverConfig};
//! use std::sync::Arc;
//!
//! let retriever = Retriever::new(Arc::new(embedder), Arc::new(index), RetrieverConfig::default());
//! let context = retriever.retrieve("list hidden files", 3).await?;
//! let prompt = compose_prompt(&context, "list hidden files");
//! ```

mod prompt;
mod retriever;

pub use prompt::{compose_prompt, PromptTemplate, DEFAULT_TEMPLATE};
pub use retriever::{Retriever, RetrieverConfig, NO_CONTEXT_MESSAGE};

// Re-export for convenience
pub use wyrm_core::{QueryMatch, RetrievalResult};
