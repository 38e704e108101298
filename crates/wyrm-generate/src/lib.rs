//! wyrm-generate - Generative model clients
//!
//! - [`OllamaGenerator`]: non-streaming `POST /api/chat` against a local
//!   Ollama server, under a timeout and bounded retry.
//! - [`MockGenerator`]: canned responses for tests.

mod mock;
mod ollama;

pub use mock::MockGenerator;
pub use ollama::OllamaGenerator;

// Re-export trait
pub use wyrm_core::Generator;
