//! wyrm-pipeline - End-to-end orchestration
//!
//! Wires the components together with explicit dependency injection:
//! every stage takes its embedder, index and generator as parameters.
//!
//! - [`IngestPipeline`]: directory of text files into the index.
//! - [`Assistant`]: retrieve, compose, generate, record.
//! - [`SessionRecorder`]: append-only `You:`/`AI:` history file.

mod assistant;
mod ingest;
mod session;

pub use assistant::{Assistant, ERROR_MARKER};
pub use ingest::{IngestOptions, IngestPipeline, IngestReport};
pub use session::SessionRecorder;
