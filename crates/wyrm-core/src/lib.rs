//! wyrm-core - Core types and traits for the wyrm assistant
//!
//! This crate provides the data model, the interfaces to the external
//! collaborators (embedding model, vector index, generative model), the
//! error taxonomy and the configuration shared by every other crate.

pub mod config;
pub mod error;
pub mod policy;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, WyrmError};
pub use policy::CallPolicy;
pub use traits::*;
pub use types::*;
