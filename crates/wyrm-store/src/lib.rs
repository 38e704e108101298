//! wyrm-store - Vector index implementations
//!
//! This crate provides the durable index used by the CLI and an in-memory
//! index with the same semantics for tests.
//!
//! - [`SqliteIndex`]: one SQLite file at a fixed path. Ranking is done in
//!   SQL through a registered `cosine_distance` function.
//! - [`MemoryIndex`]: a `BTreeMap` scanned on every query.

mod distance;
mod memory;
mod schema;
mod sqlite;

pub use distance::cosine_distance;
pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
