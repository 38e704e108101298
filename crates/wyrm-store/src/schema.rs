//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- One row per chunk identity
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    document TEXT NOT NULL,
    embedding BLOB NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_document_id ON entries(document_id);

-- Index-wide settings (dimension, schema version)
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;
