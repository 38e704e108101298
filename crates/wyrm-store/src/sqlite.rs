//! SQLite-based index implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use wyrm_core::{entry_for, IndexEntry, IndexStats, QueryMatch, Result, VectorIndex, WyrmError};

use crate::distance::{bytes_to_vec, cosine_distance, vec_to_bytes};
use crate::schema::{SCHEMA, SCHEMA_VERSION};

/// Durable vector index backed by a single SQLite file.
///
/// The connection sits behind a blocking Mutex, so upserts and queries
/// from different callers are serialized.
pub struct SqliteIndex {
    /// Connection wrapped in blocking Mutex.
    conn: Mutex<Connection>,

    /// Dimension every stored vector has.
    dimension: usize,
}

impl SqliteIndex {
    /// Open or create an index at the given path.
    ///
    /// Failures are reported as [`WyrmError::IndexUnavailable`].
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                WyrmError::index_unavailable(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| WyrmError::index_unavailable(format!("Failed to open database: {}", e)))?;

        Self::init(conn, dimension, path)
    }

    /// Open an in-memory index (for testing).
    pub fn open_memory(dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            WyrmError::index_unavailable(format!("Failed to open in-memory database: {}", e))
        })?;

        Self::init(conn, dimension, Path::new(":memory:"))
    }

    /// Initialize the index with a connection.
    fn init(conn: Connection, dimension: usize, path: &Path) -> Result<Self> {
        if dimension == 0 {
            return Err(WyrmError::invalid_argument("index dimension must be positive"));
        }

        Self::configure_connection(&conn)?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| {
                WyrmError::index_unavailable(format!("Failed to initialize schema: {}", e))
            })?;

        Self::register_functions(&conn)?;
        Self::check_meta(&conn, dimension)?;

        info!("Index opened at {:?} (dim={})", path, dimension);

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    /// Configure SQLite connection for this workload.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 30000;
            PRAGMA temp_store = MEMORY;
            "#,
        )
        .map_err(|e| {
            WyrmError::index_unavailable(format!("Failed to configure connection: {}", e))
        })?;

        Ok(())
    }

    /// Register `cosine_distance(blob, blob)` used for ranking.
    fn register_functions(conn: &Connection) -> Result<()> {
        conn.create_scalar_function(
            "cosine_distance",
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let a = ctx
                    .get_raw(0)
                    .as_blob()
                    .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
                let b = ctx
                    .get_raw(1)
                    .as_blob()
                    .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
                Ok(cosine_distance(&bytes_to_vec(a), &bytes_to_vec(b)) as f64)
            },
        )
        .map_err(|e| WyrmError::index_unavailable(format!("Failed to register functions: {}", e)))
    }

    /// Record the dimension on first open; refuse a different one later.
    fn check_meta(conn: &Connection, dimension: usize) -> Result<()> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'dimension'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| WyrmError::index_unavailable(e.to_string()))?;

        match stored {
            Some(value) => {
                let stored_dim: usize = value.parse().map_err(|_| {
                    WyrmError::index_unavailable(format!("Corrupt stored dimension: {}", value))
                })?;
                if stored_dim != dimension {
                    return Err(WyrmError::index_unavailable(format!(
                        "index was built with dimension {}, embedder produces {}",
                        stored_dim, dimension
                    )));
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO index_meta (key, value) VALUES ('dimension', ?1), ('schema_version', ?2)",
                    params![dimension.to_string(), SCHEMA_VERSION.to_string()],
                )
                .map_err(|e| WyrmError::index_unavailable(e.to_string()))?;
            }
        }

        Ok(())
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| WyrmError::database(e.to_string()))?;
        f(&conn)
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Upsert entries in one transaction, first removing every entry of
    /// `replace` when given. Returns the number of entries removed.
    fn write_entries(&self, replace: Option<&str>, entries: &[IndexEntry]) -> Result<usize> {
        for entry in entries {
            self.check_dimension(&entry.embedding)?;
        }

        let now = Self::now_millis();

        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| WyrmError::database(e.to_string()))?;

            let removed = match replace {
                Some(document_id) => tx
                    .execute(
                        "DELETE FROM entries WHERE document_id = ?1",
                        params![document_id],
                    )
                    .map_err(|e| WyrmError::database(e.to_string()))?,
                None => 0,
            };

            {
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO entries (id, document_id, document, embedding, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        ON CONFLICT(id) DO UPDATE SET
                            document_id = excluded.document_id,
                            document = excluded.document,
                            embedding = excluded.embedding,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .map_err(|e| WyrmError::database(e.to_string()))?;

                for entry in entries {
                    stmt.execute(params![
                        entry.id,
                        entry.document_id,
                        entry.document,
                        vec_to_bytes(&entry.embedding),
                        now,
                    ])
                    .map_err(|e| WyrmError::database(format!("Failed to upsert entry: {}", e)))?;
                }
            }

            tx.commit().map_err(|e| WyrmError::database(e.to_string()))?;

            debug!("Upserted {} entries ({} removed)", entries.len(), removed);
            Ok(removed)
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, id: &str, embedding: &[f32], document: &str) -> Result<()> {
        self.write_entries(None, &[entry_for(id, embedding, document)])?;
        Ok(())
    }

    async fn upsert_batch(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.write_entries(None, entries)?;
        Ok(())
    }

    async fn replace_document(&self, document_id: &str, entries: &[IndexEntry]) -> Result<usize> {
        self.write_entries(Some(document_id), entries)
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Err(WyrmError::invalid_argument("k must be positive"));
        }
        self.check_dimension(embedding)?;

        let embedding_bytes = vec_to_bytes(embedding);

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, document, cosine_distance(embedding, ?1) AS distance
                    FROM entries
                    ORDER BY distance ASC, id ASC
                    LIMIT ?2
                    "#,
                )
                .map_err(|e| WyrmError::database(e.to_string()))?;

            let matches = stmt
                .query_map(params![embedding_bytes, k as i64], |row| {
                    let distance: f64 = row.get(2)?;
                    Ok(QueryMatch {
                        id: row.get(0)?,
                        document: row.get(1)?,
                        distance: distance as f32,
                    })
                })
                .map_err(|e| WyrmError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| WyrmError::database(e.to_string()))?;

            Ok(matches)
        })
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM entries WHERE document_id = ?1",
                    params![document_id],
                )
                .map_err(|e| WyrmError::database(e.to_string()))?;

            if deleted > 0 {
                debug!("Deleted {} entries for document {}", deleted, document_id);
            }
            Ok(deleted)
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        let dimension = self.dimension;

        self.with_conn(move |conn| {
            let (entries, documents): (u64, u64) = conn
                .query_row(
                    "SELECT COUNT(*), COUNT(DISTINCT document_id) FROM entries",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| WyrmError::database(e.to_string()))?;

            // Get page count and page size to estimate storage
            let page_count: u64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: u64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            Ok(IndexStats {
                entries,
                documents,
                dimension,
                storage_bytes: page_count * page_size,
            })
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_open_memory() {
        let index = SqliteIndex::open_memory(4).unwrap();
        assert_eq!(index.stats().await.unwrap().entries, 0);
        assert_eq!(index.dimension(), 4);
    }

    #[tokio::test]
    async fn test_query_empty_index() {
        let index = SqliteIndex::open_memory(4).unwrap();
        let matches = index.query(&unit(4, 0), 3).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_query_ranks_by_distance() {
        let index = SqliteIndex::open_memory(3).unwrap();
        index.upsert("far.txt_0", &[0.0, 0.0, 1.0], "far").await.unwrap();
        index.upsert("near.txt_0", &[1.0, 0.1, 0.0], "near").await.unwrap();
        index.upsert("mid.txt_0", &[1.0, 1.0, 0.0], "mid").await.unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0], 3).await.unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["near.txt_0", "mid.txt_0", "far.txt_0"]);
        assert!(matches[0].distance <= matches[1].distance);
        assert!(matches[1].distance <= matches[2].distance);

        let top = index.query(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].document, "near");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let index = SqliteIndex::open_memory(2).unwrap();
        for _ in 0..2 {
            index.upsert("ls.txt_0", &[1.0, 0.0], "ls lists").await.unwrap();
            index.upsert("ls.txt_1", &[0.0, 1.0], "directory contents").await.unwrap();
        }

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.documents, 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_text_and_vector() {
        let index = SqliteIndex::open_memory(2).unwrap();
        index.upsert("a.txt_0", &[1.0, 0.0], "old").await.unwrap();
        index.upsert("a.txt_0", &[0.0, 1.0], "new").await.unwrap();

        let matches = index.query(&[0.0, 1.0], 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document, "new");
        assert!(matches[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = SqliteIndex::open_memory(3).unwrap();
        let err = index.upsert("x_0", &[1.0, 0.0], "short").await.unwrap_err();
        assert!(matches!(
            err,
            WyrmError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(index.query(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let index = SqliteIndex::open_memory(2).unwrap();
        assert!(index.query(&[1.0, 0.0], 0).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_document() {
        let index = SqliteIndex::open_memory(2).unwrap();
        let entries: Vec<IndexEntry> = (0..3)
            .map(|i| entry_for(&format!("tar.txt_{}", i), &[1.0, i as f32], "tar"))
            .collect();
        index.upsert_batch(&entries).await.unwrap();
        index.upsert("ls.txt_0", &[0.0, 1.0], "ls").await.unwrap();

        assert_eq!(index.delete_document("tar.txt").await.unwrap(), 3);
        assert_eq!(index.delete_document("tar.txt").await.unwrap(), 0);

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_replace_document_swaps_entries() {
        let index = SqliteIndex::open_memory(2).unwrap();
        let old: Vec<IndexEntry> = (0..3)
            .map(|i| entry_for(&format!("doc.txt_{}", i), &[1.0, 0.0], "old"))
            .collect();
        index.upsert_batch(&old).await.unwrap();
        index.upsert("other.txt_0", &[0.0, 1.0], "other").await.unwrap();

        let new = vec![entry_for("doc.txt_0", &[0.0, 1.0], "new")];
        assert_eq!(index.replace_document("doc.txt", &new).await.unwrap(), 3);

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.documents, 2);
    }

    #[tokio::test]
    async fn test_rejected_replace_keeps_old_entries() {
        let index = SqliteIndex::open_memory(2).unwrap();
        index.upsert("doc.txt_0", &[1.0, 0.0], "old").await.unwrap();

        let bad = vec![
            entry_for("doc.txt_0", &[0.0, 1.0], "new"),
            entry_for("doc.txt_1", &[1.0, 0.0, 0.0], "wrong size"),
        ];
        assert!(index.replace_document("doc.txt", &bad).await.is_err());

        let matches = index.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document, "old");
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_delete() {
        let index = SqliteIndex::open_memory(2).unwrap();
        index.upsert("doc.txt_0", &[1.0, 0.0], "old").await.unwrap();
        index
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_new BEFORE INSERT ON entries \
                     WHEN NEW.document = 'new' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )
                .map_err(|e| WyrmError::database(e.to_string()))
            })
            .unwrap();

        let new = vec![entry_for("doc.txt_5", &[0.0, 1.0], "new")];
        let err = index.replace_document("doc.txt", &new).await.unwrap_err();
        assert_eq!(err.error_code(), "DATABASE_ERROR");

        // The delete ran in the same transaction and was rolled back.
        let matches = index.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "doc.txt_0");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.sqlite");

        {
            let index = SqliteIndex::open(&path, 2).unwrap();
            index.upsert("ls.txt_0", &[1.0, 0.0], "ls lists").await.unwrap();
        }

        let reopened = SqliteIndex::open(&path, 2).unwrap();
        let matches = reopened.query(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "ls.txt_0");
    }

    #[tokio::test]
    async fn test_reopen_with_other_dimension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite");

        drop(SqliteIndex::open(&path, 2).unwrap());

        let err = SqliteIndex::open(&path, 3).err().unwrap();
        assert!(err.is_fatal());
        assert_eq!(err.error_code(), "INDEX_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_unopenable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let err = SqliteIndex::open(dir.path(), 2).err().unwrap();
        assert_eq!(err.error_code(), "INDEX_UNAVAILABLE");
    }
}
