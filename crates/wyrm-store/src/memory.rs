//! In-process index with the same ranking rules as [`crate::SqliteIndex`].

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use wyrm_core::{entry_for, IndexEntry, IndexStats, QueryMatch, Result, VectorIndex, WyrmError};

use crate::distance::cosine_distance;

/// Vector index held entirely in memory. Nothing survives a drop.
pub struct MemoryIndex {
    entries: Mutex<BTreeMap<String, IndexEntry>>,
    dimension: usize,
}

impl MemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            dimension,
        }
    }

    fn with_entries<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut BTreeMap<String, IndexEntry>) -> R,
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| WyrmError::internal(e.to_string()))?;
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, id: &str, embedding: &[f32], document: &str) -> Result<()> {
        self.check_dimension(embedding)?;
        let entry = entry_for(id, embedding, document);
        self.with_entries(|entries| {
            entries.insert(entry.id.clone(), entry);
        })
    }

    async fn upsert_batch(&self, batch: &[IndexEntry]) -> Result<()> {
        for entry in batch {
            self.check_dimension(&entry.embedding)?;
        }
        self.with_entries(|entries| {
            for entry in batch {
                entries.insert(entry.id.clone(), entry.clone());
            }
        })?;
        debug!("Upserted {} entries", batch.len());
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Err(WyrmError::invalid_argument("k must be positive"));
        }
        self.check_dimension(embedding)?;

        self.with_entries(|entries| {
            // BTreeMap iterates in id order, so a stable sort keeps id as tie-break.
            let mut matches: Vec<QueryMatch> = entries
                .values()
                .map(|entry| QueryMatch {
                    id: entry.id.clone(),
                    document: entry.document.clone(),
                    distance: cosine_distance(&entry.embedding, embedding),
                })
                .collect();
            matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            matches.truncate(k);
            matches
        })
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        self.with_entries(|entries| {
            let before = entries.len();
            entries.retain(|_, entry| entry.document_id != document_id);
            before - entries.len()
        })
    }

    async fn replace_document(&self, document_id: &str, batch: &[IndexEntry]) -> Result<usize> {
        for entry in batch {
            self.check_dimension(&entry.embedding)?;
        }
        self.with_entries(|entries| {
            let before = entries.len();
            entries.retain(|_, entry| entry.document_id != document_id);
            let removed = before - entries.len();
            for entry in batch {
                entries.insert(entry.id.clone(), entry.clone());
            }
            removed
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        let dimension = self.dimension;
        self.with_entries(|entries| {
            let mut documents: Vec<&str> =
                entries.values().map(|e| e.document_id.as_str()).collect();
            documents.sort_unstable();
            documents.dedup();

            IndexStats {
                entries: entries.len() as u64,
                documents: documents.len() as u64,
                dimension,
                storage_bytes: entries
                    .values()
                    .map(|e| (e.embedding.len() * 4 + e.document.len() + e.id.len()) as u64)
                    .sum(),
            }
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_query() {
        let index = MemoryIndex::new(2);
        assert!(index.query(&[1.0, 0.0], 5).await.unwrap().is_empty());
        assert_eq!(
            index.stats().await.unwrap(),
            IndexStats {
                dimension: 2,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_ties_break_by_id() {
        let index = MemoryIndex::new(2);
        index.upsert("b_0", &[1.0, 0.0], "b").await.unwrap();
        index.upsert("a_0", &[1.0, 0.0], "a").await.unwrap();
        index.upsert("c_0", &[0.0, 1.0], "c").await.unwrap();

        let matches = index.query(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a_0", "b_0"]);
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_entry() {
        let index = MemoryIndex::new(2);
        index.upsert("ls.txt_0", &[1.0, 0.0], "old").await.unwrap();
        index.upsert("ls.txt_0", &[1.0, 0.0], "new").await.unwrap();

        let matches = index.query(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document, "new");
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let index = MemoryIndex::new(2);
        let batch = vec![
            entry_for("tar.txt_0", &[1.0, 0.0], "tar one"),
            entry_for("tar.txt_1", &[0.5, 0.5], "tar two"),
            entry_for("ls.txt_0", &[0.0, 1.0], "ls"),
        ];
        index.upsert_batch(&batch).await.unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.documents, 2);

        assert_eq!(index.delete_document("tar.txt").await.unwrap(), 2);
        assert_eq!(index.stats().await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_replace_document() {
        let index = MemoryIndex::new(2);
        index.upsert("tar.txt_0", &[1.0, 0.0], "tar one").await.unwrap();
        index.upsert("tar.txt_1", &[1.0, 0.0], "tar two").await.unwrap();

        let bad = vec![entry_for("tar.txt_0", &[1.0], "short")];
        assert!(index.replace_document("tar.txt", &bad).await.is_err());
        assert_eq!(index.stats().await.unwrap().entries, 2);

        let new = vec![entry_for("tar.txt_0", &[0.0, 1.0], "tar new")];
        assert_eq!(index.replace_document("tar.txt", &new).await.unwrap(), 2);

        let matches = index.query(&[0.0, 1.0], 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document, "tar new");
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let index = MemoryIndex::new(3);
        let batch = vec![
            entry_for("a_0", &[1.0, 0.0, 0.0], "a"),
            entry_for("b_0", &[1.0], "b"),
        ];
        assert!(index.upsert_batch(&batch).await.is_err());
        // Nothing from a rejected batch is written.
        assert_eq!(index.stats().await.unwrap().entries, 0);
        assert!(index.query(&[1.0, 0.0, 0.0], 0).await.is_err());
    }
}
