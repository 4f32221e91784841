//! Optional redb-backed secondary index for the in-memory store's hot path.
//!
//! The `Store` trait is the canonical source of truth; this index is a
//! write-through cache that avoids full-scans when a caller repeatedly
//! looks up the same handful of documents (e.g. the attention engine
//! re-touching recently-recalled decisions). If the index file is absent or
//! corrupt it is rebuilt by replaying whatever the caller re-inserts.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lru::LruCache;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use uuid::Uuid;

use crate::document::Document;

const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");
const LRU_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct IndexCacheStats {
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_pct: f32,
}

pub struct SecondaryIndex {
    db: Database,
    path: PathBuf,
    cache: LruCache<Uuid, Document>,
    cache_hits: u64,
    cache_misses: u64,
}

impl SecondaryIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(&path)
            .with_context(|| format!("opening redb secondary index at {}", path.display()))?;
        {
            let tx = db.begin_write()?;
            tx.open_table(ENTRIES_TABLE)?;
            tx.commit()?;
        }
        Ok(Self {
            db,
            path,
            cache: LruCache::new(NonZeroUsize::new(LRU_CAPACITY).unwrap()),
            cache_hits: 0,
            cache_misses: 0,
        })
    }

    pub fn insert(&mut self, collection: &str, document: &Document) -> Result<()> {
        let key = format!("{collection}:{}", document.id);
        let bytes = bincode::serde::encode_to_vec(
            (&document.id, &document.fields),
            bincode::config::standard(),
        )?;
        let tx = self.db.begin_write()?;
        {
            let mut tbl = tx.open_table(ENTRIES_TABLE)?;
            tbl.insert(key.as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        self.cache.put(document.id, document.clone());
        Ok(())
    }

    pub fn cache_get(&mut self, id: Uuid) -> Option<&Document> {
        match self.cache.get(&id) {
            Some(doc) => {
                self.cache_hits += 1;
                Some(doc)
            }
            None => {
                self.cache_misses += 1;
                None
            }
        }
    }

    pub fn cache_stats(&self) -> IndexCacheStats {
        let total = self.cache_hits + self.cache_misses;
        IndexCacheStats {
            capacity: LRU_CAPACITY,
            len: self.cache.len(),
            hits: self.cache_hits,
            misses: self.cache_misses,
            hit_rate_pct: if total == 0 {
                0.0
            } else {
                (self.cache_hits as f32 / total as f32) * 100.0
            },
        }
    }

    pub fn len(&self) -> Result<usize> {
        let tx = self.db.begin_read()?;
        let tbl = tx.open_table(ENTRIES_TABLE)?;
        Ok(tbl.len()? as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_cache_get_hits() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut index = SecondaryIndex::open(dir.path().join("index.redb"))?;
        let doc = Document::new(Uuid::new_v4());
        let id = doc.id;
        index.insert("decisions", &doc)?;
        assert!(index.cache_get(id).is_some());
        assert_eq!(index.cache_stats().hits, 1);
        Ok(())
    }
}
