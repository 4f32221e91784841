use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::document::Document;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::vector::{cosine_similarity, VectorHit, VectorSearchOptions};

/// Document-store contract (spec §4.2): collections, atomic counters,
/// add-to-set updates, TTL, and pre-filtered vector search.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError>;

    async fn put(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError>;

    /// Atomic `find_one_and_update` with `$inc`, returning the document
    /// after the increment. Upserts with `set_on_insert` when absent and
    /// `upsert` is true.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        inc: &[(&str, i64)],
        set_on_insert: &Map<String, Value>,
        upsert: bool,
    ) -> Result<Document, StoreError>;

    /// `$addToSet`-style set-union update on one or more list fields.
    async fn add_to_set(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &[(&str, Vec<Value>)],
        upsert: bool,
    ) -> Result<(), StoreError>;

    async fn vector_search(
        &self,
        collection: &str,
        query: &[f32],
        options: VectorSearchOptions,
    ) -> Result<Vec<VectorHit>, StoreError>;
}

#[derive(Default)]
struct Collection {
    documents: HashMap<Uuid, Document>,
}

/// In-memory reference `Store`, grounded on the teacher's plain Vec/HashMap
/// `MemoryStore`. Not a production backend — it exists so the rest of the
/// workspace is runnable and testable without a live document database.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(collection: &mut Collection) {
        let now = Utc::now();
        collection.documents.retain(|_, doc| !doc.is_expired(now));
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let entry = collections.entry(collection.to_string()).or_default();
        Self::purge_expired(entry);
        Ok(entry.documents.get(&id).cloned())
    }

    async fn put(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let entry = collections.entry(collection.to_string()).or_default();
        entry.documents.insert(document.id, document);
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let entry = collections.entry(collection.to_string()).or_default();
        Self::purge_expired(entry);
        Ok(entry
            .documents
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let entry = collections.entry(collection.to_string()).or_default();
        entry.documents.remove(&id);
        Ok(())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        inc: &[(&str, i64)],
        set_on_insert: &Map<String, Value>,
        upsert: bool,
    ) -> Result<Document, StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let entry = collections.entry(collection.to_string()).or_default();
        Self::purge_expired(entry);

        let existing_id = entry
            .documents
            .values()
            .find(|doc| filter.matches(doc))
            .map(|doc| doc.id);

        let id = match existing_id {
            Some(id) => id,
            None => {
                if !upsert {
                    return Err(StoreError::NotFound(format!(
                        "no document in {collection} matches filter"
                    )));
                }
                let id = Uuid::new_v4();
                let mut doc = Document::new(id);
                for (field, value) in filter.eq_fields() {
                    doc.set(field, value.clone());
                }
                for (field, value) in set_on_insert {
                    doc.set(field, value.clone());
                }
                for (field, _) in inc {
                    if !doc.fields.contains_key(*field) {
                        doc.set(field, Value::from(0i64));
                    }
                }
                entry.documents.insert(id, doc);
                id
            }
        };

        let doc = entry.documents.get_mut(&id).expect("just inserted or found");
        for (field, delta) in inc {
            let current = doc.get(*field).and_then(Value::as_i64).unwrap_or(0);
            doc.set(field, Value::from(current + delta));
        }
        Ok(doc.clone())
    }

    async fn add_to_set(
        &self,
        collection: &str,
        filter: &Filter,
        fields: &[(&str, Vec<Value>)],
        upsert: bool,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let entry = collections.entry(collection.to_string()).or_default();

        let existing_id = entry
            .documents
            .values()
            .find(|doc| filter.matches(doc))
            .map(|doc| doc.id);

        let id = match existing_id {
            Some(id) => id,
            None => {
                if !upsert {
                    return Err(StoreError::NotFound(format!(
                        "no document in {collection} matches filter"
                    )));
                }
                let id = Uuid::new_v4();
                let mut doc = Document::new(id);
                for (field, value) in filter.eq_fields() {
                    doc.set(field, value.clone());
                }
                entry.documents.insert(id, doc);
                id
            }
        };

        let doc = entry.documents.get_mut(&id).expect("just inserted or found");
        for (field, new_values) in fields {
            let mut current: Vec<Value> = doc
                .get(field)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for value in new_values {
                if !current.contains(value) {
                    current.push(value.clone());
                }
            }
            doc.set(field, Value::from(current));
        }
        Ok(())
    }

    async fn vector_search(
        &self,
        collection: &str,
        query: &[f32],
        options: VectorSearchOptions,
    ) -> Result<Vec<VectorHit>, StoreError> {
        let mut collections = self.collections.write().expect("store lock poisoned");
        let entry = collections.entry(collection.to_string()).or_default();
        Self::purge_expired(entry);

        let mut candidates: Vec<VectorHit> = entry
            .documents
            .values()
            .filter(|doc| options.filter.as_ref().is_none_or(|f| f.matches(doc)))
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                let similarity = cosine_similarity(query, embedding);
                Some(VectorHit {
                    document: doc.clone(),
                    similarity,
                })
            })
            .filter(|hit| options.min_similarity.is_none_or(|min| hit.similarity >= min))
            .collect();

        candidates.truncate(options.num_candidates);
        candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        candidates.truncate(options.k);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_one_and_update_allocates_gap_free_sequence() -> Result<(), StoreError> {
        let store = InMemoryStore::new();
        let filter = Filter::new().eq("prefix", "P").eq("entity_type", "decision");
        for expected in 1..=5i64 {
            let doc = store
                .find_one_and_update(
                    "display_id_counters",
                    &filter,
                    &[("next_sequence", 1)],
                    &Map::new(),
                    true,
                )
                .await?;
            assert_eq!(doc.get("next_sequence").and_then(Value::as_i64), Some(expected));
        }
        Ok(())
    }

    #[tokio::test]
    async fn add_to_set_is_idempotent_and_order_insensitive() -> Result<(), StoreError> {
        let store = InMemoryStore::new();
        let filter = Filter::new().eq("edge", "src-tgt");
        store
            .add_to_set(
                "lineage_edges",
                &filter,
                &[("decisions_carried", vec![Value::from("x")])],
                true,
            )
            .await?;
        store
            .add_to_set(
                "lineage_edges",
                &filter,
                &[("decisions_carried", vec![Value::from("y"), Value::from("x")])],
                true,
            )
            .await?;

        let docs = store.find("lineage_edges", &filter).await?;
        let carried = docs[0]
            .get("decisions_carried")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        assert_eq!(carried.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn vector_search_ranks_by_similarity_desc() -> Result<(), StoreError> {
        let store = InMemoryStore::new();
        for (label, vector) in [("close", vec![1.0, 0.0]), ("far", vec![0.0, 1.0])] {
            let mut doc = Document::new(Uuid::new_v4());
            doc.set("label", Value::from(label));
            doc.embedding = Some(vector);
            store.put("decisions", doc).await?;
        }

        let hits = store
            .vector_search("decisions", &[1.0, 0.0], VectorSearchOptions::default())
            .await?;
        assert_eq!(hits[0].document.get("label"), Some(&Value::from("close")));
        Ok(())
    }
}
