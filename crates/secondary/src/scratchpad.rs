use anyhow::Result;
use chrono::{Duration, Utc};
use memoria_identity::v5_base;
use memoria_store::{Document, Filter, Store};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub const COLLECTION: &str = "scratchpad";
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// `(context_id, key) → JSON value` with TTL expiry (spec §3 "Scratchpad
/// entry"). The store purges expired documents on read, the same TTL
/// mechanism the event log and archive rely on.
pub async fn set(store: &dyn Store, context_id: &str, key: &str, value: Value, ttl_hours: i64) -> Result<()> {
    let id = entry_uuid(context_id, key);
    let mut doc = Document::new(id);
    doc.set("context_id", Value::from(context_id));
    doc.set("key", Value::from(key));
    doc.set("value", value);
    doc.expires_at = Some(Utc::now() + Duration::hours(ttl_hours));
    store.put(COLLECTION, doc).await?;
    Ok(())
}

pub async fn set_json<T: Serialize>(store: &dyn Store, context_id: &str, key: &str, value: &T, ttl_hours: i64) -> Result<()> {
    set(store, context_id, key, serde_json::to_value(value)?, ttl_hours).await
}

pub async fn get(store: &dyn Store, context_id: &str, key: &str) -> Result<Option<Value>> {
    let id = entry_uuid(context_id, key);
    Ok(store.get(COLLECTION, id).await?.and_then(|doc| doc.get("value").cloned()))
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn Store, context_id: &str, key: &str) -> Result<Option<T>> {
    match get(store, context_id, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn delete(store: &dyn Store, context_id: &str, key: &str) -> Result<()> {
    store.delete(COLLECTION, entry_uuid(context_id, key)).await?;
    Ok(())
}

pub async fn list_context(store: &dyn Store, context_id: &str) -> Result<Vec<(String, Value)>> {
    let filter = Filter::new().eq("context_id", context_id);
    let docs = store.find(COLLECTION, &filter).await?;
    Ok(docs
        .into_iter()
        .filter_map(|doc| {
            let key = doc.get("key")?.as_str()?.to_string();
            let value = doc.get("value").cloned().unwrap_or(Value::Null);
            Some((key, value))
        })
        .collect())
}

fn entry_uuid(context_id: &str, key: &str) -> uuid::Uuid {
    v5_base(&format!("scratchpad:{context_id}:{key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn set_overwrites_and_get_round_trips() -> Result<()> {
        let store = InMemoryStore::new();
        set(&store, "ctx-1", "mood", Value::from("curious"), 1).await?;
        assert_eq!(get(&store, "ctx-1", "mood").await?, Some(Value::from("curious")));

        set(&store, "ctx-1", "mood", Value::from("focused"), 1).await?;
        assert_eq!(get(&store, "ctx-1", "mood").await?, Some(Value::from("focused")));
        Ok(())
    }

    #[tokio::test]
    async fn list_context_returns_every_key_for_that_context_only() -> Result<()> {
        let store = InMemoryStore::new();
        set(&store, "ctx-1", "a", Value::from(1), 1).await?;
        set(&store, "ctx-1", "b", Value::from(2), 1).await?;
        set(&store, "ctx-2", "a", Value::from(99), 1).await?;

        let entries = list_context(&store, "ctx-1").await?;
        assert_eq!(entries.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_the_entry() -> Result<()> {
        let store = InMemoryStore::new();
        set(&store, "ctx-1", "k", Value::from(true), 1).await?;
        delete(&store, "ctx-1", "k").await?;
        assert_eq!(get(&store, "ctx-1", "k").await?, None);
        Ok(())
    }
}
