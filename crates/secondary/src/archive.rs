use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use memoria_store::{Document, Filter, Store};
use serde_json::Value;
use uuid::Uuid;

pub const COLLECTION: &str = "archive";
pub const DEFAULT_RETENTION_DAYS: i64 = 180;

/// One retired record: the source collection/id it was archived from, the
/// raw payload it carried, and when it stops being retained. Analogous to
/// the teacher's sleep-cycle consolidation moving a retired entry out of the
/// live working set (`sleep.rs`'s `retire_core`/`rewrite_core` insights),
/// generalized here into a plain TTL-policied sink any registry can archive
/// a stale record into instead of hard-deleting it.
pub async fn archive(
    store: &dyn Store,
    source_collection: &str,
    source_id: Uuid,
    payload: Value,
    retention_days: i64,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let mut doc = Document::new(id);
    doc.set("source_collection", Value::from(source_collection));
    doc.set("source_id", Value::from(source_id.to_string()));
    doc.set("payload", payload);
    doc.set("archived_at", Value::from(now.to_rfc3339()));
    doc.expires_at = Some(now + Duration::days(retention_days));
    store.put(COLLECTION, doc).await?;
    Ok(id)
}

pub struct ArchivedEntry {
    pub id: Uuid,
    pub source_collection: String,
    pub source_id: Uuid,
    pub payload: Value,
    pub archived_at: DateTime<Utc>,
}

pub async fn list_archived(store: &dyn Store, source_collection: &str) -> Result<Vec<ArchivedEntry>> {
    let filter = Filter::new().eq("source_collection", source_collection);
    let docs = store.find(COLLECTION, &filter).await?;
    Ok(docs
        .into_iter()
        .filter_map(|doc| {
            let source_id = doc.get("source_id")?.as_str()?.parse().ok()?;
            let archived_at = doc
                .get("archived_at")?
                .as_str()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))?;
            Some(ArchivedEntry {
                id: doc.id,
                source_collection: source_collection.to_string(),
                source_id,
                payload: doc.get("payload").cloned().unwrap_or(Value::Null),
                archived_at,
            })
        })
        .collect())
}
