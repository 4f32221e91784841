use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use memoria_graph::{EventSink, EventType};
use memoria_store::{Document, Filter, Store};
use serde_json::Value;
use uuid::Uuid;

pub const COLLECTION: &str = "events";
pub const EVENT_TTL_DAYS: i64 = 90;

/// Append-only audit log (spec §6): one record per significant mutation,
/// `{event_type, timestamp, details, expires_at}`. Stored through the
/// abstract `Store` rather than a local file, matching the rest of this
/// workspace's registries; `event_log.rs`'s append-only, best-effort,
/// log-and-continue-on-failure posture is what this mirrors, not its file
/// format.
pub struct StoreEventLog<'a> {
    store: &'a dyn Store,
}

impl<'a> StoreEventLog<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn record(&self, event_type: EventType, details: Value) -> Result<()> {
        let now = Utc::now();
        let mut doc = Document::new(Uuid::new_v4());
        doc.set("event_type", Value::from(event_type.to_string()));
        doc.set("timestamp", Value::from(now.to_rfc3339()));
        doc.set("details", details);
        doc.expires_at = Some(now + Duration::days(EVENT_TTL_DAYS));
        self.store.put(COLLECTION, doc).await?;
        Ok(())
    }

    pub async fn recent(&self, event_type: Option<EventType>, limit: usize) -> Result<Vec<EventRecord>> {
        let filter = match event_type {
            Some(event_type) => Filter::new().eq("event_type", event_type.to_string()),
            None => Filter::new(),
        };
        let mut docs = self.store.find(COLLECTION, &filter).await?;
        docs.sort_by(|a, b| {
            let ts = |d: &Document| d.get("timestamp").and_then(Value::as_str).unwrap_or_default().to_string();
            ts(b).cmp(&ts(a))
        });
        docs.truncate(limit);

        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let event_type = doc.get("event_type")?.as_str()?.to_string();
                let timestamp = doc
                    .get("timestamp")?
                    .as_str()
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))?;
                let details = doc.get("details").cloned().unwrap_or(Value::Null);
                Some(EventRecord {
                    event_type,
                    timestamp,
                    details,
                })
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
}

#[async_trait]
impl<'a> EventSink for StoreEventLog<'a> {
    async fn emit(&self, event_type: EventType, details: Value) {
        if let Err(err) = self.record(event_type, details).await {
            tracing::warn!(error = %err, event_type = %event_type, "failed to append audit event, dropping");
        }
    }
}
