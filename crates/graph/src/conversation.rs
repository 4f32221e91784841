use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use memoria_store::{Filter, Store};
use regex::Regex;
use serde_json::json;
use uuid::Uuid;

use crate::event_types::{emit, EventSink, EventType};
use crate::project::project_uuid;
use crate::schema::{Conversation, UpsertAction};
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "conversations";

pub async fn register_conversation(
    store: &dyn Store,
    sink: Option<&dyn EventSink>,
    source_id: &str,
    project_name: &str,
    name: Option<String>,
    created_at: Option<DateTime<Utc>>,
    summary: Option<String>,
) -> Result<(UpsertAction, Conversation)> {
    let created_at = created_at.unwrap_or_else(Utc::now);
    let ms = created_at.timestamp_millis();
    let proj_uuid = project_uuid(project_name);
    let conv_uuid = memoria_identity::v8_from_string(source_id, proj_uuid, ms);

    let existing = store
        .find(COLLECTION, &Filter::new().eq("source_id", source_id))
        .await?;

    let (action, conversation) = if let Some(doc) = existing.into_iter().next() {
        let mut conversation: Conversation = from_document(&doc)?;
        conversation.name = name.or(conversation.name);
        conversation.summary = summary.or(conversation.summary);
        conversation.updated_at = Utc::now();
        (UpsertAction::Updated, conversation)
    } else {
        (
            UpsertAction::Inserted,
            Conversation {
                uuid: conv_uuid,
                project_uuid: proj_uuid,
                source_id: source_id.to_string(),
                name,
                summary,
                created_at_ms: ms,
                updated_at: Utc::now(),
            },
        )
    };

    let document = to_document(conversation.uuid, &conversation, None)?;
    store.put(COLLECTION, document).await?;

    emit(
        sink,
        EventType::ConversationRegistered,
        json!({ "uuid": conversation.uuid, "project_uuid": conversation.project_uuid, "action": action }),
    )
    .await;

    Ok((action, conversation))
}

/// Resolve an identifier in order: exact `source_id`, exact `uuid`,
/// `source_id` prefix (≥4 chars), case-insensitive name substring.
pub async fn resolve_id(store: &dyn Store, identifier: &str) -> Result<Option<Conversation>> {
    if let Some(doc) = store
        .find(COLLECTION, &Filter::new().eq("source_id", identifier))
        .await?
        .into_iter()
        .next()
    {
        return Ok(Some(from_document(&doc)?));
    }

    if let Ok(uuid) = Uuid::parse_str(identifier) {
        if let Some(doc) = store.get(COLLECTION, uuid).await? {
            return Ok(Some(from_document(&doc)?));
        }
    }

    let all = store.find(COLLECTION, &Filter::new()).await?;

    if identifier.len() >= 4 {
        let pattern = Regex::new(&format!("^{}", regex::escape(identifier)))?;
        for doc in &all {
            let conversation: Conversation = from_document(doc)?;
            if pattern.is_match(&conversation.source_id) {
                return Ok(Some(conversation));
            }
        }
    }

    let needle = identifier.to_lowercase();
    for doc in &all {
        let conversation: Conversation = from_document(doc)?;
        if let Some(name) = &conversation.name {
            if name.to_lowercase().contains(&needle) {
                return Ok(Some(conversation));
            }
        }
    }

    Ok(None)
}

#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub project_name: String,
    pub project_uuid: Uuid,
    pub count: usize,
    pub earliest_ms: i64,
    pub latest_ms: i64,
}

/// Aggregation grouping conversations by `project_uuid`.
pub async fn list_projects_summary(store: &dyn Store) -> Result<Vec<ProjectSummary>> {
    let all = store.find(COLLECTION, &Filter::new()).await?;
    let mut groups: HashMap<Uuid, ProjectSummary> = HashMap::new();

    for doc in &all {
        let conversation: Conversation = from_document(doc)?;
        let entry = groups
            .entry(conversation.project_uuid)
            .or_insert_with(|| ProjectSummary {
                project_name: conversation
                    .name
                    .clone()
                    .unwrap_or_else(|| conversation.project_uuid.to_string()),
                project_uuid: conversation.project_uuid,
                count: 0,
                earliest_ms: conversation.created_at_ms,
                latest_ms: conversation.created_at_ms,
            });
        entry.count += 1;
        entry.earliest_ms = entry.earliest_ms.min(conversation.created_at_ms);
        entry.latest_ms = entry.latest_ms.max(conversation.created_at_ms);
    }

    Ok(groups.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn repeat_register_updates_instead_of_duplicating() -> Result<()> {
        let store = InMemoryStore::new();
        let (action_a, conv_a) =
            register_conversation(&store, None, "src-1", "P", None, None, None).await?;
        assert_eq!(action_a, UpsertAction::Inserted);

        let (action_b, conv_b) = register_conversation(
            &store,
            None,
            "src-1",
            "P",
            Some("renamed".to_string()),
            None,
            None,
        )
        .await?;
        assert_eq!(action_b, UpsertAction::Updated);
        assert_eq!(conv_a.uuid, conv_b.uuid);
        assert_eq!(conv_b.name, Some("renamed".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn resolve_id_falls_back_to_prefix_then_name() -> Result<()> {
        let store = InMemoryStore::new();
        register_conversation(
            &store,
            None,
            "abcdef123456",
            "P",
            Some("Latency investigation".to_string()),
            None,
            None,
        )
        .await?;

        assert!(resolve_id(&store, "abcd").await?.is_some());
        assert!(resolve_id(&store, "latency").await?.is_some());
        assert!(resolve_id(&store, "no-such-thing").await?.is_none());
        Ok(())
    }
}
