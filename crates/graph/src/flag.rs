use anyhow::Result;
use chrono::Utc;
use memoria_store::{Filter, Store};
use serde_json::json;
use uuid::Uuid;

use crate::event_types::{emit, EventSink, EventType};
use crate::schema::{ExpeditionFlag, FlagCategory, FlagStatus};
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "expedition_flags";

/// `uuid = v5("flag:" + description + ":" + conv_id, project_uuid)` —
/// deterministic on (description, conversation), so a duplicate plant call
/// is a no-op rather than a second row.
pub async fn plant_flag(
    store: &dyn Store,
    sink: Option<&dyn EventSink>,
    project_uuid: Uuid,
    description: &str,
    conversation_id: Uuid,
    category: FlagCategory,
) -> Result<ExpeditionFlag> {
    let uuid = memoria_identity::v5(
        &format!("flag:{description}:{conversation_id}"),
        project_uuid,
    );

    if let Some(doc) = store.get(COLLECTION, uuid).await? {
        return Ok(from_document(&doc)?);
    }

    let flag = ExpeditionFlag {
        uuid,
        project_uuid,
        description: description.to_string(),
        conversation_id,
        category,
        status: FlagStatus::Pending,
        compiled_into: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let document = to_document(flag.uuid, &flag, None)?;
    store.put(COLLECTION, document).await?;
    emit(sink, EventType::FlagPlanted, json!({ "uuid": flag.uuid })).await;

    Ok(flag)
}

pub async fn mark_flag_compiled(
    store: &dyn Store,
    sink: Option<&dyn EventSink>,
    uuid: Uuid,
    compiled_into: Uuid,
) -> Result<()> {
    if let Some(doc) = store.get(COLLECTION, uuid).await? {
        let mut flag: ExpeditionFlag = from_document(&doc)?;
        flag.status = FlagStatus::Compiled;
        flag.compiled_into = Some(compiled_into);
        flag.updated_at = Utc::now();
        let document = to_document(flag.uuid, &flag, None)?;
        store.put(COLLECTION, document).await?;
        emit(sink, EventType::FlagCompiled, json!({ "uuid": uuid, "compiled_into": compiled_into })).await;
    }
    Ok(())
}

pub async fn list_pending(store: &dyn Store, project_uuid: Uuid) -> Result<Vec<ExpeditionFlag>> {
    let filter = Filter::new()
        .eq("project_uuid", json!(project_uuid.to_string()))
        .eq("status", "pending");
    let docs = store.find(COLLECTION, &filter).await?;
    docs.iter().map(from_document).collect()
}
