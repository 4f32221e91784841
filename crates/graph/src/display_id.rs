use anyhow::Result;
use memoria_store::{Filter, Store};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::schema::DisplayIdEntry;
use crate::storeio::{from_document, to_document};

const COUNTERS_COLLECTION: &str = "display_id_counters";
const INDEX_COLLECTION: &str = "display_id_index";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Decision,
    Thread,
    Artifact,
}

impl EntityType {
    pub fn type_code(self) -> &'static str {
        match self {
            EntityType::Decision => "D",
            EntityType::Thread => "T",
            EntityType::Artifact => "A",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            EntityType::Decision => "decision",
            EntityType::Thread => "thread",
            EntityType::Artifact => "artifact",
        }
    }
}

fn fallback_prefix(project_name: &str) -> String {
    project_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(5)
        .collect()
}

/// Resolve the display prefix for `project_uuid`/`project_name`: an existing
/// counter row already established for this project (1), else a static map
/// entry (2), else up to 5 alphanumeric uppercased characters of the name
/// (3). Tier 1 takes priority so a project that already has a running
/// `(prefix, entity_type)` counter keeps using it even if the static map or
/// the project's display name changes later.
pub async fn resolve_prefix(
    store: &dyn Store,
    project_uuid: Uuid,
    project_name: &str,
    static_map: &[(&str, &str)],
) -> Result<String> {
    let filter = Filter::new().eq("project_uuid", project_uuid.to_string());
    let rows = store.find(COUNTERS_COLLECTION, &filter).await?;
    if let Some(prefix) = rows.iter().find_map(|row| row.get("prefix").and_then(Value::as_str)) {
        return Ok(prefix.to_string());
    }

    for (name, prefix) in static_map {
        if name.eq_ignore_ascii_case(project_name) {
            return Ok(prefix.to_string());
        }
    }

    Ok(fallback_prefix(project_name))
}

/// Atomically allocate the next display id for `(prefix, entity_type)` and
/// register the reverse-index row pointing back at `entity_uuid`.
pub async fn allocate(
    store: &dyn Store,
    prefix: &str,
    entity_type: EntityType,
    entity_uuid: Uuid,
    collection: &str,
    project_uuid: Uuid,
) -> Result<String> {
    let filter = Filter::new()
        .eq("prefix", prefix)
        .eq("entity_type", entity_type.slug());

    let mut set_on_insert = Map::new();
    set_on_insert.insert("prefix".to_string(), Value::from(prefix));
    set_on_insert.insert("entity_type".to_string(), Value::from(entity_type.slug()));
    set_on_insert.insert("project_uuid".to_string(), Value::from(project_uuid.to_string()));

    let doc = store
        .find_one_and_update(
            COUNTERS_COLLECTION,
            &filter,
            &[("next_sequence", 1)],
            &set_on_insert,
            true,
        )
        .await?;

    let sequence = doc.get("next_sequence").and_then(Value::as_i64).unwrap_or(1);
    let display_id = format!("{prefix}-{}-{sequence:04}", entity_type.type_code());

    let entry = DisplayIdEntry {
        display_id: display_id.clone(),
        entity_uuid,
        collection: collection.to_string(),
        project_uuid,
    };
    let entry_id = memoria_identity::v5_base(&display_id);
    let document = to_document(entry_id, &entry, None)?;
    store.put(INDEX_COLLECTION, document).await?;

    Ok(display_id)
}

pub async fn resolve(store: &dyn Store, display_id: &str) -> Result<Option<DisplayIdEntry>> {
    let entry_id = memoria_identity::v5_base(display_id);
    match store.get(INDEX_COLLECTION, entry_id).await? {
        Some(doc) => Ok(Some(from_document(&doc)?)),
        None => Ok(None),
    }
}

/// Backfill missing entities in `created_at` order so the allocated
/// sequence reflects chronology rather than iteration order.
pub async fn backfill_in_order<T>(
    store: &dyn Store,
    prefix: &str,
    entity_type: EntityType,
    collection: &str,
    project_uuid: Uuid,
    mut items: Vec<(Uuid, chrono::DateTime<chrono::Utc>)>,
) -> Result<Vec<String>> {
    items.sort_by_key(|(_, created_at)| *created_at);
    let mut ids = Vec::with_capacity(items.len());
    for (uuid, _) in items {
        ids.push(allocate(store, prefix, entity_type, uuid, collection, project_uuid).await?);
    }
    let _ = ids.len();
    Ok(ids)
}
