use anyhow::Result;
use chrono::Utc;
use memoria_store::{Filter, Store, VectorSearchOptions};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::embed::EmbedClient;
use crate::event_types::{emit, EventSink, EventType};
use crate::schema::{PrimingBlock, PrimingStatus};
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "priming_blocks";

pub const PRIMING_TERRITORY_MATCH_THRESHOLD: f32 = 0.7;

/// `uuid = v5("priming:" + territory_name, project_uuid)`; embeds the joined
/// `territory_keys` text. Re-upserting the same territory grows
/// `source_expeditions` and bumps `findings_count`.
pub async fn upsert_priming_block(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    sink: Option<&dyn EventSink>,
    project_uuid: Uuid,
    territory_name: &str,
    territory_keys: Vec<String>,
    confidence_floor: f32,
    source_expedition: Uuid,
) -> Result<PrimingBlock> {
    let uuid = memoria_identity::v5(&format!("priming:{territory_name}"), project_uuid);
    let existing = store.get(COLLECTION, uuid).await?;

    let mut block = if let Some(doc) = existing {
        from_document::<PrimingBlock>(&doc)?
    } else {
        let territory_keys_text = territory_keys.join(" ");
        let embedding = embed_client
            .embed(&[territory_keys_text])
            .await?
            .pop()
            .unwrap_or_default();
        PrimingBlock {
            uuid,
            project_uuid,
            territory_name: territory_name.to_string(),
            territory_keys: territory_keys.clone(),
            embedding,
            confidence_floor,
            findings_count: 0,
            status: PrimingStatus::Active,
            source_expeditions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    };

    if !block.source_expeditions.contains(&source_expedition) {
        block.source_expeditions.push(source_expedition);
    }
    block.findings_count += 1;
    block.confidence_floor = block.confidence_floor.max(confidence_floor);
    block.updated_at = Utc::now();

    let document = to_document(block.uuid, &block, Some(block.embedding.clone()))?;
    store.put(COLLECTION, document).await?;
    emit(sink, EventType::PrimingUpserted, json!({ "uuid": block.uuid })).await;

    Ok(block)
}

pub async fn deactivate_priming_block(store: &dyn Store, sink: Option<&dyn EventSink>, uuid: Uuid) -> Result<()> {
    if let Some(doc) = store.get(COLLECTION, uuid).await? {
        let mut block: PrimingBlock = from_document(&doc)?;
        block.status = PrimingStatus::Inactive;
        block.updated_at = Utc::now();
        let document = to_document(block.uuid, &block, Some(block.embedding.clone()))?;
        store.put(COLLECTION, document).await?;
        emit(sink, EventType::PrimingDeactivated, json!({ "uuid": uuid })).await;
    }
    Ok(())
}

/// `find_relevant_priming(topic_text, project?, limit, threshold)`: vector
/// search filtered to active blocks, optionally scoped to `project`.
pub async fn find_relevant_priming(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    topic_text: &str,
    project_uuid: Option<Uuid>,
    limit: usize,
    threshold: f32,
) -> Result<Vec<PrimingBlock>> {
    let embedding = embed_client
        .embed(&[topic_text.to_string()])
        .await?
        .pop()
        .unwrap_or_default();

    let mut filter = Filter::new().eq("status", "active");
    if let Some(project_uuid) = project_uuid {
        filter = filter.eq("project_uuid", Value::from(project_uuid.to_string()));
    }

    let options = VectorSearchOptions {
        k: limit,
        filter: Some(filter),
        min_similarity: Some(threshold),
        num_candidates: limit.max(50),
    };

    let hits = store.vector_search(COLLECTION, &embedding, options).await?;
    hits.iter().map(|hit| from_document(&hit.document)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::DeterministicEmbedClient;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn repeat_upsert_grows_expeditions_and_findings() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();

        let first = upsert_priming_block(
            &store,
            &embed,
            None,
            project,
            "auth boundary",
            vec!["jwt".to_string(), "oauth".to_string()],
            0.6,
            Uuid::new_v4(),
        )
        .await?;
        assert_eq!(first.findings_count, 1);

        let second = upsert_priming_block(
            &store,
            &embed,
            None,
            project,
            "auth boundary",
            vec!["jwt".to_string(), "oauth".to_string()],
            0.8,
            Uuid::new_v4(),
        )
        .await?;
        assert_eq!(second.uuid, first.uuid);
        assert_eq!(second.findings_count, 2);
        assert_eq!(second.source_expeditions.len(), 2);
        assert!((second.confidence_floor - 0.8).abs() < 1e-6);
        Ok(())
    }

    #[tokio::test]
    async fn find_relevant_priming_respects_threshold() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();

        upsert_priming_block(
            &store,
            &embed,
            None,
            project,
            "auth boundary",
            vec!["jwt".to_string()],
            0.6,
            Uuid::new_v4(),
        )
        .await?;

        let hits = find_relevant_priming(&store, &embed, "jwt", Some(project), 5, 0.99).await?;
        assert!(hits.is_empty());

        let hits = find_relevant_priming(&store, &embed, "jwt", Some(project), 5, 0.1).await?;
        assert_eq!(hits.len(), 1);
        Ok(())
    }
}
