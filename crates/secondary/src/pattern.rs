use std::collections::BTreeSet;

use anyhow::Result;
use chrono::Utc;
use memoria_graph::embed::embed_one_or_zero;
use memoria_graph::event_types::{emit, EventSink, EventType};
use memoria_graph::EmbedClient;
use memoria_store::{Document, Store, VectorSearchOptions};
use serde_json::Value;
use uuid::Uuid;

pub const COLLECTION: &str = "patterns";
pub const DEFAULT_MERGE_THRESHOLD: f32 = 0.88;

#[derive(Debug, Clone)]
pub struct PatternRecord {
    pub uuid: Uuid,
    pub text: String,
    pub tags: Vec<String>,
    pub merge_count: u32,
    pub success_score: f32,
    pub retrieval_count: u32,
}

pub enum PatternUpsertAction {
    Stored,
    Merged,
}

pub struct PatternUpsertResult {
    pub action: PatternUpsertAction,
    pub pattern: PatternRecord,
}

/// Self-merging pattern store (spec §3 "Pattern"): a new observation merges
/// into the nearest existing pattern above `threshold` cosine similarity
/// (`success_score` becomes the merge-count-weighted running average, tags
/// union), or is stored fresh otherwise. The weighted-average/union-on-merge
/// shape is the same "last/combined value wins, sets union" idiom the
/// teacher's `multi_sleep::merge_insights` uses for batched consolidation,
/// applied here to one incoming observation against one stored pattern
/// instead of N batches against each other.
pub async fn store_pattern(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    sink: Option<&dyn EventSink>,
    text: &str,
    tags: Vec<String>,
    success_score: f32,
    threshold: f32,
) -> Result<PatternUpsertResult> {
    let embedding = embed_one_or_zero(embed_client, text).await;

    let options = VectorSearchOptions {
        k: 1,
        filter: None,
        min_similarity: Some(threshold),
        num_candidates: 50,
    };
    let hits = store.vector_search(COLLECTION, &embedding, options).await?;

    if let Some(hit) = hits.into_iter().next() {
        let mut record = from_document(&hit.document)?;
        let total_weight = (record.merge_count + 1) as f32;
        record.success_score = (record.success_score * record.merge_count as f32 + success_score) / total_weight;
        record.merge_count += 1;

        let mut tag_set: BTreeSet<String> = record.tags.into_iter().collect();
        tag_set.extend(tags);
        record.tags = tag_set.into_iter().collect();

        let doc = to_document(&record, embedding)?;
        store.put(COLLECTION, doc).await?;
        emit(sink, EventType::PatternMerged, Value::from(record.uuid.to_string())).await;

        Ok(PatternUpsertResult {
            action: PatternUpsertAction::Merged,
            pattern: record,
        })
    } else {
        let record = PatternRecord {
            uuid: Uuid::new_v4(),
            text: text.to_string(),
            tags,
            merge_count: 1,
            success_score,
            retrieval_count: 0,
        };
        let doc = to_document(&record, embedding)?;
        store.put(COLLECTION, doc).await?;
        emit(sink, EventType::PatternStored, Value::from(record.uuid.to_string())).await;

        Ok(PatternUpsertResult {
            action: PatternUpsertAction::Stored,
            pattern: record,
        })
    }
}

/// Vector-search the pattern store and bump `retrieval_count` on every
/// match returned (spec's `memory.pattern.matched` event).
pub async fn match_patterns(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    sink: Option<&dyn EventSink>,
    query_text: &str,
    limit: usize,
    threshold: f32,
) -> Result<Vec<PatternRecord>> {
    let embedding = embed_one_or_zero(embed_client, query_text).await;
    let options = VectorSearchOptions {
        k: limit,
        filter: None,
        min_similarity: Some(threshold),
        num_candidates: limit.max(50),
    };
    let hits = store.vector_search(COLLECTION, &embedding, options).await?;

    let mut matched = Vec::with_capacity(hits.len());
    for hit in hits {
        let mut record = from_document(&hit.document)?;
        record.retrieval_count += 1;
        let embedding = hit.document.embedding.clone();
        let doc = to_document(&record, embedding)?;
        store.put(COLLECTION, doc).await?;
        emit(sink, EventType::PatternMatched, Value::from(record.uuid.to_string())).await;
        matched.push(record);
    }

    Ok(matched)
}

fn to_document(record: &PatternRecord, embedding: Vec<f32>) -> Result<Document> {
    let mut doc = Document::new(record.uuid);
    doc.set("text", Value::from(record.text.clone()));
    doc.set("tags", Value::from(record.tags.clone()));
    doc.set("merge_count", Value::from(record.merge_count));
    doc.set("success_score", Value::from(record.success_score));
    doc.set("retrieval_count", Value::from(record.retrieval_count));
    doc.set("updated_at", Value::from(Utc::now().to_rfc3339()));
    doc.embedding = Some(embedding);
    Ok(doc)
}

fn from_document(doc: &Document) -> Result<PatternRecord> {
    Ok(PatternRecord {
        uuid: doc.id,
        text: doc.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
        tags: doc
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        merge_count: doc.get("merge_count").and_then(Value::as_u64).unwrap_or(0) as u32,
        success_score: doc.get("success_score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
        retrieval_count: doc.get("retrieval_count").and_then(Value::as_u64).unwrap_or(0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_graph::embed::DeterministicEmbedClient;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn similar_observation_merges_instead_of_duplicating() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;

        let first = store_pattern(
            &store,
            &embed,
            None,
            "retry with exponential backoff on transient failures",
            vec!["resilience".to_string()],
            0.6,
            DEFAULT_MERGE_THRESHOLD,
        )
        .await?;
        assert!(matches!(first.action, PatternUpsertAction::Stored));

        let second = store_pattern(
            &store,
            &embed,
            None,
            "retry with exponential backoff on transient failures",
            vec!["networking".to_string()],
            1.0,
            DEFAULT_MERGE_THRESHOLD,
        )
        .await?;
        assert!(matches!(second.action, PatternUpsertAction::Merged));
        assert_eq!(second.pattern.uuid, first.pattern.uuid);
        assert_eq!(second.pattern.merge_count, 2);
        assert_eq!(second.pattern.tags.len(), 2);
        assert!((second.pattern.success_score - 0.8).abs() < 1e-6);
        Ok(())
    }

    #[tokio::test]
    async fn matching_increments_retrieval_count() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;

        store_pattern(&store, &embed, None, "cache invalidation on write", vec![], 0.5, DEFAULT_MERGE_THRESHOLD).await?;

        let matches = match_patterns(&store, &embed, None, "cache invalidation on write", 5, 0.5).await?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].retrieval_count, 1);

        let matches = match_patterns(&store, &embed, None, "cache invalidation on write", 5, 0.5).await?;
        assert_eq!(matches[0].retrieval_count, 2);
        Ok(())
    }
}
