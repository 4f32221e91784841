use chrono::{DateTime, Utc};
use futures::future::join_all;
use anyhow::Result;
use memoria_entanglement::persistence::get_latest_scan;
use memoria_graph::EmbedClient;
use memoria_store::Store;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::collections::{search_collection, Category, SEARCHABLE_COLLECTIONS};
use crate::scoring::{attention, AttentionInputs};

pub const DEFAULT_BUDGET: usize = 4000;
pub const DEFAULT_MIN_SCORE: f32 = 0.1;
const SEARCH_K: usize = 10;
const NUM_CANDIDATES: usize = 50;
const TRUNCATION_FLOOR: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct EntanglementEnrichment {
    pub cluster_id: String,
    pub cluster_projects: Vec<Uuid>,
    pub cluster_size: usize,
    pub avg_similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    pub uuid: Uuid,
    pub category: &'static str,
    pub source: &'static str,
    pub text: String,
    pub similarity: f32,
    pub attention: f32,
    pub project_uuid: Option<Uuid>,
    pub local_id: Option<String>,
    pub epistemic_tier: Option<f32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub has_conflicts: bool,
    pub status: Option<String>,
    pub entanglement: Option<EntanglementEnrichment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallResult {
    pub results: Vec<RecallHit>,
    pub context_text: String,
    pub total_candidates: usize,
    pub budget_used: usize,
    pub collections_searched: Vec<&'static str>,
}

fn field_str(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn field_f32(fields: &Map<String, Value>, key: &str) -> Option<f32> {
    fields.get(key).and_then(Value::as_f64).map(|v| v as f32)
}

fn field_timestamp(fields: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn field_uuid(fields: &Map<String, Value>, key: &str) -> Option<Uuid> {
    fields.get(key).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

/// Render the best available text for a hit: registries disagree on which
/// field carries the body (decisions/threads use `text`/`title`, priming
/// blocks have no free text at all, only keys).
fn extract_text(category: Category, fields: &Map<String, Value>) -> String {
    match category {
        Category::Decision => field_str(fields, "text").unwrap_or_default(),
        Category::Thread => field_str(fields, "title").unwrap_or_default(),
        Category::Priming => field_str(fields, "territory_name").unwrap_or_default(),
        _ => field_str(fields, "text")
            .or_else(|| field_str(fields, "title"))
            .or_else(|| field_str(fields, "summary"))
            .or_else(|| field_str(fields, "content"))
            .unwrap_or_default(),
    }
}

fn has_conflicts(fields: &Map<String, Value>) -> bool {
    fields
        .get("conflicts_with")
        .and_then(Value::as_array)
        .is_some_and(|arr| !arr.is_empty())
}

/// The recall heart: parallel multi-collection vector search, attention
/// scoring, entanglement enrichment, and budget trim (spec §4.13).
pub async fn recall(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    query: &str,
    project_uuid: Option<Uuid>,
    budget: usize,
    min_score: f32,
) -> Result<RecallResult> {
    let embedding = embed_client.embed(&[query.to_string()]).await?.pop().unwrap_or_default();
    recall_with_embedding(store, &embedding, project_uuid, budget, min_score).await
}

/// Same pipeline as [`recall`], but takes an already-computed query
/// embedding. Used by the gravity orchestrator, which embeds the query once
/// and fans it out to every lens (spec §4.14 step 2-3).
pub async fn recall_with_embedding(
    store: &dyn Store,
    embedding: &[f32],
    project_uuid: Option<Uuid>,
    budget: usize,
    min_score: f32,
) -> Result<RecallResult> {
    let searches = SEARCHABLE_COLLECTIONS
        .iter()
        .map(|spec| search_collection(store, spec, embedding, project_uuid, SEARCH_K, NUM_CANDIDATES));
    let search_results = join_all(searches).await;

    let mut candidates = Vec::new();
    let mut collections_searched = Vec::new();
    for (spec, result) in SEARCHABLE_COLLECTIONS.iter().zip(search_results) {
        collections_searched.push(spec.collection);
        match result {
            Ok(hits) => candidates.extend(hits),
            Err(err) => tracing::warn!(error = %err, collection = spec.collection, "vector search failed, skipping collection"),
        }
    }

    let total_candidates = candidates.len();
    let now = Utc::now();
    let scan = get_latest_scan(store, None, None).await.ok().flatten();

    let mut hits = Vec::new();
    for candidate in candidates {
        let fields = &candidate.hit.document.fields;
        let epistemic_tier = field_f32(fields, "epistemic_tier");
        let updated_at = field_timestamp(fields, "updated_at");
        let conflicted = has_conflicts(fields);

        let score = attention(
            &AttentionInputs {
                similarity: candidate.hit.similarity,
                epistemic_tier,
                updated_at,
                has_conflicts: conflicted,
                category: candidate.category,
            },
            now,
        );
        if score < min_score {
            continue;
        }

        let uuid = candidate.hit.document.id;
        let entanglement = scan.as_ref().and_then(|scan| {
            scan.clusters.iter().find(|c| c.items.contains(&uuid)).map(|c| EntanglementEnrichment {
                cluster_id: c.cluster_id.clone(),
                cluster_projects: c.projects.clone(),
                cluster_size: c.items.len(),
                avg_similarity: c.avg_similarity,
            })
        });

        hits.push(RecallHit {
            uuid,
            category: candidate.category.as_str(),
            source: candidate.category.as_str(),
            text: extract_text(candidate.category, fields),
            similarity: candidate.hit.similarity,
            attention: score,
            project_uuid: field_uuid(fields, "project_uuid"),
            local_id: field_str(fields, "local_id"),
            epistemic_tier,
            updated_at,
            has_conflicts: conflicted,
            status: field_str(fields, "status"),
            entanglement,
        });
    }

    hits.sort_by(|a, b| b.attention.total_cmp(&a.attention));

    let (included, context_text, budget_used) = budget_trim(hits, budget);

    Ok(RecallResult {
        results: included,
        context_text,
        total_candidates,
        budget_used,
        collections_searched,
    })
}

/// Greedily include hits sorted by attention until the rendered context
/// would exceed `budget` chars; on the boundary item, truncate rather than
/// discard if at least `TRUNCATION_FLOOR` chars still fit.
fn budget_trim(hits: Vec<RecallHit>, budget: usize) -> (Vec<RecallHit>, String, usize) {
    let mut included = Vec::new();
    let mut context = String::new();

    for mut hit in hits {
        let remaining = budget.saturating_sub(context.len());
        if remaining == 0 {
            break;
        }

        let line_len = hit.text.len() + 1;
        if context.len() + line_len <= budget {
            context.push_str(&hit.text);
            context.push('\n');
            included.push(hit);
            continue;
        }

        if remaining >= TRUNCATION_FLOOR {
            let truncated: String = hit.text.chars().take(remaining.saturating_sub(1)).collect();
            context.push_str(&truncated);
            hit.text = truncated;
            included.push(hit);
        }
        break;
    }

    let budget_used = context.len();
    (included, context, budget_used)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_graph::decision::{upsert_decision, UpsertDecisionInput};
    use memoria_graph::embed::DeterministicEmbedClient;
    use memoria_graph::schema::DecisionStatus;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn recall_surfaces_a_matching_decision() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();

        upsert_decision(
            &store,
            &embed,
            None,
            &[],
            &[],
            None,
            500,
            UpsertDecisionInput {
                local_id: "D001",
                text: "adopt the lsm tree storage engine",
                project_name: "alpha",
                project_uuid: project,
                originated_conversation: Uuid::new_v4(),
                tier: Some(0.8),
                status: DecisionStatus::Active,
                dependencies: Vec::new(),
                rationale: None,
            },
        )
        .await?;

        let result = recall(&store, &embed, "lsm tree storage engine", Some(project), DEFAULT_BUDGET, DEFAULT_MIN_SCORE).await?;
        assert!(!result.results.is_empty());
        assert_eq!(result.results[0].category, "decision");
        Ok(())
    }

    #[tokio::test]
    async fn low_scoring_hits_are_dropped_by_min_score() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();

        upsert_decision(
            &store,
            &embed,
            None,
            &[],
            &[],
            None,
            500,
            UpsertDecisionInput {
                local_id: "D001",
                text: "adopt the lsm tree storage engine",
                project_name: "alpha",
                project_uuid: project,
                originated_conversation: Uuid::new_v4(),
                tier: Some(0.8),
                status: DecisionStatus::Active,
                dependencies: Vec::new(),
                rationale: None,
            },
        )
        .await?;

        let result = recall(&store, &embed, "something about kubernetes networking", Some(project), DEFAULT_BUDGET, 0.9).await?;
        assert!(result.results.is_empty());
        Ok(())
    }

    #[test]
    fn budget_trim_truncates_the_boundary_item() {
        let hits = vec![RecallHit {
            uuid: Uuid::new_v4(),
            category: "decision",
            source: "decision",
            text: "x".repeat(120),
            similarity: 1.0,
            attention: 1.0,
            project_uuid: None,
            local_id: None,
            epistemic_tier: None,
            updated_at: None,
            has_conflicts: false,
            status: None,
            entanglement: None,
        }];
        let (included, context, used) = budget_trim(hits, 80);
        assert_eq!(included.len(), 1);
        assert!(context.len() <= 80);
        assert_eq!(used, context.len());
    }
}
