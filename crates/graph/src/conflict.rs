use std::collections::HashSet;

use anyhow::Result;
use memoria_store::{Filter, Store, VectorSearchOptions};
use regex::Regex;
use serde_json::json;
use uuid::Uuid;

use crate::schema::{ConflictSeverity, ConflictSignal, Decision, DecisionStatus, DetectedConflict};
use crate::storeio::from_document;

const LOCAL_ID_PATTERN: &str = r"\b[DT]\d{3,4}\b";
const EMBEDDING_SIMILARITY_THRESHOLD: f32 = 0.85;
const EMBEDDING_HIGH_SEVERITY_THRESHOLD: f32 = 0.92;
const TIER_DIVERGENCE_THRESHOLD: f32 = 0.2;
const TIER_HIGH_SEVERITY_DELTA: f32 = 0.4;

/// Extract decision/thread local IDs plus any project keyword present in
/// `keywords`, case-sensitive for local IDs, case-insensitive for keywords.
fn extract_entities(text: &str, keywords: &[String]) -> HashSet<String> {
    let re = Regex::new(LOCAL_ID_PATTERN).expect("static local-id pattern compiles");
    let mut found: HashSet<String> = re.find_iter(text).map(|m| m.as_str().to_string()).collect();
    let lower = text.to_lowercase();
    for keyword in keywords {
        if lower.contains(&keyword.to_lowercase()) {
            found.insert(keyword.clone());
        }
    }
    found
}

fn tier_delta(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a - b).abs()),
        _ => None,
    }
}

/// Two-signal conflict detector (spec §4.11). Signal 1 (embedding similarity)
/// and signal 2 (entity + tier divergence) run over the same candidate pool;
/// signal 1 owns a candidate once it fires, signal 2 only evaluates the rest.
pub async fn detect_decision_conflicts(
    store: &dyn Store,
    decision: &Decision,
    project_keywords: &[String],
) -> Result<Vec<DetectedConflict>> {
    if decision.embedding.is_empty() {
        return Ok(Vec::new());
    }

    let options = VectorSearchOptions {
        k: 10,
        filter: Some(
            Filter::new()
                .eq("project_uuid", json!(decision.project_uuid.to_string()))
                .eq("status", "active"),
        ),
        min_similarity: None,
        num_candidates: 50,
    };

    let hits = store
        .vector_search(crate::decision::COLLECTION, &decision.embedding, options)
        .await?;

    let mut conflicts = Vec::new();
    let mut signal_1_claimed: HashSet<Uuid> = HashSet::new();
    let mut candidates = Vec::with_capacity(hits.len());

    for hit in &hits {
        let candidate: Decision = from_document(&hit.document)?;
        if candidate.uuid == decision.uuid || candidate.status != DecisionStatus::Active {
            continue;
        }

        if hit.similarity >= EMBEDDING_SIMILARITY_THRESHOLD && candidate.text_hash != decision.text_hash {
            let severity = if hit.similarity > EMBEDDING_HIGH_SEVERITY_THRESHOLD {
                ConflictSeverity::High
            } else {
                ConflictSeverity::Medium
            };
            conflicts.push(DetectedConflict {
                other: candidate.uuid,
                signal: ConflictSignal::EmbeddingSimilarity,
                severity,
                shared_entities: Vec::new(),
            });
            signal_1_claimed.insert(candidate.uuid);
        }

        candidates.push(candidate);
    }

    let own_entities = extract_entities(&decision.text, project_keywords);
    for candidate in &candidates {
        if signal_1_claimed.contains(&candidate.uuid) {
            continue;
        }
        let candidate_entities = extract_entities(&candidate.text, project_keywords);
        let shared: Vec<String> = own_entities.intersection(&candidate_entities).cloned().collect();
        if shared.is_empty() {
            continue;
        }
        let Some(delta) = tier_delta(decision.epistemic_tier, candidate.epistemic_tier) else {
            continue;
        };
        if delta < TIER_DIVERGENCE_THRESHOLD {
            continue;
        }

        let mut shared = shared;
        shared.sort();
        let severity = if delta > TIER_HIGH_SEVERITY_DELTA {
            ConflictSeverity::High
        } else {
            ConflictSeverity::Medium
        };
        conflicts.push(DetectedConflict {
            other: candidate.uuid,
            signal: ConflictSignal::EntityTierDivergence,
            severity,
            shared_entities: shared,
        });
    }

    Ok(conflicts)
}

/// Register a conflict symmetrically: both decisions list each other.
pub async fn register_conflict(store: &dyn Store, a: Uuid, b: Uuid) -> Result<()> {
    add_conflict_ref(store, a, b).await?;
    add_conflict_ref(store, b, a).await?;
    Ok(())
}

async fn add_conflict_ref(store: &dyn Store, uuid: Uuid, other: Uuid) -> Result<()> {
    if let Some(doc) = store.get(crate::decision::COLLECTION, uuid).await? {
        let mut decision: Decision = from_document(&doc)?;
        if !decision.conflicts_with.contains(&other) {
            decision.conflicts_with.push(other);
        }
        let document = crate::storeio::to_document(decision.uuid, &decision, Some(decision.embedding.clone()))?;
        store.put(crate::decision::COLLECTION, document).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_entities_finds_local_ids_and_keywords() {
        let found = extract_entities("See D042 about the Redis rollout", &["redis".to_string()]);
        assert!(found.contains("D042"));
        assert!(found.contains("redis"));
    }

    #[test]
    fn tier_delta_is_none_when_either_side_missing() {
        assert_eq!(tier_delta(None, Some(0.8)), None);
        let delta = tier_delta(Some(0.9), Some(0.5)).expect("both present");
        assert!((delta - 0.4).abs() < 1e-6);
    }
}
