use anyhow::Result;
use chrono::Utc;
use memoria_store::{Filter, Store};
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use memoria_blob::BlobStore;

use crate::conflict;
use crate::display_id::{self, EntityType};
use crate::embed::{embed_one_or_zero, EmbedClient};
use crate::event_types::{emit, EventSink, EventType};
use crate::schema::{Decision, DecisionStatus, UpsertAction};
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "decisions";

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())[0..16].to_string()
}

pub struct UpsertDecisionInput<'a> {
    pub local_id: &'a str,
    pub text: &'a str,
    pub project_name: &'a str,
    pub project_uuid: Uuid,
    pub originated_conversation: Uuid,
    pub tier: Option<f32>,
    pub status: DecisionStatus,
    pub dependencies: Vec<String>,
    pub rationale: Option<String>,
}

pub struct UpsertDecisionResult {
    pub action: UpsertAction,
    pub decision: Decision,
    pub conflict_count: usize,
}

/// The three-action upsert (spec §4.6). Conflict detection runs on insert
/// only, best-effort: any failure is logged and swallowed, never surfaced.
pub async fn upsert_decision(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    sink: Option<&dyn EventSink>,
    static_prefix_map: &[(&str, &str)],
    project_keywords: &[String],
    blob_store: Option<&BlobStore>,
    inline_threshold_chars: usize,
    input: UpsertDecisionInput<'_>,
) -> Result<UpsertDecisionResult> {
    let hash = text_hash(input.text);
    let ts = memoria_identity::extract_timestamp_or_now(input.originated_conversation).timestamp_millis();
    let uuid = memoria_identity::v8_from_string(
        &format!("{hash}{}", input.originated_conversation),
        input.project_uuid,
        ts,
    );

    let existing = store.get(COLLECTION, uuid).await?;

    if let Some(doc) = existing {
        let mut decision: Decision = from_document(&doc)?;

        if decision.text_hash == hash {
            decision.last_validated = Utc::now();
            decision.hops_since_validated = 0;
            decision.updated_at = Utc::now();
            let document = to_document(decision.uuid, &decision, Some(decision.embedding.clone()))?;
            store.put(COLLECTION, document).await?;
            emit(
                sink,
                EventType::DecisionValidated,
                json!({ "uuid": decision.uuid }),
            )
            .await;
            return Ok(UpsertDecisionResult {
                action: UpsertAction::Validated,
                decision,
                conflict_count: 0,
            });
        }

        let embedding = embed_one_or_zero(embed_client, input.text).await;
        decision.text = input.text.to_string();
        decision.text_hash = hash;
        decision.embedding = embedding.clone();
        decision.text_blob_ref = blob_ref_for(blob_store, input.text, inline_threshold_chars).await?;
        decision.epistemic_tier = input.tier.or(decision.epistemic_tier);
        decision.status = input.status;
        if !input.dependencies.is_empty() {
            decision.dependencies = input.dependencies;
        }
        decision.rationale = input.rationale.or(decision.rationale);
        decision.hops_since_validated = 0;
        decision.last_validated = Utc::now();
        decision.updated_at = Utc::now();

        let document = to_document(decision.uuid, &decision, Some(embedding))?;
        store.put(COLLECTION, document).await?;
        emit(sink, EventType::DecisionUpdated, json!({ "uuid": decision.uuid })).await;
        return Ok(UpsertDecisionResult {
            action: UpsertAction::Updated,
            decision,
            conflict_count: 0,
        });
    }

    let embedding = embed_one_or_zero(embed_client, input.text).await;
    let text_blob_ref = blob_ref_for(blob_store, input.text, inline_threshold_chars).await?;

    let prefix = display_id::resolve_prefix(store, input.project_uuid, input.project_name, static_prefix_map).await?;
    let display_id = display_id::allocate(
        store,
        &prefix,
        EntityType::Decision,
        uuid,
        COLLECTION,
        input.project_uuid,
    )
    .await?;

    let decision = Decision {
        uuid,
        project_uuid: input.project_uuid,
        local_id: input.local_id.to_string(),
        text: input.text.to_string(),
        text_hash: hash,
        epistemic_tier: input.tier,
        status: input.status,
        dependencies: input.dependencies,
        conflicts_with: Vec::new(),
        superseded_by: None,
        rationale: input.rationale,
        hops_since_validated: 0,
        last_validated: Utc::now(),
        embedding: embedding.clone(),
        global_display_id: Some(display_id),
        text_blob_ref,
        originated_conversation: input.originated_conversation,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let document = to_document(decision.uuid, &decision, Some(embedding))?;
    store.put(COLLECTION, document).await?;

    let conflict_count = match conflict::detect_decision_conflicts(store, &decision, project_keywords).await {
        Ok(conflicts) => {
            for detected in &conflicts {
                if let Err(err) = conflict::register_conflict(store, decision.uuid, detected.other).await {
                    tracing::warn!(error = %err, "failed to register detected conflict");
                }
            }
            conflicts.len()
        }
        Err(err) => {
            tracing::warn!(error = %err, "conflict detection failed, continuing without it");
            0
        }
    };

    emit(
        sink,
        EventType::DecisionInserted,
        json!({ "uuid": decision.uuid, "conflict_count": conflict_count }),
    )
    .await;

    Ok(UpsertDecisionResult {
        action: UpsertAction::Inserted,
        decision,
        conflict_count,
    })
}

pub fn is_stale(decision: &Decision, max_hops: u32, max_days: i64) -> bool {
    decision.is_stale(max_hops, max_days, Utc::now())
}

/// `increment_decision_hops(project, exclude_uuids)`: raise
/// `hops_since_validated` by 1 for every active decision in `project` not in
/// `exclude`.
pub async fn increment_decision_hops(
    store: &dyn Store,
    project_uuid: Uuid,
    exclude: &[Uuid],
) -> Result<usize> {
    let filter = Filter::new()
        .eq("project_uuid", json_uuid(project_uuid))
        .eq("status", "active");
    let docs = store.find(COLLECTION, &filter).await?;
    let mut touched = 0;
    for doc in docs {
        let mut decision: Decision = from_document(&doc)?;
        if exclude.contains(&decision.uuid) {
            continue;
        }
        decision.hops_since_validated += 1;
        let document = to_document(decision.uuid, &decision, Some(decision.embedding.clone()))?;
        store.put(COLLECTION, document).await?;
        touched += 1;
    }
    Ok(touched)
}

pub async fn supersede(store: &dyn Store, uuid: Uuid, superseded_by: Uuid) -> Result<()> {
    if let Some(doc) = store.get(COLLECTION, uuid).await? {
        let mut decision: Decision = from_document(&doc)?;
        decision.status = DecisionStatus::Superseded;
        decision.superseded_by = Some(superseded_by);
        decision.updated_at = Utc::now();
        let document = to_document(decision.uuid, &decision, Some(decision.embedding.clone()))?;
        store.put(COLLECTION, document).await?;
    }
    Ok(())
}

pub async fn get_active_decisions(store: &dyn Store, project_uuid: Uuid) -> Result<Vec<Decision>> {
    let filter = Filter::new()
        .eq("project_uuid", json_uuid(project_uuid))
        .eq("status", "active");
    let docs = store.find(COLLECTION, &filter).await?;
    docs.iter().map(from_document).collect()
}

fn json_uuid(uuid: Uuid) -> serde_json::Value {
    serde_json::Value::from(uuid.to_string())
}

/// All active decisions across every project (used by the cross-project
/// entanglement scanner, spec §4.12 step 2).
pub async fn list_all_active(store: &dyn Store) -> Result<Vec<Decision>> {
    let filter = Filter::new().eq("status", "active");
    let docs = store.find(COLLECTION, &filter).await?;
    docs.iter().map(from_document).collect()
}

async fn blob_ref_for(blob_store: Option<&BlobStore>, text: &str, threshold_chars: usize) -> Result<Option<String>> {
    let Some(blob_store) = blob_store else {
        return Ok(None);
    };
    if !BlobStore::should_blob_back(text, threshold_chars) {
        return Ok(None);
    }
    Ok(blob_store.store(text).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::DeterministicEmbedClient;
    use memoria_store::InMemoryStore;

    fn input<'a>(local_id: &'a str, text: &'a str, project_uuid: Uuid, conv: Uuid) -> UpsertDecisionInput<'a> {
        UpsertDecisionInput {
            local_id,
            text,
            project_name: "P",
            project_uuid,
            originated_conversation: conv,
            tier: Some(0.9),
            status: DecisionStatus::Active,
            dependencies: Vec::new(),
            rationale: None,
        }
    }

    #[tokio::test]
    async fn s1_idempotent_decision_insert() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();
        let conv = Uuid::new_v4();

        let first = upsert_decision(&store, &embed, None, &[], &[], None, 500, input("D001", "Use LSM trees", project, conv)).await?;
        assert_eq!(first.action, UpsertAction::Inserted);
        assert_eq!(first.decision.global_display_id.as_deref(), Some("P-D-0001"));
        assert!(!first.decision.embedding.is_empty());

        let second = upsert_decision(&store, &embed, None, &[], &[], None, 500, input("D001", "Use LSM trees", project, conv)).await?;
        assert_eq!(second.action, UpsertAction::Validated);
        assert_eq!(second.decision.uuid, first.decision.uuid);
        assert_eq!(second.decision.hops_since_validated, 0);
        Ok(())
    }

    #[tokio::test]
    async fn changed_text_triggers_exactly_one_reembed() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();
        let conv = Uuid::new_v4();

        let first = upsert_decision(&store, &embed, None, &[], &[], None, 500, input("D001", "Use LSM trees", project, conv)).await?;
        let updated = upsert_decision(&store, &embed, None, &[], &[], None, 500, input("D001", "Use B-trees instead", project, conv)).await?;
        assert_eq!(updated.action, UpsertAction::Updated);
        assert_eq!(updated.decision.uuid, first.decision.uuid);
        assert_ne!(updated.decision.text_hash, first.decision.text_hash);
        Ok(())
    }

    #[tokio::test]
    async fn hop_increment_skips_excluded_set() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();
        let conv = Uuid::new_v4();

        let a = upsert_decision(&store, &embed, None, &[], &[], None, 500, input("D001", "alpha decision", project, conv)).await?;
        let b = upsert_decision(&store, &embed, None, &[], &[], None, 500, input("D002", "beta decision", project, conv)).await?;

        increment_decision_hops(&store, project, &[a.decision.uuid]).await?;

        let decisions = get_active_decisions(&store, project).await?;
        let a_after = decisions.iter().find(|d| d.uuid == a.decision.uuid).unwrap();
        let b_after = decisions.iter().find(|d| d.uuid == b.decision.uuid).unwrap();
        assert_eq!(a_after.hops_since_validated, 0);
        assert_eq!(b_after.hops_since_validated, 1);
        Ok(())
    }

    #[test]
    fn staleness_boundary() {
        let now = Utc::now();
        let mut decision = Decision {
            uuid: Uuid::new_v4(),
            project_uuid: Uuid::new_v4(),
            local_id: "D001".into(),
            text: "x".into(),
            text_hash: "x".into(),
            epistemic_tier: None,
            status: DecisionStatus::Active,
            dependencies: vec![],
            conflicts_with: vec![],
            superseded_by: None,
            rationale: None,
            hops_since_validated: 2,
            last_validated: now,
            embedding: vec![],
            global_display_id: None,
            text_blob_ref: None,
            originated_conversation: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        assert!(!decision.is_stale(3, 30, now));
        decision.hops_since_validated = 3;
        assert!(decision.is_stale(3, 30, now));
        decision.hops_since_validated = 0;
        decision.last_validated = now - chrono::Duration::days(31);
        assert!(decision.is_stale(3, 30, now));
    }
}
