use anyhow::Result;
use chrono::Utc;
use memoria_graph::schema::{Decision, ExpeditionFlag, Thread};
use memoria_graph::{decision, flag, thread};
use memoria_graph::EmbedClient;
use memoria_store::Store;
use serde::Serialize;
use uuid::Uuid;

use crate::recall::{recall, RecallResult, DEFAULT_MIN_SCORE};

const STALE_MAX_HOPS: u32 = 10;
const STALE_MAX_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct ConflictRow {
    pub decision: Uuid,
    pub conflicts_with: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectContext {
    pub project_uuid: Uuid,
    pub active_decisions: Vec<Decision>,
    pub active_threads: Vec<Thread>,
    pub pending_flags: Vec<ExpeditionFlag>,
    pub stale_decisions: Vec<Uuid>,
    pub stale_threads: Vec<Uuid>,
    pub conflicts: Vec<ConflictRow>,
}

/// Compose the whole current state of one project (spec §4.13,
/// `project_context`): active decisions, active threads, pending flags,
/// stale items, and conflict rows.
pub async fn project_context(store: &dyn Store, project_uuid: Uuid) -> Result<ProjectContext> {
    let active_decisions = decision::get_active_decisions(store, project_uuid).await?;
    let active_threads = thread::list_open_threads(store, project_uuid).await?;
    let pending_flags = flag::list_pending(store, project_uuid).await?;

    let now = Utc::now();
    let stale_decisions = active_decisions
        .iter()
        .filter(|d| d.is_stale(STALE_MAX_HOPS, STALE_MAX_DAYS, now))
        .map(|d| d.uuid)
        .collect();
    let stale_threads = active_threads
        .iter()
        .filter(|t| t.is_stale(STALE_MAX_HOPS, STALE_MAX_DAYS, now))
        .map(|t| t.uuid)
        .collect();

    let conflicts = active_decisions
        .iter()
        .filter(|d| !d.conflicts_with.is_empty())
        .map(|d| ConflictRow {
            decision: d.uuid,
            conflicts_with: d.conflicts_with.clone(),
        })
        .collect();

    Ok(ProjectContext {
        project_uuid,
        active_decisions,
        active_threads,
        pending_flags,
        stale_decisions,
        stale_threads,
        conflicts,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextLoad {
    pub project: ProjectContext,
    pub recall: Option<RecallResult>,
}

/// `project_context` plus a budget-scoped `recall` when a query is given
/// (spec §4.13, `context_load`).
pub async fn context_load(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    project_uuid: Uuid,
    query: Option<&str>,
    budget: usize,
) -> Result<ContextLoad> {
    let project = project_context(store, project_uuid).await?;

    let recall = match query {
        Some(query) => Some(recall(store, embed_client, query, Some(project_uuid), budget, DEFAULT_MIN_SCORE).await?),
        None => None,
    };

    Ok(ContextLoad { project, recall })
}
