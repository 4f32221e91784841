use anyhow::Result;
use chrono::Utc;
use memoria_store::{Filter, Store};
use serde_json::json;
use uuid::Uuid;

use memoria_blob::BlobStore;

use crate::embed::{embed_one_or_zero, EmbedClient};
use crate::event_types::{emit, EventSink, EventType};
use crate::schema::{Thread, ThreadPriority, ThreadStatus, UpsertAction};
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "threads";

pub struct UpsertThreadInput<'a> {
    pub local_id: &'a str,
    pub title: &'a str,
    pub project_uuid: Uuid,
    pub first_seen_conversation: Uuid,
    pub status: ThreadStatus,
    pub priority: ThreadPriority,
    pub blocked_by: Vec<Uuid>,
}

/// Analogous to the decision upsert but simpler: no text hash, embed once
/// on insert, revalidate on every subsequent call (spec §4.7).
pub async fn upsert_thread(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    sink: Option<&dyn EventSink>,
    input: UpsertThreadInput<'_>,
) -> Result<(UpsertAction, Thread)> {
    let ts = memoria_identity::extract_timestamp_or_now(input.first_seen_conversation).timestamp_millis();
    let uuid = memoria_identity::v8_from_string(
        &format!("{}{}", input.title, input.first_seen_conversation),
        input.project_uuid,
        ts,
    );

    let existing = store.get(COLLECTION, uuid).await?;

    let (action, thread) = if let Some(doc) = existing {
        let mut thread: Thread = from_document(&doc)?;
        thread.status = input.status;
        thread.priority = input.priority;
        if !input.blocked_by.is_empty() {
            thread.blocked_by = input.blocked_by;
        }
        thread.hops_since_validated = 0;
        thread.last_validated = Utc::now();
        thread.updated_at = Utc::now();
        (UpsertAction::Validated, thread)
    } else {
        let embedding = embed_one_or_zero(embed_client, input.title).await;

        (
            UpsertAction::Inserted,
            Thread {
                uuid,
                project_uuid: input.project_uuid,
                local_id: input.local_id.to_string(),
                title: input.title.to_string(),
                status: input.status,
                priority: input.priority,
                blocked_by: input.blocked_by,
                resolution: None,
                resolution_blob_ref: None,
                hops_since_validated: 0,
                last_validated: Utc::now(),
                embedding: Some(embedding),
                first_seen_conversation: input.first_seen_conversation,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        )
    };

    let document = to_document(thread.uuid, &thread, thread.embedding.clone())?;
    store.put(COLLECTION, document).await?;
    emit(
        sink,
        EventType::ThreadUpserted,
        json!({ "uuid": thread.uuid, "action": action }),
    )
    .await;

    Ok((action, thread))
}

pub async fn resolve_thread(
    store: &dyn Store,
    sink: Option<&dyn EventSink>,
    blob_store: Option<&BlobStore>,
    inline_threshold_chars: usize,
    uuid: Uuid,
    resolution: String,
) -> Result<()> {
    if let Some(doc) = store.get(COLLECTION, uuid).await? {
        let mut thread: Thread = from_document(&doc)?;
        thread.status = ThreadStatus::Resolved;
        thread.resolution_blob_ref = match blob_store {
            Some(blob_store) if BlobStore::should_blob_back(&resolution, inline_threshold_chars) => {
                blob_store.store(&resolution).await?
            }
            _ => None,
        };
        thread.resolution = Some(resolution);
        thread.updated_at = Utc::now();
        let document = to_document(thread.uuid, &thread, thread.embedding.clone())?;
        store.put(COLLECTION, document).await?;
        emit(sink, EventType::ThreadResolved, json!({ "uuid": uuid })).await;
    }
    Ok(())
}

pub async fn increment_thread_hops(store: &dyn Store, project_uuid: Uuid, exclude: &[Uuid]) -> Result<usize> {
    let filter = Filter::new()
        .eq("project_uuid", json!(project_uuid.to_string()))
        .ne("status", "resolved");
    let docs = store.find(COLLECTION, &filter).await?;
    let mut touched = 0;
    for doc in docs {
        let mut thread: Thread = from_document(&doc)?;
        if exclude.contains(&thread.uuid) {
            continue;
        }
        thread.hops_since_validated += 1;
        let document = to_document(thread.uuid, &thread, thread.embedding.clone())?;
        store.put(COLLECTION, document).await?;
        touched += 1;
    }
    Ok(touched)
}

/// List non-resolved threads for `project`, sorted by priority (high first)
/// then `updated_at` ascending.
pub async fn list_open_threads(store: &dyn Store, project_uuid: Uuid) -> Result<Vec<Thread>> {
    let filter = Filter::new()
        .eq("project_uuid", json!(project_uuid.to_string()))
        .ne("status", "resolved");
    let docs = store.find(COLLECTION, &filter).await?;
    let mut threads: Vec<Thread> = docs.iter().map(from_document).collect::<Result<_>>()?;
    threads.sort_by(|a, b| {
        a.priority
            .sort_key()
            .cmp(&b.priority.sort_key())
            .then(a.updated_at.cmp(&b.updated_at))
    });
    Ok(threads)
}

/// All non-resolved threads across every project (used by the cross-project
/// entanglement scanner, spec §4.12 step 2).
pub async fn list_all_open(store: &dyn Store) -> Result<Vec<Thread>> {
    let filter = Filter::new().ne("status", "resolved");
    let docs = store.find(COLLECTION, &filter).await?;
    docs.iter().map(from_document).collect()
}

/// Lazily back-fill titles missing an embedding (spec §4.12 step 1, and the
/// lazy-backfill Open Question resolution: only threads actually missing an
/// embedding get re-embedded, no bulk re-embed sweep).
pub async fn backfill_missing_embeddings(store: &dyn Store, embed_client: &dyn EmbedClient) -> Result<usize> {
    let threads = list_all_open(store).await?;
    let mut backfilled = 0;
    for mut thread in threads {
        if thread.embedding.is_some() {
            continue;
        }
        thread.embedding = Some(embed_one_or_zero(embed_client, &thread.title).await);
        let document = to_document(thread.uuid, &thread, thread.embedding.clone())?;
        store.put(COLLECTION, document).await?;
        backfilled += 1;
    }
    Ok(backfilled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::DeterministicEmbedClient;
    use memoria_store::InMemoryStore;

    fn input(title: &str, priority: ThreadPriority, project: Uuid, conv: Uuid) -> UpsertThreadInput<'_> {
        UpsertThreadInput {
            local_id: "T001",
            title,
            project_uuid: project,
            first_seen_conversation: conv,
            status: ThreadStatus::Open,
            priority,
            blocked_by: Vec::new(),
        }
    }

    #[tokio::test]
    async fn repeated_upsert_is_idempotent_on_identity() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();
        let conv = Uuid::new_v4();

        let (action_a, thread_a) =
            upsert_thread(&store, &embed, None, input("Investigate latency spike", ThreadPriority::High, project, conv)).await?;
        assert_eq!(action_a, UpsertAction::Inserted);

        let (action_b, thread_b) =
            upsert_thread(&store, &embed, None, input("Investigate latency spike", ThreadPriority::High, project, conv)).await?;
        assert_eq!(action_b, UpsertAction::Validated);
        assert_eq!(thread_a.uuid, thread_b.uuid);
        Ok(())
    }

    #[tokio::test]
    async fn list_open_threads_sorts_priority_then_updated_at() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();

        upsert_thread(&store, &embed, None, input("Low priority thing", ThreadPriority::Low, project, Uuid::new_v4())).await?;
        upsert_thread(&store, &embed, None, input("High priority thing", ThreadPriority::High, project, Uuid::new_v4())).await?;

        let threads = list_open_threads(&store, project).await?;
        assert_eq!(threads[0].priority, ThreadPriority::High);
        Ok(())
    }

    #[tokio::test]
    async fn resolved_thread_is_excluded_from_open_list() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();

        let (_, thread) =
            upsert_thread(&store, &embed, None, input("Flaky test investigation", ThreadPriority::Medium, project, Uuid::new_v4())).await?;
        resolve_thread(&store, None, None, 500, thread.uuid, "Fixed by pinning the clock".to_string()).await?;

        let threads = list_open_threads(&store, project).await?;
        assert!(threads.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn backfill_skips_threads_that_already_have_embeddings() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        upsert_thread(&store, &embed, None, input("Already embedded", ThreadPriority::Low, Uuid::new_v4(), Uuid::new_v4())).await?;

        let backfilled = backfill_missing_embeddings(&store, &embed).await?;
        assert_eq!(backfilled, 0);
        Ok(())
    }
}
