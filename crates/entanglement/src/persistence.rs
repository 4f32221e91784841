use anyhow::Result;
use chrono::Utc;
use memoria_blob::BlobStore;
use memoria_store::{Filter, Store};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{Bridge, Cluster, ScanResult};

pub const COLLECTION: &str = "scans";

fn to_document(scan: &ScanResult) -> Result<memoria_store::Document> {
    let json = serde_json::to_value(scan)?;
    let fields = json
        .as_object()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("scan result did not serialize to an object"))?;
    Ok(memoria_store::Document {
        id: scan.scan_id,
        fields,
        embedding: None,
        expires_at: None,
    })
}

fn from_document(doc: &memoria_store::Document) -> Result<ScanResult> {
    let value = Value::Object(doc.fields.clone());
    Ok(serde_json::from_value(value)?)
}

/// Insert a scan, blob-backing each heavy array only once its JSON rendering
/// exceeds `inline_threshold_chars` (the same threshold `decision.rs`/
/// `thread.rs` gate their own blob-backing on), reads staying inline below
/// it.
pub async fn save_scan(
    store: &dyn Store,
    blob_store: Option<&BlobStore>,
    inline_threshold_chars: usize,
    project_uuid: Option<Uuid>,
    clusters: Vec<Cluster>,
    bridges: Vec<Bridge>,
    loose_ends: Vec<Uuid>,
) -> Result<ScanResult> {
    let total_resonances: usize = clusters.iter().map(|c| c.resonances.len()).sum();

    let clusters_blob_ref = blob_ref_for_json(blob_store, &clusters, inline_threshold_chars).await?;
    let bridges_blob_ref = blob_ref_for_json(blob_store, &bridges, inline_threshold_chars).await?;
    let loose_ends_blob_ref = blob_ref_for_json(blob_store, &loose_ends, inline_threshold_chars).await?;

    let total_items = clusters.iter().map(|c| c.items.len()).sum::<usize>() + loose_ends.len();

    let scan = ScanResult {
        scan_id: Uuid::new_v4(),
        scanned_at: Utc::now(),
        clusters,
        clusters_blob_ref,
        bridges,
        bridges_blob_ref,
        loose_ends,
        loose_ends_blob_ref,
        total_items,
        total_resonances,
    };

    let mut document = to_document(&scan)?;
    if let Some(project_uuid) = project_uuid {
        document.set("scoped_project", Value::from(project_uuid.to_string()));
    }
    store.put(COLLECTION, document).await?;

    Ok(scan)
}

/// Most recent scan row filtered to `{project}` or `{project absent}`. When
/// `blob_store` is given and a field's blob ref is set, the blob copy is
/// resolved and replaces the inline array — the inline copy is a cache, the
/// blob is the source of truth once the content outgrew the threshold.
pub async fn get_latest_scan(
    store: &dyn Store,
    blob_store: Option<&BlobStore>,
    project_uuid: Option<Uuid>,
) -> Result<Option<ScanResult>> {
    let filter = match project_uuid {
        Some(p) => Filter::new().eq("scoped_project", Value::from(p.to_string())),
        None => Filter::new(),
    };
    let docs = store.find(COLLECTION, &filter).await?;
    let latest = docs.iter().max_by_key(|doc| {
        doc.get("scanned_at")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
    });
    let Some(doc) = latest else {
        return Ok(None);
    };
    let mut scan = from_document(doc)?;

    if let Some(blob_store) = blob_store {
        if let Some(reference) = &scan.clusters_blob_ref {
            scan.clusters = blob_store.resolve_json(reference).await?;
        }
        if let Some(reference) = &scan.bridges_blob_ref {
            scan.bridges = blob_store.resolve_json(reference).await?;
        }
        if let Some(reference) = &scan.loose_ends_blob_ref {
            scan.loose_ends = blob_store.resolve_json(reference).await?;
        }
    }

    Ok(Some(scan))
}

async fn blob_ref_for_json<T: serde::Serialize>(
    blob_store: Option<&BlobStore>,
    value: &T,
    threshold_chars: usize,
) -> Result<Option<String>> {
    let Some(blob_store) = blob_store else {
        return Ok(None);
    };
    let text = serde_json::to_string(value)?;
    if !BlobStore::should_blob_back(&text, threshold_chars) {
        return Ok(None);
    }
    Ok(blob_store.store(&text).await?)
}

/// Filter a full scan down to the clusters/bridges/loose_ends that mention
/// `project_uuid`.
pub fn scope_to_project(scan: &ScanResult, project_uuid: Uuid, item_projects: &std::collections::HashMap<Uuid, Uuid>) -> ScanResult {
    let clusters: Vec<Cluster> = scan
        .clusters
        .iter()
        .filter(|c| c.projects.contains(&project_uuid))
        .cloned()
        .collect();
    let bridges: Vec<Bridge> = scan
        .bridges
        .iter()
        .filter(|b| b.projects.contains(&project_uuid))
        .cloned()
        .collect();
    let loose_ends: Vec<Uuid> = scan
        .loose_ends
        .iter()
        .filter(|uuid| item_projects.get(uuid) == Some(&project_uuid))
        .copied()
        .collect();

    ScanResult {
        scan_id: scan.scan_id,
        scanned_at: scan.scanned_at,
        total_items: clusters.iter().map(|c| c.items.len()).sum::<usize>() + loose_ends.len(),
        total_resonances: clusters.iter().map(|c| c.resonances.len()).sum(),
        clusters,
        clusters_blob_ref: scan.clusters_blob_ref.clone(),
        bridges,
        bridges_blob_ref: scan.bridges_blob_ref.clone(),
        loose_ends,
        loose_ends_blob_ref: scan.loose_ends_blob_ref.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn save_and_reload_round_trips() -> Result<()> {
        let store = InMemoryStore::new();
        let saved = save_scan(&store, None, 500, None, Vec::new(), Vec::new(), Vec::new()).await?;
        let loaded = get_latest_scan(&store, None, None).await?.expect("scan persisted");
        assert_eq!(loaded.scan_id, saved.scan_id);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_arrays_are_blob_backed_and_resolved_on_read() -> Result<()> {
        use memoria_blob::{BlobStore, LocalFsBackend};
        use std::sync::Arc;

        let store = InMemoryStore::new();
        let dir = tempfile::tempdir()?;
        let blob = BlobStore::new(Arc::new(LocalFsBackend::new(dir.path())), true);

        let loose_ends: Vec<Uuid> = (0..200).map(|_| Uuid::new_v4()).collect();
        let saved = save_scan(&store, Some(&blob), 50, None, Vec::new(), Vec::new(), loose_ends.clone()).await?;
        assert!(saved.loose_ends_blob_ref.is_some());

        let loaded = get_latest_scan(&store, Some(&blob), None).await?.expect("scan persisted");
        assert_eq!(loaded.loose_ends, loose_ends);
        Ok(())
    }
}
