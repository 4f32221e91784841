pub mod persistence;
pub mod scan;
pub mod schema;
pub mod union_find;

use anyhow::Result;
use memoria_blob::BlobStore;
use memoria_graph::EmbedClient;
use memoria_store::Store;

pub use schema::{Bridge, Cluster, Item, ItemKind, Resonance, ResonanceTier, ScanResult};

/// Run a full cross-project entanglement scan and persist it (spec §4.12,
/// steps 1 through 5): backfill thread embeddings, load every active item,
/// find resonances, find lineage bridges, cluster via union-find, save.
pub async fn run_scan(
    store: &dyn Store,
    blob_store: Option<&BlobStore>,
    inline_threshold_chars: usize,
    embed_client: &dyn EmbedClient,
) -> Result<ScanResult> {
    let items = scan::build_item_index(store, embed_client).await?;
    let resonances = scan::find_resonances(&items);
    let bridges = scan::find_bridges(store, &items).await?;
    let (clusters, loose_ends) = scan::cluster(&items, &resonances);

    persistence::save_scan(store, blob_store, inline_threshold_chars, None, clusters, bridges, loose_ends).await
}
