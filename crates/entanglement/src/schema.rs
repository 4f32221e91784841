use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Decision,
    Thread,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub uuid: Uuid,
    pub kind: ItemKind,
    pub project_uuid: Uuid,
    pub local_id: String,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResonanceTier {
    Strong,
    Weak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resonance {
    pub a: Uuid,
    pub b: Uuid,
    pub similarity: f32,
    pub tier: ResonanceTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bridge {
    pub uuid: Uuid,
    pub kind: ItemKind,
    pub projects: Vec<Uuid>,
    pub edge_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    pub items: Vec<Uuid>,
    pub projects: Vec<Uuid>,
    pub resonances: Vec<Resonance>,
    pub avg_similarity: f32,
    pub strongest_link: Option<Resonance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub clusters: Vec<Cluster>,
    pub clusters_blob_ref: Option<String>,
    pub bridges: Vec<Bridge>,
    pub bridges_blob_ref: Option<String>,
    pub loose_ends: Vec<Uuid>,
    pub loose_ends_blob_ref: Option<String>,
    pub total_items: usize,
    pub total_resonances: usize,
}
