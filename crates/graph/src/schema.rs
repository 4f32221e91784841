use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `UpsertAction ∈ {inserted, updated, validated}` — Design Note "Dynamic
/// typing → explicit variants".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertAction {
    Inserted,
    Updated,
    Validated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Active,
    Superseded,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Open,
    Blocked,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadPriority {
    High,
    Medium,
    Low,
}

impl ThreadPriority {
    pub fn sort_key(self) -> u8 {
        match self {
            ThreadPriority::High => 0,
            ThreadPriority::Medium => 1,
            ThreadPriority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimingStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCategory {
    Inversion,
    Isomorphism,
    Fsd,
    Manifestation,
    Trap,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStatus {
    Pending,
    Compiled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_uuid: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub source_id: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub created_at_ms: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub local_id: String,
    pub text: String,
    pub text_hash: String,
    pub epistemic_tier: Option<f32>,
    pub status: DecisionStatus,
    pub dependencies: Vec<String>,
    pub conflicts_with: Vec<Uuid>,
    pub superseded_by: Option<Uuid>,
    pub rationale: Option<String>,
    pub hops_since_validated: u32,
    pub last_validated: DateTime<Utc>,
    pub embedding: Vec<f32>,
    pub global_display_id: Option<String>,
    pub text_blob_ref: Option<String>,
    pub originated_conversation: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Decision {
    pub fn is_stale(&self, max_hops: u32, max_days: i64, now: DateTime<Utc>) -> bool {
        if self.status != DecisionStatus::Active {
            return false;
        }
        self.hops_since_validated >= max_hops
            || self.last_validated <= now - chrono::Duration::days(max_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub local_id: String,
    pub title: String,
    pub status: ThreadStatus,
    pub priority: ThreadPriority,
    pub blocked_by: Vec<Uuid>,
    pub resolution: Option<String>,
    pub resolution_blob_ref: Option<String>,
    pub hops_since_validated: u32,
    pub last_validated: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
    pub first_seen_conversation: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn is_stale(&self, max_hops: u32, max_days: i64, now: DateTime<Utc>) -> bool {
        if self.status == ThreadStatus::Resolved {
            return false;
        }
        self.hops_since_validated >= max_hops
            || self.last_validated <= now - chrono::Duration::days(max_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimingBlock {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub territory_name: String,
    pub territory_keys: Vec<String>,
    pub embedding: Vec<f32>,
    pub confidence_floor: f32,
    pub findings_count: u32,
    pub status: PrimingStatus,
    pub source_expeditions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpeditionFlag {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub description: String,
    pub conversation_id: Uuid,
    pub category: FlagCategory,
    pub status: FlagStatus,
    pub compiled_into: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionTag {
    pub compression_tag: String,
    pub project_uuid: Uuid,
    pub source_conversation: Uuid,
    pub target_conversations: Vec<Uuid>,
    pub decisions_captured: Vec<String>,
    pub threads_captured: Vec<String>,
    pub artifacts_captured: Vec<String>,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEdge {
    pub edge_uuid: Uuid,
    pub source_conversation: Uuid,
    pub target_conversation: Uuid,
    pub compression_tag: Option<String>,
    pub decisions_carried: Vec<String>,
    pub decisions_dropped: Vec<String>,
    pub threads_carried: Vec<String>,
    pub threads_resolved: Vec<String>,
    pub source_project: Option<Uuid>,
    pub target_project: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayIdEntry {
    pub display_id: String,
    pub entity_uuid: Uuid,
    pub collection: String,
    pub project_uuid: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSeverity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSignal {
    EmbeddingSimilarity,
    EntityTierDivergence,
}

#[derive(Debug, Clone)]
pub struct DetectedConflict {
    pub other: Uuid,
    pub signal: ConflictSignal,
    pub severity: ConflictSeverity,
    pub shared_entities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    Connector,
    Navigator,
    Builder,
    Evaluator,
    Critic,
    Compiler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityType {
    Lateral,
    Directional,
    Implementation,
    Quality,
    Critical,
    Synthesis,
}

impl ProjectRole {
    /// The role's dispositional effect on the gravitational field (GLOSSARY
    /// "Gravity type").
    pub fn gravity_type(self) -> GravityType {
        match self {
            ProjectRole::Connector => GravityType::Lateral,
            ProjectRole::Navigator => GravityType::Directional,
            ProjectRole::Builder => GravityType::Implementation,
            ProjectRole::Evaluator => GravityType::Quality,
            ProjectRole::Critic => GravityType::Critical,
            ProjectRole::Compiler => GravityType::Synthesis,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRoleRow {
    pub project_uuid: Uuid,
    pub role: ProjectRole,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensSpec {
    pub project_uuid: Uuid,
    pub role: ProjectRole,
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensConfiguration {
    pub name: String,
    pub lenses: Vec<LensSpec>,
    pub default_budget: usize,
}
