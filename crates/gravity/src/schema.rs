use memoria_attention::RecallHit;
use memoria_graph::schema::{GravityType, ProjectRole};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct LensResult {
    pub project_uuid: Uuid,
    pub role: ProjectRole,
    pub gravity_type: GravityType,
    pub weight: f32,
    pub hits: Vec<RecallHit>,
}

impl LensResult {
    pub fn top_attention(&self) -> f32 {
        self.hits.iter().map(|h| h.attention).fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceType {
    EntanglementCluster,
    SemanticOverlap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvergencePoint {
    pub convergence_type: ConvergenceType,
    pub lens_a: Uuid,
    pub lens_b: Uuid,
    pub item_a: Uuid,
    pub item_b: Uuid,
    pub combined_mass: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceType {
    Gap,
    TierMismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct DivergenceNote {
    pub divergence_type: DivergenceType,
    pub lens_a: Uuid,
    pub lens_b: Uuid,
    pub item_a: Option<Uuid>,
    pub item_b: Option<Uuid>,
    pub tension_score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GravityResult {
    pub lenses: Vec<LensResult>,
    pub convergence_points: Vec<ConvergencePoint>,
    pub divergence_notes: Vec<DivergenceNote>,
    pub field_coherence: f32,
    pub context_text: String,
}
