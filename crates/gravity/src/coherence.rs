use crate::schema::{ConvergencePoint, DivergenceNote, LensResult};

/// `coherence = 0.5 + 0.5*(convergence_mass / total_mass) - 0.5*(divergence_tension / max(total_mass, 1))`,
/// clamped to [0,1]; defaults to 0.5 when `total_mass = 0` (spec §4.14 step 6).
pub fn field_coherence(lenses: &[LensResult], convergence: &[ConvergencePoint], divergence: &[DivergenceNote]) -> f32 {
    let total_mass: f32 = lenses.iter().flat_map(|l| l.hits.iter()).map(|h| h.attention).sum();
    if total_mass <= 0.0 {
        return 0.5;
    }

    let convergence_mass: f32 = convergence.iter().map(|c| c.combined_mass).sum();
    let divergence_tension: f32 = divergence.iter().map(|d| d.tension_score).sum();

    let coherence = 0.5 + 0.5 * (convergence_mass / total_mass) - 0.5 * (divergence_tension / total_mass.max(1.0));
    coherence.clamp(0.0, 1.0)
}
