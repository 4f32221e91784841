use std::fmt::Write as _;

use crate::schema::{ConvergencePoint, DivergenceNote, LensResult};

const MAX_DIVERGENCE_NOTES: usize = 3;

/// Budget-constrained three-band composition (spec §4.14 step 7):
/// convergence header + items, per-lens bands sorted by top-attention desc,
/// then up to three divergence notes. Truncates at the character budget.
pub fn compose(lenses: &[LensResult], convergence: &[ConvergencePoint], divergence: &[DivergenceNote], budget: usize) -> String {
    let mut out = String::new();

    if !convergence.is_empty() {
        let _ = writeln!(out, "## Convergence ({} points)", convergence.len());
        for point in convergence {
            let _ = writeln!(
                out,
                "- {:?}: lens {} <-> lens {} (mass {:.2})",
                point.convergence_type, point.lens_a, point.lens_b, point.combined_mass
            );
        }
    }

    let mut ordered_lenses: Vec<&LensResult> = lenses.iter().collect();
    ordered_lenses.sort_by(|a, b| b.top_attention().total_cmp(&a.top_attention()));
    for lens in ordered_lenses {
        let _ = writeln!(out, "## Lens {} ({:?})", lens.project_uuid, lens.gravity_type);
        for hit in &lens.hits {
            let _ = writeln!(out, "- [{:.2}] {}", hit.attention, hit.text);
        }
    }

    if !divergence.is_empty() {
        let _ = writeln!(out, "## Divergence");
        for note in divergence.iter().take(MAX_DIVERGENCE_NOTES) {
            let _ = writeln!(
                out,
                "- {:?}: lens {} <-> lens {} (tension {:.2})",
                note.divergence_type, note.lens_a, note.lens_b, note.tension_score
            );
        }
    }

    if out.len() > budget {
        out.truncate(budget);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_graph::schema::{GravityType, ProjectRole};
    use uuid::Uuid;

    #[test]
    fn composition_respects_the_budget() {
        let lens = LensResult {
            project_uuid: Uuid::new_v4(),
            role: ProjectRole::Builder,
            gravity_type: GravityType::Implementation,
            weight: 1.0,
            hits: Vec::new(),
        };
        let text = compose(&[lens], &[], &[], 20);
        assert!(text.len() <= 20);
    }
}
