use crate::schema::{DivergenceNote, DivergenceType, LensResult};

const GAP_TENSION: f32 = 0.6;
const TIER_MISMATCH_THRESHOLD: f32 = 0.25;
const TIER_MISMATCH_SCALE: f32 = 0.5;

/// Divergence between every pair of lenses (spec §4.14 step 5): a gap where
/// one lens is silent and the other isn't, or two decision hits whose
/// epistemic tiers disagree by more than the threshold.
pub fn find_divergence(lenses: &[LensResult]) -> Vec<DivergenceNote> {
    let mut notes = Vec::new();

    for i in 0..lenses.len() {
        for j in (i + 1)..lenses.len() {
            let lens_a = &lenses[i];
            let lens_b = &lenses[j];

            if lens_a.hits.is_empty() != lens_b.hits.is_empty() && (lens_a.hits.is_empty() || lens_b.hits.is_empty()) {
                notes.push(DivergenceNote {
                    divergence_type: DivergenceType::Gap,
                    lens_a: lens_a.project_uuid,
                    lens_b: lens_b.project_uuid,
                    item_a: lens_a.hits.first().map(|h| h.uuid),
                    item_b: lens_b.hits.first().map(|h| h.uuid),
                    tension_score: GAP_TENSION,
                });
                continue;
            }

            for hit_a in lens_a.hits.iter().filter(|h| h.category == "decision") {
                for hit_b in lens_b.hits.iter().filter(|h| h.category == "decision") {
                    let (Some(tier_a), Some(tier_b)) = (hit_a.epistemic_tier, hit_b.epistemic_tier) else {
                        continue;
                    };
                    let delta = (tier_a - tier_b).abs();
                    if delta >= TIER_MISMATCH_THRESHOLD {
                        notes.push(DivergenceNote {
                            divergence_type: DivergenceType::TierMismatch,
                            lens_a: lens_a.project_uuid,
                            lens_b: lens_b.project_uuid,
                            item_a: Some(hit_a.uuid),
                            item_b: Some(hit_b.uuid),
                            tension_score: (delta / TIER_MISMATCH_SCALE).clamp(0.0, 1.0),
                        });
                    }
                }
            }
        }
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LensResult;
    use memoria_attention::RecallHit;
    use memoria_graph::schema::{GravityType, ProjectRole};
    use uuid::Uuid;

    fn lens(project: Uuid, hits: Vec<RecallHit>) -> LensResult {
        LensResult {
            project_uuid: project,
            role: ProjectRole::Navigator,
            gravity_type: GravityType::Directional,
            weight: 1.0,
            hits,
        }
    }

    fn decision_hit(uuid: Uuid, tier: f32) -> RecallHit {
        RecallHit {
            uuid,
            category: "decision",
            source: "decision",
            text: "some decision text here".to_string(),
            similarity: 0.9,
            attention: 0.8,
            project_uuid: None,
            local_id: None,
            epistemic_tier: Some(tier),
            updated_at: None,
            has_conflicts: false,
            status: None,
            entanglement: None,
        }
    }

    #[test]
    fn empty_lens_against_populated_lens_is_a_gap() {
        let a = lens(Uuid::new_v4(), vec![decision_hit(Uuid::new_v4(), 0.5)]);
        let b = lens(Uuid::new_v4(), vec![]);
        let notes = find_divergence(&[a, b]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].divergence_type, DivergenceType::Gap);
    }

    #[test]
    fn large_tier_delta_is_flagged() {
        let a = lens(Uuid::new_v4(), vec![decision_hit(Uuid::new_v4(), 0.9)]);
        let b = lens(Uuid::new_v4(), vec![decision_hit(Uuid::new_v4(), 0.2)]);
        let notes = find_divergence(&[a, b]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].divergence_type, DivergenceType::TierMismatch);
        assert!((notes[0].tension_score - 1.0).abs() < 1e-6);
    }
}
