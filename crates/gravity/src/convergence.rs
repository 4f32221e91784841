use std::collections::{HashMap, HashSet};

use crate::schema::{ConvergencePoint, ConvergenceType, LensResult};

const SEMANTIC_OVERLAP_THRESHOLD: f32 = 0.70;
const MIN_WORDS_FOR_OVERLAP: usize = 5;
const CONVERGENCE_BOOST: f32 = 1.3;

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Convergence between every pair of lenses (spec §4.14 step 4): either two
/// lenses surface hits in the same entanglement cluster, or their texts
/// overlap heavily by word-set Jaccard. Deduped so each (lens pair, cluster)
/// or (lens pair, item pair) contributes once, keeping the strongest hit.
pub fn find_convergence(lenses: &[LensResult]) -> Vec<ConvergencePoint> {
    let mut points = Vec::new();
    let mut seen_clusters: HashMap<(usize, usize, String), usize> = HashMap::new();

    for i in 0..lenses.len() {
        for j in (i + 1)..lenses.len() {
            let lens_a = &lenses[i];
            let lens_b = &lenses[j];

            for hit_a in &lens_a.hits {
                for hit_b in &lens_b.hits {
                    if hit_a.uuid == hit_b.uuid {
                        continue;
                    }

                    if let (Some(ea), Some(eb)) = (&hit_a.entanglement, &hit_b.entanglement) {
                        if ea.cluster_id == eb.cluster_id {
                            let combined_mass = (hit_a.attention + hit_b.attention) * CONVERGENCE_BOOST;
                            let key = (i, j, ea.cluster_id.clone());
                            let idx = *seen_clusters.entry(key).or_insert_with(|| {
                                points.push(ConvergencePoint {
                                    convergence_type: ConvergenceType::EntanglementCluster,
                                    lens_a: lens_a.project_uuid,
                                    lens_b: lens_b.project_uuid,
                                    item_a: hit_a.uuid,
                                    item_b: hit_b.uuid,
                                    combined_mass,
                                });
                                points.len() - 1
                            });
                            if combined_mass > points[idx].combined_mass {
                                points[idx].combined_mass = combined_mass;
                            }
                            continue;
                        }
                    }

                    let words_a = word_set(&hit_a.text);
                    let words_b = word_set(&hit_b.text);
                    if words_a.len() < MIN_WORDS_FOR_OVERLAP || words_b.len() < MIN_WORDS_FOR_OVERLAP {
                        continue;
                    }
                    if jaccard(&words_a, &words_b) >= SEMANTIC_OVERLAP_THRESHOLD {
                        points.push(ConvergencePoint {
                            convergence_type: ConvergenceType::SemanticOverlap,
                            lens_a: lens_a.project_uuid,
                            lens_b: lens_b.project_uuid,
                            item_a: hit_a.uuid,
                            item_b: hit_b.uuid,
                            combined_mass: (hit_a.attention + hit_b.attention) * CONVERGENCE_BOOST,
                        });
                    }
                }
            }
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a = word_set("adopt the shared caching layer now");
        let b = word_set("adopt the shared caching layer now");
        assert_eq!(jaccard(&a, &b), 1.0);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a = word_set("alpha beta gamma delta epsilon");
        let b = word_set("zulu yankee xray whiskey victor");
        assert_eq!(jaccard(&a, &b), 0.0);
    }
}
