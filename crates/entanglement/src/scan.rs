use std::collections::{HashMap, HashSet};

use anyhow::Result;
use memoria_graph::{decision, lineage, thread, EmbedClient};
use memoria_store::{cosine_similarity, Store};
use uuid::Uuid;

use crate::schema::{Bridge, Item, ItemKind, Resonance, ResonanceTier};
use crate::union_find::UnionFind;

pub const STRONG_THRESHOLD: f32 = 0.65;
pub const WEAK_THRESHOLD: f32 = 0.50;

fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn tier_of(similarity: f32) -> Option<ResonanceTier> {
    if similarity >= STRONG_THRESHOLD {
        Some(ResonanceTier::Strong)
    } else if similarity >= WEAK_THRESHOLD {
        Some(ResonanceTier::Weak)
    } else {
        None
    }
}

/// Backfill missing thread embeddings, then load every active decision and
/// non-resolved thread into one `uuid → Item` index (spec §4.12 steps 1-2).
pub async fn build_item_index(store: &dyn Store, embed_client: &dyn EmbedClient) -> Result<HashMap<Uuid, Item>> {
    thread::backfill_missing_embeddings(store, embed_client).await?;

    let mut items = HashMap::new();
    for d in decision::list_all_active(store).await? {
        items.insert(
            d.uuid,
            Item {
                uuid: d.uuid,
                kind: ItemKind::Decision,
                project_uuid: d.project_uuid,
                local_id: d.local_id,
                text: d.text,
                embedding: d.embedding,
            },
        );
    }
    for t in thread::list_all_open(store).await? {
        let Some(embedding) = t.embedding else { continue };
        items.insert(
            t.uuid,
            Item {
                uuid: t.uuid,
                kind: ItemKind::Thread,
                project_uuid: t.project_uuid,
                local_id: t.local_id,
                text: t.title,
                embedding,
            },
        );
    }
    Ok(items)
}

/// Three resonance passes deduped via sorted-pair key (spec §4.12 step 3):
/// cross-project decision↔decision, decision↔thread (any project pair), and
/// cross-project thread↔thread.
pub fn find_resonances(items: &HashMap<Uuid, Item>) -> Vec<Resonance> {
    let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();
    let mut resonances = Vec::new();
    let values: Vec<&Item> = items.values().collect();

    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            let a = values[i];
            let b = values[j];

            let eligible = match (a.kind, b.kind) {
                (ItemKind::Decision, ItemKind::Decision) => a.project_uuid != b.project_uuid,
                (ItemKind::Thread, ItemKind::Thread) => a.project_uuid != b.project_uuid,
                (ItemKind::Decision, ItemKind::Thread) | (ItemKind::Thread, ItemKind::Decision) => {
                    a.project_uuid != b.project_uuid
                }
            };
            if !eligible {
                continue;
            }

            let key = pair_key(a.uuid, b.uuid);
            if !seen.insert(key) {
                continue;
            }

            if a.embedding.is_empty() || b.embedding.is_empty() {
                continue;
            }
            let similarity = cosine_similarity(&a.embedding, &b.embedding);
            let Some(tier) = tier_of(similarity) else { continue };

            resonances.push(Resonance {
                a: a.uuid,
                b: b.uuid,
                similarity,
                tier,
            });
        }
    }

    resonances
}

/// Scan lineage edges for uuids (resolved via `local_id` + kind against
/// `items`) that appear carried across more than one project (spec §4.12
/// step 4).
pub async fn find_bridges(store: &dyn Store, items: &HashMap<Uuid, Item>) -> Result<Vec<Bridge>> {
    let mut local_index: HashMap<(ItemKind, &str), Uuid> = HashMap::new();
    for item in items.values() {
        local_index.insert((item.kind, item.local_id.as_str()), item.uuid);
    }

    let mut tally: HashMap<Uuid, (ItemKind, HashSet<Uuid>, u32)> = HashMap::new();
    let edges = lineage::get_full_graph(store, None).await?;

    for edge in &edges {
        let mut projects = HashSet::new();
        if let Some(p) = edge.source_project {
            projects.insert(p);
        }
        if let Some(p) = edge.target_project {
            projects.insert(p);
        }

        for local_id in &edge.decisions_carried {
            if let Some(&uuid) = local_index.get(&(ItemKind::Decision, local_id.as_str())) {
                let entry = tally.entry(uuid).or_insert((ItemKind::Decision, HashSet::new(), 0));
                entry.1.extend(&projects);
                entry.2 += 1;
            }
        }
        for local_id in &edge.threads_carried {
            if let Some(&uuid) = local_index.get(&(ItemKind::Thread, local_id.as_str())) {
                let entry = tally.entry(uuid).or_insert((ItemKind::Thread, HashSet::new(), 0));
                entry.1.extend(&projects);
                entry.2 += 1;
            }
        }
    }

    Ok(tally
        .into_iter()
        .filter(|(_, (_, projects, _))| projects.len() > 1)
        .map(|(uuid, (kind, projects, edge_count))| Bridge {
            uuid,
            kind,
            projects: projects.into_iter().collect(),
            edge_count,
        })
        .collect())
}

pub fn cluster(items: &HashMap<Uuid, Item>, resonances: &[Resonance]) -> (Vec<crate::schema::Cluster>, Vec<Uuid>) {
    let mut uf = UnionFind::new();
    for item in items.keys() {
        uf.touch(*item);
    }
    for r in resonances {
        uf.union(r.a, r.b);
    }

    let mut by_member: HashMap<Uuid, usize> = HashMap::new();
    let components = uf.components();
    for (idx, component) in components.iter().enumerate() {
        for uuid in component {
            by_member.insert(*uuid, idx);
        }
    }

    let mut resonances_per_component: HashMap<usize, Vec<Resonance>> = HashMap::new();
    for r in resonances {
        if let Some(&idx) = by_member.get(&r.a) {
            resonances_per_component.entry(idx).or_default().push(r.clone());
        }
    }

    let mut clusters = Vec::new();
    let mut loose_ends = Vec::new();

    for (idx, component) in components.iter().enumerate() {
        if component.len() < 2 {
            loose_ends.extend(component.iter().copied());
            continue;
        }
        let component_resonances = resonances_per_component.remove(&idx).unwrap_or_default();
        let avg_similarity = if component_resonances.is_empty() {
            0.0
        } else {
            component_resonances.iter().map(|r| r.similarity).sum::<f32>() / component_resonances.len() as f32
        };
        let strongest_link = component_resonances
            .iter()
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
            .cloned();
        let projects: Vec<Uuid> = component
            .iter()
            .filter_map(|uuid| items.get(uuid).map(|i| i.project_uuid))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        clusters.push(crate::schema::Cluster {
            cluster_id: format!("cluster-{}", idx),
            items: component.clone(),
            projects,
            resonances: component_resonances,
            avg_similarity,
            strongest_link,
        });
    }

    clusters.sort_by(|a, b| b.avg_similarity.total_cmp(&a.avg_similarity));
    (clusters, loose_ends)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(uuid: Uuid, kind: ItemKind, project: Uuid, text: &str, embedding: Vec<f32>) -> Item {
        Item {
            uuid,
            kind,
            project_uuid: project,
            local_id: "L001".to_string(),
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn cross_project_decisions_resonate_same_project_ones_do_not() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let mut items = HashMap::new();
        items.insert(a, item(a, ItemKind::Decision, p1, "use lsm trees", vec![1.0, 0.0]));
        items.insert(b, item(b, ItemKind::Decision, p2, "use lsm trees too", vec![1.0, 0.0]));
        items.insert(c, item(c, ItemKind::Decision, p1, "use lsm trees as well", vec![1.0, 0.0]));

        let resonances = find_resonances(&items);
        assert!(resonances.iter().any(|r| (r.a == a && r.b == b) || (r.a == b && r.b == a)));
        assert!(!resonances.iter().any(|r| (r.a == a && r.b == c) || (r.a == c && r.b == a)));
    }

    #[test]
    fn clustering_groups_transitively_resonant_items_and_leaves_singletons_loose() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let p3 = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let lonely = Uuid::new_v4();

        let mut items = HashMap::new();
        items.insert(a, item(a, ItemKind::Decision, p1, "x", vec![1.0, 0.0]));
        items.insert(b, item(b, ItemKind::Decision, p2, "x", vec![1.0, 0.0]));
        items.insert(c, item(c, ItemKind::Thread, p3, "x", vec![1.0, 0.0]));
        items.insert(lonely, item(lonely, ItemKind::Decision, p1, "unrelated", vec![0.0, 1.0]));

        let resonances = find_resonances(&items);
        let (clusters, loose_ends) = cluster(&items, &resonances);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].items.len(), 3);
        assert_eq!(loose_ends, vec![lonely]);
    }
}
