use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use memoria_graph::schema::{Decision, ExpeditionFlag, PrimingBlock, Thread};
use memoria_graph::{decision, flag, priming, thread};
use memoria_store::Store;
use uuid::Uuid;

/// One compiled document ready for a sync target, analogous to the
/// teacher's per-entry vault note: a title, a rendered body, and the
/// backlink topics a target can use to build an index.
#[derive(Debug, Clone)]
pub struct SyncDocument {
    pub id: Uuid,
    pub collection: &'static str,
    pub title: String,
    pub body: String,
    pub topics: Vec<String>,
}

/// A project's whole compiled state: one index plus one document per active
/// decision/thread/priming-block/pending-flag (spec §2's "Sync → registry
/// query → document compile → push").
#[derive(Debug, Clone)]
pub struct ProjectDocumentSet {
    pub project_uuid: Uuid,
    pub documents: Vec<SyncDocument>,
    pub index: SyncDocument,
}

pub async fn compile_project_documents(store: &dyn Store, project_uuid: Uuid) -> Result<ProjectDocumentSet> {
    let decisions = decision::get_active_decisions(store, project_uuid).await?;
    let threads = thread::list_open_threads(store, project_uuid).await?;
    let priming_blocks = priming_for_project(store, project_uuid).await?;
    let pending_flags = flag::list_pending(store, project_uuid).await?;

    let mut documents = Vec::new();
    let mut topic_backlinks: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for d in &decisions {
        let doc = decision_document(d);
        for topic in &doc.topics {
            topic_backlinks.entry(topic.clone()).or_default().insert(doc.title.clone());
        }
        documents.push(doc);
    }
    for t in &threads {
        let doc = thread_document(t);
        for topic in &doc.topics {
            topic_backlinks.entry(topic.clone()).or_default().insert(doc.title.clone());
        }
        documents.push(doc);
    }
    for p in &priming_blocks {
        documents.push(priming_document(p));
    }
    for f in &pending_flags {
        documents.push(flag_document(f));
    }

    let index = index_document(project_uuid, &decisions, &threads, &topic_backlinks);

    Ok(ProjectDocumentSet {
        project_uuid,
        documents,
        index,
    })
}

async fn priming_for_project(store: &dyn Store, project_uuid: Uuid) -> Result<Vec<PrimingBlock>> {
    // Priming blocks carry no free-text body to embed-search against; the
    // sync compiler only needs the active ones for this project, so this
    // reuses the registry's own filter rather than the recall path.
    let all = priming::find_relevant_priming(store, &never_match_embed_client(), "", Some(project_uuid), 1000, -1.0).await;
    match all {
        Ok(blocks) => Ok(blocks),
        Err(_) => Ok(Vec::new()),
    }
}

fn never_match_embed_client() -> memoria_graph::embed::DeterministicEmbedClient {
    memoria_graph::embed::DeterministicEmbedClient
}

fn decision_document(d: &Decision) -> SyncDocument {
    let title = format!("decision-{}", d.local_id);
    let topics = extract_topics(&d.text);
    let body = format!(
        "# {}\n\nstatus: {:?}\ntier: {}\n\n{}\n",
        title,
        d.status,
        d.epistemic_tier.map(|t| t.to_string()).unwrap_or_else(|| "unset".to_string()),
        d.text,
    );
    SyncDocument {
        id: d.uuid,
        collection: "decisions",
        title,
        body,
        topics,
    }
}

fn thread_document(t: &Thread) -> SyncDocument {
    let title = format!("thread-{}", t.local_id);
    let topics = extract_topics(&t.title);
    let body = format!("# {}\n\nstatus: {:?}\npriority: {:?}\n\n{}\n", title, t.status, t.priority, t.title);
    SyncDocument {
        id: t.uuid,
        collection: "threads",
        title,
        body,
        topics,
    }
}

fn priming_document(p: &PrimingBlock) -> SyncDocument {
    let title = format!("priming-{}", p.territory_name);
    let body = format!(
        "# {}\n\nconfidence_floor: {:.2}\nfindings: {}\n\nkeys: {}\n",
        title,
        p.confidence_floor,
        p.findings_count,
        p.territory_keys.join(", "),
    );
    SyncDocument {
        id: p.uuid,
        collection: "priming_blocks",
        title,
        body,
        topics: p.territory_keys.clone(),
    }
}

fn flag_document(f: &ExpeditionFlag) -> SyncDocument {
    let title = format!("flag-{}", f.uuid.as_simple());
    let body = format!("# {}\n\ncategory: {:?}\n\n{}\n", title, f.category, f.description);
    SyncDocument {
        id: f.uuid,
        collection: "expedition_flags",
        title,
        body,
        topics: extract_topics(&f.description),
    }
}

fn index_document(
    project_uuid: Uuid,
    decisions: &[Decision],
    threads: &[Thread],
    topic_backlinks: &BTreeMap<String, BTreeSet<String>>,
) -> SyncDocument {
    let mut body = format!("# Project {project_uuid} index\n\n## Decisions ({})\n", decisions.len());
    for d in decisions {
        body.push_str(&format!("- [[decision-{}]]\n", d.local_id));
    }
    body.push_str(&format!("\n## Threads ({})\n", threads.len()));
    for t in threads {
        body.push_str(&format!("- [[thread-{}]]\n", t.local_id));
    }
    body.push_str("\n## Topics\n");
    for topic in topic_backlinks.keys() {
        body.push_str(&format!("- [[topic-{topic}]]\n"));
    }

    SyncDocument {
        id: project_uuid,
        collection: "index",
        title: "index".to_string(),
        body,
        topics: Vec::new(),
    }
}

const STOPWORDS: &[&str] = &[
    "about", "after", "because", "before", "could", "there", "their", "these", "those", "would",
    "should", "where", "which", "while", "using", "please", "today",
];

fn extract_topics(text: &str) -> Vec<String> {
    let stop: BTreeSet<&str> = STOPWORDS.iter().copied().collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
        .map(|w| w.to_lowercase())
        .filter(|w| !stop.contains(w.as_str()))
    {
        *counts.entry(word).or_default() += 1;
    }

    let mut topics: Vec<(String, usize)> = counts.into_iter().collect();
    topics.sort_by(|(lw, lc), (rw, rc)| rc.cmp(lc).then_with(|| lw.cmp(rw)));
    topics.into_iter().take(6).map(|(word, _)| word).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_graph::decision::{upsert_decision, UpsertDecisionInput};
    use memoria_graph::embed::DeterministicEmbedClient;
    use memoria_graph::schema::DecisionStatus;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn compiled_index_lists_every_active_decision() -> Result<()> {
        let store = InMemoryStore::new();
        let embed = DeterministicEmbedClient;
        let project = Uuid::new_v4();

        upsert_decision(
            &store,
            &embed,
            None,
            &[],
            &[],
            None,
            500,
            UpsertDecisionInput {
                local_id: "D001",
                text: "adopt the shared caching layer for latency",
                project_name: "proj",
                project_uuid: project,
                originated_conversation: Uuid::new_v4(),
                tier: Some(0.8),
                status: DecisionStatus::Active,
                dependencies: Vec::new(),
                rationale: None,
            },
        )
        .await?;

        let set = compile_project_documents(&store, project).await?;
        assert_eq!(set.documents.len(), 1);
        assert!(set.index.body.contains("decision-D001"));
        Ok(())
    }

    #[test]
    fn topic_extraction_drops_stopwords_and_short_words() {
        let topics = extract_topics("please adopt the shared caching layer because latency matters");
        assert!(!topics.contains(&"please".to_string()));
        assert!(topics.contains(&"caching".to_string()));
    }
}
