use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use memoria_store::{Filter, Store};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::event_types::{emit, EventSink, EventType};
use crate::schema::LineageEdge;
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "lineage_edges";

fn union(existing: &mut Vec<String>, incoming: &[String]) {
    for s in incoming {
        if !existing.contains(s) {
            existing.push(s.clone());
        }
    }
}

pub struct AddEdgeInput {
    pub source: Uuid,
    pub target: Uuid,
    pub compression_tag: Option<String>,
    pub decisions_carried: Vec<String>,
    pub decisions_dropped: Vec<String>,
    pub threads_carried: Vec<String>,
    pub threads_resolved: Vec<String>,
    pub source_project: Option<Uuid>,
    pub target_project: Option<Uuid>,
}

/// `edge_uuid = composite_pair(source, target)` — order-independent, so
/// repeat edges in either direction collapse onto one row (spec §4.10).
pub async fn add_edge(store: &dyn Store, sink: Option<&dyn EventSink>, input: AddEdgeInput) -> Result<LineageEdge> {
    let edge_uuid = memoria_identity::composite_pair(input.source, input.target);
    let existing = store.get(COLLECTION, edge_uuid).await?;

    let mut edge = if let Some(doc) = existing {
        from_document::<LineageEdge>(&doc)?
    } else {
        LineageEdge {
            edge_uuid,
            source_conversation: input.source,
            target_conversation: input.target,
            compression_tag: None,
            decisions_carried: Vec::new(),
            decisions_dropped: Vec::new(),
            threads_carried: Vec::new(),
            threads_resolved: Vec::new(),
            source_project: None,
            target_project: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    };

    union(&mut edge.decisions_carried, &input.decisions_carried);
    union(&mut edge.decisions_dropped, &input.decisions_dropped);
    union(&mut edge.threads_carried, &input.threads_carried);
    union(&mut edge.threads_resolved, &input.threads_resolved);

    if let Some(tag) = input.compression_tag.filter(|t| !t.is_empty()) {
        edge.compression_tag = Some(tag);
    }
    if let Some(p) = input.source_project {
        edge.source_project = Some(p);
    }
    if let Some(p) = input.target_project {
        edge.target_project = Some(p);
    }
    edge.updated_at = Utc::now();

    let document = to_document(edge.edge_uuid, &edge, None)?;
    store.put(COLLECTION, document).await?;
    emit(sink, EventType::LineageEdge, json!({ "edge_uuid": edge.edge_uuid })).await;

    Ok(edge)
}

/// Follow `target=current` edges backward, newest-hop-first, up to `depth`.
pub async fn get_ancestors(store: &dyn Store, id: Uuid, depth: usize) -> Result<Vec<LineageEdge>> {
    let mut chain = Vec::new();
    let mut current = id;
    let mut visited = HashSet::new();
    for _ in 0..depth {
        if !visited.insert(current) {
            break;
        }
        let filter = Filter::new().eq("target_conversation", Value::from(current.to_string()));
        let docs = store.find(COLLECTION, &filter).await?;
        let Some(doc) = docs.into_iter().next() else {
            break;
        };
        let edge: LineageEdge = from_document(&doc)?;
        current = edge.source_conversation;
        chain.push(edge);
    }
    Ok(chain)
}

/// Dual of [`get_ancestors`]: follows `source=current` edges forward.
pub async fn get_descendants(store: &dyn Store, id: Uuid, depth: usize) -> Result<Vec<LineageEdge>> {
    let mut chain = Vec::new();
    let mut current = id;
    let mut visited = HashSet::new();
    for _ in 0..depth {
        if !visited.insert(current) {
            break;
        }
        let filter = Filter::new().eq("source_conversation", Value::from(current.to_string()));
        let docs = store.find(COLLECTION, &filter).await?;
        let Some(doc) = docs.into_iter().next() else {
            break;
        };
        let edge: LineageEdge = from_document(&doc)?;
        current = edge.target_conversation;
        chain.push(edge);
    }
    Ok(chain)
}

#[derive(Debug, Clone)]
pub struct ConversationTrace {
    pub root: Uuid,
    pub leaves: Vec<Uuid>,
    pub ancestors: Vec<LineageEdge>,
    pub descendants: Vec<LineageEdge>,
    pub conversations: Vec<Uuid>,
    pub projects: Vec<Uuid>,
    pub cross_project: bool,
}

/// Combine ancestors (root-first) and descendants for `id`, with the
/// project-set and cross-project flag spec §4.10 asks for.
pub async fn trace_conversation(store: &dyn Store, id: Uuid, depth: usize) -> Result<ConversationTrace> {
    let mut ancestors = get_ancestors(store, id, depth).await?;
    let descendants = get_descendants(store, id, depth).await?;
    ancestors.reverse();

    let root = ancestors.first().map(|e| e.source_conversation).unwrap_or(id);
    let leaves = if let Some(last) = descendants.last() {
        vec![last.target_conversation]
    } else {
        vec![id]
    };

    let mut conversations = HashSet::new();
    let mut projects = HashSet::new();
    conversations.insert(id);
    for edge in ancestors.iter().chain(descendants.iter()) {
        conversations.insert(edge.source_conversation);
        conversations.insert(edge.target_conversation);
        if let Some(p) = edge.source_project {
            projects.insert(p);
        }
        if let Some(p) = edge.target_project {
            projects.insert(p);
        }
    }

    Ok(ConversationTrace {
        root,
        leaves,
        ancestors,
        descendants,
        conversations: conversations.into_iter().collect(),
        cross_project: projects.len() > 1,
        projects: projects.into_iter().collect(),
    })
}

/// Edges touching `project` on either side, or every edge when `project` is
/// `None`.
pub async fn get_full_graph(store: &dyn Store, project_uuid: Option<Uuid>) -> Result<Vec<LineageEdge>> {
    let docs = store.find(COLLECTION, &Filter::new()).await?;
    let edges: Vec<LineageEdge> = docs.iter().map(from_document).collect::<Result<_>>()?;
    let Some(project_uuid) = project_uuid else {
        return Ok(edges);
    };
    Ok(edges
        .into_iter()
        .filter(|e| e.source_project == Some(project_uuid) || e.target_project == Some(project_uuid))
        .collect())
}
