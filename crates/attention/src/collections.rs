use anyhow::Result;
use memoria_store::{Filter, Store, VectorHit, VectorSearchOptions};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Decision,
    Thread,
    Priming,
    Pattern,
    Conversation,
    Message,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Decision => "decision",
            Category::Thread => "thread",
            Category::Priming => "priming",
            Category::Pattern => "pattern",
            Category::Conversation => "conversation",
            Category::Message => "message",
        }
    }
}

/// One of the six collections the recall heart searches in parallel (spec
/// §4.13 step 2). `status_filter` is the collection's active/non-resolved
/// pre-filter predicate, if it has one; `has_project_field` gates whether a
/// project scope is applied.
pub struct CollectionSpec {
    pub collection: &'static str,
    pub category: Category,
    pub status_filter: Option<fn(Filter) -> Filter>,
    pub has_project_field: bool,
}

pub const SEARCHABLE_COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        collection: "decisions",
        category: Category::Decision,
        status_filter: Some(|f| f.eq("status", "active")),
        has_project_field: true,
    },
    CollectionSpec {
        collection: "threads",
        category: Category::Thread,
        status_filter: Some(|f| f.ne("status", "resolved")),
        has_project_field: true,
    },
    CollectionSpec {
        collection: "priming_blocks",
        category: Category::Priming,
        status_filter: Some(|f| f.eq("status", "active")),
        has_project_field: true,
    },
    CollectionSpec {
        collection: "patterns",
        category: Category::Pattern,
        status_filter: None,
        has_project_field: false,
    },
    CollectionSpec {
        collection: "conversations",
        category: Category::Conversation,
        status_filter: None,
        has_project_field: true,
    },
    CollectionSpec {
        collection: "messages",
        category: Category::Message,
        status_filter: None,
        has_project_field: true,
    },
];

pub struct CollectionHit {
    pub category: Category,
    pub hit: VectorHit,
}

/// Run one pre-filtered vector search against `spec`'s collection.
pub async fn search_collection(
    store: &dyn Store,
    spec: &CollectionSpec,
    embedding: &[f32],
    project_uuid: Option<Uuid>,
    k: usize,
    num_candidates: usize,
) -> Result<Vec<CollectionHit>> {
    let mut filter = Filter::new();
    if let Some(status_filter) = spec.status_filter {
        filter = status_filter(filter);
    }
    if spec.has_project_field {
        if let Some(project_uuid) = project_uuid {
            filter = filter.eq("project_uuid", Value::from(project_uuid.to_string()));
        }
    }

    let options = VectorSearchOptions {
        k,
        filter: Some(filter),
        min_similarity: None,
        num_candidates,
    };

    let hits = store.vector_search(spec.collection, embedding, options).await?;
    Ok(hits
        .into_iter()
        .map(|hit| CollectionHit {
            category: spec.category,
            hit,
        })
        .collect())
}
