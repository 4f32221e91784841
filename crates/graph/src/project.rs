use anyhow::Result;
use memoria_store::{Filter, Store};
use uuid::Uuid;

use crate::schema::Project;
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "projects";

/// Immutable project identity: `project_uuid = v5("project:" + name)`.
pub fn project_uuid(name: &str) -> Uuid {
    memoria_identity::v5_base(&format!("project:{name}"))
}

/// Ensure a project row exists for `name`, returning its canonical uuid.
/// Names are display-only (Open Question resolution in SPEC_FULL.md §D.1);
/// `project_uuid` is the identity callers should key on thereafter.
pub async fn ensure_project(store: &dyn Store, name: &str) -> Result<Uuid> {
    let uuid = project_uuid(name);
    if store.get(COLLECTION, uuid).await?.is_none() {
        let project = Project {
            project_uuid: uuid,
            name: name.to_string(),
        };
        let document = to_document(uuid, &project, None)?;
        store.put(COLLECTION, document).await?;
    }
    Ok(uuid)
}

pub async fn get_project(store: &dyn Store, uuid: Uuid) -> Result<Option<Project>> {
    match store.get(COLLECTION, uuid).await? {
        Some(doc) => Ok(Some(from_document(&doc)?)),
        None => Ok(None),
    }
}

pub async fn list_projects(store: &dyn Store) -> Result<Vec<Project>> {
    let docs = store.find(COLLECTION, &Filter::new()).await?;
    docs.iter().map(from_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn project_uuid_is_name_keyed_and_stable() -> Result<()> {
        let store = InMemoryStore::new();
        let a = ensure_project(&store, "forgeos").await?;
        let b = ensure_project(&store, "forgeos").await?;
        assert_eq!(a, b);
        assert_eq!(a, project_uuid("forgeos"));
        Ok(())
    }
}
