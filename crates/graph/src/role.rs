use anyhow::Result;
use memoria_store::{Filter, Store};
use uuid::Uuid;

use crate::schema::{LensConfiguration, ProjectRole, ProjectRoleRow};
use crate::storeio::{from_document, to_document};

pub const ROLES_COLLECTION: &str = "project_roles";
pub const LENSES_COLLECTION: &str = "lenses";

fn role_uuid(project_uuid: Uuid) -> Uuid {
    memoria_identity::v5(&format!("role:{project_uuid}"), project_uuid)
}

/// One row per project: `role` and `weight` (spec §3 "Project role"). A
/// project has at most one role; re-assigning overwrites it.
pub async fn set_role(store: &dyn Store, project_uuid: Uuid, role: ProjectRole, weight: f32) -> Result<ProjectRoleRow> {
    let row = ProjectRoleRow {
        project_uuid,
        role,
        weight,
    };
    let document = to_document(role_uuid(project_uuid), &row, None)?;
    store.put(ROLES_COLLECTION, document).await?;
    Ok(row)
}

pub async fn get_role(store: &dyn Store, project_uuid: Uuid) -> Result<Option<ProjectRoleRow>> {
    match store.get(ROLES_COLLECTION, role_uuid(project_uuid)).await? {
        Some(doc) => Ok(Some(from_document(&doc)?)),
        None => Ok(None),
    }
}

pub async fn list_roles(store: &dyn Store) -> Result<Vec<ProjectRoleRow>> {
    let docs = store.find(ROLES_COLLECTION, &Filter::new()).await?;
    docs.iter().map(from_document).collect()
}

fn lens_config_uuid(name: &str) -> Uuid {
    memoria_identity::v5_base(&format!("lens:{name}"))
}

pub async fn save_lens_configuration(store: &dyn Store, config: LensConfiguration) -> Result<()> {
    let document = to_document(lens_config_uuid(&config.name), &config, None)?;
    store.put(LENSES_COLLECTION, document).await?;
    Ok(())
}

pub async fn get_lens_configuration(store: &dyn Store, name: &str) -> Result<Option<LensConfiguration>> {
    match store.get(LENSES_COLLECTION, lens_config_uuid(name)).await? {
        Some(doc) => Ok(Some(from_document(&doc)?)),
        None => Ok(None),
    }
}

/// The default lens set when none is named explicitly: every project that
/// has an assigned role, each as its own lens at full weight.
pub async fn default_lenses(store: &dyn Store) -> Result<Vec<crate::schema::LensSpec>> {
    let roles = list_roles(store).await?;
    Ok(roles
        .into_iter()
        .map(|row| crate::schema::LensSpec {
            project_uuid: row.project_uuid,
            role: row.role,
            weight: Some(row.weight),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_store::InMemoryStore;

    #[tokio::test]
    async fn role_assignment_is_queryable_and_overwritable() -> Result<()> {
        let store = InMemoryStore::new();
        let project = Uuid::new_v4();
        set_role(&store, project, ProjectRole::Navigator, 1.0).await?;
        set_role(&store, project, ProjectRole::Critic, 0.5).await?;

        let row = get_role(&store, project).await?.expect("role set");
        assert_eq!(row.role, ProjectRole::Critic);
        assert_eq!(row.weight, 0.5);
        Ok(())
    }

    #[tokio::test]
    async fn lens_configuration_round_trips() -> Result<()> {
        let store = InMemoryStore::new();
        let project = Uuid::new_v4();
        let config = LensConfiguration {
            name: "standard".to_string(),
            lenses: vec![crate::schema::LensSpec {
                project_uuid: project,
                role: ProjectRole::Builder,
                weight: Some(1.0),
            }],
            default_budget: 4000,
        };
        save_lens_configuration(&store, config).await?;

        let loaded = get_lens_configuration(&store, "standard").await?.expect("config saved");
        assert_eq!(loaded.lenses.len(), 1);
        assert_eq!(loaded.lenses[0].project_uuid, project);
        Ok(())
    }
}
