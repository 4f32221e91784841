use anyhow::Result;
use memoria_graph::role;
use memoria_graph::schema::LensSpec;
use memoria_store::Store;

pub const GRAVITY_MAX_LENSES: usize = 6;

pub enum LensSelection<'a> {
    Explicit(Vec<LensSpec>),
    Named(&'a str),
    Default,
}

/// Resolve the lens set for a gravity pass: an explicit list, a named
/// configuration fetched from store, or the default set of every project
/// with an assigned role (spec §4.14 step 1). Capped at
/// `GRAVITY_MAX_LENSES`.
pub async fn resolve_lenses(store: &dyn Store, selection: LensSelection<'_>) -> Result<Vec<LensSpec>> {
    let mut lenses = match selection {
        LensSelection::Explicit(lenses) => lenses,
        LensSelection::Named(name) => match role::get_lens_configuration(store, name).await? {
            Some(config) => config.lenses,
            None => role::default_lenses(store).await?,
        },
        LensSelection::Default => role::default_lenses(store).await?,
    };
    lenses.truncate(GRAVITY_MAX_LENSES);
    Ok(lenses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_graph::schema::ProjectRole;
    use memoria_store::InMemoryStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn default_selection_caps_at_max_lenses() -> Result<()> {
        let store = InMemoryStore::new();
        for _ in 0..9 {
            role::set_role(&store, Uuid::new_v4(), ProjectRole::Navigator, 1.0).await?;
        }
        let lenses = resolve_lenses(&store, LensSelection::Default).await?;
        assert_eq!(lenses.len(), GRAVITY_MAX_LENSES);
        Ok(())
    }

    #[tokio::test]
    async fn named_selection_falls_back_to_default_when_missing() -> Result<()> {
        let store = InMemoryStore::new();
        let project = Uuid::new_v4();
        role::set_role(&store, project, ProjectRole::Builder, 1.0).await?;

        let lenses = resolve_lenses(&store, LensSelection::Named("nonexistent")).await?;
        assert_eq!(lenses.len(), 1);
        assert_eq!(lenses[0].project_uuid, project);
        Ok(())
    }
}
