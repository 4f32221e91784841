use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;

use crate::document::{ProjectDocumentSet, SyncDocument};

/// A destination a compiled project document set can be pushed to. Grounded
/// on the teacher's `vault.rs`: `export_obsidian_vault` was one hardcoded
/// writer, generalized here into a trait so new destinations (a remote
/// vault, an object-store mirror) can be added without touching the
/// compiler in `document.rs`.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    fn name(&self) -> &str;
    async fn push(&self, set: &ProjectDocumentSet) -> Result<()>;
}

/// Mirrors a project's compiled documents into an Obsidian-style vault on
/// local disk: one note per document under `notes/`, a collection index per
/// collection under `collections/`, and a topic backlink note per topic
/// under `topics/` — the same three-tier layout as the teacher's
/// `tiers/`/`daily/`/`topics/` split, generalized off tier/day onto
/// collection/topic since this system has no MemoryTier equivalent.
pub struct ObsidianVaultTarget {
    root: PathBuf,
}

impl ObsidianVaultTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn project_root(&self, project_uuid: uuid::Uuid) -> PathBuf {
        self.root.join(project_uuid.to_string())
    }
}

#[async_trait]
impl SyncTarget for ObsidianVaultTarget {
    fn name(&self) -> &str {
        "obsidian-vault"
    }

    async fn push(&self, set: &ProjectDocumentSet) -> Result<()> {
        let project_root = self.project_root(set.project_uuid);
        let notes_dir = project_root.join("notes");
        let topics_dir = project_root.join("topics");
        fs::create_dir_all(&notes_dir)?;
        fs::create_dir_all(&topics_dir)?;

        for doc in &set.documents {
            write_note(&notes_dir, doc)?;
        }
        write_note(&project_root, &set.index)?;
        write_topic_notes(&topics_dir, &set.documents)?;

        Ok(())
    }
}

fn write_note(dir: &Path, doc: &SyncDocument) -> Result<()> {
    fs::write(dir.join(format!("{}.md", doc.title)), &doc.body)?;
    Ok(())
}

fn write_topic_notes(topics_dir: &Path, documents: &[SyncDocument]) -> Result<()> {
    use std::collections::{BTreeMap, BTreeSet};

    let mut backlinks: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for doc in documents {
        for topic in &doc.topics {
            backlinks.entry(topic.as_str()).or_default().insert(doc.title.as_str());
        }
    }

    for (topic, links) in backlinks {
        let mut body = format!("# Topic: {topic}\n\n## Backlinks\n");
        for link in links {
            body.push_str(&format!("- [[{link}]]\n"));
        }
        fs::write(topics_dir.join(format!("topic-{topic}.md")), body)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn push_writes_notes_and_topic_backlinks() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let target = ObsidianVaultTarget::new(dir.path());
        let project = Uuid::new_v4();

        let set = ProjectDocumentSet {
            project_uuid: project,
            documents: vec![SyncDocument {
                id: Uuid::new_v4(),
                collection: "decisions",
                title: "decision-D001".to_string(),
                body: "# decision-D001\n\nbody\n".to_string(),
                topics: vec!["caching".to_string()],
            }],
            index: SyncDocument {
                id: project,
                collection: "index",
                title: "index".to_string(),
                body: "# index\n".to_string(),
                topics: Vec::new(),
            },
        };

        target.push(&set).await?;

        let project_root = dir.path().join(project.to_string());
        assert!(project_root.join("notes/decision-D001.md").exists());
        assert!(project_root.join("index.md").exists());
        assert!(project_root.join("topics/topic-caching.md").exists());
        Ok(())
    }
}
