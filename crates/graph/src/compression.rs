use anyhow::Result;
use chrono::Utc;
use memoria_store::{Filter, Store};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::event_types::{emit, EventSink, EventType};
use crate::schema::CompressionTag;
use crate::storeio::{from_document, to_document};

pub const COLLECTION: &str = "compression_tags";

fn checksum_of(archive_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(archive_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn union(existing: &mut Vec<String>, incoming: &[Uuid]) {
    for id in incoming {
        let s = id.to_string();
        if !existing.contains(&s) {
            existing.push(s);
        }
    }
}

fn union_strings(existing: &mut Vec<String>, incoming: &[String]) {
    for s in incoming {
        if !existing.contains(s) {
            existing.push(s.clone());
        }
    }
}

pub struct RegisterCompressionInput<'a> {
    pub project_uuid: Uuid,
    pub source_conversation: Uuid,
    pub target_conversations: Vec<Uuid>,
    pub decisions_captured: Vec<String>,
    pub threads_captured: Vec<String>,
    pub artifacts_captured: Vec<String>,
    pub checksum: &'a str,
}

/// Keyed by `compression_tag` string. Repeat registration of the same tag
/// merges list fields via add-to-set and only overwrites `checksum` when the
/// new value is non-empty and differs (spec §4.9).
pub async fn register_compression(
    store: &dyn Store,
    sink: Option<&dyn EventSink>,
    compression_tag: &str,
    input: RegisterCompressionInput<'_>,
) -> Result<CompressionTag> {
    let existing = store.get(COLLECTION, tag_uuid(compression_tag)).await?;

    let mut tag = if let Some(doc) = existing {
        from_document::<CompressionTag>(&doc)?
    } else {
        CompressionTag {
            compression_tag: compression_tag.to_string(),
            project_uuid: input.project_uuid,
            source_conversation: input.source_conversation,
            target_conversations: Vec::new(),
            decisions_captured: Vec::new(),
            threads_captured: Vec::new(),
            artifacts_captured: Vec::new(),
            checksum: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    };

    let mut target_strings: Vec<String> = tag
        .target_conversations
        .iter()
        .map(Uuid::to_string)
        .collect();
    union(&mut target_strings, &input.target_conversations);
    tag.target_conversations = target_strings
        .into_iter()
        .filter_map(|s| Uuid::parse_str(&s).ok())
        .collect();

    union_strings(&mut tag.decisions_captured, &input.decisions_captured);
    union_strings(&mut tag.threads_captured, &input.threads_captured);
    union_strings(&mut tag.artifacts_captured, &input.artifacts_captured);

    if !input.checksum.is_empty() && input.checksum != tag.checksum {
        tag.checksum = input.checksum.to_string();
    }
    tag.updated_at = Utc::now();

    let document = to_document(tag_uuid(compression_tag), &tag, None)?;
    store.put(COLLECTION, document).await?;
    emit(
        sink,
        EventType::CompressionRegistered,
        json!({ "compression_tag": compression_tag }),
    )
    .await;

    Ok(tag)
}

pub struct ChecksumVerification {
    pub matches: bool,
    pub stored: String,
    pub computed: String,
}

pub async fn verify_checksum(store: &dyn Store, compression_tag: &str, archive_text: &str) -> Result<ChecksumVerification> {
    let computed = checksum_of(archive_text);
    let stored = match store.get(COLLECTION, tag_uuid(compression_tag)).await? {
        Some(doc) => from_document::<CompressionTag>(&doc)?.checksum,
        None => String::new(),
    };
    let matches = !stored.is_empty() && stored == computed;
    Ok(ChecksumVerification { matches, stored, computed })
}

pub async fn get_compression(store: &dyn Store, compression_tag: &str) -> Result<Option<CompressionTag>> {
    match store.get(COLLECTION, tag_uuid(compression_tag)).await? {
        Some(doc) => Ok(Some(from_document(&doc)?)),
        None => Ok(None),
    }
}

pub async fn list_by_project(store: &dyn Store, project_uuid: Uuid) -> Result<Vec<CompressionTag>> {
    let filter = Filter::new().eq("project_uuid", Value::from(project_uuid.to_string()));
    let docs = store.find(COLLECTION, &filter).await?;
    docs.iter().map(from_document).collect()
}

fn tag_uuid(compression_tag: &str) -> Uuid {
    memoria_identity::v5_base(&format!("compression:{compression_tag}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input(project: Uuid, source: Uuid) -> RegisterCompressionInput<'static> {
        RegisterCompressionInput {
            project_uuid: project,
            source_conversation: source,
            target_conversations: Vec::new(),
            decisions_captured: vec!["D001".to_string()],
            threads_captured: Vec::new(),
            artifacts_captured: Vec::new(),
            checksum: "abc123",
        }
    }

    #[tokio::test]
    async fn repeat_registration_unions_captured_sets() -> Result<()> {
        let store = memoria_store::InMemoryStore::new();
        let project = Uuid::new_v4();
        let source = Uuid::new_v4();

        register_compression(&store, None, "tag-1", base_input(project, source)).await?;

        let mut second = base_input(project, source);
        second.decisions_captured = vec!["D001".to_string(), "D002".to_string()];
        second.checksum = "";
        let tag = register_compression(&store, None, "tag-1", second).await?;

        assert_eq!(tag.decisions_captured, vec!["D001".to_string(), "D002".to_string()]);
        assert_eq!(tag.checksum, "abc123");
        Ok(())
    }

    #[tokio::test]
    async fn verify_checksum_detects_mismatch() -> Result<()> {
        let store = memoria_store::InMemoryStore::new();
        let project = Uuid::new_v4();
        let source = Uuid::new_v4();
        register_compression(&store, None, "tag-1", base_input(project, source)).await?;

        let verification = verify_checksum(&store, "tag-1", "some archive text").await?;
        assert!(!verification.matches);
        assert_eq!(verification.stored, "abc123");
        Ok(())
    }
}
