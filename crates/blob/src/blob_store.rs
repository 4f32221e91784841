use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use futures::future::join_all;
use sha2::{Digest, Sha256};

use crate::backend::BlobBackend;

/// Content-addressed blob store, backend-agnostic (spec §4.3).
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
    enabled: bool,
}

fn hash_of(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn ref_of(hash: &str) -> String {
    format!("sha256:{hash}")
}

fn hash_from_ref(reference: &str) -> Option<&str> {
    reference.strip_prefix("sha256:")
}

impl BlobStore {
    pub fn new(backend: Arc<dyn BlobBackend>, enabled: bool) -> Self {
        Self { backend, enabled }
    }

    /// Store `content`, returning its ref, or `None` when the store is
    /// disabled or `content` is empty. Idempotent: identical content always
    /// yields the identical ref.
    pub async fn store(&self, content: &str) -> Result<Option<String>> {
        if !self.enabled || content.is_empty() {
            return Ok(None);
        }
        let hash = hash_of(content);
        self.backend.write(&hash, content.as_bytes()).await?;
        Ok(Some(ref_of(&hash)))
    }

    pub async fn resolve(&self, reference: &str) -> Result<String> {
        let Some(hash) = hash_from_ref(reference) else {
            bail!("not found: malformed blob ref {reference}");
        };
        let bytes = self.backend.read(hash).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Resolve many refs in parallel; missing refs are simply omitted from
    /// the result rather than failing the whole batch.
    pub async fn resolve_batch(&self, refs: &[String]) -> HashMap<String, String> {
        let futures = refs.iter().map(|reference| {
            let reference = reference.clone();
            async move {
                let resolved = self.resolve(&reference).await.ok();
                (reference, resolved)
            }
        });
        let results = join_all(futures).await;
        results
            .into_iter()
            .filter_map(|(reference, content)| content.map(|c| (reference, c)))
            .collect()
    }

    pub async fn store_json<T: serde::Serialize>(&self, value: &T) -> Result<Option<String>> {
        let text = serde_json::to_string(value)?;
        self.store(&text).await
    }

    pub async fn resolve_json<T: serde::de::DeserializeOwned>(&self, reference: &str) -> Result<T> {
        let text = self.resolve(reference).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The key backward-compat primitive: read a blob when `ref_value` is
    /// present, otherwise fall back to the inline `inline_value`.
    pub async fn get_text_with_fallback(
        &self,
        inline_value: Option<&str>,
        ref_value: Option<&str>,
    ) -> Result<String> {
        if let Some(reference) = ref_value {
            return self.resolve(reference).await;
        }
        Ok(inline_value.unwrap_or_default().to_string())
    }

    /// Whether `content` should be blob-backed rather than stored inline,
    /// per the caller's chosen threshold.
    pub fn should_blob_back(content: &str, threshold_chars: usize) -> bool {
        content.chars().count() > threshold_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_fs::LocalFsBackend;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalFsBackend::new(dir.path()));
        (dir, BlobStore::new(backend, true))
    }

    #[tokio::test]
    async fn store_is_idempotent() -> Result<()> {
        let (_dir, store) = store();
        let a = store.store("hello world").await?.unwrap();
        let b = store.store("hello world").await?.unwrap();
        assert_eq!(a, b);
        Ok(())
    }

    #[tokio::test]
    async fn resolve_round_trips_store() -> Result<()> {
        let (_dir, store) = store();
        let reference = store.store("round trip me").await?.unwrap();
        assert_eq!(store.resolve(&reference).await?, "round trip me");
        Ok(())
    }

    #[tokio::test]
    async fn disabled_store_returns_none() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = Arc::new(LocalFsBackend::new(dir.path()));
        let store = BlobStore::new(backend, false);
        assert_eq!(store.store("anything").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn resolve_batch_omits_missing_keys() -> Result<()> {
        let (_dir, store) = store();
        let present = store.store("present").await?.unwrap();
        let missing = "sha256:0000000000000000000000000000000000000000000000000000000000000000".to_string();
        let resolved = store.resolve_batch(&[present.clone(), missing]).await;
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key(&present));
        Ok(())
    }

    #[tokio::test]
    async fn get_text_with_fallback_prefers_blob() -> Result<()> {
        let (_dir, store) = store();
        let reference = store.store("blob text").await?.unwrap();
        let text = store
            .get_text_with_fallback(Some("inline text"), Some(&reference))
            .await?;
        assert_eq!(text, "blob text");

        let text = store.get_text_with_fallback(Some("inline text"), None).await?;
        assert_eq!(text, "inline text");
        Ok(())
    }
}
