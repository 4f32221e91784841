use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::backend::{shard, BlobBackend};

/// Sharded local filesystem backend: `base/{hash[0..2]}/{hash[2..4]}/{hash}`.
/// Writes go through a tempfile-then-rename so a crash mid-write never
/// leaves a partial blob visible under its final name, the same crash-safety
/// shape as the event log's atomic overwrite.
pub struct LocalFsBackend {
    base: PathBuf,
}

impl LocalFsBackend {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        let (h0, h1) = shard(hash);
        self.base.join(h0).join(h1).join(hash)
    }
}

#[async_trait]
impl BlobBackend for LocalFsBackend {
    async fn write(&self, hash: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(hash);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = path.with_extension("tmp");
        let write_result: Result<()> = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn exists(&self, hash: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(hash)).await?)
    }

    async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.path_for(hash);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(_) => bail!("blob not found: {hash}"),
        }
    }
}

pub fn sharded_path(base: &Path, hash: &str) -> PathBuf {
    let (h0, h1) = shard(hash);
    base.join(h0).join(h1).join(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = LocalFsBackend::new(dir.path());
        backend.write("abcd1234", b"hello").await?;
        assert!(backend.exists("abcd1234").await?);
        assert_eq!(backend.read("abcd1234").await?, b"hello");
        Ok(())
    }

    #[tokio::test]
    async fn repeat_write_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = LocalFsBackend::new(dir.path());
        backend.write("deadbeef", b"one").await?;
        backend.write("deadbeef", b"one").await?;
        assert_eq!(backend.read("deadbeef").await?, b"one");
        Ok(())
    }
}
