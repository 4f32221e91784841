//! Object-storage backend (`BLOB_BACKEND=gcs`), keyed
//! `blobs/{hash[0..2]}/{hash[2..4]}/{hash}`. Built on the `object_store`
//! crate's generic `ObjectStore` trait so the same code path works against
//! GCS, S3, or any other backend that crate supports; which concrete store
//! to construct is the caller's concern (see [`ObjectStoreBackend::new`]).

use anyhow::{Context, Result};
use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

use crate::backend::{shard, BlobBackend};

pub struct ObjectStoreBackend {
    store: Box<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn key_for(hash: &str) -> ObjectPath {
        let (h0, h1) = shard(hash);
        ObjectPath::from(format!("blobs/{h0}/{h1}/{hash}"))
    }
}

#[async_trait]
impl BlobBackend for ObjectStoreBackend {
    async fn write(&self, hash: &str, content: &[u8]) -> Result<()> {
        let key = Self::key_for(hash);
        if self.exists(hash).await? {
            return Ok(());
        }
        self.store
            .put(&key, content.to_vec().into())
            .await
            .with_context(|| format!("uploading blob {hash}"))?;
        Ok(())
    }

    async fn exists(&self, hash: &str) -> Result<bool> {
        match self.store.head(&Self::key_for(hash)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let result = self
            .store
            .get(&Self::key_for(hash))
            .await
            .with_context(|| format!("fetching blob {hash}"))?;
        Ok(result.bytes().await?.to_vec())
    }
}
