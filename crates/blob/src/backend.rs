use async_trait::async_trait;

#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Write `content` under `hash`. Returns `Ok(())` whether or not the
    /// content already existed — writes are idempotent.
    async fn write(&self, hash: &str, content: &[u8]) -> anyhow::Result<()>;

    async fn exists(&self, hash: &str) -> anyhow::Result<bool>;

    async fn read(&self, hash: &str) -> anyhow::Result<Vec<u8>>;
}

pub(crate) fn shard(hash: &str) -> (String, String) {
    let h0 = hash.get(0..2).unwrap_or("00").to_string();
    let h1 = hash.get(2..4).unwrap_or("00").to_string();
    (h0, h1)
}
