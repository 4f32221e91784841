use async_trait::async_trait;

/// The embedding provider, treated as an abstract collaborator (spec §1).
/// Implementations must produce 1024-dim vectors.
#[async_trait]
pub trait EmbedClient: Send + Sync {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

pub const EMBEDDING_DIM: usize = 1024;

/// Deterministic pseudo-embedding for tests: hashes each word into a bucket
/// of the output vector. Two texts sharing words end up with nonzero cosine
/// similarity, which is all the registries/conflict-detector tests need.
pub struct DeterministicEmbedClient;

#[async_trait]
impl EmbedClient for DeterministicEmbedClient {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| embed_one(text)).collect())
    }
}

fn embed_one(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for word in text.split_whitespace() {
        let bucket = fnv1a(word.to_lowercase().as_bytes()) as usize % EMBEDDING_DIM;
        vector[bucket] += 1.0;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

/// Embed `text`, falling back to a zero vector on provider failure so the
/// caller can still store the record (spec §7: "embedding failures inside
/// registry upsert fall back to a zero-vector"). The record is corrected on
/// the next successful write.
pub async fn embed_one_or_zero(client: &dyn EmbedClient, text: &str) -> Vec<f32> {
    match client.embed(&[text.to_string()]).await {
        Ok(mut vectors) => vectors.pop().unwrap_or_else(|| vec![0.0; EMBEDDING_DIM]),
        Err(err) => {
            tracing::warn!(error = %err, "embedding provider failed, storing zero vector");
            vec![0.0; EMBEDDING_DIM]
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
