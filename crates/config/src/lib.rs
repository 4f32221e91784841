use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub store_uri: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_uri: "memory://local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub embed_api_key: String,
    pub embed_model: String,
    /// Max batch count for embedding calls.
    pub embed_batch_size: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            embed_api_key: String::new(),
            embed_model: "text-embedding-local-1024".to_string(),
            embed_batch_size: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub blob_backend: String,
    pub blob_local_path: String,
    pub blob_object_bucket: String,
    pub blob_enabled: bool,
    /// Content longer than this many characters is blob-backed; shorter
    /// content stays inline on the owning record.
    pub inline_threshold_chars: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            blob_backend: "local".to_string(),
            blob_local_path: "./data/blobs".to_string(),
            blob_object_bucket: String::new(),
            blob_enabled: true,
            inline_threshold_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    pub stale_max_hops: u32,
    pub stale_max_days: i64,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            stale_max_hops: 3,
            stale_max_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    pub decision_conflict_similarity_threshold: f32,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            decision_conflict_similarity_threshold: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntanglementConfig {
    pub strong_threshold: f32,
    pub weak_threshold: f32,
}

impl Default for EntanglementConfig {
    fn default() -> Self {
        Self {
            strong_threshold: 0.65,
            weak_threshold: 0.50,
        }
    }
}

/// Per-signal attention weights. Must sum to 1.0 (checked in tests, not
/// enforced at load time — a caller that tunes these is responsible for
/// keeping them normalized).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    pub similarity_weight: f32,
    pub tier_weight: f32,
    pub freshness_weight: f32,
    pub conflict_weight: f32,
    pub category_weight: f32,
    pub freshness_half_life_days: f64,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            similarity_weight: 0.45,
            tier_weight: 0.20,
            freshness_weight: 0.15,
            conflict_weight: 0.10,
            category_weight: 0.10,
            freshness_half_life_days: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    pub default_budget: usize,
    pub max_lenses: usize,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            default_budget: 4000,
            max_lenses: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    pub event_ttl_days: i64,
    pub scratchpad_default_ttl_hours: i64,
    pub archive_default_retention_days: i64,
    pub pattern_merge_threshold: f32,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            event_ttl_days: 90,
            scratchpad_default_ttl_hours: 24,
            archive_default_retention_days: 180,
            pattern_merge_threshold: 0.88,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub courtesy_delay_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { courtesy_delay_secs: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MemoriaConfig {
    pub store: StoreConfig,
    pub embed: EmbedConfig,
    pub blob: BlobConfig,
    pub staleness: StalenessConfig,
    pub conflict: ConflictConfig,
    pub entanglement: EntanglementConfig,
    pub attention: AttentionConfig,
    pub gravity: GravityConfig,
    pub secondary: SecondaryConfig,
    pub sync: SyncConfig,
}

impl MemoriaConfig {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then layer environment-variable overrides on top.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("STORE_URI") {
            if !v.is_empty() {
                self.store.store_uri = v;
            }
        }
        if let Ok(v) = env::var("EMBED_API_KEY") {
            if !v.is_empty() {
                self.embed.embed_api_key = v;
            }
        }
        if let Ok(v) = env::var("EMBED_MODEL") {
            if !v.is_empty() {
                self.embed.embed_model = v;
            }
        }
        if let Ok(v) = env::var("EMBED_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                self.embed.embed_batch_size = n;
            }
        }
        if let Ok(v) = env::var("BLOB_BACKEND") {
            if !v.is_empty() {
                self.blob.blob_backend = v;
            }
        }
        if let Ok(v) = env::var("BLOB_LOCAL_PATH") {
            if !v.is_empty() {
                self.blob.blob_local_path = v;
            }
        }
        if let Ok(v) = env::var("BLOB_OBJECT_BUCKET") {
            if !v.is_empty() {
                self.blob.blob_object_bucket = v;
            }
        }
        if let Ok(v) = env::var("BLOB_ENABLED") {
            if let Ok(b) = v.parse() {
                self.blob.blob_enabled = b;
            }
        }
        if let Ok(v) = env::var("STALE_MAX_HOPS") {
            if let Ok(n) = v.parse() {
                self.staleness.stale_max_hops = n;
            }
        }
        if let Ok(v) = env::var("STALE_MAX_DAYS") {
            if let Ok(n) = v.parse() {
                self.staleness.stale_max_days = n;
            }
        }
        if let Ok(v) = env::var("DECISION_CONFLICT_SIMILARITY_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.conflict.decision_conflict_similarity_threshold = n;
            }
        }
        if let Ok(v) = env::var("ENTANGLEMENT_STRONG_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.entanglement.strong_threshold = n;
            }
        }
        if let Ok(v) = env::var("ENTANGLEMENT_WEAK_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.entanglement.weak_threshold = n;
            }
        }
        if let Ok(v) = env::var("ATTENTION_FRESHNESS_HALF_LIFE") {
            if let Ok(n) = v.parse() {
                self.attention.freshness_half_life_days = n;
            }
        }
        if let Ok(v) = env::var("GRAVITY_MAX_LENSES") {
            if let Ok(n) = v.parse() {
                self.gravity.max_lenses = n;
            }
        }
        if let Ok(v) = env::var("PATTERN_MERGE_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.secondary.pattern_merge_threshold = n;
            }
        }
        if let Ok(v) = env::var("SYNC_COURTESY_DELAY_SECS") {
            if let Ok(n) = v.parse() {
                self.sync.courtesy_delay_secs = n;
            }
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("memoria.toml");
        let config = MemoriaConfig::default();
        config.save_to(&path)?;
        let loaded = MemoriaConfig::load_from(&path)?;
        assert_eq!(loaded.attention.similarity_weight, 0.45);
        Ok(())
    }

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let config = MemoriaConfig::load_from("/nonexistent/path/memoria.toml")?;
        assert_eq!(config.staleness.stale_max_hops, 3);
        Ok(())
    }

    #[test]
    fn attention_weights_sum_to_one() {
        let a = AttentionConfig::default();
        let sum = a.similarity_weight
            + a.tier_weight
            + a.freshness_weight
            + a.conflict_weight
            + a.category_weight;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn env_override_wins_over_file() -> Result<()> {
        // SAFETY: test-local, no other test in this process reads this var.
        unsafe { env::set_var("STALE_MAX_HOPS", "7") };
        let config = MemoriaConfig::load_from("/nonexistent/path/memoria.toml")?;
        assert_eq!(config.staleness.stale_max_hops, 7);
        unsafe { env::remove_var("STALE_MAX_HOPS") };
        Ok(())
    }
}
