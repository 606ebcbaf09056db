use serde::Deserialize;

/// Specifies which claims cache backend to use
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStore {
    #[default]
    InMemory,
    Redis,
    EncryptedFile,
}

/// Configuration for the claims caching subsystem
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Upper bound on any cache entry lifetime, in seconds (default: 5 minutes).
    /// Individual entries may expire sooner, bounded by the token expiry.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Cache store type: "in-memory" (default), "redis", or "encrypted-file"
    #[serde(default)]
    pub store: CacheStore,

    /// In-memory cache specific configuration
    #[serde(default)]
    pub in_memory: InMemoryCacheConfig,

    /// Redis cache specific configuration
    #[serde(default)]
    pub redis: RedisCacheConfig,

    /// Encrypted file cache specific configuration
    #[serde(default)]
    pub file: FileCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            store: CacheStore::default(),
            in_memory: InMemoryCacheConfig::default(),
            redis: RedisCacheConfig::default(),
            file: FileCacheConfig::default(),
        }
    }
}

pub fn default_cache_ttl() -> u64 {
    300
}

/// In-memory cache configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum capacity in MiB (default: 128)
    #[serde(default = "default_in_memory_capacity")]
    pub capacity_mib: usize,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            capacity_mib: default_in_memory_capacity(),
        }
    }
}

fn default_in_memory_capacity() -> usize {
    128
}

/// Redis cache configuration options
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisCacheConfig {
    /// Redis connection string
    #[serde(default)]
    pub url: String,
}

/// Encrypted file cache configuration options
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FileCacheConfig {
    /// Path of the encrypted cache file
    #[serde(default)]
    pub path: String,

    /// Base64-encoded 32-byte AES-256-GCM key
    #[serde(default)]
    pub key: String,
}
