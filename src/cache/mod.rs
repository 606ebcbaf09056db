use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod redis;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Stored values are wrapped in an envelope carrying their absolute expiry,
/// so backends without native per-entry TTL still honor it on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub value: serde_json::Value,
    pub expires_at: i64,
}

impl Envelope {
    pub(crate) fn new<T: Serialize>(value: &T, ttl_secs: u64) -> Result<Self, CacheError> {
        Ok(Self {
            value: serde_json::to_value(value)?,
            expires_at: chrono::Utc::now().timestamp() + ttl_secs as i64,
        })
    }

    pub(crate) fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at
    }

    pub(crate) fn unwrap_value<T: DeserializeOwned>(self) -> Result<T, CacheError> {
        serde_json::from_value(self.value).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

/// Contract every claims cache backend must fulfill.
///
/// Implementations are thread-safe (Send + Sync) and cloneable so the cache
/// can be shared across handlers. Values are stored serialized; raw bearer
/// tokens must never be used as keys or values.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store a value with the given time-to-live
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), CacheError>;

    /// Retrieve a value, honoring its expiry
    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError>;

    /// Remove a single entry
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry owned by this service
    async fn clear(&self) -> Result<(), CacheError>;

    /// Performs a health check on the cache backend.
    ///
    /// For Redis this pings the server; for the in-memory and file backends
    /// it checks the store is usable.
    async fn health_check(&self) -> Result<(), String>;
}

/// Claims cache with a uniform interface regardless of backend.
///
/// The concrete implementation is chosen at startup from configuration,
/// never by runtime type inspection:
/// - in-memory: single instance only, lost on restart
/// - redis: shared across instances, network-dependent, TTL enforced by the store
/// - encrypted-file: single instance, no network dependency, AES-256-GCM at rest
#[derive(Clone)]
pub enum ClaimsCache {
    InMemory(memory::InMemoryCache),
    Redis(redis::RedisCache),
    EncryptedFile(file::EncryptedFileCache),
}

#[async_trait::async_trait]
impl CacheBackend for ClaimsCache {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.set(key, value, ttl_secs).await,
            Self::Redis(cache) => cache.set(key, value, ttl_secs).await,
            Self::EncryptedFile(cache) => cache.set(key, value, ttl_secs).await,
        }
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        match self {
            Self::InMemory(cache) => cache.get(key).await,
            Self::Redis(cache) => cache.get(key).await,
            Self::EncryptedFile(cache) => cache.get(key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.delete(key).await,
            Self::Redis(cache) => cache.delete(key).await,
            Self::EncryptedFile(cache) => cache.delete(key).await,
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        match self {
            Self::InMemory(cache) => cache.clear().await,
            Self::Redis(cache) => cache.clear().await,
            Self::EncryptedFile(cache) => cache.clear().await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(cache) => cache.health_check().await,
            Self::Redis(cache) => cache.health_check().await,
            Self::EncryptedFile(cache) => cache.health_check().await,
        }
    }
}

/// Factory creating the configured cache backend at startup.
pub async fn create_cache(config: &crate::config::Settings) -> Result<ClaimsCache, CacheError> {
    match config.cache.store {
        crate::config::CacheStore::InMemory => {
            let cache = memory::InMemoryCache::new(
                config.cache.ttl_secs,
                config.cache.in_memory.capacity_mib,
            )
            .map_err(CacheError::Config)?;
            Ok(ClaimsCache::InMemory(cache))
        }
        crate::config::CacheStore::Redis => {
            if config.cache.redis.url.is_empty() {
                return Err(CacheError::Config(
                    "Redis URL is required for the redis cache store".to_string(),
                ));
            }
            let cache = redis::RedisCache::new(&config.cache.redis.url)
                .await
                .map_err(CacheError::Config)?;
            Ok(ClaimsCache::Redis(cache))
        }
        crate::config::CacheStore::EncryptedFile => {
            if config.cache.file.path.is_empty() || config.cache.file.key.is_empty() {
                return Err(CacheError::Config(
                    "File path and key are required for the encrypted-file cache store".to_string(),
                ));
            }
            let cache =
                file::EncryptedFileCache::new(&config.cache.file.path, &config.cache.file.key)
                    .await
                    .map_err(CacheError::Config)?;
            Ok(ClaimsCache::EncryptedFile(cache))
        }
    }
}
