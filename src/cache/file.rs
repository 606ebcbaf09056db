use super::{CacheBackend, CacheError, Envelope};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::warn;
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

const NONCE_LEN: usize = 12;

/// Claims cache persisted to a single AES-256-GCM encrypted file.
///
/// Single-instance only; the whole map is rewritten on every mutation, which
/// is fine for the small working set of validated claims. Entry expiry is
/// enforced on read via the stored envelope.
#[derive(Clone)]
pub struct EncryptedFileCache {
    path: PathBuf,
    cipher: Aes256Gcm,
    entries: Arc<RwLock<HashMap<String, Envelope>>>,
}

impl EncryptedFileCache {
    /// Initialize the cache, loading and decrypting any existing file.
    ///
    /// `key_base64` must decode to exactly 32 bytes.
    pub async fn new(path: &str, key_base64: &str) -> Result<Self, String> {
        let key = BASE64
            .decode(key_base64)
            .map_err(|e| format!("Invalid cache encryption key: {}", e))?;
        if key.len() != 32 {
            return Err(format!(
                "Cache encryption key must be 32 bytes, got {}",
                key.len()
            ));
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| format!("Failed to initialize cipher: {}", e))?;

        let path = PathBuf::from(path);
        let entries = match Self::load(&path, &cipher).await {
            Ok(entries) => entries,
            Err(err) => {
                // A corrupt or unreadable cache file only costs re-validation
                warn!("Discarding unreadable claims cache file: {}", err);
                HashMap::new()
            }
        };

        Ok(Self {
            path,
            cipher,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    async fn load(
        path: &PathBuf,
        cipher: &Aes256Gcm,
    ) -> Result<HashMap<String, Envelope>, String> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let blob = tokio::fs::read(path)
            .await
            .map_err(|e| format!("read failed: {}", e))?;
        if blob.len() < NONCE_LEN {
            return Err("file too short".to_string());
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| format!("decryption failed: {}", e))?;
        serde_json::from_slice(&plaintext).map_err(|e| format!("parse failed: {}", e))
    }

    /// Encrypt and persist the current map. Callers hold the write lock.
    async fn persist(&self, entries: &HashMap<String, Envelope>) -> Result<(), CacheError> {
        let plaintext = serde_json::to_vec(entries)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| CacheError::Storage(format!("encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        // Write-then-rename so a crash never leaves a truncated file
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &blob)
            .await
            .map_err(|e| CacheError::Storage(format!("write failed: {}", e)))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| CacheError::Storage(format!("rename failed: {}", e)))
    }
}

#[async_trait]
impl CacheBackend for EncryptedFileCache {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), CacheError> {
        let envelope = Envelope::new(value, ttl_secs)?;
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| !e.is_expired());
        entries.insert(key.to_string(), envelope);
        self.persist(&entries).await
    }

    async fn get<T: DeserializeOwned + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(envelope) if !envelope.is_expired() => {
                    return envelope.clone().unwrap_value().map(Some);
                }
                Some(_) => {} // expired, fall through to remove
                None => return Ok(None),
            }
        }
        let mut entries = self.entries.write().await;
        entries.remove(key);
        self.persist(&entries).await?;
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.clear();
        self.persist(&entries).await
    }

    async fn health_check(&self) -> Result<(), String> {
        let entries = self.entries.read().await;
        self.persist(&entries)
            .await
            .map_err(|e| format!("Claims cache file not writable: {}", e))
    }
}
