use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Claims extracted from a successfully validated bearer token.
///
/// This is what the cache stores - never the token itself. Mutation is
/// replacement-only: re-validation or an employee-binding write-back stores
/// a whole new value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedClaims {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub issuer: String,
    pub audience: String,
    /// Granted scopes, derived once at validation time
    pub scopes: Vec<String>,
    /// Token expiry (unix seconds); always in the future at insertion time
    pub expires_at: i64,
    /// Employee bound to this identity, filled in on first resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_employee_id: Option<i64>,
    /// When this entry was created (unix seconds)
    pub cached_at: i64,
}

impl ValidatedClaims {
    pub fn has_any_scope(&self, required: &[String]) -> bool {
        required.iter().any(|s| self.scopes.contains(s))
    }

    /// Seconds this entry may still be served from cache:
    /// `min(expires_at, cached_at + max_ttl) - now`.
    pub fn remaining_ttl(&self, max_ttl_secs: u64) -> i64 {
        let bound = self.expires_at.min(self.cached_at + max_ttl_secs as i64);
        bound - Utc::now().timestamp()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().timestamp()
    }
}

/// Stable, non-reversible identifier for a token, safe to use as a cache
/// key and (prefix-truncated) in logs.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..32].to_string()
}

/// Cache key for a fingerprint.
pub fn claims_cache_key(fingerprint: &str) -> String {
    format!("claims:{}", fingerprint)
}
