use crate::cache::{CacheBackend, ClaimsCache};
use crate::config::OAuthConfig;
use crate::errors::ServiceError;
use crate::oauth::claims::{claims_cache_key, token_fingerprint, ValidatedClaims};
use crate::oauth::scopes::ScopePolicy;
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// How long a fetched JWKS document is trusted before re-fetching.
const JWKS_TTL: Duration = Duration::from_secs(3600);

/// Accepted signature algorithms. HS256 covers JWKS `oct` entries used by
/// secret-keyed gateway deployments and the test fixture.
const ALLOWED_ALGS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::HS256,
];

/// Claims as they appear on the wire, before policy checks.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    iss: String,
    // String or array; audience matching is handled by Validation
    #[serde(rename = "aud")]
    _aud: serde_json::Value,
    exp: i64,
    #[serde(default)]
    scope: Option<String>,
}

struct CachedJwks {
    fetched_at: Instant,
    keys: HashMap<String, DecodingKey>,
}

/// Validates inbound bearer tokens against the authorization server's JWKS
/// and caches the resulting claims by token fingerprint.
///
/// A cache hit involves no cryptographic work and no network call. The JWKS
/// document itself is cached in-process with its own long TTL.
pub struct TokenValidator {
    issuer: String,
    audience: String,
    jwks_uri: String,
    max_ttl_secs: u64,
    policy: ScopePolicy,
    cache: Arc<ClaimsCache>,
    http: reqwest::Client,
    jwks: RwLock<Option<CachedJwks>>,
}

impl TokenValidator {
    pub fn new(config: &OAuthConfig, cache: Arc<ClaimsCache>) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| {
                ServiceError::Configuration(format!("Failed to build JWKS HTTP client: {}", e))
            })?;

        Ok(Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            jwks_uri: config.jwks_uri.clone(),
            max_ttl_secs: config.claims_ttl_secs,
            policy: ScopePolicy::new(config.full_access_domain.clone()),
            cache,
            http,
            jwks: RwLock::new(None),
        })
    }

    pub fn max_ttl_secs(&self) -> u64 {
        self.max_ttl_secs
    }

    /// Validate a bearer token, returning its fingerprint and claims.
    pub async fn validate(&self, token: &str) -> Result<(String, ValidatedClaims), ServiceError> {
        let fingerprint = token_fingerprint(token);
        let key = claims_cache_key(&fingerprint);

        match self.cache.get::<ValidatedClaims>(&key).await {
            Ok(Some(claims)) if !claims.is_expired() => {
                debug!("Token cache hit for {}...", &fingerprint[..8]);
                return Ok((fingerprint, claims));
            }
            Ok(_) => {}
            // A broken cache backend degrades to full validation
            Err(err) => warn!("Claims cache read failed: {}", err),
        }

        let header = decode_header(token)
            .map_err(|e| ServiceError::Authentication(format!("Invalid token: {}", e)))?;
        if !ALLOWED_ALGS.contains(&header.alg) {
            return Err(ServiceError::Authentication(format!(
                "Unsupported token algorithm {:?}",
                header.alg
            )));
        }

        let decoding_key = self.signing_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data =
            decode::<RawClaims>(token, &decoding_key, &validation).map_err(|e| map_jwt_error(&e, &self.issuer, &self.audience))?;
        let raw = data.claims;

        let email = raw
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ServiceError::Authentication("Token carries no email identity".to_string()))?;

        // Product policy: an unverified email is not an identity we accept,
        // and it must leave no trace in the cache
        if !raw.email_verified {
            warn!("Rejected token with unverified email: {}", email);
            return Err(ServiceError::Authentication(format!(
                "Unverified identity: {}",
                email
            )));
        }

        let now = Utc::now().timestamp();
        let scopes = self.policy.derive(&email, raw.scope.as_deref());
        let claims = ValidatedClaims {
            subject: raw.sub,
            email,
            email_verified: true,
            issuer: raw.iss,
            audience: self.audience.clone(),
            scopes,
            expires_at: raw.exp,
            resolved_employee_id: None,
            cached_at: now,
        };

        let ttl = (raw.exp - now).min(self.max_ttl_secs as i64).max(1) as u64;
        if let Err(err) = self.cache.set(&key, &claims, ttl).await {
            warn!("Failed to cache validated claims: {}", err);
        }
        debug!("Cached claims for {}... (ttl {}s)", &fingerprint[..8], ttl);

        Ok((fingerprint, claims))
    }

    /// Look up the decoding key for a `kid`, fetching the JWKS when the
    /// cached document is missing, stale, or does not know the key.
    async fn signing_key(&self, kid: Option<&str>) -> Result<DecodingKey, ServiceError> {
        if let Some(key) = self.lookup_cached(kid).await {
            return Ok(key);
        }

        self.refresh_jwks().await?;

        self.lookup_cached(kid).await.ok_or_else(|| {
            ServiceError::Authentication(format!(
                "Unknown signing key '{}'",
                kid.unwrap_or("<none>")
            ))
        })
    }

    async fn lookup_cached(&self, kid: Option<&str>) -> Option<DecodingKey> {
        let guard = self.jwks.read().await;
        let cached = guard.as_ref()?;
        if cached.fetched_at.elapsed() >= JWKS_TTL {
            return None;
        }
        match kid {
            Some(kid) => cached.keys.get(kid).cloned(),
            // Tokens without a kid are acceptable only against a single-key set
            None if cached.keys.len() == 1 => cached.keys.values().next().cloned(),
            None => None,
        }
    }

    async fn refresh_jwks(&self) -> Result<(), ServiceError> {
        let mut guard = self.jwks.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < Duration::from_secs(5) {
                return Ok(());
            }
        }

        debug!("Fetching JWKS from {}", self.jwks_uri);
        let response = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| connectivity(format!("Failed to fetch JWKS: {}", e), e.is_timeout()))?;
        if !response.status().is_success() {
            return Err(connectivity(
                format!("JWKS endpoint returned status {}", response.status().as_u16()),
                false,
            ));
        }
        let document: JwkSet = response
            .json()
            .await
            .map_err(|e| ServiceError::Server(format!("Invalid JWKS document: {}", e)))?;

        let mut keys = HashMap::new();
        for jwk in &document.keys {
            let kid = jwk.common.key_id.clone().unwrap_or_default();
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => debug!("Skipping unusable JWKS entry: {}", err),
            }
        }

        if keys.is_empty() {
            return Err(ServiceError::Server(
                "JWKS document contains no usable keys".to_string(),
            ));
        }

        *guard = Some(CachedJwks {
            fetched_at: Instant::now(),
            keys,
        });
        Ok(())
    }
}

fn connectivity(message: String, timeout: bool) -> ServiceError {
    ServiceError::Connectivity { message, timeout }
}

fn map_jwt_error(
    err: &jsonwebtoken::errors::Error,
    issuer: &str,
    audience: &str,
) -> ServiceError {
    use jsonwebtoken::errors::ErrorKind;
    let message = match err.kind() {
        ErrorKind::ExpiredSignature => "Token has expired".to_string(),
        ErrorKind::InvalidIssuer => format!("Invalid issuer, expected {}", issuer),
        ErrorKind::InvalidAudience => format!("Invalid audience, expected {}", audience),
        ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
        ErrorKind::ImmatureSignature => "Token not yet valid".to_string(),
        _ => format!("Invalid token: {}", err),
    };
    ServiceError::Authentication(message)
}
