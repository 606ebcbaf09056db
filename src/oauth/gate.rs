use crate::cache::{CacheBackend, ClaimsCache};
use crate::errors::ServiceError;
use crate::oauth::claims::{claims_cache_key, ValidatedClaims};
use crate::oauth::employee::EmployeeResolver;
use crate::oauth::scopes::ScopeRegistry;
use crate::oauth::validator::TokenValidator;
use log::{debug, warn};
use std::sync::Arc;

/// Everything an operation implementation is allowed to know about its
/// caller. The employee id in here is the only one tools may act on.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub employee_id: i64,
    pub scopes: Vec<String>,
    pub email: String,
    pub subject: String,
    pub fingerprint: String,
}

/// Facade combining validation, authorization and identity resolution, in
/// that fixed order: an invalid token never reaches the scope table, and an
/// unauthorized call never triggers a backend lookup.
pub struct OperationGate {
    validator: TokenValidator,
    scopes: ScopeRegistry,
    resolver: EmployeeResolver,
    cache: Arc<ClaimsCache>,
}

impl OperationGate {
    pub fn new(
        validator: TokenValidator,
        scopes: ScopeRegistry,
        resolver: EmployeeResolver,
        cache: Arc<ClaimsCache>,
    ) -> Self {
        Self {
            validator,
            scopes,
            resolver,
            cache,
        }
    }

    pub fn scope_registry(&self) -> &ScopeRegistry {
        &self.scopes
    }

    /// Validate the token only; used by methods that need an authenticated
    /// caller but no specific operation grant (e.g. listing tools).
    pub async fn validate_only(
        &self,
        token: &str,
    ) -> Result<(String, ValidatedClaims), ServiceError> {
        self.validator.validate(token).await
    }

    /// Authenticate, authorize and resolve the caller for one operation.
    pub async fn enter(
        &self,
        token: &str,
        operation: &str,
    ) -> Result<ExecutionContext, ServiceError> {
        let (fingerprint, claims) = self.validator.validate(token).await?;

        self.scopes.authorize(operation, &claims)?;

        let employee_id = match claims.resolved_employee_id {
            Some(id) => id,
            None => {
                let id = self.resolver.resolve(&claims.email).await?;
                self.bind_employee(&fingerprint, &claims, id).await;
                id
            }
        };

        Ok(ExecutionContext {
            employee_id,
            scopes: claims.scopes,
            email: claims.email,
            subject: claims.subject,
            fingerprint,
        })
    }

    /// Drop the cached claims for a caller; used when an upstream
    /// permission fault indicates they no longer reflect current access.
    pub async fn invalidate(&self, fingerprint: &str) {
        let key = claims_cache_key(fingerprint);
        if let Err(err) = self.cache.delete(&key).await {
            warn!("Failed to invalidate claims for {}...: {}", &fingerprint[..8], err);
        } else {
            debug!("Invalidated cached claims for {}...", &fingerprint[..8]);
        }
    }

    /// Store the resolved employee binding for the entry's remaining
    /// lifetime, so later calls in the validity window skip the resolver.
    async fn bind_employee(&self, fingerprint: &str, claims: &ValidatedClaims, employee_id: i64) {
        let remaining = claims.remaining_ttl(self.validator.max_ttl_secs());
        if remaining <= 0 {
            return;
        }
        let mut bound = claims.clone();
        bound.resolved_employee_id = Some(employee_id);
        let key = claims_cache_key(fingerprint);
        if let Err(err) = self.cache.set(&key, &bound, remaining as u64).await {
            warn!("Failed to cache employee binding: {}", err);
        }
    }
}
