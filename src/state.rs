use crate::cache::{create_cache, ClaimsCache};
use crate::config::Settings;
use crate::errors::ServiceError;
use crate::oauth::employee::EmployeeResolver;
use crate::oauth::gate::OperationGate;
use crate::oauth::metadata::ProtectedResourceMetadata;
use crate::oauth::scopes::ScopeRegistry;
use crate::oauth::validator::TokenValidator;
use crate::odoo::OdooClient;
use std::sync::Arc;

/// Explicitly owned component instances, constructed once at startup and
/// passed by reference everywhere. No module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: Arc<ClaimsCache>,
    pub odoo: Arc<OdooClient>,
    pub gate: Arc<OperationGate>,
    pub metadata: Arc<ProtectedResourceMetadata>,
}

impl AppState {
    pub async fn new(settings: Settings) -> Result<Self, ServiceError> {
        let cache = create_cache(&settings)
            .await
            .map_err(|e| ServiceError::Configuration(format!("Failed to create cache: {}", e)))?;
        Self::with_existing_cache(settings, cache)
    }

    pub fn with_existing_cache(
        settings: Settings,
        cache: ClaimsCache,
    ) -> Result<Self, ServiceError> {
        let cache = Arc::new(cache);
        let odoo = Arc::new(OdooClient::new(&settings.odoo)?);

        let validator = TokenValidator::new(&settings.oauth, cache.clone())?;
        let resolver = EmployeeResolver::new(odoo.clone());
        let gate = Arc::new(OperationGate::new(
            validator,
            ScopeRegistry::builtin(),
            resolver,
            cache.clone(),
        ));
        let metadata = Arc::new(ProtectedResourceMetadata::from_config(&settings.oauth));

        Ok(Self {
            settings: Arc::new(settings),
            cache,
            odoo,
            gate,
            metadata,
        })
    }
}
