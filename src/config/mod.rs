pub(crate) use crate::config::cache::{CacheConfig, CacheStore};
pub(crate) use crate::config::oauth::OAuthConfig;
pub(crate) use crate::config::odoo::OdooConfig;
use config::{Config, ConfigError};
use serde::Deserialize;

pub mod cache;
pub mod oauth;
pub mod odoo;

/// Main configuration structure, loaded from `ODOO_MCP_*` environment
/// variables (nested fields use `__`, e.g. `ODOO_MCP_CACHE__STORE`).
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// The port the server will listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// OAuth resource server configuration
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Upstream Odoo ERP configuration
    #[serde(default)]
    pub odoo: OdooConfig,

    /// Claims cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Debug mode
    #[serde(default)]
    pub debug: Option<bool>,
}

fn default_port() -> u16 {
    8080
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port(),
            oauth: OAuthConfig::default(),
            odoo: OdooConfig::default(),
            cache: CacheConfig::default(),
            debug: None,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, String> {
        Config::builder()
            .add_source(
                config::Environment::with_prefix("ODOO_MCP")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(config::Case::Snake),
            )
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(
        jwks_mock: &wiremock::MockServer,
        odoo_mock: &wiremock::MockServer,
    ) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            oauth: OAuthConfig {
                issuer: "https://issuer.test".to_string(),
                audience: "test-client-id".to_string(),
                jwks_uri: format!("{}/jwks", jwks_mock.uri()),
                resource: "https://odoo-mcp.test".to_string(),
                claims_ttl_secs: 300,
                full_access_domain: Some("keboola.com".to_string()),
            },
            odoo: OdooConfig {
                url: odoo_mock.uri(),
                db: "test-db".to_string(),
                username: "service".to_string(),
                api_key: "service-api-key".to_string(),
                query_timeout: 5,
            },
            cache: CacheConfig {
                ttl_secs: 300,
                store: CacheStore::InMemory,
                ..Default::default()
            },
            debug: Some(true),
        }
    }
}
