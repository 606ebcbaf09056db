use serde::Deserialize;

/// Upstream Odoo ERP connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OdooConfig {
    /// Base URL of the Odoo instance
    #[serde(default = "default_url")]
    pub url: String,

    /// Database name
    #[serde(default)]
    pub db: String,

    /// Service identity used for the XML-RPC session
    #[serde(default = "default_username")]
    pub username: String,

    /// API key of the service identity
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout toward Odoo, in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,
}

fn default_url() -> String {
    "https://erp.internal.keboola.com".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_query_timeout() -> u64 {
    30
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            db: String::new(),
            username: default_username(),
            api_key: String::new(),
            query_timeout: default_query_timeout(),
        }
    }
}
