use crate::config::OAuthConfig;
use serde::Serialize;

/// RFC 9728 Protected Resource Metadata, served at
/// `/.well-known/oauth-protected-resource`.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
    pub resource_signing_alg_values_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            resource: config.resource.clone(),
            authorization_servers: vec![config.issuer.clone()],
            // Only scopes the authorization server understands are
            // advertised; the Odoo-specific grants are derived server-side
            scopes_supported: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            bearer_methods_supported: vec!["header".to_string()],
            resource_signing_alg_values_supported: vec!["RS256".to_string(), "ES256".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_advertises_issuer() {
        let metadata = ProtectedResourceMetadata::from_config(&OAuthConfig {
            issuer: "https://accounts.google.com".to_string(),
            audience: "client-id".to_string(),
            jwks_uri: "https://www.googleapis.com/oauth2/v3/certs".to_string(),
            resource: "https://odoo-mcp.example.com".to_string(),
            claims_ttl_secs: 300,
            full_access_domain: None,
        });

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["resource"], "https://odoo-mcp.example.com");
        assert_eq!(
            json["authorization_servers"][0],
            "https://accounts.google.com"
        );
        assert_eq!(json["bearer_methods_supported"][0], "header");
    }
}
