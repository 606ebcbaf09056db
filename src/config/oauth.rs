use serde::Deserialize;

/// OAuth 2.1 resource server configuration.
///
/// Defaults target Google as the authorization server; the audience is the
/// OAuth client id because Google ID tokens carry `aud = client_id`.
#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfig {
    /// Expected token issuer
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Expected token audience (the OAuth client id for Google)
    #[serde(default)]
    pub audience: String,

    /// JWKS endpoint of the authorization server
    #[serde(default = "default_jwks_uri")]
    pub jwks_uri: String,

    /// Identifier of this protected resource (RFC 9728 `resource`)
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Upper bound on validated-claims cache entries, in seconds
    #[serde(default = "default_claims_ttl")]
    pub claims_ttl_secs: u64,

    /// Email domain whose verified members receive the write scope grants.
    /// A stand-in for fine-grained scopes from the identity provider; unset
    /// means nobody gets the extended grants.
    #[serde(default)]
    pub full_access_domain: Option<String>,
}

fn default_issuer() -> String {
    "https://accounts.google.com".to_string()
}

fn default_jwks_uri() -> String {
    "https://www.googleapis.com/oauth2/v3/certs".to_string()
}

fn default_resource() -> String {
    "https://odoo-mcp.keboola.com".to_string()
}

fn default_claims_ttl() -> u64 {
    300
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            audience: String::new(),
            jwks_uri: default_jwks_uri(),
            resource: default_resource(),
            claims_ttl_secs: default_claims_ttl(),
            full_access_domain: None,
        }
    }
}
