use crate::cache::memory::InMemoryCache;
use crate::cache::ClaimsCache;
use crate::config::Settings;
use crate::create_app;
use crate::odoo::xmlrpc;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::LevelFilter;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// HS256 secret shared between minted test tokens and the mocked JWKS.
pub const TEST_JWKS_SECRET: &[u8] = b"odoo-mcp-test-secret-0123456789abcdef";

/// JWKS document matching [`mint_token`] signatures.
pub fn jwks_body() -> Value {
    json!({
        "keys": [{
            "kty": "oct",
            "kid": "test-key",
            "alg": "HS256",
            "k": URL_SAFE_NO_PAD.encode(TEST_JWKS_SECRET),
        }]
    })
}

/// Sign a token the mocked authorization server would have issued.
pub fn mint_token(claims: Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("test-key".to_string());
    jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(TEST_JWKS_SECRET))
        .expect("Failed to sign test token")
}

/// Test fixture wiring the full application against mocked external
/// collaborators: the authorization server's JWKS endpoint and the Odoo
/// XML-RPC endpoints.
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Shared application state (for cache inspection)
    pub state: AppState,
    /// Configuration settings
    pub settings: Settings,
    /// Mock authorization server (JWKS)
    pub jwks_mock: MockServer,
    /// Mock Odoo server (XML-RPC)
    pub odoo_mock: MockServer,
}

impl TestFixture {
    pub async fn new() -> Self {
        // Initialize test logger
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let jwks_mock = MockServer::start().await;
        let odoo_mock = MockServer::start().await;

        // Default collaborator behavior: a valid JWKS and a service login
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body()))
            .mount(&jwks_mock)
            .await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .and(body_string_contains("authenticate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!(7))),
            )
            .mount(&odoo_mock)
            .await;

        let settings = Settings::for_test_with_mocks(&jwks_mock, &odoo_mock);
        let cache = ClaimsCache::InMemory(InMemoryCache::new(300, 16).unwrap());
        let state = AppState::with_existing_cache(settings.clone(), cache)
            .expect("Failed to build test state");
        let app = create_app(state.clone());

        Self {
            app,
            state,
            settings,
            jwks_mock,
            odoo_mock,
        }
    }

    /// Token for a verified identity; scopes are derived by policy unless
    /// the claims carry an explicit `scope`.
    pub fn token_for(&self, email: &str) -> String {
        self.token_with(email, true, None)
    }

    pub fn token_with(&self, email: &str, email_verified: bool, scope: Option<&str>) -> String {
        let mut claims = json!({
            "sub": format!("sub-{email}"),
            "email": email,
            "email_verified": email_verified,
            "iss": self.settings.oauth.issuer,
            "aud": self.settings.oauth.audience,
            "exp": Utc::now().timestamp() + 600,
        });
        if let Some(scope) = scope {
            claims["scope"] = json!(scope);
        }
        mint_token(claims)
    }

    /// Mock one Odoo `execute_kw` response, matched by a body substring
    /// (model name, method name, or any distinctive argument).
    pub async fn mount_odoo_response(&self, body_contains: &str, result: &Value, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains(body_contains))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(result)),
            )
            .expect(expected)
            .mount(&self.odoo_mock)
            .await;
    }

    /// Mock an Odoo fault for any `execute_kw` call matching the substring.
    pub async fn mount_odoo_fault(&self, body_contains: &str, code: i64, message: &str) {
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains(body_contains))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::fault_body(code, message)),
            )
            .mount(&self.odoo_mock)
            .await;
    }

    /// POST a JSON-RPC request to /mcp with the given bearer token.
    pub async fn post_mcp(&self, token: Option<&str>, body: &Value) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = builder
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Call one tool through the full MCP surface.
    pub async fn call_tool(&self, token: &str, tool: &str, arguments: Value) -> TestResponse {
        self.post_mcp(
            Some(token),
            &json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": { "name": tool, "arguments": arguments },
            }),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        TestResponse { status, json }
    }
}

/// Response from a test request with assertion helpers.
pub struct TestResponse {
    pub status: StatusCode,
    pub json: Value,
}

impl TestResponse {
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }

    /// The JSON-RPC `result` member, which must be present.
    pub fn rpc_result(&self) -> &Value {
        self.json
            .get("result")
            .unwrap_or_else(|| panic!("No result in response: {}", self.json))
    }

    /// The JSON-RPC `error` member, which must be present.
    pub fn rpc_error(&self) -> &Value {
        self.json
            .get("error")
            .unwrap_or_else(|| panic!("No error in response: {}", self.json))
    }

    /// Parse the first text content block of a tool result.
    pub fn tool_output(&self) -> Value {
        let text = self.rpc_result()["content"][0]["text"]
            .as_str()
            .unwrap_or_else(|| panic!("No text content in response: {}", self.json));
        serde_json::from_str(text).expect("Tool output is not JSON")
    }
}
