//! Odoo XML-RPC client with lazy, single-flight session authentication.

use crate::config::OdooConfig;
use crate::errors::ServiceError;
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use http::header::CONTENT_TYPE;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

mod faults;
pub mod xmlrpc;

use faults::{map_fault, map_status, map_transport_error};

/// An established upstream session. Immutable once created; replaced, never
/// mutated.
#[derive(Debug)]
pub struct OdooSession {
    pub uid: i64,
    pub established_at: DateTime<Utc>,
}

/// Async client for the Odoo `common` and `object` XML-RPC endpoints.
///
/// At most one live session exists per client instance. The session handle
/// is read lock-free on the fast path; establishment is guarded by a mutex
/// whose critical section is exactly "perform login, store handle", so
/// concurrent first callers collapse into a single authenticate round-trip.
pub struct OdooClient {
    http: reqwest::Client,
    common_url: String,
    object_url: String,
    db: String,
    username: String,
    credential: String,
    session: ArcSwapOption<OdooSession>,
    auth_lock: Mutex<()>,
}

impl OdooClient {
    pub fn new(config: &OdooConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.query_timeout))
            .connect_timeout(Duration::from_secs(2))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| {
                ServiceError::Configuration(format!("Failed to build Odoo HTTP client: {}", e))
            })?;

        let base = config.url.trim_end_matches('/');
        Ok(Self {
            http,
            common_url: format!("{}/xmlrpc/2/common", base),
            object_url: format!("{}/xmlrpc/2/object", base),
            db: config.db.clone(),
            username: config.username.clone(),
            credential: config.api_key.clone(),
            session: ArcSwapOption::empty(),
            auth_lock: Mutex::new(()),
        })
    }

    /// One XML-RPC round-trip. The HTTP call runs in its own task so that a
    /// caller disconnecting mid-request abandons the await while the issued
    /// RPC still completes upstream.
    async fn call(
        &self,
        url: &str,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, ServiceError> {
        let body = xmlrpc::marshal_call(method, &params);
        let http = self.http.clone();
        let url = url.to_string();

        let handle = tokio::spawn(async move {
            let response = http
                .post(&url)
                .header(CONTENT_TYPE, "text/xml")
                .body(body)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(map_status(status));
            }
            response.text().await.map_err(map_transport_error)
        });

        let xml = handle
            .await
            .map_err(|e| ServiceError::Server(format!("Upstream call task failed: {}", e)))??;

        match xmlrpc::parse_response(&xml) {
            Ok(value) => Ok(value),
            Err(xmlrpc::XmlRpcError::Fault { code, message }) => {
                debug!("Odoo fault {} on {}: {}", code, method, message);
                Err(map_fault(code, &message))
            }
            Err(xmlrpc::XmlRpcError::Malformed(message)) => Err(ServiceError::Server(format!(
                "Invalid XML-RPC response: {}",
                message
            ))),
        }
    }

    /// Return the established session, authenticating on first use.
    ///
    /// Fast path: lock-free read of the cached handle. Slow path: acquire
    /// the auth lock, re-check (another caller may have finished first),
    /// then perform the single login round-trip.
    pub async fn session(&self) -> Result<Arc<OdooSession>, ServiceError> {
        if let Some(session) = self.session.load_full() {
            return Ok(session);
        }

        let _guard = self.auth_lock.lock().await;
        if let Some(session) = self.session.load_full() {
            return Ok(session);
        }

        let result = self
            .call(
                &self.common_url,
                "authenticate",
                vec![
                    json!(self.db),
                    json!(self.username),
                    json!(self.credential),
                    json!({}),
                ],
            )
            .await?;

        // Odoo answers the integer uid, or boolean false on bad credentials
        let uid = result.as_i64().filter(|uid| *uid > 0).ok_or_else(|| {
            ServiceError::Authentication(
                "Upstream authentication failed - check service credentials".to_string(),
            )
        })?;

        let session = Arc::new(OdooSession {
            uid,
            established_at: Utc::now(),
        });
        self.session.store(Some(session.clone()));
        info!("Authenticated against Odoo as uid {}", uid);
        Ok(session)
    }

    /// Drop the session handle; the next caller re-authenticates.
    fn invalidate_session(&self) {
        warn!("Invalidating Odoo session after authentication-class fault");
        self.session.store(None);
    }

    /// Execute a method on a model through `object.execute_kw`.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Value,
    ) -> Result<Value, ServiceError> {
        let session = self.session().await?;
        let params = vec![
            json!(self.db),
            json!(session.uid),
            json!(self.credential),
            json!(model),
            json!(method),
            Value::Array(args),
            kwargs,
        ];

        match self.call(&self.object_url, "execute_kw", params).await {
            Err(err @ ServiceError::Authentication(_)) => {
                self.invalidate_session();
                Err(err)
            }
            other => other,
        }
    }

    pub async fn version(&self) -> Result<Value, ServiceError> {
        self.call(&self.common_url, "version", vec![]).await
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        limit: i64,
    ) -> Result<Vec<Value>, ServiceError> {
        let kwargs = json!({ "fields": fields, "limit": limit });
        let result = self
            .execute_kw(model, "search_read", vec![domain], kwargs)
            .await?;
        expect_records(result)
    }

    pub async fn search_read_ordered(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
        order: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        let kwargs = json!({ "fields": fields, "order": order });
        let result = self
            .execute_kw(model, "search_read", vec![domain], kwargs)
            .await?;
        expect_records(result)
    }

    pub async fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<Value>, ServiceError> {
        let kwargs = json!({ "fields": fields });
        let result = self
            .execute_kw(model, "read", vec![json!(ids)], kwargs)
            .await?;
        expect_records(result)
    }

    pub async fn create(&self, model: &str, values: Value) -> Result<i64, ServiceError> {
        let result = self
            .execute_kw(model, "create", vec![values], json!({}))
            .await?;
        result.as_i64().ok_or_else(|| {
            ServiceError::Server("Odoo create did not return a record id".to_string())
        })
    }

    pub async fn write(&self, model: &str, ids: &[i64], values: Value) -> Result<bool, ServiceError> {
        let result = self
            .execute_kw(model, "write", vec![json!(ids), values], json!({}))
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn unlink(&self, model: &str, ids: &[i64]) -> Result<bool, ServiceError> {
        let result = self
            .execute_kw(model, "unlink", vec![json!(ids)], json!({}))
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn search_count(&self, model: &str, domain: Value) -> Result<i64, ServiceError> {
        let result = self
            .execute_kw(model, "search_count", vec![domain], json!({}))
            .await?;
        result.as_i64().ok_or_else(|| {
            ServiceError::Server("Odoo search_count did not return an integer".to_string())
        })
    }
}

fn expect_records(value: Value) -> Result<Vec<Value>, ServiceError> {
    match value {
        Value::Array(records) => Ok(records),
        other => Err(ServiceError::Server(format!(
            "Expected a record list from Odoo, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> OdooClient {
        OdooClient::new(&OdooConfig {
            url: server.uri(),
            db: "test-db".to_string(),
            username: "service".to_string(),
            api_key: "service-api-key".to_string(),
            query_timeout: 5,
        })
        .unwrap()
    }

    async fn mount_authenticate(server: &MockServer, uid: i64, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .and(body_string_contains("authenticate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!(uid))),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_single_flight_authentication() {
        let server = MockServer::start().await;
        // Exactly one login round-trip regardless of caller count
        mount_authenticate(&server, 7, 1).await;

        let client = Arc::new(test_client(&server));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let client = client.clone();
            handles.push(tokio::spawn(async move { client.session().await }));
        }

        let mut uids = Vec::new();
        for handle in handles {
            let session = handle.await.unwrap().unwrap();
            uids.push(session.uid);
        }
        assert!(uids.iter().all(|uid| *uid == 7));

        server.verify().await;
    }

    #[tokio::test]
    async fn test_session_reused_across_calls() {
        let server = MockServer::start().await;
        mount_authenticate(&server, 7, 1).await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(xmlrpc::response_body(&json!([{"id": 1}]))),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client
            .search_read("hr.employee", json!([]), &["id"], 10)
            .await
            .unwrap();
        client
            .search_read("hr.employee", json!([]), &["id"], 10)
            .await
            .unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn test_failed_login_returns_authentication_error() {
        let server = MockServer::start().await;
        // Odoo answers boolean false on bad credentials
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!(false))),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.session().await.unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_auth_fault_invalidates_session() {
        let server = MockServer::start().await;
        // Two logins: initial one, then re-auth after the session is dropped
        mount_authenticate(&server, 7, 2).await;

        // First object call reports an expired session, second succeeds
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(xmlrpc::fault_body(3, "Session expired")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(xmlrpc::response_body(&json!([{"id": 1}]))),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .search_read("hr.employee", json!([]), &["id"], 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));

        // Next call re-authenticates and succeeds
        let records = client
            .search_read("hr.employee", json!([]), &["id"], 10)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);

        server.verify().await;
    }

    #[tokio::test]
    async fn test_transient_login_failures_are_retryable_connectivity() {
        let server = MockServer::start().await;
        // Backend login fails twice (gateway down), then succeeds
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!(7))),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        for _ in 0..2 {
            let err = client.session().await.unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Connectivity { timeout: false, .. }
            ));
            assert!(err.is_retryable());
        }

        let session = client.session().await.unwrap();
        assert_eq!(session.uid, 7);
    }

    #[tokio::test]
    async fn test_fault_mapping_surfaces_typed_errors() {
        let server = MockServer::start().await;
        mount_authenticate(&server, 7, 1).await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xmlrpc::fault_body(
                1,
                "UserError: You cannot have 2 time off requests that overlap on the same day.",
            )))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .create("hr.leave", json!({"employee_id": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
        assert!(err.to_string().contains("overlap"));
    }

    #[tokio::test]
    async fn test_search_count_and_version() {
        let server = MockServer::start().await;
        mount_authenticate(&server, 7, 1).await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("search_count"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!(3))),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .and(body_string_contains("version"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(
                &json!({"server_version": "18.0"}),
            )))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let count = client
            .search_count("hr.leave", json!([["employee_id", "=", 42]]))
            .await
            .unwrap();
        assert_eq!(count, 3);

        let version = client.version().await.unwrap();
        assert_eq!(version["server_version"], "18.0");
    }

    #[tokio::test]
    async fn test_execute_kw_carries_session_credentials() {
        let server = MockServer::start().await;
        mount_authenticate(&server, 42, 1).await;
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("<int>42</int>"))
            .and(body_string_contains("service-api-key"))
            .and(body_string_contains("hr.employee"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!([]))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        client
            .search_read("hr.employee", json!([]), &["id"], 10)
            .await
            .unwrap();

        server.verify().await;
    }
}
