use crate::errors::ServiceError;
use crate::odoo::OdooClient;
use log::{info, warn};
use serde_json::json;
use std::sync::Arc;

/// Maps an authenticated identity (email) to its Odoo employee record.
///
/// Strategy order:
/// 1. exact match on `hr.employee.work_email`
/// 2. `res.users` login -> linked employee
///
/// The first strategy yielding exactly one match wins. Zero matches across
/// both is a not-found failure; more than one match anywhere is a conflict -
/// an ambiguous binding is never resolved by guessing.
pub struct EmployeeResolver {
    odoo: Arc<OdooClient>,
}

impl EmployeeResolver {
    pub fn new(odoo: Arc<OdooClient>) -> Self {
        Self { odoo }
    }

    pub async fn resolve(&self, email: &str) -> Result<i64, ServiceError> {
        // Strategy 1: canonical work email (case-insensitive exact match).
        // limit 2 so a second row proves ambiguity without fetching more.
        let employees = self
            .odoo
            .search_read(
                "hr.employee",
                json!([["work_email", "=ilike", email]]),
                &["id", "name"],
                2,
            )
            .await?;

        match employees.len() {
            1 => {
                let id = record_id(&employees[0])?;
                info!("Resolved employee {} by work_email for {}", id, email);
                return Ok(id);
            }
            0 => {}
            _ => {
                warn!("Multiple employees share work_email {}", email);
                return Err(ServiceError::Conflict(format!(
                    "Ambiguous identity: multiple employees match {}",
                    email
                )));
            }
        }

        // Strategy 2: login account linked to an employee
        let users = self
            .odoo
            .search_read(
                "res.users",
                json!([["login", "=ilike", email]]),
                &["id", "employee_id", "employee_ids"],
                2,
            )
            .await?;

        if users.len() > 1 {
            warn!("Multiple user accounts share login {}", email);
            return Err(ServiceError::Conflict(format!(
                "Ambiguous identity: multiple user accounts match {}",
                email
            )));
        }

        if let Some(user) = users.first() {
            let employee_id = linked_employee_id(user);
            if let Some(employee_id) = employee_id {
                // Confirm the linked record actually exists
                let employees = self
                    .odoo
                    .read("hr.employee", &[employee_id], &["id", "name"])
                    .await?;
                if !employees.is_empty() {
                    info!("Resolved employee {} via res.users for {}", employee_id, email);
                    return Ok(employee_id);
                }
            }
        }

        Err(ServiceError::NotFound(format!(
            "No employee bound to this identity: {}",
            email
        )))
    }
}

fn record_id(record: &serde_json::Value) -> Result<i64, ServiceError> {
    record
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ServiceError::Server("Employee record without id".to_string()))
}

/// `employee_id` is a many2one (`[id, name]` or `false`); `employee_ids` a
/// list of ids. Either may be absent.
fn linked_employee_id(user: &serde_json::Value) -> Option<i64> {
    if let Some(id) = user
        .get("employee_id")
        .and_then(|v| v.as_array())
        .and_then(|pair| pair.first())
        .and_then(|v| v.as_i64())
    {
        return Some(id);
    }
    user.get("employee_ids")
        .and_then(|v| v.as_array())
        .and_then(|ids| ids.first())
        .and_then(|v| v.as_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OdooConfig;
    use crate::odoo::xmlrpc;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn resolver_with_mock(server: &MockServer) -> EmployeeResolver {
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/common"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!(7))),
            )
            .mount(server)
            .await;

        let odoo = Arc::new(
            OdooClient::new(&OdooConfig {
                url: server.uri(),
                db: "test-db".to_string(),
                username: "service".to_string(),
                api_key: "service-api-key".to_string(),
                query_timeout: 5,
            })
            .unwrap(),
        );
        EmployeeResolver::new(odoo)
    }

    #[tokio::test]
    async fn test_resolves_by_work_email() {
        let server = MockServer::start().await;
        let resolver = resolver_with_mock(&server).await;

        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("hr.employee"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(
                &json!([{"id": 42, "name": "Alice"}]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let id = resolver.resolve("alice@keboola.com").await.unwrap();
        assert_eq!(id, 42);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_two_matches_is_a_conflict() {
        let server = MockServer::start().await;
        let resolver = resolver_with_mock(&server).await;

        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(
                &json!([{"id": 42, "name": "Alice"}, {"id": 43, "name": "Alice B"}]),
            )))
            .mount(&server)
            .await;

        let err = resolver.resolve("alice@keboola.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_falls_back_to_user_account_link() {
        let server = MockServer::start().await;
        let resolver = resolver_with_mock(&server).await;

        // No employee by work_email
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("work_email"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!([]))),
            )
            .mount(&server)
            .await;
        // One user account linked to employee 9
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("res.users"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(
                &json!([{"id": 5, "employee_id": [9, "Bob"], "employee_ids": [9]}]),
            )))
            .mount(&server)
            .await;
        // Existence check for employee 9
        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .and(body_string_contains("<string>read</string>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(
                &json!([{"id": 9, "name": "Bob"}]),
            )))
            .mount(&server)
            .await;

        let id = resolver.resolve("bob@keboola.com").await.unwrap();
        assert_eq!(id, 9);
    }

    #[tokio::test]
    async fn test_no_match_is_not_found() {
        let server = MockServer::start().await;
        let resolver = resolver_with_mock(&server).await;

        Mock::given(method("POST"))
            .and(path("/xmlrpc/2/object"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(xmlrpc::response_body(&json!([]))),
            )
            .mount(&server)
            .await;

        let err = resolver.resolve("ghost@keboola.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(err.to_string().contains("No employee bound"));
    }
}
