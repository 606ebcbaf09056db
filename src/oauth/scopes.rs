use crate::errors::ServiceError;
use crate::oauth::claims::ValidatedClaims;
use log::info;
use std::collections::HashMap;

/// Scopes granted to every verified identity (employee self-service).
const DEFAULT_SCOPES: [&str; 10] = [
    "openid",
    "email",
    "profile",
    "odoo.hr.profile",
    "odoo.hr.team",
    "odoo.hr.directory",
    "odoo.leave.read",
    "odoo.leave.write",
    "odoo.documents.read",
    "odoo.read",
];

/// Additional scopes for identities in the configured full-access domain.
const EXTENDED_SCOPES: [&str; 3] = ["odoo.hr.profile.write", "odoo.documents.write", "odoo.write"];

/// Derives granted scopes for a validated identity.
///
/// The identity provider (Google) does not issue fine-grained scopes, so
/// coarse grants are derived from the verified email. The privileged domain
/// comes from configuration; real per-scope grants from the provider would
/// replace this policy wholesale, which is why it is a value, not a
/// hardcoded rule.
#[derive(Debug, Clone, Default)]
pub struct ScopePolicy {
    full_access_domain: Option<String>,
}

impl ScopePolicy {
    pub fn new(full_access_domain: Option<String>) -> Self {
        Self { full_access_domain }
    }

    /// Evaluated once per token validation, not per call.
    pub fn derive(&self, email: &str, token_scope: Option<&str>) -> Vec<String> {
        // A token that carries explicit scopes wins over derivation
        if let Some(scope) = token_scope {
            let scopes: Vec<String> = scope.split_whitespace().map(str::to_string).collect();
            if !scopes.is_empty() {
                return scopes;
            }
        }

        let mut scopes: Vec<String> = DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect();
        if let Some(domain) = &self.full_access_domain {
            if email
                .rsplit_once('@')
                .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain))
            {
                scopes.extend(EXTENDED_SCOPES.iter().map(|s| s.to_string()));
                info!("Granted extended scopes for internal user {}", email);
            }
        }
        scopes
    }
}

/// Static operation -> required-scope-set table, built at startup.
///
/// OR semantics: any one of the listed scopes authorizes the operation.
/// Operations absent from the table are never permitted - an unknown name
/// is a deployment defect, not a user error.
pub struct ScopeRegistry {
    table: HashMap<&'static str, Vec<String>>,
}

impl ScopeRegistry {
    /// The built-in table covering every exposed tool.
    pub fn builtin() -> Self {
        let entries: [(&'static str, &[&str]); 16] = [
            // Profile & organization
            ("get_my_profile", &["odoo.hr.profile", "odoo.read"]),
            ("get_my_manager", &["odoo.hr.profile", "odoo.read"]),
            ("get_my_team", &["odoo.hr.team", "odoo.read"]),
            ("find_colleague", &["odoo.hr.directory", "odoo.read"]),
            ("get_direct_reports", &["odoo.hr.team", "odoo.read"]),
            ("update_my_contact", &["odoo.hr.profile.write", "odoo.write"]),
            // Leave
            ("get_my_leave_balance", &["odoo.leave.read", "odoo.read"]),
            ("get_my_leave_requests", &["odoo.leave.read", "odoo.read"]),
            ("request_leave", &["odoo.leave.write", "odoo.write"]),
            ("cancel_leave_request", &["odoo.leave.write", "odoo.write"]),
            ("get_public_holidays", &["odoo.leave.read", "odoo.read"]),
            // Documents
            ("get_my_documents", &["odoo.documents.read", "odoo.read"]),
            ("get_document_categories", &["odoo.documents.read", "odoo.read"]),
            (
                "upload_identity_document",
                &["odoo.documents.write", "odoo.write"],
            ),
            ("download_document", &["odoo.documents.read", "odoo.read"]),
            ("get_document_details", &["odoo.documents.read", "odoo.read"]),
        ];

        let table = entries
            .into_iter()
            .map(|(op, scopes)| (op, scopes.iter().map(|s| s.to_string()).collect()))
            .collect();
        Self { table }
    }

    #[cfg(test)]
    pub fn from_entries(entries: &[(&'static str, &[&str])]) -> Self {
        let table = entries
            .iter()
            .map(|(op, scopes)| (*op, scopes.iter().map(|s| s.to_string()).collect()))
            .collect();
        Self { table }
    }

    /// Permit iff the caller's scopes intersect the operation's required set.
    pub fn authorize(
        &self,
        operation: &str,
        claims: &ValidatedClaims,
    ) -> Result<(), ServiceError> {
        let required = self.table.get(operation).ok_or_else(|| {
            ServiceError::Configuration(format!(
                "No scope requirement registered for operation '{}'",
                operation
            ))
        })?;

        if claims.has_any_scope(required) {
            return Ok(());
        }

        Err(ServiceError::Permission {
            message: format!("Insufficient scope for operation '{}'", operation),
            operation: Some(operation.to_string()),
            required_scopes: required.clone(),
        })
    }

    /// Non-failing check used to filter the advertised tool list.
    pub fn allows(&self, operation: &str, claims: &ValidatedClaims) -> bool {
        self.table
            .get(operation)
            .is_some_and(|required| claims.has_any_scope(required))
    }
}
