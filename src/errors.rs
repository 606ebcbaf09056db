use axum::response::IntoResponse;
use axum::Json;
use http::{header, StatusCode};
use serde_json::json;
use thiserror::Error;

/// Closed error taxonomy for the whole service.
///
/// Every failure a caller can observe is one of these variants. The `code`
/// string is part of the wire contract and tells callers whether a retry can
/// help; see [`ServiceError::is_retryable`].
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Bad, expired or unverified token, or upstream login failure.
    #[error("{0}")]
    Authentication(String),

    /// Valid identity, but the operation is not covered by the granted
    /// scopes, or the backend denied access.
    #[error("{message}")]
    Permission {
        message: String,
        /// Operation that was denied, when known.
        operation: Option<String>,
        /// Scopes that would have sufficed (any one of them).
        required_scopes: Vec<String>,
    },

    /// No matching record upstream.
    #[error("{0}")]
    NotFound(String),

    /// More than one record matched where exactly one was required.
    #[error("{0}")]
    Conflict(String),

    /// Malformed or rejected input.
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Network-level failure talking to an upstream system.
    #[error("{message}")]
    Connectivity { message: String, timeout: bool },

    /// Unexpected upstream failure.
    #[error("{0}")]
    Server(String),

    /// Deployment defect (e.g. an operation without a scope mapping).
    #[error("{0}")]
    Configuration(String),
}

impl ServiceError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn permission<S: Into<String>>(message: S) -> Self {
        Self::Permission {
            message: message.into(),
            operation: None,
            required_scopes: Vec::new(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "ACCESS_DENIED",
            Self::Permission { .. } => "PERMISSION_DENIED",
            Self::NotFound(_) => "RECORD_NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Connectivity { timeout: true, .. } => "CONNECTION_TIMEOUT",
            Self::Connectivity { timeout: false, .. } => "CONNECTION_ERROR",
            Self::Server(_) => "SERVER_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Server(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Permission { .. } => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Connectivity { .. } => StatusCode::BAD_GATEWAY,
            Self::Server(_) => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire shape: `{"error": {"code", "message", "retryable", "field"?}}`.
    pub fn to_error_body(&self) -> serde_json::Value {
        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
            "retryable": self.is_retryable(),
        });
        if let Self::Validation {
            field: Some(field), ..
        } = self
        {
            error["field"] = json!(field);
        }
        if let Self::Permission {
            required_scopes, ..
        } = self
        {
            if !required_scopes.is_empty() {
                error["required_scopes"] = json!(required_scopes);
            }
        }
        json!({ "error": error })
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = self.to_error_body();
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                http::HeaderValue::from_static("Bearer realm=\"odoo-mcp\", error=\"invalid_token\""),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_retryability() {
        assert_eq!(
            ServiceError::Authentication("x".into()).code(),
            "ACCESS_DENIED"
        );
        assert!(!ServiceError::Authentication("x".into()).is_retryable());

        let timeout = ServiceError::Connectivity {
            message: "timed out".into(),
            timeout: true,
        };
        assert_eq!(timeout.code(), "CONNECTION_TIMEOUT");
        assert!(timeout.is_retryable());

        let conn = ServiceError::Connectivity {
            message: "refused".into(),
            timeout: false,
        };
        assert_eq!(conn.code(), "CONNECTION_ERROR");
        assert!(conn.is_retryable());

        assert!(ServiceError::Server("boom".into()).is_retryable());
        assert!(!ServiceError::Configuration("missing mapping".into()).is_retryable());
    }

    #[test]
    fn test_error_body_shape() {
        let err = ServiceError::validation_field("end date before start date", "end_date");
        let body = err.to_error_body();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "end_date");
        assert_eq!(body["error"]["retryable"], false);
    }

    #[test]
    fn test_permission_body_names_sufficient_scopes() {
        let err = ServiceError::Permission {
            message: "insufficient scope for tool: request_leave".into(),
            operation: Some("request_leave".into()),
            required_scopes: vec!["odoo.leave.write".into(), "odoo.write".into()],
        };
        let body = err.to_error_body();
        assert_eq!(body["error"]["code"], "PERMISSION_DENIED");
        assert_eq!(
            body["error"]["required_scopes"],
            json!(["odoo.leave.write", "odoo.write"])
        );
    }
}
