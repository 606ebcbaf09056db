//! Mapping of Odoo XML-RPC faults and transport failures into the service
//! error taxonomy.
//!
//! Odoo fault codes:
//! - 1: UserError / ValidationError
//! - 2: MissingError (record not found)
//! - 3: AccessDenied (authentication)
//! - 4: AccessError (permission denied)

use crate::errors::ServiceError;
use http::StatusCode;

/// Map a fault to a typed error, in priority order:
/// authentication > permission > not-found > validation > server.
pub(super) fn map_fault(code: i64, fault_string: &str) -> ServiceError {
    let message = extract_fault_message(fault_string);

    if code == 3 || fault_string.contains("AccessDenied") {
        return ServiceError::Authentication(message);
    }
    if code == 4 || fault_string.contains("AccessError") {
        return ServiceError::permission(message);
    }
    if code == 2 || fault_string.contains("MissingError") {
        return ServiceError::NotFound(message);
    }
    if code == 1 || fault_string.contains("UserError") || fault_string.contains("ValidationError")
    {
        return ServiceError::validation(message);
    }

    ServiceError::Server(format!("Odoo error (code {}): {}", code, message))
}

/// Map reqwest-level failures. Timeouts are a distinguishable sub-kind so
/// callers can pick a backoff strategy.
pub(super) fn map_transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::Connectivity {
            message: "Connection timed out talking to Odoo".to_string(),
            timeout: true,
        };
    }
    if err.is_connect() {
        return ServiceError::Connectivity {
            message: "Connection refused - Odoo server may be down".to_string(),
            timeout: false,
        };
    }
    ServiceError::Connectivity {
        message: format!("Network error talking to Odoo: {}", err),
        timeout: false,
    }
}

/// Map a non-success HTTP status. Gateway-class statuses indicate the server
/// is unreachable behind its proxy and are retryable connectivity failures.
pub(super) fn map_status(status: StatusCode) -> ServiceError {
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            ServiceError::Connectivity {
                message: format!("Odoo unavailable (status {})", status.as_u16()),
                timeout: false,
            }
        }
        _ => ServiceError::Server(format!("Odoo request failed with status {}", status.as_u16())),
    }
}

/// Extract the meaningful message from an Odoo fault string, which often
/// carries a full Python traceback.
fn extract_fault_message(fault_string: &str) -> String {
    const CLASS_PREFIXES: [&str; 5] = [
        "UserError:",
        "ValidationError:",
        "MissingError:",
        "AccessError:",
        "AccessDenied:",
    ];
    for prefix in CLASS_PREFIXES {
        if let Some((_, rest)) = fault_string.split_once(prefix) {
            if let Some(line) = rest.trim().lines().next() {
                return line.trim().to_string();
            }
        }
    }

    const NOISE_PREFIXES: [&str; 3] = ["Traceback ", "File ", "  "];
    let first_line = fault_string.lines().next().unwrap_or("").trim();
    if NOISE_PREFIXES.iter().any(|p| first_line.starts_with(p)) {
        // Traceback-shaped: the last clean line is the actual error
        for line in fault_string.lines().rev() {
            let line = line.trim();
            if !line.is_empty() && !NOISE_PREFIXES.iter().any(|p| line.starts_with(p)) {
                return line.to_string();
            }
        }
    }

    if first_line.is_empty() {
        fault_string.to_string()
    } else {
        first_line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_code_mapping() {
        assert!(matches!(
            map_fault(3, "AccessDenied"),
            ServiceError::Authentication(_)
        ));
        assert!(matches!(
            map_fault(4, "you are not allowed"),
            ServiceError::Permission { .. }
        ));
        assert!(matches!(
            map_fault(2, "Record does not exist"),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            map_fault(1, "UserError: You cannot overlap leave requests"),
            ServiceError::Validation { .. }
        ));
        assert!(matches!(map_fault(99, "boom"), ServiceError::Server(_)));
    }

    #[test]
    fn test_substring_mapping_when_code_is_generic() {
        assert!(matches!(
            map_fault(0, "odoo.exceptions.AccessError: Sorry"),
            ServiceError::Permission { .. }
        ));
        assert!(matches!(
            map_fault(0, "odoo.exceptions.MissingError: gone"),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn test_priority_authentication_over_validation() {
        // A fault mentioning both classes maps to the highest-priority kind
        let err = map_fault(3, "AccessDenied raised during ValidationError handling");
        assert!(matches!(err, ServiceError::Authentication(_)));
    }

    #[test]
    fn test_extract_message_from_class_prefix() {
        let fault = "odoo.exceptions.UserError: You cannot request leave in the past\nDetails follow";
        let err = map_fault(1, fault);
        assert_eq!(err.to_string(), "You cannot request leave in the past");
    }

    #[test]
    fn test_extract_message_from_traceback() {
        let fault = "Traceback (most recent call last):\n  File \"x.py\", line 1\nSomething actually went wrong";
        let err = map_fault(99, fault);
        assert!(err.to_string().contains("Something actually went wrong"));
        assert!(!err.to_string().contains("Traceback"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::SERVICE_UNAVAILABLE),
            ServiceError::Connectivity { timeout: false, .. }
        ));
        assert!(matches!(
            map_status(StatusCode::INTERNAL_SERVER_ERROR),
            ServiceError::Server(_)
        ));
    }
}
