use crate::cache::CacheBackend;
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;

/// Liveness endpoint. Unauthenticated; reports component health without
/// touching the upstream ERP.
pub(super) async fn health_handler(State(state): State<AppState>) -> Response {
    match state.cache.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "odoo-mcp-server",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
            .into_response(),
        Err(detail) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "service": "odoo-mcp-server",
                "detail": detail,
            })),
        )
            .into_response(),
    }
}
