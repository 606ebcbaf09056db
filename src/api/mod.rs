pub(crate) mod health;
pub(crate) mod mcp;
pub(crate) mod well_known;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Combines all API routes into a single router.
///
/// `/health` and the discovery document are open; every `/mcp` method
/// requires a bearer token, enforced inside the handler because the
/// operation-level gate needs the method name from the request body.
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/.well-known/oauth-protected-resource",
            get(well_known::metadata_handler),
        )
        .route("/mcp", post(mcp::mcp_handler).get(mcp::mcp_sse_handler))
}
