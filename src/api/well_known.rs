use crate::state::AppState;
use axum::extract::State;
use axum::Json;

/// RFC 9728 Protected Resource Metadata endpoint. Unauthenticated by
/// definition: clients read it to discover where to authenticate.
pub(super) async fn metadata_handler(
    State(state): State<AppState>,
) -> Json<crate::oauth::metadata::ProtectedResourceMetadata> {
    Json(state.metadata.as_ref().clone())
}
