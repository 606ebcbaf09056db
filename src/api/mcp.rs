//! MCP JSON-RPC endpoint.
//!
//! Every method requires a validated bearer token. `tools/list` filters the
//! advertised tools down to the caller's scopes; `tools/call` passes the
//! full operation gate (validate -> authorize -> resolve) before dispatch.

use crate::errors::ServiceError;
use crate::oauth::ValidatedClaims;
use crate::state::AppState;
use crate::tools;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use http::HeaderMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::time::Duration;

const PROTOCOL_VERSION: &str = "2024-11-05";

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const OPERATION_FAILED: i64 = -32000;

#[derive(Debug, Deserialize)]
pub(super) struct McpRequest {
    #[allow(dead_code)]
    #[serde(default)]
    jsonrpc: Option<String>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(super) struct McpResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
    id: Option<Value>,
}

impl McpResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Option<Value>, code: i64, message: String, data: Option<Value>) -> Self {
        let mut error = json!({ "code": code, "message": message });
        if let Some(data) = data {
            error["data"] = data;
        }
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(error),
            id,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|auth_value| {
            if auth_value.to_lowercase().starts_with("bearer ") {
                Some(auth_value[7..].to_string())
            } else {
                None
            }
        })
}

pub(super) async fn mcp_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<McpRequest>,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        warn!("MCP request without bearer token");
        return ServiceError::Authentication("Missing Bearer token".to_string()).into_response();
    };

    // Authentication happens before any method handling; failures surface
    // as HTTP-level errors, not JSON-RPC errors
    let (_, claims) = match state.gate.validate_only(&token).await {
        Ok(validated) => validated,
        Err(err) => {
            warn!("Token validation failed: {}", err);
            return err.into_response();
        }
    };

    let McpRequest {
        method, params, id, ..
    } = request;
    debug!("MCP method {} from {}", method, claims.email);

    let response = match method.as_str() {
        "initialize" => McpResponse::result(id, initialize_result()),
        "notifications/initialized" => McpResponse::result(id, json!({})),
        "ping" => McpResponse::result(id, json!({})),
        "tools/list" => McpResponse::result(id, tools_list(&state, &claims)),
        "tools/call" => handle_tools_call(&state, &token, params, id).await,
        other => McpResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
            None,
        ),
    };

    Json(response).into_response()
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false },
        },
        "serverInfo": {
            "name": "odoo-mcp-server",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

/// Advertise only the tools the caller's scopes permit.
fn tools_list(state: &AppState, claims: &ValidatedClaims) -> Value {
    let registry = state.gate.scope_registry();
    let tools: Vec<Value> = tools::registry()
        .iter()
        .filter(|tool| registry.allows(tool.name, claims))
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": (tool.input_schema)(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

async fn handle_tools_call(
    state: &AppState,
    token: &str,
    params: Option<Value>,
    id: Option<Value>,
) -> McpResponse {
    let params = params.unwrap_or_else(|| json!({}));
    let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
        return McpResponse::error(id, INVALID_PARAMS, "Missing tool name".to_string(), None);
    };
    let empty = Map::new();
    let arguments = params
        .get("arguments")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    // validate -> authorize -> resolve, in that order
    let ctx = match state.gate.enter(token, tool_name).await {
        Ok(ctx) => ctx,
        Err(err) => return taxonomy_error(id, &err),
    };

    match tools::dispatch(tool_name, arguments, &state.odoo, &ctx).await {
        Ok(result) => {
            let text = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
            McpResponse::result(
                id,
                json!({
                    "content": [{ "type": "text", "text": text }],
                }),
            )
        }
        Err(err) => {
            // A backend access denial means the cached claims no longer
            // reflect current access; stop feeding decisions from them
            if matches!(err, ServiceError::Permission { .. }) {
                state.gate.invalidate(&ctx.fingerprint).await;
            }
            taxonomy_error(id, &err)
        }
    }
}

fn taxonomy_error(id: Option<Value>, err: &ServiceError) -> McpResponse {
    let code = match err {
        ServiceError::Validation { .. } => INVALID_PARAMS,
        _ => OPERATION_FAILED,
    };
    McpResponse::error(id, code, err.to_string(), Some(err.to_error_body()))
}

/// Server-initiated message stream for the streamable-http transport.
/// Nothing is pushed today; the keep-alive comments hold the connection.
pub(super) async fn mcp_sse_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return ServiceError::Authentication("Missing Bearer token".to_string()).into_response();
    };
    if let Err(err) = state.gate.validate_only(&token).await {
        return err.into_response();
    }

    Sse::new(futures::stream::pending::<Result<Event, Infallible>>())
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("heartbeat"),
        )
        .into_response()
}
