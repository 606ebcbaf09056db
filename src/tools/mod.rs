//! MCP tool surface: employee self-service operations.
//!
//! Every tool operates strictly on the employee bound to the caller's
//! validated identity. Tool arguments never select whose data is touched.

use crate::errors::ServiceError;
use crate::oauth::ExecutionContext;
use crate::odoo::OdooClient;
use serde_json::{Map, Value};

mod documents;
mod leave;
mod profile;

/// Descriptor advertised through `tools/list`.
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: fn() -> Value,
}

/// All exposed tools, in their advertised order.
pub fn registry() -> Vec<ToolSpec> {
    let mut tools = Vec::new();
    tools.extend(profile::tools());
    tools.extend(leave::tools());
    tools.extend(documents::tools());
    tools
}

/// Execute one tool on behalf of the resolved caller.
pub async fn dispatch(
    name: &str,
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    match name {
        "get_my_profile" => profile::get_my_profile(odoo, ctx).await,
        "get_my_manager" => profile::get_my_manager(odoo, ctx).await,
        "get_my_team" => profile::get_my_team(odoo, ctx).await,
        "find_colleague" => profile::find_colleague(args, odoo).await,
        "get_direct_reports" => profile::get_direct_reports(odoo, ctx).await,
        "update_my_contact" => profile::update_my_contact(args, odoo, ctx).await,
        "get_my_leave_balance" => leave::get_my_leave_balance(args, odoo, ctx).await,
        "get_my_leave_requests" => leave::get_my_leave_requests(args, odoo, ctx).await,
        "request_leave" => leave::request_leave(args, odoo, ctx).await,
        "cancel_leave_request" => leave::cancel_leave_request(args, odoo, ctx).await,
        "get_public_holidays" => leave::get_public_holidays(args, odoo).await,
        "get_my_documents" => documents::get_my_documents(args, odoo, ctx).await,
        "get_document_categories" => documents::get_document_categories(odoo, ctx).await,
        "upload_identity_document" => documents::upload_identity_document(args, odoo, ctx).await,
        "download_document" => documents::download_document(args, odoo, ctx).await,
        "get_document_details" => documents::get_document_details(args, odoo, ctx).await,
        other => Err(ServiceError::Configuration(format!(
            "Unknown tool '{}'",
            other
        ))),
    }
}

// --- argument extraction -------------------------------------------------

pub(crate) fn required_str<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ServiceError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::validation_field(format!("Missing required argument '{}'", key), key)
        })
}

pub(crate) fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

pub(crate) fn required_i64(args: &Map<String, Value>, key: &str) -> Result<i64, ServiceError> {
    args.get(key).and_then(|v| v.as_i64()).ok_or_else(|| {
        ServiceError::validation_field(format!("Missing required argument '{}'", key), key)
    })
}

pub(crate) fn optional_i64(args: &Map<String, Value>, key: &str) -> Option<i64> {
    args.get(key).and_then(|v| v.as_i64())
}

// --- Odoo record field helpers ------------------------------------------

/// Many2one fields come back as `[id, display_name]`, or `false` when empty.
pub(crate) fn m2o_id(value: Option<&Value>) -> Option<i64> {
    value?.as_array()?.first()?.as_i64()
}

pub(crate) fn m2o_name(value: Option<&Value>) -> Option<String> {
    value?
        .as_array()?
        .get(1)?
        .as_str()
        .map(str::to_string)
}

/// Scalar fields report `false` instead of null when unset.
pub(crate) fn str_field(record: &Value, key: &str) -> Option<String> {
    record.get(key)?.as_str().map(str::to_string)
}

pub(crate) fn f64_field(record: &Value, key: &str) -> f64 {
    record.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

pub(crate) fn i64_field(record: &Value, key: &str) -> Option<i64> {
    record.get(key)?.as_i64()
}
