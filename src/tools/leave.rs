//! Time off / leave tools.

use super::{f64_field, m2o_name, optional_i64, optional_str, required_i64, required_str, str_field, ToolSpec};
use crate::errors::ServiceError;
use crate::oauth::ExecutionContext;
use crate::odoo::OdooClient;
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::{json, Map, Value};

pub(super) fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_my_leave_balance",
            description: "Get your remaining leave balance for all leave types (vacation, sick leave, etc.) for a specific year",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "leave_type": {
                            "type": "string",
                            "description": "Optional: specific leave type to check (e.g., 'Paid Time Off', 'Sick Leave')",
                        },
                        "year": {
                            "type": "integer",
                            "description": "Year to check balance for (default: current year)",
                        },
                    },
                })
            },
        },
        ToolSpec {
            name: "get_my_leave_requests",
            description: "Get your leave/time-off requests and their status",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "status": {
                            "type": "string",
                            "enum": ["all", "pending", "approved", "rejected"],
                            "default": "all",
                            "description": "Filter by request status",
                        }
                    },
                })
            },
        },
        ToolSpec {
            name: "request_leave",
            description: "Submit a new leave/time-off request",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "leave_type": {
                            "type": "string",
                            "description": "Type of leave (e.g., 'Paid Time Off', 'Sick Leave', 'Vacation')",
                        },
                        "start_date": {
                            "type": "string",
                            "format": "date",
                            "description": "Start date in YYYY-MM-DD format",
                        },
                        "end_date": {
                            "type": "string",
                            "format": "date",
                            "description": "End date in YYYY-MM-DD format",
                        },
                        "reason": {
                            "type": "string",
                            "description": "Reason for the leave request",
                        },
                    },
                    "required": ["leave_type", "start_date", "end_date"],
                })
            },
        },
        ToolSpec {
            name: "cancel_leave_request",
            description: "Cancel a pending leave request",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "request_id": {
                            "type": "integer",
                            "description": "ID of the leave request to cancel",
                        }
                    },
                    "required": ["request_id"],
                })
            },
        },
        ToolSpec {
            name: "get_public_holidays",
            description: "Get company public holidays for a specific year",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "year": {
                            "type": "integer",
                            "description": "Year to get holidays for (default: current year)",
                        }
                    },
                })
            },
        },
    ]
}

pub(super) async fn get_my_leave_balance(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let leave_type_filter = optional_str(args, "leave_type");
    let year = optional_i64(args, "year").unwrap_or_else(|| Utc::now().year() as i64);

    // Odoo computes balances from allocations valid in the date context
    let kwargs = json!({
        "fields": ["id", "name", "max_leaves", "leaves_taken", "virtual_remaining_leaves"],
        "context": {
            "employee_id": ctx.employee_id,
            "default_date_from": format!("{year}-01-01"),
            "default_date_to": format!("{year}-12-31"),
        },
    });
    let leave_types = odoo
        .execute_kw(
            "hr.leave.type",
            "search_read",
            vec![json!([["requires_allocation", "=", "yes"]])],
            kwargs,
        )
        .await?;
    let leave_types = leave_types.as_array().cloned().unwrap_or_default();

    let mut balances = Vec::new();
    for lt in &leave_types {
        let type_name = str_field(lt, "name").unwrap_or_else(|| "Unknown".to_string());
        if let Some(filter) = leave_type_filter {
            if !type_name.to_lowercase().contains(&filter.to_lowercase()) {
                continue;
            }
        }

        let allocated = f64_field(lt, "max_leaves");
        let taken = f64_field(lt, "leaves_taken");
        let remaining = f64_field(lt, "virtual_remaining_leaves");

        if allocated > 0.0 || taken > 0.0 {
            balances.push(json!({
                "leave_type": type_name,
                "allocated": allocated,
                "taken": taken,
                "remaining": remaining,
            }));
        }
    }

    Ok(json!({ "year": year, "balances": balances }))
}

pub(super) async fn get_my_leave_requests(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let status = optional_str(args, "status").unwrap_or("all");

    let mut domain = vec![json!(["employee_id", "=", ctx.employee_id])];
    match status {
        "pending" => domain.push(json!(["state", "in", ["draft", "confirm", "validate1"]])),
        "approved" => domain.push(json!(["state", "=", "validate"])),
        "rejected" => domain.push(json!(["state", "=", "refuse"])),
        _ => {}
    }

    let requests = odoo
        .search_read(
            "hr.leave",
            Value::Array(domain),
            &["holiday_status_id", "date_from", "date_to", "number_of_days", "state", "name"],
            50,
        )
        .await?;

    let result: Vec<Value> = requests
        .iter()
        .map(|r| {
            json!({
                "id": r.get("id"),
                "leave_type": m2o_name(r.get("holiday_status_id")),
                "start_date": str_field(r, "date_from"),
                "end_date": str_field(r, "date_to"),
                "days": r.get("number_of_days"),
                "state": str_field(r, "state"),
                "reason": str_field(r, "name"),
            })
        })
        .collect();
    Ok(Value::Array(result))
}

pub(super) async fn request_leave(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let leave_type_name = required_str(args, "leave_type")?;
    let start_date = parse_date(args, "start_date")?;
    let end_date = parse_date(args, "end_date")?;
    let reason = optional_str(args, "reason").unwrap_or("");

    if end_date < start_date {
        return Err(ServiceError::validation_field(
            "End date must be after start date",
            "end_date",
        ));
    }

    let leave_types = odoo
        .search_read(
            "hr.leave.type",
            json!([["name", "ilike", leave_type_name]]),
            &["id", "name"],
            1,
        )
        .await?;
    let Some(leave_type_id) = leave_types.first().and_then(|lt| lt.get("id")).and_then(Value::as_i64)
    else {
        return Err(ServiceError::NotFound(format!(
            "Leave type '{}' not found",
            leave_type_name
        )));
    };

    // Whole-day requests; overlap and allocation rules are Odoo's to enforce
    let leave_id = odoo
        .create(
            "hr.leave",
            json!({
                "employee_id": ctx.employee_id,
                "holiday_status_id": leave_type_id,
                "date_from": format!("{start_date} 08:00:00"),
                "date_to": format!("{end_date} 17:00:00"),
                "name": reason,
            }),
        )
        .await?;

    Ok(json!({
        "request_id": leave_id,
        "status": "submitted",
        "message": "Leave request submitted successfully",
    }))
}

pub(super) async fn cancel_leave_request(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let request_id = required_i64(args, "request_id")?;

    // Ownership is part of the lookup: someone else's request is "not found"
    let requests = odoo
        .search_read(
            "hr.leave",
            json!([["id", "=", request_id], ["employee_id", "=", ctx.employee_id]]),
            &["state"],
            1,
        )
        .await?;
    let Some(request) = requests.first() else {
        return Err(ServiceError::NotFound(
            "Leave request not found or not yours".to_string(),
        ));
    };

    let state = str_field(request, "state").unwrap_or_default();
    if state != "draft" && state != "confirm" {
        return Err(ServiceError::validation(
            "Cannot cancel approved or refused requests",
        ));
    }

    odoo.unlink("hr.leave", &[request_id]).await?;

    Ok(json!({
        "status": "cancelled",
        "message": "Leave request cancelled",
    }))
}

pub(super) async fn get_public_holidays(
    args: &Map<String, Value>,
    odoo: &OdooClient,
) -> Result<Value, ServiceError> {
    let year = optional_i64(args, "year").unwrap_or_else(|| Utc::now().year() as i64);

    // Company-wide holidays are calendar leaves without a resource
    let holidays = odoo
        .search_read_ordered(
            "resource.calendar.leaves",
            json!([
                ["resource_id", "=", false],
                ["date_from", ">=", format!("{year}-01-01")],
                ["date_to", "<=", format!("{year}-12-31 23:59:59")],
            ]),
            &["name", "date_from", "date_to"],
            "date_from asc",
        )
        .await?;

    let result: Vec<Value> = holidays
        .iter()
        .map(|h| {
            json!({
                "name": str_field(h, "name"),
                "date_from": str_field(h, "date_from"),
                "date_to": str_field(h, "date_to"),
            })
        })
        .collect();

    Ok(json!({
        "year": year,
        "holidays": result,
        "count": result.len(),
    }))
}

fn parse_date(args: &Map<String, Value>, key: &str) -> Result<NaiveDate, ServiceError> {
    let raw = required_str(args, key)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ServiceError::validation_field(format!("'{}' must be a date in YYYY-MM-DD format", key), key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let args: Map<String, Value> = serde_json::from_value(json!({
            "start_date": "2026-08-10",
            "bad": "10/08/2026",
        }))
        .unwrap();

        assert_eq!(
            parse_date(&args, "start_date").unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 10).unwrap()
        );

        let err = parse_date(&args, "bad").unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
        let err = parse_date(&args, "missing").unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }
}
