//! Profile and organization tools.

use super::{m2o_id, m2o_name, optional_str, required_str, str_field, ToolSpec};
use crate::errors::ServiceError;
use crate::oauth::ExecutionContext;
use crate::odoo::OdooClient;
use serde_json::{json, Map, Value};

/// Fields visible when viewing other employees.
const PUBLIC_EMPLOYEE_FIELDS: [&str; 12] = [
    "id",
    "name",
    "work_email",
    "mobile_phone",
    "work_phone",
    "department_id",
    "job_id",
    "job_title",
    "parent_id",
    "coach_id",
    "image_128",
    "x_preferred_name",
];

/// Additional fields visible on one's own profile.
const SELF_EMPLOYEE_FIELDS: [&str; 16] = [
    "id",
    "name",
    "work_email",
    "mobile_phone",
    "work_phone",
    "department_id",
    "job_id",
    "job_title",
    "parent_id",
    "coach_id",
    "image_128",
    "x_preferred_name",
    "private_email",
    "emergency_contact",
    "emergency_phone",
    "x_division",
];

pub(super) fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_my_profile",
            description: "Get your employee profile information including name, email, department, job title, and manager",
            input_schema: || json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "get_my_manager",
            description: "Get information about your direct manager including their name, email, and phone",
            input_schema: || json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "get_my_team",
            description: "Get list of colleagues in your department/team",
            input_schema: || json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "find_colleague",
            description: "Find a colleague by name and get their contact information (email, phone, department)",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "Name or partial name to search for",
                        }
                    },
                    "required": ["name"],
                })
            },
        },
        ToolSpec {
            name: "get_direct_reports",
            description: "Get employees who report directly to you (for managers). Returns empty list if you're not a manager.",
            input_schema: || json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "update_my_contact",
            description: "Update your contact information (work phone, mobile phone, or work email)",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "work_phone": {"type": "string", "description": "Work phone number"},
                        "mobile_phone": {"type": "string", "description": "Mobile phone number"},
                        "work_email": {
                            "type": "string",
                            "format": "email",
                            "description": "Work email address",
                        },
                    },
                })
            },
        },
    ]
}

pub(super) async fn get_my_profile(
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let employees = odoo
        .read("hr.employee", &[ctx.employee_id], &SELF_EMPLOYEE_FIELDS)
        .await?;
    let Some(emp) = employees.first() else {
        return Err(ServiceError::NotFound("Employee not found".to_string()));
    };

    let job_title =
        str_field(emp, "job_title").or_else(|| m2o_name(emp.get("job_id")));
    Ok(json!({
        "name": str_field(emp, "name"),
        "preferred_name": str_field(emp, "x_preferred_name"),
        "work_email": str_field(emp, "work_email"),
        "mobile_phone": str_field(emp, "mobile_phone"),
        "work_phone": str_field(emp, "work_phone"),
        "department": m2o_name(emp.get("department_id")),
        "division": str_field(emp, "x_division"),
        "job_title": job_title,
        "manager": m2o_name(emp.get("parent_id")),
        "coach": m2o_name(emp.get("coach_id")),
    }))
}

pub(super) async fn get_my_manager(
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let employees = odoo
        .read("hr.employee", &[ctx.employee_id], &["parent_id"])
        .await?;
    let manager_id = employees
        .first()
        .and_then(|emp| m2o_id(emp.get("parent_id")));
    let Some(manager_id) = manager_id else {
        return Ok(json!({"message": "No manager assigned"}));
    };

    let managers = odoo
        .read("hr.employee", &[manager_id], &PUBLIC_EMPLOYEE_FIELDS)
        .await?;
    let Some(mgr) = managers.first() else {
        return Err(ServiceError::NotFound("Manager not found".to_string()));
    };

    let phone = str_field(mgr, "work_phone").or_else(|| str_field(mgr, "mobile_phone"));
    Ok(json!({
        "name": str_field(mgr, "name"),
        "email": str_field(mgr, "work_email"),
        "phone": phone,
        "department": m2o_name(mgr.get("department_id")),
        "job_title": str_field(mgr, "job_title"),
    }))
}

pub(super) async fn get_my_team(
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let employees = odoo
        .read("hr.employee", &[ctx.employee_id], &["department_id"])
        .await?;
    let dept_id = employees
        .first()
        .and_then(|emp| m2o_id(emp.get("department_id")));
    let Some(dept_id) = dept_id else {
        return Ok(json!([]));
    };

    let team = odoo
        .search_read(
            "hr.employee",
            json!([["department_id", "=", dept_id], ["id", "!=", ctx.employee_id]]),
            &["name", "work_email", "job_title", "parent_id"],
            50,
        )
        .await?;

    let members: Vec<Value> = team
        .iter()
        .map(|t| {
            json!({
                "name": str_field(t, "name"),
                "email": str_field(t, "work_email"),
                "job_title": str_field(t, "job_title"),
                "is_manager": m2o_id(t.get("parent_id")) == Some(ctx.employee_id),
            })
        })
        .collect();
    Ok(Value::Array(members))
}

pub(super) async fn find_colleague(
    args: &Map<String, Value>,
    odoo: &OdooClient,
) -> Result<Value, ServiceError> {
    let search_name = required_str(args, "name")?;

    let colleagues = odoo
        .search_read(
            "hr.employee",
            json!([["name", "ilike", search_name]]),
            &["name", "work_email", "mobile_phone", "department_id", "job_title"],
            10,
        )
        .await?;

    let result: Vec<Value> = colleagues
        .iter()
        .map(|c| {
            json!({
                "name": str_field(c, "name"),
                "work_email": str_field(c, "work_email"),
                "phone": str_field(c, "mobile_phone"),
                "department": m2o_name(c.get("department_id")),
                "job_title": str_field(c, "job_title"),
            })
        })
        .collect();
    Ok(Value::Array(result))
}

pub(super) async fn get_direct_reports(
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let reports = odoo
        .search_read(
            "hr.employee",
            json!([["parent_id", "=", ctx.employee_id]]),
            &["name", "work_email", "mobile_phone", "department_id", "job_title"],
            50,
        )
        .await?;

    let result: Vec<Value> = reports
        .iter()
        .map(|r| {
            json!({
                "id": r.get("id"),
                "name": str_field(r, "name"),
                "email": str_field(r, "work_email"),
                "phone": str_field(r, "mobile_phone"),
                "department": m2o_name(r.get("department_id")),
                "job_title": str_field(r, "job_title"),
            })
        })
        .collect();

    let mut response = json!({
        "direct_reports": result,
        "count": result.len(),
    });
    if result.is_empty() {
        response["message"] = json!("You have no direct reports");
    }
    Ok(response)
}

pub(super) async fn update_my_contact(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let mut updates = Map::new();

    if let Some(work_phone) = optional_str(args, "work_phone") {
        updates.insert("work_phone".to_string(), json!(work_phone));
    }
    if let Some(mobile_phone) = optional_str(args, "mobile_phone") {
        updates.insert("mobile_phone".to_string(), json!(mobile_phone));
    }
    if let Some(work_email) = optional_str(args, "work_email") {
        if !is_plausible_email(work_email) {
            return Err(ServiceError::validation_field(
                "Invalid email format",
                "work_email",
            ));
        }
        updates.insert("work_email".to_string(), json!(work_email));
    }

    if updates.is_empty() {
        return Err(ServiceError::validation(
            "No fields to update. Provide work_phone, mobile_phone, or work_email.",
        ));
    }

    let updated_fields: Vec<String> = updates.keys().cloned().collect();
    odoo.write("hr.employee", &[ctx.employee_id], Value::Object(updates))
        .await?;

    let employees = odoo
        .read(
            "hr.employee",
            &[ctx.employee_id],
            &["name", "work_email", "mobile_phone", "work_phone"],
        )
        .await?;

    let mut response = json!({
        "status": "updated",
        "updated_fields": updated_fields,
    });
    if let Some(emp) = employees.first() {
        response["profile"] = json!({
            "name": str_field(emp, "name"),
            "work_email": str_field(emp, "work_email"),
            "mobile_phone": str_field(emp, "mobile_phone"),
            "work_phone": str_field(emp, "work_phone"),
        });
    }
    Ok(response)
}

/// local@domain.tld, no whitespace. Odoo performs its own validation; this
/// only rejects obviously broken input before a round-trip.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}
