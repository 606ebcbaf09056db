//! Personal HR document (DMS) tools.
//!
//! Documents live under `HR Documents > <Employee Name> > <Category>`.
//! Restricted categories are invisible to their subject; uploads are
//! accepted only into the Identity folder.

use super::{i64_field, m2o_id, m2o_name, optional_str, required_i64, required_str, str_field, ToolSpec};
use crate::errors::ServiceError;
use crate::oauth::ExecutionContext;
use crate::odoo::OdooClient;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

const RESTRICTED_FOLDERS: [&str; 2] = ["Background Checks", "Offboarding Documents"];
const UPLOAD_FOLDER: &str = "Identity";

pub(super) fn tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_my_documents",
            description: "Get your personal HR documents (contracts, identity documents, etc.)",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "enum": ["all", "Contracts", "Identity"],
                            "default": "all",
                            "description": "Filter by document category. Note: Background Checks and Offboarding Documents are restricted.",
                        }
                    },
                })
            },
        },
        ToolSpec {
            name: "get_document_categories",
            description: "Get list of your available document categories/folders",
            input_schema: || json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "upload_identity_document",
            description: "Upload an identity document (passport, ID card, etc.) to your personal folder",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "filename": {
                            "type": "string",
                            "description": "Name of the file being uploaded",
                        },
                        "content_base64": {
                            "type": "string",
                            "description": "Base64-encoded file content",
                        },
                        "document_type": {
                            "type": "string",
                            "enum": ["passport", "id_card", "driving_license", "other"],
                            "description": "Type of identity document",
                        },
                    },
                    "required": ["filename", "content_base64", "document_type"],
                })
            },
        },
        ToolSpec {
            name: "download_document",
            description: "Download a specific document from your personal folder",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "document_id": {
                            "type": "integer",
                            "description": "ID of the document to download",
                        }
                    },
                    "required": ["document_id"],
                })
            },
        },
        ToolSpec {
            name: "get_document_details",
            description: "Get detailed metadata for a specific document (without downloading content)",
            input_schema: || {
                json!({
                    "type": "object",
                    "properties": {
                        "document_id": {
                            "type": "integer",
                            "description": "ID of the document",
                        }
                    },
                    "required": ["document_id"],
                })
            },
        },
    ]
}

async fn employee_name(odoo: &OdooClient, ctx: &ExecutionContext) -> Result<String, ServiceError> {
    let employees = odoo.read("hr.employee", &[ctx.employee_id], &["name"]).await?;
    employees
        .first()
        .and_then(|emp| str_field(emp, "name"))
        .ok_or_else(|| ServiceError::NotFound("Employee not found".to_string()))
}

/// Locate the employee's personal folder: preferably under the
/// "HR Documents" root, falling back to a top-level folder of the same name
/// (legacy layout).
async fn find_employee_folder(
    odoo: &OdooClient,
    employee_name: &str,
) -> Result<Option<i64>, ServiceError> {
    let hr_root = odoo
        .search_read(
            "dms.directory",
            json!([["name", "=", "HR Documents"], ["is_root_directory", "=", true]]),
            &["id"],
            1,
        )
        .await?;

    let domain = match hr_root.first().and_then(|d| i64_field(d, "id")) {
        Some(root_id) => json!([["name", "=", employee_name], ["parent_id", "=", root_id]]),
        None => json!([["name", "=", employee_name]]),
    };

    let dirs = odoo
        .search_read("dms.directory", domain, &["id", "name"], 1)
        .await?;
    Ok(dirs.first().and_then(|d| i64_field(d, "id")))
}

/// Category subfolders the employee may see.
async fn accessible_subfolders(
    odoo: &OdooClient,
    folder_id: i64,
) -> Result<Vec<Value>, ServiceError> {
    odoo.search_read(
        "dms.directory",
        json!([
            ["parent_id", "=", folder_id],
            ["name", "not in", RESTRICTED_FOLDERS],
        ]),
        &["id", "name"],
        50,
    )
    .await
}

pub(super) async fn get_my_documents(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let category_filter = optional_str(args, "category").unwrap_or("all");

    let name = employee_name(odoo, ctx).await?;
    let Some(folder_id) = find_employee_folder(odoo, &name).await? else {
        return Ok(json!({
            "documents": [],
            "message": "No personal document folder found",
        }));
    };

    let mut subdirs = accessible_subfolders(odoo, folder_id).await?;
    if category_filter != "all" {
        subdirs.retain(|d| str_field(d, "name").as_deref() == Some(category_filter));
    }

    let subdir_ids: Vec<i64> = subdirs.iter().filter_map(|d| i64_field(d, "id")).collect();
    if subdir_ids.is_empty() {
        return Ok(json!({
            "documents": [],
            "message": "No accessible document folders found",
        }));
    }

    let files = odoo
        .search_read(
            "dms.file",
            json!([["directory_id", "in", subdir_ids]]),
            &["id", "name", "directory_id", "mimetype", "size", "create_date"],
            100,
        )
        .await?;

    let dir_names: HashMap<i64, String> = subdirs
        .iter()
        .filter_map(|d| Some((i64_field(d, "id")?, str_field(d, "name")?)))
        .collect();

    let documents: Vec<Value> = files
        .iter()
        .map(|f| {
            let category = m2o_id(f.get("directory_id"))
                .and_then(|id| dir_names.get(&id).cloned())
                .unwrap_or_else(|| "Unknown".to_string());
            json!({
                "id": f.get("id"),
                "filename": str_field(f, "name"),
                "category": category,
                "mimetype": str_field(f, "mimetype"),
                "size_bytes": f.get("size"),
                "uploaded_at": str_field(f, "create_date"),
            })
        })
        .collect();

    Ok(json!({
        "documents": documents,
        "total": documents.len(),
    }))
}

pub(super) async fn get_document_categories(
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let name = employee_name(odoo, ctx).await?;
    let Some(folder_id) = find_employee_folder(odoo, &name).await? else {
        return Ok(json!({
            "categories": [],
            "message": "No personal document folder found",
        }));
    };

    let subdirs = accessible_subfolders(odoo, folder_id).await?;
    let subdir_ids: Vec<i64> = subdirs.iter().filter_map(|d| i64_field(d, "id")).collect();

    // One query for all file counts, tallied locally
    let mut file_counts: HashMap<i64, usize> = HashMap::new();
    if !subdir_ids.is_empty() {
        let files = odoo
            .search_read(
                "dms.file",
                json!([["directory_id", "in", subdir_ids]]),
                &["directory_id"],
                1000,
            )
            .await?;
        for f in &files {
            if let Some(dir_id) = m2o_id(f.get("directory_id")) {
                *file_counts.entry(dir_id).or_default() += 1;
            }
        }
    }

    let categories: Vec<Value> = subdirs
        .iter()
        .filter_map(|d| {
            let id = i64_field(d, "id")?;
            let name = str_field(d, "name")?;
            let can_upload = name == UPLOAD_FOLDER;
            Some(json!({
                "name": name,
                "document_count": file_counts.get(&id).copied().unwrap_or(0),
                "can_upload": can_upload,
            }))
        })
        .collect();

    Ok(json!({ "categories": categories }))
}

pub(super) async fn upload_identity_document(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let filename = required_str(args, "filename")?;
    let content_base64 = required_str(args, "content_base64")?;
    let document_type = required_str(args, "document_type")?;

    if BASE64.decode(content_base64).is_err() {
        return Err(ServiceError::validation_field(
            "Invalid base64 content",
            "content_base64",
        ));
    }

    let name = employee_name(odoo, ctx).await?;
    let Some(folder_id) = find_employee_folder(odoo, &name).await? else {
        return Err(ServiceError::NotFound(
            "Personal folder not found".to_string(),
        ));
    };

    let identity_dirs = odoo
        .search_read(
            "dms.directory",
            json!([["parent_id", "=", folder_id], ["name", "=", UPLOAD_FOLDER]]),
            &["id"],
            1,
        )
        .await?;
    let Some(identity_dir_id) = identity_dirs.first().and_then(|d| i64_field(d, "id")) else {
        return Err(ServiceError::NotFound("Identity folder not found".to_string()));
    };

    let prefixed_filename = format!("{}_{}", document_type, filename);
    let file_id = odoo
        .create(
            "dms.file",
            json!({
                "name": prefixed_filename,
                "directory_id": identity_dir_id,
                "content": content_base64,
            }),
        )
        .await?;

    Ok(json!({
        "status": "uploaded",
        "file_id": file_id,
        "filename": prefixed_filename,
        "message": "Identity document uploaded successfully",
    }))
}

/// Verify the file's folder belongs to the caller and is not restricted.
/// Returns the category (folder) name.
async fn verify_document_access(
    odoo: &OdooClient,
    ctx: &ExecutionContext,
    directory_id: Option<i64>,
) -> Result<Option<String>, ServiceError> {
    let Some(directory_id) = directory_id else {
        return Ok(None);
    };

    let directories = odoo
        .read("dms.directory", &[directory_id], &["name", "parent_id"])
        .await?;
    let Some(directory) = directories.first() else {
        return Ok(None);
    };

    let category = str_field(directory, "name");
    if category
        .as_deref()
        .is_some_and(|name| RESTRICTED_FOLDERS.contains(&name))
    {
        return Err(ServiceError::permission(
            "Access denied to restricted folder",
        ));
    }

    if let Some(parent_id) = m2o_id(directory.get("parent_id")) {
        let employee_name = employee_name(odoo, ctx).await?;
        let parents = odoo
            .read("dms.directory", &[parent_id], &["name"])
            .await?;
        let parent_name = parents.first().and_then(|p| str_field(p, "name"));
        if parent_name.as_deref() != Some(employee_name.as_str()) {
            return Err(ServiceError::permission(
                "Access denied - not your document",
            ));
        }
    }

    Ok(category)
}

pub(super) async fn download_document(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let document_id = required_i64(args, "document_id")?;

    let files = odoo
        .search_read(
            "dms.file",
            json!([["id", "=", document_id]]),
            &["id", "name", "directory_id", "content", "mimetype"],
            1,
        )
        .await?;
    let Some(file) = files.first() else {
        return Err(ServiceError::NotFound("Document not found".to_string()));
    };

    verify_document_access(odoo, ctx, m2o_id(file.get("directory_id"))).await?;

    Ok(json!({
        "id": file.get("id"),
        "filename": str_field(file, "name"),
        "mimetype": str_field(file, "mimetype"),
        "content_base64": str_field(file, "content"),
    }))
}

pub(super) async fn get_document_details(
    args: &Map<String, Value>,
    odoo: &OdooClient,
    ctx: &ExecutionContext,
) -> Result<Value, ServiceError> {
    let document_id = required_i64(args, "document_id")?;

    let files = odoo
        .search_read(
            "dms.file",
            json!([["id", "=", document_id]]),
            &["id", "name", "directory_id", "mimetype", "size", "create_date", "create_uid", "write_date"],
            1,
        )
        .await?;
    let Some(file) = files.first() else {
        return Err(ServiceError::NotFound("Document not found".to_string()));
    };

    let category = verify_document_access(odoo, ctx, m2o_id(file.get("directory_id"))).await?;

    Ok(json!({
        "id": file.get("id"),
        "filename": str_field(file, "name"),
        "category": category,
        "mimetype": str_field(file, "mimetype"),
        "size_bytes": file.get("size"),
        "created_at": str_field(file, "create_date"),
        "created_by": m2o_name(file.get("create_uid")),
        "modified_at": str_field(file, "write_date"),
    }))
}
