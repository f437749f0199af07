use crate::backup;
use crate::config::DB_FILE_NAME;
use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::session::Session;
use serde_json::json;
use std::path::PathBuf;

fn export_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_path = required_str(&req.params, "outPath")?;
    let workspace = state.workspace.clone().ok_or_else(HandlerErr::no_workspace)?;

    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(FULL)") {
            tracing::warn!(error = %e, "checkpoint before export failed");
        }
    }

    let export = backup::export_workspace_bundle(&workspace.join(DB_FILE_NAME), &PathBuf::from(&out_path))
        .map_err(|e| {
            HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": out_path }))
        })?;
    tracing::info!(path = %out_path, sha256 = %export.db_sha256, "workspace exported");
    Ok(json!({
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256,
    }))
}

fn import_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let in_path = required_str(&req.params, "inPath")?;
    let workspace = state.workspace.clone().ok_or_else(HandlerErr::no_workspace)?;
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path })));
    }

    // Release the handle before the database file is replaced.
    state.db = None;
    let imported = backup::import_workspace_bundle(&src, &workspace.join(DB_FILE_NAME));

    // Reopen whatever is on disk now, whether or not the import went through.
    let reopened = db::open_db(&workspace);
    let import = imported.map_err(|e| {
        tracing::error!(path = %in_path, error = %e, "workspace import failed");
        HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": in_path }))
    });
    match reopened {
        Ok(conn) => state.db = Some(conn),
        Err(e) => {
            state.workspace = None;
            return Err(HandlerErr::new("db_open_failed", format!("{e:#}")));
        }
    }
    let import = import?;

    tracing::info!(path = %in_path, format = %import.bundle_format_detected, "workspace imported");
    Ok(json!({
        "path": in_path,
        "bundleFormatDetected": import.bundle_format_detected,
        "workspacePath": workspace.to_string_lossy(),
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Session>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export_bundle(state, req),
        "backup.importWorkspaceBundle" => import_bundle(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
