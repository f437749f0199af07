use crate::db;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{degraded_read, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::Snapshot;
use crate::session::Session;
use crate::store;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    // Teacher sessions are bound to the workspace they logged into.
    if state.workspace.as_ref() != Some(&path) {
        let closed = state.sessions.close_teachers();
        if closed > 0 {
            tracing::info!(closed, "teacher sessions closed on workspace switch");
        }
    }

    // Release the old handle before opening another workspace.
    state.db = None;
    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            state.workspace = None;
            tracing::error!(path = %path.display(), error = %e, "failed to open workspace");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_data_snapshot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let empty = to_json(&Snapshot::default()).unwrap_or_default();
    degraded_read(state, req, empty, |conn| {
        let snapshot = store::load_snapshot(conn).map_err(HandlerErr::query)?;
        to_json(&snapshot)
    })
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Session>,
) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "data.snapshot" => Some(handle_data_snapshot(state, req)),
        _ => None,
    }
}
