use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, respond, required_str};
use crate::ipc::types::{AppState, Request};
use crate::session::{self, LoginError, Session};
use serde_json::json;

fn auth_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let username = required_str(&req.params, "username")?;
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?;

    let session = session::login(state.db.as_ref(), &state.config, &username, password)
        .map_err(|e| match e {
            LoginError::InvalidCredentials => {
                HandlerErr::unauthorized("invalid username or password")
            }
            LoginError::NoWorkspace => HandlerErr::no_workspace(),
            LoginError::Db(source) => HandlerErr::query(source),
        })
        .map_err(|e| {
            tracing::warn!(username = %username, code = e.code, "login rejected");
            e
        })?;

    let role = session.role;
    let teacher_id = session.teacher_id.clone();
    let token = state.sessions.open(session);
    tracing::info!(%role, sessions = state.sessions.len(), "signed in");
    Ok(json!({
        "token": token,
        "role": role,
        "teacherId": teacher_id,
    }))
}

fn auth_logout(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let closed = req
        .token
        .as_deref()
        .map(|t| state.sessions.close(t))
        .unwrap_or(false);
    Ok(json!({ "loggedOut": closed }))
}

fn auth_session(session: Option<&Session>) -> Result<serde_json::Value, HandlerErr> {
    let s = caller(session)?;
    Ok(json!({
        "role": s.role,
        "teacherId": s.teacher_id,
        "createdAt": s.created_at,
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    session: Option<&Session>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => auth_login(state, req),
        "auth.logout" => auth_logout(state, req),
        "auth.session" => auth_session(session),
        _ => return None,
    };
    Some(respond(req, result))
}
