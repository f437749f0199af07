use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::HandlerErr;
use crate::model::{Role, Teacher};
use crate::session::{self, Access, Session};
use crate::store;

/// Resolves the caller for `req` and enforces the method's access level.
fn gate(state: &mut AppState, req: &Request) -> Result<Option<Session>, HandlerErr> {
    let Some(access) = session::required_access(&req.method) else {
        return Err(HandlerErr::new(
            "not_implemented",
            format!("unknown method: {}", req.method),
        ));
    };
    if access == Access::Public {
        return Ok(None);
    }

    let token = req
        .token
        .as_deref()
        .ok_or_else(|| HandlerErr::unauthorized("missing session token"))?;
    let session = state
        .sessions
        .get(token)
        .cloned()
        .ok_or_else(|| HandlerErr::unauthorized("unknown or expired session"))?;

    if session.role == Role::Teacher {
        if let (Some(tid), Some(conn)) = (session.teacher_id.as_deref(), state.db.as_ref()) {
            let still_there = store::exists::<Teacher>(conn, tid).unwrap_or(true);
            if !still_there {
                state.sessions.close(token);
                return Err(HandlerErr::unauthorized("teacher account no longer exists"));
            }
        }
    }

    if access == Access::Admin && !session.is_admin() {
        return Err(HandlerErr::forbidden(format!(
            "{} requires the admin role",
            req.method
        )));
    }
    Ok(Some(session))
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    let caller = match gate(state, &req) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, "request rejected");
            return e.response(&req.id);
        }
    };
    let caller = caller.as_ref();

    let routes: &[handlers::Route] = &[
        handlers::core::try_handle,
        handlers::auth::try_handle,
        handlers::classes::try_handle,
        handlers::students::try_handle,
        handlers::teachers::try_handle,
        handlers::class_teacher::try_handle,
        handlers::catalog::try_handle,
        handlers::attendance::try_handle,
        handlers::marks::try_handle,
        handlers::notices::try_handle,
        handlers::timetable::try_handle,
        handlers::views::try_handle,
        handlers::backup::try_handle,
    ];
    for route in routes {
        if let Some(resp) = route(state, &req, caller) {
            return resp;
        }
    }

    HandlerErr::new(
        "not_implemented",
        format!("unknown method: {}", req.method),
    )
    .response(&req.id)
}
