use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    caller, db_conn, degraded_read, optional_bool, optional_str, required_str, respond, to_json,
    today,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Audience, Notice};
use crate::session::Session;
use crate::store;
use crate::validate::{self, FieldError};
use crate::views;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn notices_list(conn: &Connection, session: &Session) -> Result<Value, HandlerErr> {
    let all = store::all::<Notice>(conn).map_err(HandlerErr::query)?;
    let visible = views::visible_notices(&all, &today(), session.role);
    Ok(json!({ "notices": to_json(&visible)? }))
}

fn notices_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let title = validate::notice_title(&required_str(params, "title")?)?;
    let message = validate::notice_message(&required_str(params, "message")?)?;
    let event_date =
        validate::optional_iso_date("eventDate", optional_str(params, "eventDate")?.as_deref())?;
    let expiry_date =
        validate::optional_iso_date("expiryDate", optional_str(params, "expiryDate")?.as_deref())?;
    if let (Some(event), Some(expiry)) = (&event_date, &expiry_date) {
        if expiry < event {
            return Err(FieldError::new("expiryDate", "must not be before eventDate").into());
        }
    }
    let audience = match optional_str(params, "audience")? {
        Some(a) => validate::enumeration::<Audience>("audience", &a)?,
        None => Audience::Both,
    };
    let notice = Notice {
        id: Uuid::new_v4().to_string(),
        title,
        message,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        active: optional_bool(params, "active")?.unwrap_or(true),
        audience,
        event_date,
        expiry_date,
    };
    store::notice_insert(conn, &notice).map_err(HandlerErr::write)?;
    tracing::info!(notice_id = %notice.id, %audience, "notice posted");
    Ok(json!({ "notice": to_json(&notice)? }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    session: Option<&Session>,
) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notices.list" => {
            let s = match caller(session) {
                Ok(s) => s,
                Err(e) => return Some(e.response(&req.id)),
            };
            return Some(degraded_read(state, req, json!({ "notices": [] }), |c| {
                notices_list(c, s)
            }));
        }
        "notices.create" => db_conn(state).and_then(|c| notices_create(c, &req.params)),
        _ => return None,
    };
    Some(respond(req, result))
}
