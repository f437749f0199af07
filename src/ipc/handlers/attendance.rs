use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, db_conn, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::ClassRoom;
use crate::session::Session;
use crate::store;
use crate::validate;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;

fn ensure_can_mark(conn: &Connection, session: &Session, class_id: &str) -> Result<(), HandlerErr> {
    if session.is_admin() {
        return Ok(());
    }
    let owner = store::mapping_for_class(conn, class_id)
        .map_err(HandlerErr::query)?
        .map(|m| m.teacher_id);
    match (owner.as_deref(), session.teacher_id.as_deref()) {
        (Some(owner), Some(me)) if owner == me => Ok(()),
        _ => Err(HandlerErr::forbidden(
            "only the class teacher or an admin can mark attendance for this class",
        )),
    }
}

fn present_map(params: &Value) -> Result<HashMap<String, bool>, HandlerErr> {
    let Some(obj) = params.get("present").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing present object"));
    };
    obj.iter()
        .map(|(k, v)| match v {
            Value::Bool(b) => Ok((k.clone(), *b)),
            _ => Err(HandlerErr::bad_params(format!("present.{} must be a boolean", k))),
        })
        .collect()
}

fn attendance_set(
    conn: &Connection,
    session: &Session,
    params: &Value,
) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = validate::iso_date("date", &required_str(params, "date")?)?;
    let present = present_map(params)?;
    if !store::exists::<ClassRoom>(conn, &class_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("class", &class_id));
    }
    ensure_can_mark(conn, session, &class_id)?;

    let students = store::students_in_class(conn, &class_id).map_err(HandlerErr::query)?;
    let mut ignored: Vec<&String> = present
        .keys()
        .filter(|sid| !students.iter().any(|s| &s.id == *sid))
        .collect();
    ignored.sort();

    let tx = conn.unchecked_transaction().map_err(HandlerErr::write)?;
    for s in &students {
        let is_present = present.get(&s.id).copied().unwrap_or(false);
        store::attendance_set(&tx, &s.id, &date, is_present).map_err(HandlerErr::write)?;
    }
    tx.commit().map_err(HandlerErr::write)?;

    tracing::info!(
        class_id = %class_id,
        date = %date,
        updated = students.len(),
        ignored = ignored.len(),
        "attendance recorded"
    );
    Ok(json!({
        "classId": class_id,
        "date": date,
        "updated": students.len(),
        "ignored": ignored,
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    session: Option<&Session>,
) -> Option<serde_json::Value> {
    if req.method != "attendance.set" {
        return None;
    }
    let result = caller(session)
        .and_then(|s| db_conn(state).and_then(|c| attendance_set(c, s, &req.params)));
    Some(respond(req, result))
}
