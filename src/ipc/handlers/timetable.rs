use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    caller, db_conn, degraded_read, optional_str, parse_params, required_str, respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassRoom, ClassTimetable, Teacher, TimetableEntry};
use crate::session::Session;
use crate::store;
use crate::validate::{self, FieldError};
use crate::views;
use rusqlite::Connection;
use serde_json::{json, Value};

pub(super) fn scoped_teacher_id(session: &Session, params: &Value) -> Result<String, HandlerErr> {
    let requested = optional_str(params, "teacherId")?;
    let teacher_id = requested
        .or_else(|| session.teacher_id.clone())
        .ok_or_else(|| HandlerErr::bad_params("missing teacherId"))?;
    if !session.acts_for(&teacher_id) {
        return Err(HandlerErr::forbidden("teachers can only view their own schedule"));
    }
    Ok(teacher_id)
}

fn timetable_list(conn: &Connection) -> Result<Value, HandlerErr> {
    let timetables = store::timetables_all(conn).map_err(HandlerErr::query)?;
    Ok(json!({ "timetables": to_json(&timetables)? }))
}

fn empty_timetable(class_id: &str) -> ClassTimetable {
    ClassTimetable {
        class_id: class_id.to_string(),
        academic_year: None,
        entries: Vec::new(),
    }
}

fn timetable_get(conn: &Connection, class_id: &str) -> Result<Value, HandlerErr> {
    let timetable = store::timetable_get(conn, class_id)
        .map_err(HandlerErr::query)?
        .unwrap_or_else(|| empty_timetable(class_id));
    Ok(json!({ "timetable": to_json(&timetable)? }))
}

fn timetable_set(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    if !store::exists::<ClassRoom>(conn, &class_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("class", &class_id));
    }
    let academic_year = optional_str(params, "academicYear")?;
    let raw: Vec<TimetableEntry> = match params.get("entries") {
        Some(v) if v.is_array() => parse_params(v)?,
        _ => return Err(HandlerErr::bad_params("missing entries array")),
    };

    let mut entries = Vec::with_capacity(raw.len());
    for (i, e) in raw.iter().enumerate() {
        let entry = validate::timetable_entry(i, e)?;
        if !store::exists::<Teacher>(conn, &entry.teacher_id).map_err(HandlerErr::query)? {
            return Err(FieldError::new(
                &format!("entries[{}].teacherId", i),
                "teacher does not exist",
            )
            .into());
        }
        entries.push(entry);
    }

    let tx = conn.unchecked_transaction().map_err(HandlerErr::write)?;
    store::timetable_replace(&tx, &class_id, academic_year.as_deref(), &entries)
        .map_err(HandlerErr::write)?;
    tx.commit().map_err(HandlerErr::write)?;
    tracing::info!(class_id = %class_id, entries = entries.len(), "timetable saved");

    let timetable = ClassTimetable {
        class_id,
        academic_year,
        entries,
    };
    Ok(json!({ "timetable": to_json(&timetable)? }))
}

fn timetable_teacher(conn: &Connection, teacher_id: &str) -> Result<Value, HandlerErr> {
    let timetables = store::timetables_all(conn).map_err(HandlerErr::query)?;
    let slots = views::teacher_timetable(&timetables, teacher_id);
    Ok(json!({ "teacherId": teacher_id, "slots": to_json(&slots)? }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    session: Option<&Session>,
) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "timetable.list" => {
            return Some(degraded_read(state, req, json!({ "timetables": [] }), timetable_list))
        }
        "timetable.get" => {
            let class_id = match required_str(p, "classId") {
                Ok(c) => c,
                Err(e) => return Some(e.response(&req.id)),
            };
            let empty = json!({
                "timetable": to_json(&empty_timetable(&class_id)).unwrap_or_default()
            });
            return Some(degraded_read(state, req, empty, |c| timetable_get(c, &class_id)));
        }
        "timetable.set" => db_conn(state).and_then(|c| timetable_set(c, p)),
        "timetable.teacher" => {
            let teacher_id = match caller(session).and_then(|s| scoped_teacher_id(s, p)) {
                Ok(t) => t,
                Err(e) => return Some(e.response(&req.id)),
            };
            let empty = json!({ "teacherId": teacher_id, "slots": [] });
            return Some(degraded_read(state, req, empty, |c| {
                timetable_teacher(c, &teacher_id)
            }));
        }
        _ => return None,
    };
    Some(respond(req, result))
}
