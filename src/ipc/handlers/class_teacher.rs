use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db_conn, degraded_read, required_str, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle;
use crate::model::ClassTeacherMapping;
use crate::session::Session;
use crate::store;
use rusqlite::Connection;
use serde_json::{json, Value};

fn mappings_list(conn: &Connection) -> Result<Value, HandlerErr> {
    let mappings = store::all::<ClassTeacherMapping>(conn).map_err(HandlerErr::query)?;
    Ok(json!({ "mappings": to_json(&mappings)? }))
}

fn mapping_assign(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let teacher_id = required_str(params, "teacherId")?;
    let (mapping, report) = lifecycle::assign_class_teacher(conn, &class_id, &teacher_id)?;
    Ok(json!({ "mapping": to_json(&mapping)?, "steps": report.steps }))
}

fn mapping_unassign(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let report = lifecycle::unassign_class_teacher(conn, &class_id)?;
    Ok(json!({ "classId": class_id, "steps": report.steps }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Session>,
) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "classTeacher.list" => {
            return Some(degraded_read(state, req, json!({ "mappings": [] }), mappings_list))
        }
        "classTeacher.assign" => db_conn(state).and_then(|c| mapping_assign(c, p)),
        "classTeacher.unassign" => db_conn(state).and_then(|c| mapping_unassign(c, p)),
        _ => return None,
    };
    Some(respond(req, result))
}
