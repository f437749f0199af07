use crate::ids;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    db_conn, degraded_read, optional_bool, optional_str, required_str, respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle;
use crate::model::{ClassRoom, FeeType, Gender, Student};
use crate::session::Session;
use crate::store;
use crate::validate::{self, FieldError};
use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = optional_str(params, "classId")?;
    let section = optional_str(params, "section")?;
    let mut students = match &class_id {
        Some(cid) => store::students_in_class(conn, cid),
        None => store::students_all(conn),
    }
    .map_err(HandlerErr::query)?;
    if let Some(sec) = &section {
        students.retain(|s| s.section.as_deref() == Some(sec.as_str()));
    }
    if class_id.is_some() {
        students.sort_by_key(|s| s.roll_no);
    }
    Ok(json!({ "students": to_json(&students)? }))
}

fn students_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let student = store::student_get(conn, &student_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("student", &student_id))?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = validate::person_name("name", &required_str(params, "name")?)?;
    let gender: Gender = validate::enumeration("gender", &required_str(params, "gender")?)?;
    let class_id = required_str(params, "classId")?;
    if !store::exists::<ClassRoom>(conn, &class_id).map_err(HandlerErr::query)? {
        return Err(FieldError::new("classId", "class does not exist").into());
    }
    let section = optional_str(params, "section")?;
    let section = match section {
        Some(s) => Some(validate::section("section", Some(s.as_str()))?),
        None => None,
    };
    let dob = validate::optional_iso_date("dob", optional_str(params, "dob")?.as_deref())?;
    let guardian_name = match optional_str(params, "guardianName")? {
        Some(g) => Some(validate::person_name("guardianName", &g)?),
        None => None,
    };
    let guardian_phone =
        validate::phone("guardianPhone", optional_str(params, "guardianPhone")?.as_deref())?;
    let email = validate::email("email", optional_str(params, "email")?.as_deref())?;

    let stamp = ids::next_stamp();
    let roll_no =
        store::next_roll_no(conn, &class_id, section.as_deref()).map_err(HandlerErr::query)?;
    let student = Student {
        id: ids::student_id(stamp),
        name,
        gender,
        dob,
        admission_no: ids::admission_no(stamp),
        class_id,
        section,
        roll_no,
        guardian_name,
        guardian_phone,
        address: validate::optional_text(optional_str(params, "address")?.as_deref()),
        email,
        attendance: BTreeMap::new(),
        fees_paid: BTreeMap::new(),
        marks: BTreeMap::new(),
    };
    store::student_insert(conn, &student).map_err(HandlerErr::write)?;
    tracing::info!(student_id = %student.id, class_id = %student.class_id, roll_no, "student created");
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_reassign(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let class_id = required_str(params, "classId")?;
    let student = lifecycle::reassign_student(conn, &student_id, &class_id)?;
    Ok(json!({ "student": to_json(&student)? }))
}

fn students_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let report = lifecycle::delete_student(conn, &student_id)?;
    tracing::info!(student_id = %student_id, "student deleted");
    Ok(json!({ "studentId": student_id, "steps": report.steps }))
}

fn students_set_fee_paid(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let fee_type: FeeType = validate::enumeration("type", &required_str(params, "type")?)?;
    let paid = optional_bool(params, "paid")?.unwrap_or(true);
    if !store::exists::<Student>(conn, &student_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("student", &student_id));
    }
    store::fee_payment_set(conn, &student_id, fee_type, paid).map_err(HandlerErr::write)?;
    tracing::info!(student_id = %student_id, %fee_type, paid, "fee payment recorded");
    Ok(json!({ "studentId": student_id, "type": fee_type, "paid": paid }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Session>,
) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "students.list" => {
            return Some(degraded_read(state, req, json!({ "students": [] }), |c| {
                students_list(c, p)
            }))
        }
        "students.get" => db_conn(state).and_then(|c| students_get(c, p)),
        "students.create" => db_conn(state).and_then(|c| students_create(c, p)),
        "students.reassign" => db_conn(state).and_then(|c| students_reassign(c, p)),
        "students.delete" => db_conn(state).and_then(|c| students_delete(c, p)),
        "students.setFeePaid" => db_conn(state).and_then(|c| students_set_fee_paid(c, p)),
        _ => return None,
    };
    Some(respond(req, result))
}
