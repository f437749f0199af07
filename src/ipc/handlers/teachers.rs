use crate::ids;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    db_conn, degraded_read, optional_bool, optional_str, required_str, respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle::{self, CascadeReport};
use crate::model::{ClassRoom, Gender, Teacher};
use crate::session::{self, Session};
use crate::store;
use crate::validate::{self, FieldError};
use rusqlite::Connection;
use serde_json::{json, Value};

fn string_array(params: &Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an array of strings", key)))
            })
            .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an array", key))),
    }
}

fn load_teacher(conn: &Connection, teacher_id: &str) -> Result<Teacher, HandlerErr> {
    store::teacher_get(conn, teacher_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("teacher", teacher_id))
}

fn apply_profile(params: &Value, mut t: Teacher) -> Result<Teacher, HandlerErr> {
    if let Some(name) = optional_str(params, "name")? {
        t.name = validate::person_name("name", &name)?;
    }
    if let Some(g) = optional_str(params, "gender")? {
        t.gender = Some(validate::enumeration::<Gender>("gender", &g)?);
    }
    if let Some(dob) = optional_str(params, "dob")? {
        t.dob = Some(validate::iso_date("dob", &dob)?);
    }
    if let Some(q) = optional_str(params, "qualification")? {
        t.qualification = Some(q);
    }
    if let Some(expertise) = string_array(params, "expertise")? {
        t.expertise = expertise;
    }
    if let Some(subject) = optional_str(params, "subject")? {
        t.subject = Some(subject);
    }
    if params.get("contactNumber").is_some() {
        t.contact_number =
            validate::phone("contactNumber", optional_str(params, "contactNumber")?.as_deref())?;
    }
    if params.get("email").is_some() {
        t.email = validate::email("email", optional_str(params, "email")?.as_deref())?;
    }
    if let Some(address) = optional_str(params, "address")? {
        t.address = Some(address);
    }
    Ok(t)
}

fn check_class_role(conn: &Connection, params: &Value, current: Option<&str>) -> Result<(), HandlerErr> {
    if optional_bool(params, "isClassTeacher")? != Some(true) {
        return Ok(());
    }
    let class_id = optional_str(params, "classId")?
        .or_else(|| current.map(str::to_string))
        .ok_or_else(|| FieldError::new("classId", "required when isClassTeacher is true"))?;
    if !store::exists::<ClassRoom>(conn, &class_id).map_err(HandlerErr::query)? {
        return Err(HandlerErr::not_found("class", &class_id));
    }
    Ok(())
}

fn apply_class_role(
    conn: &Connection,
    params: &Value,
    teacher: &Teacher,
) -> Result<Option<CascadeReport>, HandlerErr> {
    let Some(is_class_teacher) = optional_bool(params, "isClassTeacher")? else {
        return Ok(None);
    };
    if is_class_teacher {
        let class_id = optional_str(params, "classId")?
            .or_else(|| teacher.class_id.clone())
            .ok_or_else(|| FieldError::new("classId", "required when isClassTeacher is true"))?;
        let (_, report) = lifecycle::assign_class_teacher(conn, &class_id, &teacher.id)?;
        return Ok(Some(report));
    }
    match &teacher.class_id {
        Some(class_id) => Ok(Some(lifecycle::unassign_class_teacher(conn, class_id)?)),
        None => Ok(None),
    }
}

fn teachers_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = optional_str(params, "classId")?;
    let subject = optional_str(params, "subject")?;
    let is_class_teacher = optional_bool(params, "isClassTeacher")?;
    let mut teachers = store::teachers_all(conn).map_err(HandlerErr::query)?;
    teachers.retain(|t| {
        class_id.as_ref().map_or(true, |c| t.class_id.as_ref() == Some(c))
            && subject.as_ref().map_or(true, |s| {
                t.subject.as_ref() == Some(s) || t.expertise.contains(s)
            })
            && is_class_teacher.map_or(true, |f| t.is_class_teacher == f)
    });
    Ok(json!({ "teachers": to_json(&teachers)? }))
}

fn teachers_get(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_str(params, "teacherId")?;
    let teacher = load_teacher(conn, &teacher_id)?;
    Ok(json!({ "teacher": to_json(&teacher)? }))
}

fn teachers_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let id = match optional_str(params, "id")? {
        Some(id) => id,
        None => ids::teacher_id(ids::next_stamp()),
    };
    if store::exists::<Teacher>(conn, &id).map_err(HandlerErr::query)? {
        return Err(FieldError::new("id", "a teacher with this id already exists").into());
    }
    let password = optional_str(params, "password")?.unwrap_or_else(ids::generate_password);
    let password_hash =
        session::hash_password(&password).map_err(|e| HandlerErr::new("internal", e.to_string()))?;

    let name = validate::person_name("name", &required_str(params, "name")?)?;
    let blank = Teacher {
        id,
        name,
        gender: None,
        dob: None,
        qualification: None,
        expertise: Vec::new(),
        subject: None,
        contact_number: None,
        email: None,
        address: None,
        password_hash,
        is_class_teacher: false,
        class_id: None,
    };
    let teacher = apply_profile(params, blank)?;
    check_class_role(conn, params, None)?;

    let tx = conn.unchecked_transaction().map_err(HandlerErr::write)?;
    store::teacher_upsert(&tx, &teacher).map_err(HandlerErr::write)?;
    tx.commit().map_err(HandlerErr::write)?;
    tracing::info!(teacher_id = %teacher.id, "teacher created");

    apply_class_role(conn, params, &teacher)?;
    let saved = load_teacher(conn, &teacher.id)?;
    Ok(json!({ "teacher": to_json(&saved)?, "password": password }))
}

fn teachers_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_str(params, "teacherId")?;
    let current = load_teacher(conn, &teacher_id)?;
    let mut teacher = apply_profile(params, current)?;
    check_class_role(conn, params, teacher.class_id.as_deref())?;
    if let Some(password) = optional_str(params, "password")? {
        teacher.password_hash = session::hash_password(&password)
            .map_err(|e| HandlerErr::new("internal", e.to_string()))?;
    }
    store::teacher_upsert(conn, &teacher).map_err(HandlerErr::write)?;
    let report = apply_class_role(conn, params, &teacher)?;
    tracing::info!(teacher_id = %teacher_id, "teacher updated");

    let saved = load_teacher(conn, &teacher_id)?;
    let steps = report.map(|r| r.steps).unwrap_or_default();
    Ok(json!({ "teacher": to_json(&saved)?, "steps": steps }))
}

fn teachers_unassign(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_str(params, "teacherId")?;
    let report = lifecycle::unassign_teacher(conn, &teacher_id)?;
    Ok(json!({ "teacherId": teacher_id, "steps": report.steps }))
}

fn teachers_reassign_subjects(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_str(params, "teacherId")?;
    let to = required_str(params, "toTeacherId")?;
    let report = lifecycle::reassign_teacher_subjects(conn, &teacher_id, &to)?;
    Ok(json!({ "teacherId": teacher_id, "toTeacherId": to, "steps": report.steps }))
}

fn teachers_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let teacher_id = required_str(params, "teacherId")?;
    let reassign_to = optional_str(params, "reassignTo")?;
    let report = lifecycle::delete_teacher(conn, &teacher_id, reassign_to.as_deref())?;
    Ok(json!({ "teacherId": teacher_id, "steps": report.steps }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Session>,
) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "teachers.list" => {
            return Some(degraded_read(state, req, json!({ "teachers": [] }), |c| {
                teachers_list(c, p)
            }))
        }
        "teachers.get" => db_conn(state).and_then(|c| teachers_get(c, p)),
        "teachers.create" => db_conn(state).and_then(|c| teachers_create(c, p)),
        "teachers.update" => db_conn(state).and_then(|c| teachers_update(c, p)),
        "teachers.unassign" => db_conn(state).and_then(|c| teachers_unassign(c, p)),
        "teachers.reassignSubjects" => db_conn(state).and_then(|c| teachers_reassign_subjects(c, p)),
        "teachers.delete" => db_conn(state).and_then(|c| teachers_delete(c, p)),
        _ => return None,
    };
    Some(respond(req, result))
}
