//! Per-class catalogue collections: subjects, fee schedules and exams.

use crate::ids;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    db_conn, degraded_read, optional_str, required_f64, required_i64, required_str,
    respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassRoom, Exam, Fee, FeeGender, FeeType, Subject, SubjectType};
use crate::session::Session;
use crate::store::{self, Record};
use crate::validate::{self, FieldError};
use rusqlite::Connection;
use serde_json::{json, Value};

fn list_for_class<T: Record>(conn: &Connection, params: &Value) -> Result<Vec<T>, HandlerErr> {
    match optional_str(params, "classId")? {
        Some(class_id) => store::all_where::<T>(conn, "class_id", &class_id),
        None => store::all::<T>(conn),
    }
    .map_err(HandlerErr::query)
}

fn require_class_field(conn: &Connection, class_id: &str) -> Result<(), HandlerErr> {
    if store::exists::<ClassRoom>(conn, class_id).map_err(HandlerErr::query)? {
        Ok(())
    } else {
        Err(FieldError::new("classId", "class does not exist").into())
    }
}

fn subjects_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = validate::required_text("name", &required_str(params, "name")?)?;
    let class_id = required_str(params, "classId")?;
    require_class_field(conn, &class_id)?;
    let subject_type = match optional_str(params, "type")? {
        Some(t) => validate::enumeration::<SubjectType>("type", &t)?,
        None => SubjectType::Core,
    };
    let code = optional_str(params, "code")?.unwrap_or_else(|| ids::subject_code(&name));
    let subject = Subject {
        id: ids::subject_id(&class_id, &name),
        name,
        code,
        subject_type,
        class_id,
    };
    store::subject_upsert(conn, &subject).map_err(HandlerErr::write)?;
    tracing::info!(subject_id = %subject.id, "subject saved");
    Ok(json!({ "subject": to_json(&subject)? }))
}

fn fees_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    require_class_field(conn, &class_id)?;
    let fee_type: FeeType = validate::enumeration("type", &required_str(params, "type")?)?;
    let amount = validate::non_negative_amount("amount", required_f64(params, "amount")?)?;
    let applicable_gender = match optional_str(params, "applicableGender")? {
        Some(g) => validate::enumeration::<FeeGender>("applicableGender", &g)?,
        None => FeeGender::Male,
    };
    let due_date = validate::optional_iso_date("dueDate", optional_str(params, "dueDate")?.as_deref())?;
    let fee = Fee {
        id: ids::fee_id(&class_id, fee_type),
        class_id,
        fee_type,
        amount,
        applicable_gender,
        due_date,
    };
    store::fee_upsert(conn, &fee).map_err(HandlerErr::write)?;
    tracing::info!(fee_id = %fee.id, amount, "fee saved");
    Ok(json!({ "fee": to_json(&fee)? }))
}

fn exams_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    require_class_field(conn, &class_id)?;
    let name = validate::required_text("name", &required_str(params, "name")?)?;
    let (total_marks, passing_marks) = validate::exam_marks(
        required_i64(params, "totalMarks")?,
        required_i64(params, "passingMarks")?,
    )?;
    let start_date =
        validate::optional_iso_date("startDate", optional_str(params, "startDate")?.as_deref())?;
    let end_date = validate::optional_iso_date("endDate", optional_str(params, "endDate")?.as_deref())?;
    if let (Some(start), Some(end)) = (&start_date, &end_date) {
        if end < start {
            return Err(FieldError::new("endDate", "must not be before startDate").into());
        }
    }
    let exam = Exam {
        id: ids::exam_id(&class_id, ids::next_stamp()),
        class_id,
        name,
        total_marks: Some(total_marks),
        passing_marks: Some(passing_marks),
        start_date,
        end_date,
    };
    store::exam_insert(conn, &exam).map_err(HandlerErr::write)?;
    tracing::info!(exam_id = %exam.id, "exam created");
    Ok(json!({ "exam": to_json(&exam)? }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Session>,
) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "subjects.list" => {
            return Some(degraded_read(state, req, json!({ "subjects": [] }), |c| {
                Ok(json!({ "subjects": to_json(&list_for_class::<Subject>(c, p)?)? }))
            }))
        }
        "fees.list" => {
            return Some(degraded_read(state, req, json!({ "fees": [] }), |c| {
                Ok(json!({ "fees": to_json(&list_for_class::<Fee>(c, p)?)? }))
            }))
        }
        "exams.list" => {
            return Some(degraded_read(state, req, json!({ "exams": [] }), |c| {
                Ok(json!({ "exams": to_json(&list_for_class::<Exam>(c, p)?)? }))
            }))
        }
        "subjects.create" => db_conn(state).and_then(|c| subjects_create(c, p)),
        "fees.upsert" => db_conn(state).and_then(|c| fees_upsert(c, p)),
        "exams.create" => db_conn(state).and_then(|c| exams_create(c, p)),
        _ => return None,
    };
    Some(respond(req, result))
}
