use crate::config::DEFAULT_MARKS_PER_SUBJECT;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, db_conn, optional_f64, required_f64, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::Exam;
use crate::session::Session;
use crate::store;
use crate::validate::{self, FieldError};
use rusqlite::Connection;
use serde_json::{json, Value};

fn teaches_class(conn: &Connection, teacher_id: &str, class_id: &str) -> Result<bool, HandlerErr> {
    let is_owner = store::mapping_for_class(conn, class_id)
        .map_err(HandlerErr::query)?
        .is_some_and(|m| m.teacher_id == teacher_id);
    if is_owner {
        return Ok(true);
    }
    let timetable = store::timetable_get(conn, class_id).map_err(HandlerErr::query)?;
    Ok(timetable.is_some_and(|tt| tt.entries.iter().any(|e| e.teacher_id == teacher_id)))
}

fn marks_set(conn: &Connection, session: &Session, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let exam_id = required_str(params, "examId")?;
    let subject = validate::required_text("subject", &required_str(params, "subject")?)?;
    let score = required_f64(params, "score")?;

    let student = store::student_get(conn, &student_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("student", &student_id))?;
    let exam = store::get::<Exam>(conn, &exam_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("exam", &exam_id))?;
    if exam.class_id != student.class_id {
        return Err(FieldError::new("examId", "exam belongs to a different class").into());
    }

    if !session.is_admin() {
        let allowed = match session.teacher_id.as_deref() {
            Some(tid) => teaches_class(conn, tid, &student.class_id)?,
            None => false,
        };
        if !allowed {
            return Err(HandlerErr::forbidden(
                "only an admin or a teacher of this class can enter marks",
            ));
        }
    }

    let default_total = exam
        .total_marks
        .map(|t| t as f64)
        .unwrap_or(DEFAULT_MARKS_PER_SUBJECT);
    let total = optional_f64(params, "total")?.unwrap_or(default_total);
    let (score, total) = validate::score(score, total)?;

    store::marks_set(conn, &student_id, &exam_id, &subject, score, total)
        .map_err(HandlerErr::write)?;
    tracing::info!(student_id = %student_id, exam_id = %exam_id, subject = %subject, score, "marks recorded");
    Ok(json!({
        "studentId": student_id,
        "examId": exam_id,
        "subject": subject,
        "score": score,
        "total": total,
    }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    session: Option<&Session>,
) -> Option<serde_json::Value> {
    if req.method != "marks.set" {
        return None;
    }
    let result =
        caller(session).and_then(|s| db_conn(state).and_then(|c| marks_set(c, s, &req.params)));
    Some(respond(req, result))
}
