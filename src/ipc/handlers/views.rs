use super::timetable::scoped_teacher_id;
use crate::config::TIMETABLE_DAYS;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{caller, degraded_read, optional_str, required_str, respond, to_json};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassRoom, Exam, Fee, Gender, Subject};
use crate::session::Session;
use crate::store;
use crate::validate::{self, FieldError};
use crate::views;
use rusqlite::Connection;
use serde_json::{json, Value};

fn pending_fees(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = optional_str(params, "classId")?;
    let gender = match optional_str(params, "gender")? {
        Some(g) => Some(validate::enumeration::<Gender>("gender", &g)?),
        None => None,
    };
    let mut students = match &class_id {
        Some(cid) => store::students_in_class(conn, cid),
        None => store::students_all(conn),
    }
    .map_err(HandlerErr::query)?;
    if let Some(g) = gender {
        students.retain(|s| s.gender == g);
    }
    let fees = store::all::<Fee>(conn).map_err(HandlerErr::query)?;
    let rows = views::pending_fees(&students, &fees);
    let total_pending: f64 = rows.iter().map(|r| r.pending_amount).sum();
    Ok(json!({ "students": to_json(&rows)?, "totalPending": total_pending }))
}

fn attendance_daily(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let date = validate::iso_date("date", &required_str(params, "date")?)?;
    let students = store::students_in_class(conn, &class_id).map_err(HandlerErr::query)?;
    to_json(&views::attendance_daily(&students, &class_id, &date))
}

fn attendance_summary(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let students = store::students_in_class(conn, &class_id).map_err(HandlerErr::query)?;
    let rows = views::attendance_summary(&students, &class_id);
    Ok(json!({ "classId": class_id, "students": to_json(&rows)? }))
}

fn exam_results(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let exam_id = required_str(params, "examId")?;
    let exam = store::get::<Exam>(conn, &exam_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("exam", &exam_id))?;
    let students = store::students_in_class(conn, &exam.class_id).map_err(HandlerErr::query)?;
    let subjects =
        store::all_where::<Subject>(conn, "class_id", &exam.class_id).map_err(HandlerErr::query)?;
    to_json(&views::exam_results(&students, &subjects, &exam))
}

fn teacher_today(conn: &Connection, teacher_id: &str, day: Option<&str>) -> Result<Value, HandlerErr> {
    let Some(day) = day else {
        return Ok(json!({ "teacherId": teacher_id, "day": null, "classes": [] }));
    };
    let timetables = store::timetables_all(conn).map_err(HandlerErr::query)?;
    let classes = store::all::<ClassRoom>(conn).map_err(HandlerErr::query)?;
    let rows = views::teacher_day(&timetables, &classes, teacher_id, day);
    Ok(json!({ "teacherId": teacher_id, "day": day, "classes": to_json(&rows)? }))
}

fn pending_marks(conn: &Connection, teacher_id: &str) -> Result<Value, HandlerErr> {
    let snapshot = store::load_snapshot(conn).map_err(HandlerErr::query)?;
    let rows = views::pending_marks(&snapshot, teacher_id);
    Ok(json!({ "teacherId": teacher_id, "exams": to_json(&rows)? }))
}

fn requested_day(params: &Value) -> Result<Option<&'static str>, HandlerErr> {
    match optional_str(params, "day")? {
        Some(d) => TIMETABLE_DAYS
            .iter()
            .find(|known| **known == d)
            .copied()
            .map(Some)
            .ok_or_else(|| {
                FieldError::new("day", format!("must be one of {}", TIMETABLE_DAYS.join(", ")))
                    .into()
            }),
        None => Ok(views::today_label()),
    }
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    session: Option<&Session>,
) -> Option<serde_json::Value> {
    let p = &req.params;
    let value = match req.method.as_str() {
        "views.pendingFees" => degraded_read(
            state,
            req,
            json!({ "students": [], "totalPending": 0.0 }),
            |c| pending_fees(c, p),
        ),
        "views.attendanceDaily" => {
            let empty = json!({ "rows": [], "counts": { "present": 0, "absent": 0, "noRecord": 0, "total": 0 } });
            degraded_read(state, req, empty, |c| attendance_daily(c, p))
        }
        "views.attendanceSummary" => {
            degraded_read(state, req, json!({ "students": [] }), |c| attendance_summary(c, p))
        }
        "views.examResults" => {
            let empty = json!({
                "examId": p.get("examId").cloned().unwrap_or(Value::Null),
                "classId": null,
                "subjects": [],
                "passingMarks": null,
                "rows": [],
                "stats": null,
            });
            degraded_read(state, req, empty, |c| exam_results(c, p))
        }
        "views.teacherToday" => {
            let scoped = caller(session)
                .and_then(|s| scoped_teacher_id(s, p))
                .and_then(|tid| requested_day(p).map(|day| (tid, day)));
            let (teacher_id, day) = match scoped {
                Ok(v) => v,
                Err(e) => return Some(respond(req, Err(e))),
            };
            let empty = json!({ "teacherId": teacher_id, "day": day, "classes": [] });
            degraded_read(state, req, empty, |c| teacher_today(c, &teacher_id, day))
        }
        "views.pendingMarks" => {
            let teacher_id = match caller(session).and_then(|s| scoped_teacher_id(s, p)) {
                Ok(t) => t,
                Err(e) => return Some(respond(req, Err(e))),
            };
            let empty = json!({ "teacherId": teacher_id, "exams": [] });
            degraded_read(state, req, empty, |c| pending_marks(c, &teacher_id))
        }
        _ => return None,
    };
    Some(value)
}
