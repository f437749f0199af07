use crate::ids;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    db_conn, degraded_read, optional_f64, optional_i64, optional_str, parse_params, required_str,
    respond, to_json,
};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle::{self, ClassDeleteOptions};
use crate::model::{ClassRoom, LegacyClassFees, Student};
use crate::session::Session;
use crate::store;
use crate::validate::{self, FieldError};
use serde_json::json;
use std::collections::HashMap;

fn classes_list(conn: &rusqlite::Connection) -> Result<serde_json::Value, HandlerErr> {
    let classes = store::all::<ClassRoom>(conn).map_err(HandlerErr::query)?;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for s in store::all::<Student>(conn).map_err(HandlerErr::query)? {
        *counts.entry(s.class_id).or_default() += 1;
    }
    let rows = classes
        .into_iter()
        .map(|c| {
            let student_count = counts.get(&c.id).copied().unwrap_or(0);
            let mut v = to_json(&c)?;
            v["label"] = json!(c.label());
            v["studentCount"] = json!(student_count);
            Ok(v)
        })
        .collect::<Result<Vec<_>, HandlerErr>>()?;
    Ok(json!({ "classes": rows }))
}

fn classes_create(conn: &rusqlite::Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let raw_name = required_str(params, "name")?;
    let name = validate::class_name("name", &raw_name)?;
    let section = validate::section("section", optional_str(params, "section")?.as_deref())?;
    let max_strength = optional_i64(params, "maxStrength")?;
    if matches!(max_strength, Some(n) if n < 0) {
        return Err(FieldError::new("maxStrength", "must be a non-negative integer").into());
    }

    let class = ClassRoom {
        id: ids::class_id(&name, &section),
        name,
        section,
        academic_year: optional_str(params, "academicYear")?,
        max_strength,
        subjects: Vec::new(),
        fees: LegacyClassFees::default(),
    };
    store::class_upsert(conn, &class).map_err(HandlerErr::write)?;
    tracing::info!(class_id = %class.id, "class saved");

    let saved = store::get::<ClassRoom>(conn, &class.id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("class", &class.id))?;
    Ok(json!({ "classId": saved.id, "class": to_json(&saved)? }))
}

fn classes_delete(conn: &rusqlite::Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let opts: ClassDeleteOptions = match params.get("options") {
        Some(o) => parse_params(o)?,
        None => parse_params(params)?,
    };
    let report = lifecycle::delete_class(conn, &class_id, &opts)?;
    Ok(json!({ "classId": class_id, "steps": report.steps }))
}

fn require_class(conn: &rusqlite::Connection, class_id: &str) -> Result<ClassRoom, HandlerErr> {
    store::get::<ClassRoom>(conn, class_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("class", class_id))
}

fn legacy_amount(fees: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match optional_f64(fees, key)? {
        Some(v) => Ok(Some(validate::non_negative_amount(&format!("fees.{}", key), v)?)),
        None => Ok(None),
    }
}

fn classes_set_legacy_fees(conn: &rusqlite::Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let fees = params
        .get("fees")
        .filter(|v| v.is_object())
        .ok_or_else(|| HandlerErr::bad_params("missing fees object"))?;
    require_class(conn, &class_id)?;
    let legacy = LegacyClassFees {
        exam: legacy_amount(fees, "exam")?,
        admission: legacy_amount(fees, "admission")?,
        term: legacy_amount(fees, "term")?,
        utilities: legacy_amount(fees, "utilities")?,
    };
    store::class_set_legacy_fees(conn, &class_id, &legacy).map_err(HandlerErr::write)?;
    Ok(json!({ "classId": class_id, "fees": to_json(&legacy)? }))
}

fn classes_add_legacy_subject(conn: &rusqlite::Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = required_str(params, "classId")?;
    let name = validate::required_text("name", &required_str(params, "name")?)?;
    let mut class = require_class(conn, &class_id)?;
    if !class.subjects.contains(&name) {
        class.subjects.push(name);
        store::class_set_legacy_subjects(conn, &class_id, &class.subjects).map_err(HandlerErr::write)?;
    }
    Ok(json!({ "classId": class_id, "subjects": class.subjects }))
}

fn migrate_legacy(conn: &rusqlite::Connection) -> Result<serde_json::Value, HandlerErr> {
    let report = lifecycle::migrate_legacy(conn)?;
    tracing::info!(steps = report.steps.len(), "legacy class data migrated");
    Ok(json!({ "message": "Migration completed successfully", "steps": report.steps }))
}

pub fn try_handle(
    state: &mut AppState,
    req: &Request,
    _caller: Option<&Session>,
) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "classes.list" => {
            return Some(degraded_read(state, req, json!({ "classes": [] }), classes_list))
        }
        "classes.create" => db_conn(state).and_then(|c| classes_create(c, p)),
        "classes.delete" => db_conn(state).and_then(|c| classes_delete(c, p)),
        "classes.setLegacyFees" => db_conn(state).and_then(|c| classes_set_legacy_fees(c, p)),
        "classes.addLegacySubject" => db_conn(state).and_then(|c| classes_add_legacy_subject(c, p)),
        "migrate.legacy" => db_conn(state).and_then(migrate_legacy),
        _ => return None,
    };
    Some(respond(req, result))
}
