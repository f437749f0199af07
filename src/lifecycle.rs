//! Multi-collection mutations that keep references consistent when a class,
//! student or teacher is removed or moved.
//!
//! Each operation runs inside one SQLite transaction and records an ordered
//! step report. A failing step rolls the whole operation back and is named in
//! the returned error.

use crate::ids;
use crate::model::{
    ClassRoom, ClassTeacherMapping, Exam, Fee, FeeGender, Student, Subject, SubjectType, Teacher,
};
use crate::store;
use crate::validate::FieldError;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Invalid(#[from] FieldError),
    #[error("step {step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl LifecycleError {
    fn not_found(entity: &'static str, id: &str) -> Self {
        LifecycleError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: &'static str,
    pub affected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub steps: Vec<StepOutcome>,
}

impl CascadeReport {
    pub fn affected(&self, step: &str) -> Option<usize> {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.affected)
    }

    fn run(
        &mut self,
        step: &'static str,
        f: impl FnOnce() -> rusqlite::Result<usize>,
    ) -> LifecycleResult<usize> {
        let affected = f().map_err(|source| LifecycleError::Step { step, source })?;
        tracing::info!(step, affected, "cascade step");
        self.steps.push(StepOutcome { step, affected });
        Ok(affected)
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn require_class(conn: &Connection, class_id: &str) -> LifecycleResult<()> {
    if !store::exists::<ClassRoom>(conn, class_id)? {
        return Err(LifecycleError::not_found("class", class_id));
    }
    Ok(())
}

fn require_teacher(conn: &Connection, teacher_id: &str) -> LifecycleResult<()> {
    if !store::exists::<Teacher>(conn, teacher_id)? {
        return Err(LifecycleError::not_found("teacher", teacher_id));
    }
    Ok(())
}

/// Options object of a class deletion, as sent by callers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDeleteOptions {
    #[serde(default)]
    pub reassign_students_to: Option<String>,
    #[serde(default)]
    pub delete_students: bool,
    #[serde(default)]
    pub unassign_teachers: bool,
    #[serde(default)]
    pub delete_teachers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentMode {
    ReassignTo(String),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherMode {
    Unassign,
    Delete,
}

impl ClassDeleteOptions {
    /// Exactly one student mode and exactly one teacher mode must be chosen.
    pub fn resolve(&self, class_id: &str) -> Result<(StudentMode, TeacherMode), FieldError> {
        let target = self
            .reassign_students_to
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let students = match (target, self.delete_students) {
            (Some(_), true) | (None, false) => {
                return Err(FieldError::new(
                    "deleteStudents",
                    "choose exactly one of reassignStudentsTo or deleteStudents",
                ))
            }
            (Some(t), false) if t == class_id => {
                return Err(FieldError::new(
                    "reassignStudentsTo",
                    "must differ from the class being deleted",
                ))
            }
            (Some(t), false) => StudentMode::ReassignTo(t.to_string()),
            (None, true) => StudentMode::Delete,
        };
        let teachers = match (self.unassign_teachers, self.delete_teachers) {
            (true, false) => TeacherMode::Unassign,
            (false, true) => TeacherMode::Delete,
            _ => {
                return Err(FieldError::new(
                    "deleteTeachers",
                    "choose exactly one of unassignTeachers or deleteTeachers",
                ))
            }
        };
        Ok((students, teachers))
    }
}

/// Moves students to the end of the target class roll, preserving their order.
fn reassign_students(
    conn: &Connection,
    students: &[Student],
    target: &str,
) -> rusqlite::Result<usize> {
    let mut roll_no = store::next_roll_no(conn, target, None)?;
    for s in students {
        store::student_set_class(conn, &s.id, target, roll_no)?;
        roll_no += 1;
    }
    Ok(students.len())
}

pub fn delete_class(
    conn: &Connection,
    class_id: &str,
    opts: &ClassDeleteOptions,
) -> LifecycleResult<CascadeReport> {
    require_class(conn, class_id)?;
    let (student_mode, teacher_mode) = opts.resolve(class_id)?;
    if let StudentMode::ReassignTo(target) = &student_mode {
        if !store::exists::<ClassRoom>(conn, target)? {
            return Err(FieldError::new("reassignStudentsTo", "target class does not exist").into());
        }
    }

    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();

    let mut students = store::all_where::<Student>(&tx, "class_id", class_id)?;
    students.sort_by_key(|s| s.roll_no);
    report.run("students", || match &student_mode {
        StudentMode::ReassignTo(target) => reassign_students(&tx, &students, target),
        StudentMode::Delete => {
            for s in &students {
                store::student_delete_with_records(&tx, &s.id)?;
            }
            Ok(students.len())
        }
    })?;

    let teacher_ids: Vec<String> = store::all_where::<Teacher>(&tx, "class_id", class_id)?
        .into_iter()
        .map(|t| t.id)
        .collect();
    report.run("teachers", || {
        for tid in &teacher_ids {
            match teacher_mode {
                TeacherMode::Unassign => store::teacher_set_class(&tx, tid, None)?,
                TeacherMode::Delete => {
                    store::mapping_delete_for_teacher(&tx, tid)?;
                    store::teacher_delete_with_records(&tx, tid)?
                }
            };
        }
        Ok(teacher_ids.len())
    })?;
    if teacher_mode == TeacherMode::Delete {
        report.run("teacherTimetableEntries", || {
            store::timetable_prune_teachers(&tx, &teacher_ids)
        })?;
    }

    report.run("classTeacherMapping", || {
        store::mapping_delete_for_class(&tx, class_id)
    })?;
    report.run("timetable", || store::timetable_delete(&tx, class_id))?;
    report.run("examMarks", || store::exam_marks_delete_for_class(&tx, class_id))?;
    report.run("exams", || store::delete_where::<Exam>(&tx, "class_id", class_id))?;
    report.run("subjects", || {
        store::delete_where::<Subject>(&tx, "class_id", class_id)
    })?;
    report.run("fees", || store::delete_where::<Fee>(&tx, "class_id", class_id))?;
    report.run("class", || store::delete::<ClassRoom>(&tx, class_id))?;

    tx.commit()?;
    tracing::info!(class_id, "class deleted");
    Ok(report)
}

/// Moves one student to another class, appended to that class's roll.
/// Attendance, fee payments and marks travel with the student.
pub fn reassign_student(
    conn: &Connection,
    student_id: &str,
    target_class: &str,
) -> LifecycleResult<Student> {
    let student = store::get::<Student>(conn, student_id)?
        .ok_or_else(|| LifecycleError::not_found("student", student_id))?;
    if !store::exists::<ClassRoom>(conn, target_class)? {
        return Err(FieldError::new("classId", "target class does not exist").into());
    }
    if student.class_id != target_class {
        let tx = conn.unchecked_transaction()?;
        let roll_no = store::next_roll_no(&tx, target_class, None)?;
        store::student_set_class(&tx, student_id, target_class, roll_no)?;
        tx.commit()?;
        tracing::info!(student_id, target_class, roll_no, "student reassigned");
    }
    store::student_get(conn, student_id)?.ok_or_else(|| LifecycleError::not_found("student", student_id))
}

pub fn delete_student(conn: &Connection, student_id: &str) -> LifecycleResult<CascadeReport> {
    if !store::exists::<Student>(conn, student_id)? {
        return Err(LifecycleError::not_found("student", student_id));
    }
    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();
    report.run("student", || store::student_delete_with_records(&tx, student_id))?;
    tx.commit()?;
    Ok(report)
}

/// Clears a teacher's class-teacher role and removes them from every timetable.
pub fn unassign_teacher(conn: &Connection, teacher_id: &str) -> LifecycleResult<CascadeReport> {
    require_teacher(conn, teacher_id)?;
    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();
    report.run("classTeacherMapping", || {
        store::mapping_delete_for_teacher(&tx, teacher_id)
    })?;
    report.run("teacher", || store::teacher_set_class(&tx, teacher_id, None))?;
    report.run("timetableEntries", || {
        store::timetable_prune_teachers(&tx, &[teacher_id.to_string()])
    })?;
    tx.commit()?;
    Ok(report)
}

fn require_distinct_target(from: &str, to: &str, field: &str) -> LifecycleResult<()> {
    if from == to {
        return Err(FieldError::new(field, "must differ from the source teacher").into());
    }
    Ok(())
}

/// Hands every timetable slot of `from` to `to`. Class-teacher roles are untouched.
pub fn reassign_teacher_subjects(
    conn: &Connection,
    from: &str,
    to: &str,
) -> LifecycleResult<CascadeReport> {
    require_teacher(conn, from)?;
    require_distinct_target(from, to, "toTeacherId")?;
    if !store::exists::<Teacher>(conn, to)? {
        return Err(FieldError::new("toTeacherId", "target teacher does not exist").into());
    }
    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();
    report.run("timetableEntries", || {
        store::timetable_repoint_teacher(&tx, from, to)
    })?;
    tx.commit()?;
    Ok(report)
}

/// Removes a teacher. With `reassign_to`, their timetable slots are handed
/// over first; whatever still references them is pruned.
pub fn delete_teacher(
    conn: &Connection,
    teacher_id: &str,
    reassign_to: Option<&str>,
) -> LifecycleResult<CascadeReport> {
    require_teacher(conn, teacher_id)?;
    if let Some(to) = reassign_to {
        require_distinct_target(teacher_id, to, "reassignTo")?;
        if !store::exists::<Teacher>(conn, to)? {
            return Err(FieldError::new("reassignTo", "target teacher does not exist").into());
        }
    }
    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();
    if let Some(to) = reassign_to {
        report.run("timetableReassign", || {
            store::timetable_repoint_teacher(&tx, teacher_id, to)
        })?;
    }
    report.run("classTeacherMapping", || {
        store::mapping_delete_for_teacher(&tx, teacher_id)
    })?;
    report.run("timetableEntries", || {
        store::timetable_prune_teachers(&tx, &[teacher_id.to_string()])
    })?;
    report.run("teacher", || store::teacher_delete_with_records(&tx, teacher_id))?;
    tx.commit()?;
    tracing::info!(teacher_id, "teacher deleted");
    Ok(report)
}

/// Makes `teacher_id` the one class teacher of `class_id`. The previous
/// holder of the class loses the role; a teacher already in charge of
/// another class is moved.
pub fn assign_class_teacher(
    conn: &Connection,
    class_id: &str,
    teacher_id: &str,
) -> LifecycleResult<(ClassTeacherMapping, CascadeReport)> {
    require_class(conn, class_id)?;
    require_teacher(conn, teacher_id)?;
    let previous = store::mapping_for_class(conn, class_id)?;

    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();
    report.run("previousTeacher", || match &previous {
        Some(m) if m.teacher_id != teacher_id => {
            store::teacher_set_class(&tx, &m.teacher_id, None)
        }
        _ => Ok(0),
    })?;
    report.run("teacherMappings", || {
        store::mapping_delete_for_teacher(&tx, teacher_id)
    })?;
    let mapping = ClassTeacherMapping {
        id: ids::class_teacher_mapping_id(class_id, teacher_id),
        class_id: class_id.to_string(),
        teacher_id: teacher_id.to_string(),
        assigned_at: now_iso(),
    };
    report.run("mapping", || store::mapping_replace(&tx, &mapping).map(|_| 1))?;
    report.run("teacher", || {
        store::teacher_set_class(&tx, teacher_id, Some(class_id))
    })?;
    tx.commit()?;
    tracing::info!(class_id, teacher_id, "class teacher assigned");
    Ok((mapping, report))
}

pub fn unassign_class_teacher(conn: &Connection, class_id: &str) -> LifecycleResult<CascadeReport> {
    require_class(conn, class_id)?;
    let previous = store::mapping_for_class(conn, class_id)?;
    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();
    report.run("teacher", || match &previous {
        Some(m) => store::teacher_set_class(&tx, &m.teacher_id, None),
        None => Ok(0),
    })?;
    report.run("mapping", || store::mapping_delete_for_class(&tx, class_id))?;
    tx.commit()?;
    Ok(report)
}

/// Copies fees and subject names embedded on class rows into the fees and
/// subjects collections. Re-running is harmless.
pub fn migrate_legacy(conn: &Connection) -> LifecycleResult<CascadeReport> {
    let classes = store::all::<ClassRoom>(conn)?;
    let tx = conn.unchecked_transaction()?;
    let mut report = CascadeReport::default();

    report.run("subjects", || {
        let mut n = 0;
        for class in &classes {
            for name in &class.subjects {
                let id = ids::subject_id(&class.id, name);
                let subject = Subject {
                    code: id.to_uppercase(),
                    id,
                    name: name.clone(),
                    subject_type: SubjectType::Core,
                    class_id: class.id.clone(),
                };
                store::subject_upsert(&tx, &subject)?;
                n += 1;
            }
        }
        Ok(n)
    })?;

    report.run("fees", || {
        let mut n = 0;
        for class in &classes {
            for (fee_type, amount) in class.fees.entries() {
                let id = ids::fee_id(&class.id, fee_type);
                let due_date = store::get::<Fee>(&tx, &id)?.and_then(|f| f.due_date);
                let fee = Fee {
                    id,
                    class_id: class.id.clone(),
                    fee_type,
                    amount,
                    applicable_gender: FeeGender::Male,
                    due_date,
                };
                store::fee_upsert(&tx, &fee)?;
                n += 1;
            }
        }
        Ok(n)
    })?;

    tx.commit()?;
    Ok(report)
}
