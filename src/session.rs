//! Server-side sessions and the per-method access table.

use crate::config::{Config, PASSWORD_HASH_COST};
use crate::model::Role;
use crate::store;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    pub created_at: String,
}

impl Session {
    fn new(role: Role, teacher_id: Option<String>) -> Self {
        Self {
            role,
            teacher_id,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins act for anyone; a teacher only for themself.
    pub fn acts_for(&self, teacher_id: &str) -> bool {
        self.is_admin() || self.teacher_id.as_deref() == Some(teacher_id)
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn open(&mut self, session: Session) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), session);
        token
    }

    pub fn get(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn close(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops every teacher session. Admin sessions stay open.
    pub fn close_teachers(&mut self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_admin());
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("select a workspace first")]
    NoWorkspace,
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, PASSWORD_HASH_COST)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// The preset admin credentials are tried first, then the teacher whose id
/// equals `username`.
pub fn login(
    conn: Option<&Connection>,
    config: &Config,
    username: &str,
    password: &str,
) -> Result<Session, LoginError> {
    if username == config.admin_id && password == config.admin_password {
        return Ok(Session::new(Role::Admin, None));
    }
    let conn = conn.ok_or(LoginError::NoWorkspace)?;
    let teacher = store::teacher_get(conn, username)?.ok_or(LoginError::InvalidCredentials)?;
    if !verify_password(password, &teacher.password_hash) {
        return Err(LoginError::InvalidCredentials);
    }
    Ok(Session::new(Role::Teacher, Some(teacher.id)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No token needed.
    Public,
    /// Any signed-in role. Handlers may narrow further for teachers.
    Session,
    Admin,
}

/// `None` for methods this daemon does not know.
pub fn required_access(method: &str) -> Option<Access> {
    let access = match method {
        "health" | "workspace.select" | "auth.login" => Access::Public,

        "auth.logout" | "auth.session" | "data.snapshot" | "classes.list" | "students.list"
        | "students.get" | "teachers.list" | "teachers.get" | "classTeacher.list"
        | "subjects.list" | "fees.list" | "exams.list" | "notices.list" | "timetable.list"
        | "timetable.get" | "timetable.teacher" | "attendance.set" | "marks.set"
        | "views.pendingFees" | "views.attendanceDaily" | "views.attendanceSummary"
        | "views.examResults" | "views.teacherToday" | "views.pendingMarks" => Access::Session,

        "classes.create" | "classes.delete" | "classes.setLegacyFees"
        | "classes.addLegacySubject" | "migrate.legacy" | "students.create"
        | "students.reassign" | "students.delete" | "students.setFeePaid" | "teachers.create"
        | "teachers.update" | "teachers.unassign" | "teachers.reassignSubjects"
        | "teachers.delete" | "classTeacher.assign" | "classTeacher.unassign"
        | "subjects.create" | "fees.upsert" | "exams.create" | "notices.create"
        | "timetable.set" | "backup.exportWorkspaceBundle" | "backup.importWorkspaceBundle" => {
            Access::Admin
        }

        _ => return None,
    };
    Some(access)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::Teacher;

    #[test]
    fn access_table_covers_public_shared_and_admin() {
        assert_eq!(required_access("health"), Some(Access::Public));
        assert_eq!(required_access("auth.login"), Some(Access::Public));
        assert_eq!(required_access("views.examResults"), Some(Access::Session));
        assert_eq!(required_access("attendance.set"), Some(Access::Session));
        assert_eq!(required_access("classes.delete"), Some(Access::Admin));
        assert_eq!(required_access("backup.importWorkspaceBundle"), Some(Access::Admin));
        assert_eq!(required_access("classes.frobnicate"), None);
    }

    #[test]
    fn store_opens_and_closes_tokens() {
        let mut store = SessionStore::default();
        let token = store.open(Session::new(Role::Admin, None));
        assert!(store.get(&token).expect("session").is_admin());
        assert!(store.close(&token));
        assert!(!store.close(&token));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn closing_teachers_keeps_admins() {
        let mut store = SessionStore::default();
        let admin = store.open(Session::new(Role::Admin, None));
        let teacher = store.open(Session::new(Role::Teacher, Some("T1".into())));
        assert_eq!(store.close_teachers(), 1);
        assert!(store.get(&admin).is_some());
        assert!(store.get(&teacher).is_none());
    }

    #[test]
    fn acts_for_limits_teachers_to_themselves() {
        let admin = Session::new(Role::Admin, None);
        let teacher = Session::new(Role::Teacher, Some("T1".into()));
        assert!(admin.acts_for("T9"));
        assert!(teacher.acts_for("T1"));
        assert!(!teacher.acts_for("T2"));
    }

    #[test]
    fn login_prefers_admin_then_checks_teacher_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = db::open_db(dir.path()).expect("open");
        let config = Config::default();

        let admin = login(None, &config, "admin", "admin123").expect("admin");
        assert_eq!(admin.role, Role::Admin);
        assert!(matches!(
            login(None, &config, "T1", "pw"),
            Err(LoginError::NoWorkspace)
        ));

        let teacher = Teacher {
            id: "T1".into(),
            name: "Ravi Kumar".into(),
            gender: None,
            dob: None,
            qualification: None,
            expertise: vec![],
            subject: None,
            contact_number: None,
            email: None,
            address: None,
            password_hash: hash_password("secret12").expect("hash"),
            is_class_teacher: false,
            class_id: None,
        };
        store::teacher_upsert(&conn, &teacher).expect("teacher");

        let s = login(Some(&conn), &config, "T1", "secret12").expect("teacher login");
        assert_eq!(s.role, Role::Teacher);
        assert_eq!(s.teacher_id.as_deref(), Some("T1"));
        assert!(matches!(
            login(Some(&conn), &config, "T1", "wrong"),
            Err(LoginError::InvalidCredentials)
        ));
        assert!(matches!(
            login(Some(&conn), &config, "admin", "wrong"),
            Err(LoginError::InvalidCredentials)
        ));
    }
}
