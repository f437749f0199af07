use crate::ipc::types::{AppState, Request};
use crate::session::Session;

pub mod attendance;
pub mod auth;
pub mod backup;
pub mod catalog;
pub mod class_teacher;
pub mod classes;
pub mod core;
pub mod marks;
pub mod notices;
pub mod students;
pub mod teachers;
pub mod timetable;
pub mod views;

pub type Route = fn(&mut AppState, &Request, Option<&Session>) -> Option<serde_json::Value>;
