//! Identifier synthesis for new records.
//!
//! Classes, fees, subjects and class-teacher mappings get deterministic ids so
//! that re-submitting the same natural key upserts instead of duplicating.
//! Students, teachers and exams get millisecond stamps.

use crate::config::{GENERATED_PASSWORD_LEN, SUBJECT_CODE_LEN};
use crate::model::FeeType;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the epoch, strictly increasing within this process.
pub fn next_stamp() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    let mut prev = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = if now > prev { now } else { prev + 1 };
        match LAST_STAMP.compare_exchange_weak(prev, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

pub fn class_id(name: &str, section: &str) -> String {
    format!("c{}{}", name, section)
}

pub fn student_id(stamp: i64) -> String {
    format!("s{}", stamp)
}

pub fn admission_no(stamp: i64) -> String {
    format!("ADM{}", stamp)
}

pub fn teacher_id(stamp: i64) -> String {
    format!("T{}", stamp)
}

pub fn exam_id(class_id: &str, stamp: i64) -> String {
    format!("exam_{}_{}", class_id, stamp)
}

pub fn fee_id(class_id: &str, fee_type: FeeType) -> String {
    format!("fee_{}_{}", class_id, fee_type)
}

pub fn subject_id(class_id: &str, name: &str) -> String {
    format!("{}_{}", class_id, slug(name))
}

pub fn class_teacher_mapping_id(class_id: &str, teacher_id: &str) -> String {
    format!("ct_{}_{}", class_id, teacher_id)
}

/// Default subject code: lowercase ASCII letters and digits of the name.
pub fn subject_code(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(SUBJECT_CODE_LEN)
        .collect()
}

/// Lowercase, whitespace runs collapsed to `_`.
pub fn slug(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}
