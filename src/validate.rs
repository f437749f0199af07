//! Field constraints checked before any write is accepted.

use crate::config::{
    EXAM_TOTAL_MARKS_MAX, EXAM_TOTAL_MARKS_MIN, NOTICE_MESSAGE_MAX, NOTICE_TITLE_MAX,
    PHONE_MIN_LEN, TIMETABLE_DAYS, TIMETABLE_PERIOD_MAX, TIMETABLE_PERIOD_MIN,
};
use crate::model::TimetableEntry;
use chrono::NaiveDate;
use regex::Regex;
use std::str::FromStr;
use thiserror::Error;

lazy_static::lazy_static! {
    static ref ALNUM_SPACE: Regex = Regex::new(r"^[A-Za-z0-9\s]+$").expect("valid regex");
    static ref ALPHA_SPACE: Regex = Regex::new(r"^[A-Za-z ]+$").expect("valid regex");
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex");
    static ref PHONE: Regex = Regex::new(r"^[\d+\-\s()]+$").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type FieldResult<T> = Result<T, FieldError>;

/// Class name: letters, digits and spaces; non-empty after trimming.
pub fn class_name(field: &str, value: &str) -> FieldResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(FieldError::new(field, "must not be empty"));
    }
    if !ALNUM_SPACE.is_match(t) {
        return Err(FieldError::new(field, "may only contain letters, digits and spaces"));
    }
    Ok(t.to_string())
}

/// Section: empty, or the same alphabet as class names.
pub fn section(field: &str, value: Option<&str>) -> FieldResult<String> {
    let t = value.map(str::trim).unwrap_or("");
    if t.is_empty() {
        return Ok(String::new());
    }
    class_name(field, t)
}

/// Person names: letters and spaces only.
pub fn person_name(field: &str, value: &str) -> FieldResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(FieldError::new(field, "must not be empty"));
    }
    if !ALPHA_SPACE.is_match(t) {
        return Err(FieldError::new(field, "may only contain letters and spaces"));
    }
    Ok(t.to_string())
}

pub fn email(field: &str, value: Option<&str>) -> FieldResult<Option<String>> {
    let t = value.map(str::trim).unwrap_or("");
    if t.is_empty() {
        return Ok(None);
    }
    if !EMAIL.is_match(t) {
        return Err(FieldError::new(field, "must look like local@domain.tld"));
    }
    Ok(Some(t.to_string()))
}

pub fn phone(field: &str, value: Option<&str>) -> FieldResult<Option<String>> {
    let t = value.map(str::trim).unwrap_or("");
    if t.is_empty() {
        return Ok(None);
    }
    if t.chars().count() < PHONE_MIN_LEN || !PHONE.is_match(t) {
        return Err(FieldError::new(
            field,
            format!(
                "must be at least {} characters of digits, +, -, spaces or parentheses",
                PHONE_MIN_LEN
            ),
        ));
    }
    Ok(Some(t.to_string()))
}

/// Trimmed optional free text; empty collapses to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
}

pub fn required_text(field: &str, value: &str) -> FieldResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(FieldError::new(field, "must not be empty"));
    }
    Ok(t.to_string())
}

pub fn non_negative_amount(field: &str, value: f64) -> FieldResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(FieldError::new(field, "must be a non-negative number"));
    }
    Ok(value)
}

pub fn exam_marks(total_marks: i64, passing_marks: i64) -> FieldResult<(i64, i64)> {
    if !(EXAM_TOTAL_MARKS_MIN..=EXAM_TOTAL_MARKS_MAX).contains(&total_marks) {
        return Err(FieldError::new(
            "totalMarks",
            format!(
                "must be an integer between {} and {}",
                EXAM_TOTAL_MARKS_MIN, EXAM_TOTAL_MARKS_MAX
            ),
        ));
    }
    if !(0..=total_marks).contains(&passing_marks) {
        return Err(FieldError::new(
            "passingMarks",
            format!("must be an integer between 0 and {}", total_marks),
        ));
    }
    Ok((total_marks, passing_marks))
}

/// A single subject score against the exam total it was entered under.
pub fn score(score: f64, total: f64) -> FieldResult<(f64, f64)> {
    if !total.is_finite() || total <= 0.0 {
        return Err(FieldError::new("total", "must be a positive number"));
    }
    if !score.is_finite() || score < 0.0 {
        return Err(FieldError::new("score", "must be a non-negative number"));
    }
    if score > total {
        return Err(FieldError::new("score", "must not exceed total"));
    }
    Ok((score, total))
}

fn bounded_text(field: &str, value: &str, max: usize) -> FieldResult<String> {
    let t = value.trim();
    let len = t.chars().count();
    if len == 0 || len > max {
        return Err(FieldError::new(
            field,
            format!("must be between 1 and {} characters", max),
        ));
    }
    Ok(t.to_string())
}

pub fn notice_title(value: &str) -> FieldResult<String> {
    bounded_text("title", value, NOTICE_TITLE_MAX)
}

pub fn notice_message(value: &str) -> FieldResult<String> {
    bounded_text("message", value, NOTICE_MESSAGE_MAX)
}

/// `YYYY-MM-DD`, returned in canonical form.
pub fn iso_date(field: &str, value: &str) -> FieldResult<String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| FieldError::new(field, "must be a date in YYYY-MM-DD form"))
}

pub fn optional_iso_date(field: &str, value: Option<&str>) -> FieldResult<Option<String>> {
    match optional_text(value) {
        Some(v) => iso_date(field, &v).map(Some),
        None => Ok(None),
    }
}

pub fn enumeration<T: FromStr<Err = String>>(field: &str, value: &str) -> FieldResult<T> {
    value.trim().parse::<T>().map_err(|e| FieldError::new(field, e))
}

/// Day and period must fall on the fixed grid; subject and teacher are required.
pub fn timetable_entry(index: usize, entry: &TimetableEntry) -> FieldResult<TimetableEntry> {
    let field = |name: &str| format!("entries[{}].{}", index, name);
    let day = entry.day.trim();
    if !TIMETABLE_DAYS.contains(&day) {
        return Err(FieldError::new(
            &field("day"),
            format!("must be one of {}", TIMETABLE_DAYS.join(", ")),
        ));
    }
    if !(TIMETABLE_PERIOD_MIN..=TIMETABLE_PERIOD_MAX).contains(&entry.period) {
        return Err(FieldError::new(
            &field("period"),
            format!(
                "must be between {} and {}",
                TIMETABLE_PERIOD_MIN, TIMETABLE_PERIOD_MAX
            ),
        ));
    }
    let subject = required_text(&field("subject"), &entry.subject)?;
    let teacher_id = required_text(&field("teacherId"), &entry.teacher_id)?;
    Ok(TimetableEntry {
        day: day.to_string(),
        period: entry.period,
        subject,
        teacher_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Gender;

    #[test]
    fn class_and_section_names() {
        assert_eq!(class_name("name", "  10 ").unwrap(), "10");
        assert!(class_name("name", "   ").is_err());
        assert!(class_name("name", "10-A").is_err());
        assert_eq!(section("section", None).unwrap(), "");
        assert_eq!(section("section", Some("B")).unwrap(), "B");
        assert_eq!(section("section", Some("B#")).unwrap_err().field, "section");
    }

    #[test]
    fn person_names_reject_digits() {
        assert_eq!(person_name("name", "Asha Rao").unwrap(), "Asha Rao");
        assert!(person_name("name", "Asha 2").is_err());
    }

    #[test]
    fn email_and_phone_accept_empty() {
        assert_eq!(email("email", Some("")).unwrap(), None);
        assert_eq!(email("email", None).unwrap(), None);
        assert!(email("email", Some("a@b")).is_err());
        assert_eq!(email("email", Some("a@b.in")).unwrap().as_deref(), Some("a@b.in"));

        assert_eq!(phone("phone", Some("  ")).unwrap(), None);
        assert!(phone("phone", Some("12345")).is_err());
        assert!(phone("phone", Some("98765x43210")).is_err());
        assert!(phone("phone", Some("+91 (987) 654-3210")).is_ok());
    }

    #[test]
    fn exam_mark_ranges() {
        assert!(exam_marks(100, 33).is_ok());
        assert!(exam_marks(1000, 1000).is_ok());
        assert_eq!(exam_marks(0, 0).unwrap_err().field, "totalMarks");
        assert_eq!(exam_marks(1001, 0).unwrap_err().field, "totalMarks");
        assert_eq!(exam_marks(50, 51).unwrap_err().field, "passingMarks");
        assert_eq!(exam_marks(50, -1).unwrap_err().field, "passingMarks");
    }

    #[test]
    fn notice_lengths_count_characters() {
        assert!(notice_title(&"x".repeat(200)).is_ok());
        assert!(notice_title(&"x".repeat(201)).is_err());
        assert!(notice_title("").is_err());
        assert!(notice_message(&"é".repeat(5000)).is_ok());
    }

    #[test]
    fn scores_and_amounts() {
        assert!(non_negative_amount("amount", 0.0).is_ok());
        assert!(non_negative_amount("amount", -1.0).is_err());
        assert!(non_negative_amount("amount", f64::NAN).is_err());
        assert!(score(40.0, 50.0).is_ok());
        assert_eq!(score(60.0, 50.0).unwrap_err().field, "score");
        assert_eq!(score(1.0, 0.0).unwrap_err().field, "total");
    }

    #[test]
    fn dates_and_enums() {
        assert_eq!(iso_date("date", "2024-02-29").unwrap(), "2024-02-29");
        assert!(iso_date("date", "2023-02-29").is_err());
        assert_eq!(optional_iso_date("dueDate", Some(" ")).unwrap(), None);
        assert_eq!(enumeration::<Gender>("gender", "Female").unwrap(), Gender::Female);
        assert_eq!(enumeration::<Gender>("gender", "F").unwrap_err().field, "gender");
    }

    #[test]
    fn timetable_grid() {
        let entry = TimetableEntry {
            day: "Sat".into(),
            period: 6,
            subject: " Maths ".into(),
            teacher_id: "T1".into(),
        };
        assert_eq!(timetable_entry(0, &entry).unwrap().subject, "Maths");

        let sunday = TimetableEntry { day: "Sun".into(), ..entry.clone() };
        assert_eq!(timetable_entry(2, &sunday).unwrap_err().field, "entries[2].day");

        let late = TimetableEntry { period: 7, ..entry };
        assert_eq!(timetable_entry(1, &late).unwrap_err().field, "entries[1].period");
    }
}
