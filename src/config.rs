//! Runtime configuration and the fixed limits shared by validation and views.

use clap::Parser;
use std::path::PathBuf;

/// File name of the SQLite store inside a workspace directory.
pub const DB_FILE_NAME: &str = "school.sqlite3";

// ===== Validation bounds =====

pub const NOTICE_TITLE_MAX: usize = 200;
pub const NOTICE_MESSAGE_MAX: usize = 5000;

pub const EXAM_TOTAL_MARKS_MIN: i64 = 1;
pub const EXAM_TOTAL_MARKS_MAX: i64 = 1000;

/// Minimum number of characters in a phone number (digits and `+-() `).
pub const PHONE_MIN_LEN: usize = 10;

/// Length of auto-generated teacher passwords.
pub const GENERATED_PASSWORD_LEN: usize = 8;

/// bcrypt work factor for stored teacher passwords.
pub const PASSWORD_HASH_COST: u32 = 10;

/// Maximum length of a derived subject code.
pub const SUBJECT_CODE_LEN: usize = 8;

// ===== Timetable grid =====

pub const TIMETABLE_DAYS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
pub const TIMETABLE_PERIOD_MIN: i64 = 1;
pub const TIMETABLE_PERIOD_MAX: i64 = 6;

// ===== Results =====

/// Aggregate pass threshold in percent. Independent of an exam's passingMarks.
pub const AGGREGATE_PASS_PERCENT: f64 = 33.0;

/// Per-subject pass mark used when an exam carries no passingMarks.
pub const DEFAULT_SUBJECT_PASS_MARKS: f64 = 33.0;

/// Marks per subject assumed when an exam carries no totalMarks.
pub const DEFAULT_MARKS_PER_SUBJECT: f64 = 100.0;

/// Grade bands, highest first. A percentage at or above the bound gets the grade.
pub const GRADE_BANDS: &[(f64, &str)] = &[
    (90.0, "A+"),
    (80.0, "A"),
    (70.0, "B+"),
    (60.0, "B"),
    (50.0, "C+"),
    (40.0, "C"),
    (33.0, "D"),
];
pub const FAILING_GRADE: &str = "F";

#[derive(Debug, Clone, Parser)]
#[command(name = "schoold", version, about = "School administration sidecar")]
pub struct Config {
    /// Workspace directory to open at startup.
    #[arg(long, env = "SCHOOLD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Preset administrator login id.
    #[arg(long, env = "SCHOOLD_ADMIN_ID", default_value = "admin")]
    pub admin_id: String,

    /// Preset administrator password.
    #[arg(long, env = "SCHOOLD_ADMIN_PASSWORD", default_value = "admin123")]
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            admin_id: "admin".to_string(),
            admin_password: "admin123".to_string(),
        }
    }
}
