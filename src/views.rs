//! Derived views: read-only aggregates computed from a snapshot of the
//! collections. Nothing here touches the database or is persisted.

use crate::config::{
    AGGREGATE_PASS_PERCENT, DEFAULT_MARKS_PER_SUBJECT, DEFAULT_SUBJECT_PASS_MARKS, FAILING_GRADE,
    GRADE_BANDS, TIMETABLE_DAYS,
};
use crate::model::{
    Audience, ClassRoom, ClassTimetable, Exam, Fee, FeeType, Gender, Notice, Role, Snapshot,
    Student, Subject, TimetableEntry,
};
use chrono::{Datelike, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Round half away from zero to `places` decimals.
pub fn round_to(x: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (x * f).round() / f
}

// ===== Fees =====

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingFees {
    pub student_id: String,
    pub name: String,
    pub class_id: String,
    pub gender: Gender,
    pub roll_no: i64,
    pub pending: Vec<FeeType>,
    pub pending_amount: f64,
}

/// Students with at least one applicable, unpaid fee type, in input order.
pub fn pending_fees(students: &[Student], fees: &[Fee]) -> Vec<PendingFees> {
    students
        .iter()
        .filter_map(|s| {
            let mut pending = Vec::new();
            let mut pending_amount = 0.0;
            for fee in fees
                .iter()
                .filter(|f| f.class_id == s.class_id && f.applicable_gender.applies_to(s.gender))
            {
                let paid = s.fees_paid.get(&fee.fee_type).copied().unwrap_or(false);
                if !paid && !pending.contains(&fee.fee_type) {
                    pending.push(fee.fee_type);
                    pending_amount += fee.amount;
                }
            }
            if pending.is_empty() {
                return None;
            }
            Some(PendingFees {
                student_id: s.id.clone(),
                name: s.name.clone(),
                class_id: s.class_id.clone(),
                gender: s.gender,
                roll_no: s.roll_no,
                pending,
                pending_amount,
            })
        })
        .collect()
}

// ===== Attendance =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    NoRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendanceRow {
    pub student_id: String,
    pub name: String,
    pub roll_no: i64,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendanceCounts {
    pub present: usize,
    pub absent: usize,
    pub no_record: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendance {
    pub class_id: String,
    pub date: String,
    pub rows: Vec<DailyAttendanceRow>,
    pub counts: DailyAttendanceCounts,
}

fn class_students_by_roll<'a>(students: &'a [Student], class_id: &str) -> Vec<&'a Student> {
    let mut out: Vec<&Student> = students.iter().filter(|s| s.class_id == class_id).collect();
    out.sort_by_key(|s| s.roll_no);
    out
}

pub fn attendance_daily(students: &[Student], class_id: &str, date: &str) -> DailyAttendance {
    let mut counts = DailyAttendanceCounts::default();
    let rows: Vec<DailyAttendanceRow> = class_students_by_roll(students, class_id)
        .into_iter()
        .map(|s| {
            let status = match s.attendance.get(date) {
                Some(true) => AttendanceStatus::Present,
                Some(false) => AttendanceStatus::Absent,
                None => AttendanceStatus::NoRecord,
            };
            match status {
                AttendanceStatus::Present => counts.present += 1,
                AttendanceStatus::Absent => counts.absent += 1,
                AttendanceStatus::NoRecord => counts.no_record += 1,
            }
            DailyAttendanceRow {
                student_id: s.id.clone(),
                name: s.name.clone(),
                roll_no: s.roll_no,
                status,
            }
        })
        .collect();
    counts.total = rows.len();
    DailyAttendance {
        class_id: class_id.to_string(),
        date: date.to_string(),
        rows,
        counts,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummaryRow {
    pub student_id: String,
    pub name: String,
    pub roll_no: i64,
    pub record_count: usize,
    pub present_days: usize,
    pub absent_days: usize,
    /// One decimal, e.g. `"62.5"`; `"0.0"` without records.
    pub attendance_percent: String,
}

pub fn attendance_percent(present_days: usize, record_count: usize) -> String {
    if record_count == 0 {
        return "0.0".to_string();
    }
    let pct = present_days as f64 / record_count as f64 * 100.0;
    format!("{:.1}", round_to(pct, 1))
}

pub fn attendance_summary(students: &[Student], class_id: &str) -> Vec<AttendanceSummaryRow> {
    class_students_by_roll(students, class_id)
        .into_iter()
        .map(|s| {
            let record_count = s.attendance.len();
            let present_days = s.attendance.values().filter(|p| **p).count();
            AttendanceSummaryRow {
                student_id: s.id.clone(),
                name: s.name.clone(),
                roll_no: s.roll_no,
                record_count,
                present_days,
                absent_days: record_count - present_days,
                attendance_percent: attendance_percent(present_days, record_count),
            }
        })
        .collect()
}

// ===== Exam results =====

pub fn grade_for(percentage: f64) -> &'static str {
    GRADE_BANDS
        .iter()
        .find(|(bound, _)| percentage >= *bound)
        .map(|(_, grade)| *grade)
        .unwrap_or(FAILING_GRADE)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultRow {
    pub student_id: String,
    pub name: String,
    pub roll_no: i64,
    pub subject_marks: BTreeMap<String, f64>,
    /// Subjects scored under the exam's passingMarks (33 when unset).
    pub below_passing_marks: Vec<String>,
    pub total_obtained: f64,
    pub total_possible: f64,
    /// Rounded to 2 decimals; grade and pass use the unrounded value.
    pub percentage: f64,
    #[serde(skip)]
    pub raw_percentage: f64,
    pub grade: &'static str,
    pub has_marks: bool,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamClassStats {
    pub total_students: usize,
    pub average_percentage: f64,
    pub highest_percentage: f64,
    pub lowest_percentage: f64,
    pub pass_count: usize,
    pub pass_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResults {
    pub exam_id: String,
    pub class_id: String,
    pub subjects: Vec<String>,
    pub passing_marks: Option<i64>,
    pub rows: Vec<ExamResultRow>,
    pub stats: Option<ExamClassStats>,
}

/// Per-student results for one exam over the subjects of the exam's class.
///
/// The pass/fail used in the statistics is the fixed aggregate threshold.
/// The exam's passingMarks only drives the per-subject flags.
pub fn exam_results(students: &[Student], subjects: &[Subject], exam: &Exam) -> ExamResults {
    let class_subjects: Vec<&Subject> = subjects
        .iter()
        .filter(|s| s.class_id == exam.class_id)
        .collect();
    let per_subject = exam
        .total_marks
        .map(|t| t as f64)
        .unwrap_or(DEFAULT_MARKS_PER_SUBJECT);
    let total_possible = per_subject * class_subjects.len() as f64;
    let subject_pass = exam
        .passing_marks
        .filter(|p| *p > 0)
        .map(|p| p as f64)
        .unwrap_or(DEFAULT_SUBJECT_PASS_MARKS);

    let rows: Vec<ExamResultRow> = class_students_by_roll(students, &exam.class_id)
        .into_iter()
        .map(|student| {
            let mut subject_marks = BTreeMap::new();
            let mut below_passing_marks = Vec::new();
            let mut total_obtained = 0.0;
            if let Some(marks) = student.marks.get(&exam.id) {
                for subject in &class_subjects {
                    if let Some(score) = marks.subjects.get(&subject.name) {
                        subject_marks.insert(subject.name.clone(), *score);
                        total_obtained += score;
                        if *score < subject_pass {
                            below_passing_marks.push(subject.name.clone());
                        }
                    }
                }
            }
            let raw = if total_possible > 0.0 {
                total_obtained / total_possible * 100.0
            } else {
                0.0
            };
            ExamResultRow {
                student_id: student.id.clone(),
                name: student.name.clone(),
                roll_no: student.roll_no,
                has_marks: !subject_marks.is_empty(),
                subject_marks,
                below_passing_marks,
                total_obtained,
                total_possible,
                percentage: round_to(raw, 2),
                raw_percentage: raw,
                grade: grade_for(raw),
                passed: raw >= AGGREGATE_PASS_PERCENT,
            }
        })
        .collect();

    let stats = exam_class_stats(&rows);
    ExamResults {
        exam_id: exam.id.clone(),
        class_id: exam.class_id.clone(),
        subjects: class_subjects.iter().map(|s| s.name.clone()).collect(),
        passing_marks: exam.passing_marks,
        rows,
        stats,
    }
}

fn exam_class_stats(rows: &[ExamResultRow]) -> Option<ExamClassStats> {
    let with_marks: Vec<&ExamResultRow> = rows.iter().filter(|r| r.has_marks).collect();
    if with_marks.is_empty() {
        return None;
    }
    let n = with_marks.len();
    let sum: f64 = with_marks.iter().map(|r| r.raw_percentage).sum();
    let highest = with_marks
        .iter()
        .map(|r| r.raw_percentage)
        .fold(f64::NEG_INFINITY, f64::max);
    let lowest = with_marks
        .iter()
        .map(|r| r.raw_percentage)
        .fold(f64::INFINITY, f64::min);
    let pass_count = with_marks.iter().filter(|r| r.passed).count();
    Some(ExamClassStats {
        total_students: n,
        average_percentage: round_to(sum / n as f64, 2),
        highest_percentage: round_to(highest, 2),
        lowest_percentage: round_to(lowest, 2),
        pass_count,
        pass_percentage: round_to(pass_count as f64 / n as f64 * 100.0, 2),
    })
}

// ===== Timetables =====

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSlot {
    pub class_id: String,
    #[serde(flatten)]
    pub entry: TimetableEntry,
}

/// Every timetable entry taught by `teacher_id`, annotated with its class.
pub fn teacher_timetable(timetables: &[ClassTimetable], teacher_id: &str) -> Vec<TeacherSlot> {
    timetables
        .iter()
        .flat_map(|tt| {
            tt.entries
                .iter()
                .filter(|e| e.teacher_id == teacher_id)
                .map(|e| TeacherSlot {
                    class_id: tt.class_id.clone(),
                    entry: e.clone(),
                })
        })
        .collect()
}

/// Timetable day label for a weekday; Sunday has no classes.
pub fn day_label(weekday: Weekday) -> Option<&'static str> {
    let idx = weekday.num_days_from_monday() as usize;
    TIMETABLE_DAYS.get(idx).copied()
}

pub fn today_label() -> Option<&'static str> {
    day_label(chrono::Local::now().weekday())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayClass {
    #[serde(flatten)]
    pub slot: TeacherSlot,
    pub class_label: String,
}

/// A teacher's classes on one day, by period.
pub fn teacher_day(
    timetables: &[ClassTimetable],
    classes: &[ClassRoom],
    teacher_id: &str,
    day: &str,
) -> Vec<DayClass> {
    let mut out: Vec<DayClass> = teacher_timetable(timetables, teacher_id)
        .into_iter()
        .filter(|slot| slot.entry.day == day)
        .map(|slot| {
            let class_label = classes
                .iter()
                .find(|c| c.id == slot.class_id)
                .map(|c| c.label())
                .unwrap_or_else(|| slot.class_id.clone());
            DayClass { slot, class_label }
        })
        .collect();
    out.sort_by_key(|d| d.slot.entry.period);
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMarks {
    pub exam_id: String,
    pub exam_name: String,
    pub class_id: String,
    pub pending_students: usize,
}

/// Exams in classes the teacher teaches where some student has no marks yet.
pub fn pending_marks(snapshot: &Snapshot, teacher_id: &str) -> Vec<PendingMarks> {
    let taught: HashSet<String> = teacher_timetable(&snapshot.class_timetables, teacher_id)
        .into_iter()
        .map(|s| s.class_id)
        .collect();
    snapshot
        .exams
        .iter()
        .filter(|e| taught.contains(&e.class_id))
        .filter(|e| snapshot.classes.iter().any(|c| c.id == e.class_id))
        .filter_map(|e| {
            let pending_students = snapshot
                .students
                .iter()
                .filter(|s| s.class_id == e.class_id && !s.marks.contains_key(&e.id))
                .count();
            (pending_students > 0).then(|| PendingMarks {
                exam_id: e.id.clone(),
                exam_name: e.name.clone(),
                class_id: e.class_id.clone(),
                pending_students,
            })
        })
        .collect()
}

// ===== Notices =====

/// Active, unexpired notices visible to `role`, newest first. `today` is
/// `YYYY-MM-DD`; a notice stays visible through its expiry date.
pub fn visible_notices(notices: &[Notice], today: &str, role: Role) -> Vec<Notice> {
    let mut out: Vec<Notice> = notices
        .iter()
        .filter(|n| n.active)
        .filter(|n| n.expiry_date.as_deref().map(|d| d >= today).unwrap_or(true))
        .filter(|n| match role {
            Role::Admin => true,
            Role::Teacher => n.audience != Audience::Admin,
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamMarks, FeeGender, SubjectType};

    fn student(id: &str, class_id: &str, gender: Gender, roll_no: i64) -> Student {
        Student {
            id: id.to_string(),
            name: format!("Student {}", id),
            gender,
            dob: None,
            admission_no: format!("ADM{}", id),
            class_id: class_id.to_string(),
            section: None,
            roll_no,
            guardian_name: None,
            guardian_phone: None,
            address: None,
            email: None,
            attendance: BTreeMap::new(),
            fees_paid: BTreeMap::new(),
            marks: BTreeMap::new(),
        }
    }

    fn fee(class_id: &str, fee_type: FeeType, amount: f64, gender: FeeGender) -> Fee {
        Fee {
            id: format!("fee_{}_{}", class_id, fee_type),
            class_id: class_id.to_string(),
            fee_type,
            amount,
            applicable_gender: gender,
            due_date: None,
        }
    }

    #[test]
    fn pending_fees_lists_only_unpaid_types() {
        let mut s = student("1", "c10A", Gender::Male, 1);
        s.fees_paid.insert(FeeType::Exam, true);
        let fees = vec![
            fee("c10A", FeeType::Exam, 500.0, FeeGender::Both),
            fee("c10A", FeeType::Term, 300.0, FeeGender::Both),
        ];
        let rows = pending_fees(&[s.clone()], &fees);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pending, vec![FeeType::Term]);
        assert_eq!(rows[0].pending_amount, 300.0);

        s.fees_paid.insert(FeeType::Term, true);
        assert!(pending_fees(&[s], &fees).is_empty());
    }

    #[test]
    fn pending_fees_respects_gender_and_order() {
        let boy = student("b", "c1", Gender::Male, 1);
        let girl = student("g", "c1", Gender::Female, 2);
        let other = student("o", "c2", Gender::Other, 1);
        let fees = vec![
            fee("c1", FeeType::Utilities, 50.0, FeeGender::Female),
            fee("c2", FeeType::Admission, 900.0, FeeGender::Male),
        ];
        let input = vec![girl.clone(), boy, other];
        let first = pending_fees(&input, &fees);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].student_id, "g");
        assert_eq!(pending_fees(&input, &fees), first);
    }

    #[test]
    fn daily_attendance_partitions_students() {
        let mut a = student("a", "c1", Gender::Male, 2);
        let mut b = student("b", "c1", Gender::Female, 1);
        let c = student("c", "c1", Gender::Other, 3);
        a.attendance.insert("2024-06-03".into(), true);
        b.attendance.insert("2024-06-03".into(), false);
        let view = attendance_daily(&[a, b, c], "c1", "2024-06-03");
        let order: Vec<&str> = view.rows.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_eq!(view.rows[0].status, AttendanceStatus::Absent);
        assert_eq!(
            view.counts,
            DailyAttendanceCounts {
                present: 1,
                absent: 1,
                no_record: 1,
                total: 3
            }
        );
    }

    #[test]
    fn attendance_summary_five_of_eight() {
        let mut s = student("a", "c1", Gender::Male, 1);
        for day in 1..=5 {
            s.attendance.insert(format!("2024-06-{:02}", day), true);
        }
        for day in 6..=8 {
            s.attendance.insert(format!("2024-06-{:02}", day), false);
        }
        let rows = attendance_summary(&[s], "c1");
        assert_eq!(rows[0].record_count, 8);
        assert_eq!(rows[0].present_days, 5);
        assert_eq!(rows[0].absent_days, 3);
        assert_eq!(rows[0].attendance_percent, "62.5");
    }

    #[test]
    fn attendance_percent_rounding() {
        assert_eq!(attendance_percent(0, 0), "0.0");
        assert_eq!(attendance_percent(2, 3), "66.7");
        assert_eq!(attendance_percent(1, 16), "6.3");
        assert_eq!(attendance_percent(4, 4), "100.0");
    }

    #[test]
    fn grade_band_boundaries() {
        assert_eq!(grade_for(33.0), "D");
        assert_eq!(grade_for(32.9), "F");
        assert_eq!(grade_for(90.0), "A+");
        assert_eq!(grade_for(89.99), "A");
        assert_eq!(grade_for(50.0), "C+");
        assert_eq!(grade_for(0.0), "F");
    }

    fn subject(class_id: &str, name: &str) -> Subject {
        Subject {
            id: format!("{}_{}", class_id, name.to_lowercase()),
            name: name.to_string(),
            code: name.to_lowercase(),
            subject_type: SubjectType::Core,
            class_id: class_id.to_string(),
        }
    }

    #[test]
    fn exam_results_and_stats() {
        let exam = Exam {
            id: "e1".into(),
            class_id: "c1".into(),
            name: "Midterm".into(),
            total_marks: Some(50),
            passing_marks: Some(20),
            start_date: None,
            end_date: None,
        };
        let subjects = vec![subject("c1", "Maths"), subject("c1", "Science"), subject("c2", "Art")];

        let mut top = student("top", "c1", Gender::Female, 1);
        top.marks.insert(
            "e1".into(),
            ExamMarks {
                total: 50.0,
                subjects: BTreeMap::from([("Maths".into(), 45.0), ("Science".into(), 45.0)]),
            },
        );
        let mut low = student("low", "c1", Gender::Male, 2);
        low.marks.insert(
            "e1".into(),
            ExamMarks {
                total: 50.0,
                subjects: BTreeMap::from([("Maths".into(), 18.0), ("Art".into(), 50.0)]),
            },
        );
        let absent = student("none", "c1", Gender::Other, 3);

        let res = exam_results(&[low, absent, top], &subjects, &exam);
        assert_eq!(res.subjects, vec!["Maths", "Science"]);
        assert_eq!(res.rows[0].student_id, "top");
        assert_eq!(res.rows[0].percentage, 90.0);
        assert_eq!(res.rows[0].grade, "A+");

        let low_row = &res.rows[1];
        assert_eq!(low_row.total_obtained, 18.0);
        assert_eq!(low_row.total_possible, 100.0);
        assert_eq!(low_row.percentage, 18.0);
        assert_eq!(low_row.grade, "F");
        assert_eq!(low_row.below_passing_marks, vec!["Maths"]);
        assert!(!low_row.passed);

        assert!(!res.rows[2].has_marks);
        let stats = res.stats.expect("stats");
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.average_percentage, 54.0);
        assert_eq!(stats.highest_percentage, 90.0);
        assert_eq!(stats.lowest_percentage, 18.0);
        assert_eq!(stats.pass_count, 1);
        assert_eq!(stats.pass_percentage, 50.0);
    }

    #[test]
    fn grade_and_pass_use_the_unrounded_percentage() {
        let exam = Exam {
            id: "e1".into(),
            class_id: "c1".into(),
            name: "Final".into(),
            total_marks: Some(100),
            passing_marks: None,
            start_date: None,
            end_date: None,
        };
        let subjects = vec![
            subject("c1", "Maths"),
            subject("c1", "Science"),
            subject("c1", "English"),
        ];
        let mut edge = student("edge", "c1", Gender::Male, 1);
        edge.marks.insert(
            "e1".into(),
            ExamMarks {
                total: 100.0,
                subjects: BTreeMap::from([
                    ("Maths".into(), 33.0),
                    ("Science".into(), 33.0),
                    ("English".into(), 32.99),
                ]),
            },
        );

        let res = exam_results(&[edge], &subjects, &exam);
        let row = &res.rows[0];
        assert_eq!(row.percentage, 33.0);
        assert!(row.raw_percentage < 33.0);
        assert_eq!(row.grade, "F");
        assert!(!row.passed);
        // No passingMarks on the exam: subjects are flagged under 33.
        assert_eq!(row.below_passing_marks, vec!["English"]);

        let stats = res.stats.expect("stats");
        assert_eq!(stats.pass_count, 0);
        assert_eq!(stats.highest_percentage, 33.0);
    }

    fn timetable(class_id: &str, entries: &[(&str, i64, &str, &str)]) -> ClassTimetable {
        ClassTimetable {
            class_id: class_id.to_string(),
            academic_year: None,
            entries: entries
                .iter()
                .map(|(day, period, subject, teacher)| TimetableEntry {
                    day: day.to_string(),
                    period: *period,
                    subject: subject.to_string(),
                    teacher_id: teacher.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn teacher_timetable_flattens_and_filters() {
        let tts = vec![
            timetable("c1", &[("Mon", 3, "Maths", "T1"), ("Mon", 1, "Art", "T2")]),
            timetable("c2", &[("Mon", 1, "Maths", "T1"), ("Tue", 2, "Maths", "T1")]),
        ];
        let slots = teacher_timetable(&tts, "T1");
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].class_id, "c1");

        let classes = vec![ClassRoom {
            id: "c2".into(),
            name: "9".into(),
            section: "B".into(),
            academic_year: None,
            max_strength: None,
            subjects: vec![],
            fees: Default::default(),
        }];
        let monday = teacher_day(&tts, &classes, "T1", "Mon");
        let periods: Vec<i64> = monday.iter().map(|d| d.slot.entry.period).collect();
        assert_eq!(periods, vec![1, 3]);
        assert_eq!(monday[0].class_label, "9 B");
        assert_eq!(monday[1].class_label, "c1");
    }

    #[test]
    fn day_labels_skip_sunday() {
        assert_eq!(day_label(Weekday::Mon), Some("Mon"));
        assert_eq!(day_label(Weekday::Sat), Some("Sat"));
        assert_eq!(day_label(Weekday::Sun), None);
    }

    fn notice(id: &str, created_at: &str, audience: Audience, expiry: Option<&str>) -> Notice {
        Notice {
            id: id.to_string(),
            title: id.to_string(),
            message: "m".to_string(),
            created_at: created_at.to_string(),
            active: true,
            audience,
            event_date: None,
            expiry_date: expiry.map(str::to_string),
        }
    }

    #[test]
    fn notices_filter_expiry_audience_and_sort() {
        let mut inactive = notice("off", "2024-06-05T00:00:00Z", Audience::Both, None);
        inactive.active = false;
        let notices = vec![
            notice("old", "2024-06-01T00:00:00Z", Audience::Both, None),
            notice("expired", "2024-06-02T00:00:00Z", Audience::Both, Some("2024-06-09")),
            notice("today", "2024-06-03T00:00:00Z", Audience::Teachers, Some("2024-06-10")),
            notice("staff", "2024-06-04T00:00:00Z", Audience::Admin, None),
            inactive,
        ];
        let admin: Vec<String> = visible_notices(&notices, "2024-06-10", Role::Admin)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(admin, vec!["staff", "today", "old"]);
        let teacher: Vec<String> = visible_notices(&notices, "2024-06-10", Role::Teacher)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(teacher, vec!["today", "old"]);
    }

    #[test]
    fn pending_marks_counts_students_without_marks() {
        let mut marked = student("m", "c1", Gender::Male, 1);
        marked.marks.insert("e1".into(), ExamMarks::default());
        let unmarked = student("u", "c1", Gender::Female, 2);
        let snapshot = Snapshot {
            classes: vec![ClassRoom {
                id: "c1".into(),
                name: "1".into(),
                section: String::new(),
                academic_year: None,
                max_strength: None,
                subjects: vec![],
                fees: Default::default(),
            }],
            students: vec![marked, unmarked],
            class_timetables: vec![timetable("c1", &[("Wed", 2, "Maths", "T1")])],
            exams: vec![
                Exam {
                    id: "e1".into(),
                    class_id: "c1".into(),
                    name: "Unit 1".into(),
                    total_marks: Some(20),
                    passing_marks: Some(7),
                    start_date: None,
                    end_date: None,
                },
                Exam {
                    id: "e2".into(),
                    class_id: "c9".into(),
                    name: "Elsewhere".into(),
                    total_marks: None,
                    passing_marks: None,
                    start_date: None,
                    end_date: None,
                },
            ],
            ..Default::default()
        };
        let pending = pending_marks(&snapshot, "T1");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].exam_id, "e1");
        assert_eq!(pending[0].pending_students, 1);
        assert!(pending_marks(&snapshot, "T2").is_empty());
    }
}
