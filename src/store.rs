//! Record store: per-collection reads and writes over the workspace database.
//!
//! Every getAll-style read returns rows in insertion order so derived views
//! stay order-stable.

use crate::model::{
    ClassRoom, ClassTeacherMapping, ClassTimetable, Exam, ExamMarks, Fee, FeeType, LegacyClassFees,
    Notice, Snapshot, Student, Subject, Teacher, TimetableEntry,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

pub trait Record: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg)),
    )
}

fn enum_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn opt_enum_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<T>().map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn json_col<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e.to_string()))
}

impl Record for ClassRoom {
    const TABLE: &'static str = "classes";
    const COLUMNS: &'static str =
        "id, name, section, academic_year, max_strength, legacy_subjects, legacy_fees";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ClassRoom {
            id: row.get(0)?,
            name: row.get(1)?,
            section: row.get(2)?,
            academic_year: row.get(3)?,
            max_strength: row.get(4)?,
            subjects: json_col(row, 5)?,
            fees: json_col(row, 6)?,
        })
    }
}

impl Record for Student {
    const TABLE: &'static str = "students";
    const COLUMNS: &'static str = "id, name, gender, dob, admission_no, class_id, section, roll_no,
         guardian_name, guardian_phone, address, email";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: row.get(0)?,
            name: row.get(1)?,
            gender: enum_col(row, 2)?,
            dob: row.get(3)?,
            admission_no: row.get(4)?,
            class_id: row.get(5)?,
            section: row.get(6)?,
            roll_no: row.get(7)?,
            guardian_name: row.get(8)?,
            guardian_phone: row.get(9)?,
            address: row.get(10)?,
            email: row.get(11)?,
            attendance: BTreeMap::new(),
            fees_paid: BTreeMap::new(),
            marks: BTreeMap::new(),
        })
    }
}

impl Record for Teacher {
    const TABLE: &'static str = "teachers";
    const COLUMNS: &'static str = "id, name, gender, dob, qualification, subject, contact_number,
         email, address, password_hash, is_class_teacher, class_id";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Teacher {
            id: row.get(0)?,
            name: row.get(1)?,
            gender: opt_enum_col(row, 2)?,
            dob: row.get(3)?,
            qualification: row.get(4)?,
            expertise: Vec::new(),
            subject: row.get(5)?,
            contact_number: row.get(6)?,
            email: row.get(7)?,
            address: row.get(8)?,
            password_hash: row.get(9)?,
            is_class_teacher: row.get::<_, i64>(10)? != 0,
            class_id: row.get(11)?,
        })
    }
}

impl Record for ClassTeacherMapping {
    const TABLE: &'static str = "class_teacher_mappings";
    const COLUMNS: &'static str = "id, class_id, teacher_id, assigned_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ClassTeacherMapping {
            id: row.get(0)?,
            class_id: row.get(1)?,
            teacher_id: row.get(2)?,
            assigned_at: row.get(3)?,
        })
    }
}

impl Record for Subject {
    const TABLE: &'static str = "subjects";
    const COLUMNS: &'static str = "id, name, code, type, class_id";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Subject {
            id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
            subject_type: enum_col(row, 3)?,
            class_id: row.get(4)?,
        })
    }
}

impl Record for Fee {
    const TABLE: &'static str = "fees";
    const COLUMNS: &'static str = "id, class_id, type, amount, applicable_gender, due_date";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Fee {
            id: row.get(0)?,
            class_id: row.get(1)?,
            fee_type: enum_col(row, 2)?,
            amount: row.get(3)?,
            applicable_gender: enum_col(row, 4)?,
            due_date: row.get(5)?,
        })
    }
}

impl Record for Exam {
    const TABLE: &'static str = "exams";
    const COLUMNS: &'static str =
        "id, class_id, name, total_marks, passing_marks, start_date, end_date";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Exam {
            id: row.get(0)?,
            class_id: row.get(1)?,
            name: row.get(2)?,
            total_marks: row.get(3)?,
            passing_marks: row.get(4)?,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
        })
    }
}

impl Record for Notice {
    const TABLE: &'static str = "notices";
    const COLUMNS: &'static str =
        "id, title, message, created_at, active, audience, event_date, expiry_date";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Notice {
            id: row.get(0)?,
            title: row.get(1)?,
            message: row.get(2)?,
            created_at: row.get(3)?,
            active: row.get::<_, i64>(4)? != 0,
            audience: enum_col(row, 5)?,
            event_date: row.get(6)?,
            expiry_date: row.get(7)?,
        })
    }
}

// ===== Generic primitives =====

pub fn all<T: Record>(conn: &Connection) -> rusqlite::Result<Vec<T>> {
    let sql = format!("SELECT {} FROM {} ORDER BY rowid", T::COLUMNS, T::TABLE);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |r| T::from_row(r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Rows whose `column` equals `value`. `column` is always a literal from this crate.
pub fn all_where<T: Record>(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Vec<T>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ? ORDER BY rowid",
        T::COLUMNS,
        T::TABLE,
        column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([value], |r| T::from_row(r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get<T: Record>(conn: &Connection, id: &str) -> rusqlite::Result<Option<T>> {
    let sql = format!("SELECT {} FROM {} WHERE id = ?", T::COLUMNS, T::TABLE);
    conn.query_row(&sql, [id], |r| T::from_row(r)).optional()
}

pub fn exists<T: Record>(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", T::TABLE);
    conn.query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}

pub fn delete<T: Record>(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
    conn.execute(&sql, [id])
}

pub fn delete_where<T: Record>(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<usize> {
    let sql = format!("DELETE FROM {} WHERE {} = ?", T::TABLE, column);
    conn.execute(&sql, [value])
}

// ===== Classes =====

/// Inserts or merges a class by id. Legacy embedded subjects/fees survive a merge.
pub fn class_upsert(conn: &Connection, class: &ClassRoom) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO classes(id, name, section, academic_year, max_strength)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           section = excluded.section,
           academic_year = excluded.academic_year,
           max_strength = excluded.max_strength",
        params![
            class.id,
            class.name,
            class.section,
            class.academic_year,
            class.max_strength
        ],
    )?;
    Ok(())
}

pub fn class_set_legacy_fees(
    conn: &Connection,
    class_id: &str,
    fees: &LegacyClassFees,
) -> rusqlite::Result<usize> {
    let raw = serde_json::to_string(fees).map_err(|e| conversion_err(0, e.to_string()))?;
    conn.execute(
        "UPDATE classes SET legacy_fees = ? WHERE id = ?",
        params![raw, class_id],
    )
}

pub fn class_set_legacy_subjects(
    conn: &Connection,
    class_id: &str,
    subjects: &[String],
) -> rusqlite::Result<usize> {
    let raw = serde_json::to_string(subjects).map_err(|e| conversion_err(0, e.to_string()))?;
    conn.execute(
        "UPDATE classes SET legacy_subjects = ? WHERE id = ?",
        params![raw, class_id],
    )
}

// ===== Students =====

fn hydrate_students(conn: &Connection, students: &mut [Student]) -> rusqlite::Result<()> {
    if students.is_empty() {
        return Ok(());
    }
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for (i, s) in students.iter().enumerate() {
        by_id.insert(s.id.clone(), i);
    }

    let mut stmt = conn.prepare("SELECT student_id, date, present FROM attendance")?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)? != 0))
    })?;
    for row in rows {
        let (sid, date, present) = row?;
        if let Some(&i) = by_id.get(&sid) {
            students[i].attendance.insert(date, present);
        }
    }

    let mut stmt = conn.prepare("SELECT student_id, fee_type, paid FROM fee_payments")?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(0)?, enum_col::<FeeType>(r, 1)?, r.get::<_, i64>(2)? != 0))
    })?;
    for row in rows {
        let (sid, fee_type, paid) = row?;
        if let Some(&i) = by_id.get(&sid) {
            students[i].fees_paid.insert(fee_type, paid);
        }
    }

    let mut stmt = conn.prepare("SELECT student_id, exam_id, total FROM mark_totals")?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, f64>(2)?))
    })?;
    for row in rows {
        let (sid, exam_id, total) = row?;
        if let Some(&i) = by_id.get(&sid) {
            students[i].marks.entry(exam_id).or_default().total = total;
        }
    }

    let mut stmt = conn.prepare("SELECT student_id, exam_id, subject, score FROM marks")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, f64>(3)?,
        ))
    })?;
    for row in rows {
        let (sid, exam_id, subject, score) = row?;
        if let Some(&i) = by_id.get(&sid) {
            students[i]
                .marks
                .entry(exam_id)
                .or_insert_with(ExamMarks::default)
                .subjects
                .insert(subject, score);
        }
    }
    Ok(())
}

pub fn students_all(conn: &Connection) -> rusqlite::Result<Vec<Student>> {
    let mut students = all::<Student>(conn)?;
    hydrate_students(conn, &mut students)?;
    Ok(students)
}

pub fn students_in_class(conn: &Connection, class_id: &str) -> rusqlite::Result<Vec<Student>> {
    let mut students = all_where::<Student>(conn, "class_id", class_id)?;
    hydrate_students(conn, &mut students)?;
    Ok(students)
}

pub fn student_get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Student>> {
    let Some(student) = get::<Student>(conn, id)? else {
        return Ok(None);
    };
    let mut one = [student];
    hydrate_students(conn, &mut one)?;
    let [student] = one;
    Ok(Some(student))
}

/// One more than the highest roll number in the class (and section, if given).
pub fn next_roll_no(conn: &Connection, class_id: &str, section: Option<&str>) -> rusqlite::Result<i64> {
    match section {
        Some(sec) => conn.query_row(
            "SELECT COALESCE(MAX(roll_no), 0) + 1 FROM students WHERE class_id = ? AND section = ?",
            params![class_id, sec],
            |r| r.get(0),
        ),
        None => conn.query_row(
            "SELECT COALESCE(MAX(roll_no), 0) + 1 FROM students WHERE class_id = ?",
            [class_id],
            |r| r.get(0),
        ),
    }
}

pub fn student_insert(conn: &Connection, s: &Student) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO students(id, name, gender, dob, admission_no, class_id, section, roll_no,
           guardian_name, guardian_phone, address, email)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            s.id,
            s.name,
            s.gender.as_str(),
            s.dob,
            s.admission_no,
            s.class_id,
            s.section,
            s.roll_no,
            s.guardian_name,
            s.guardian_phone,
            s.address,
            s.email
        ],
    )?;
    Ok(())
}

pub fn attendance_set(conn: &Connection, student_id: &str, date: &str, present: bool) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO attendance(student_id, date, present) VALUES(?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET present = excluded.present",
        params![student_id, date, present as i64],
    )?;
    Ok(())
}

pub fn fee_payment_set(conn: &Connection, student_id: &str, fee_type: FeeType, paid: bool) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO fee_payments(student_id, fee_type, paid) VALUES(?, ?, ?)
         ON CONFLICT(student_id, fee_type) DO UPDATE SET paid = excluded.paid",
        params![student_id, fee_type.as_str(), paid as i64],
    )?;
    Ok(())
}

pub fn marks_set(
    conn: &Connection,
    student_id: &str,
    exam_id: &str,
    subject: &str,
    score: f64,
    total: f64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO mark_totals(student_id, exam_id, total) VALUES(?, ?, ?)
         ON CONFLICT(student_id, exam_id) DO UPDATE SET total = excluded.total",
        params![student_id, exam_id, total],
    )?;
    conn.execute(
        "INSERT INTO marks(student_id, exam_id, subject, score) VALUES(?, ?, ?, ?)
         ON CONFLICT(student_id, exam_id, subject) DO UPDATE SET score = excluded.score",
        params![student_id, exam_id, subject, score],
    )?;
    Ok(())
}

pub fn student_set_class(conn: &Connection, student_id: &str, class_id: &str, roll_no: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE students SET class_id = ?, roll_no = ? WHERE id = ?",
        params![class_id, roll_no, student_id],
    )
}

/// Removes a student row and the attendance, fee and mark rows hanging off it.
pub fn student_delete_with_records(conn: &Connection, student_id: &str) -> rusqlite::Result<usize> {
    for table in ["attendance", "fee_payments", "marks", "mark_totals"] {
        conn.execute(
            &format!("DELETE FROM {} WHERE student_id = ?", table),
            [student_id],
        )?;
    }
    delete::<Student>(conn, student_id)
}

// ===== Teachers =====

fn hydrate_teachers(conn: &Connection, teachers: &mut [Teacher]) -> rusqlite::Result<()> {
    if teachers.is_empty() {
        return Ok(());
    }
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for (i, t) in teachers.iter().enumerate() {
        by_id.insert(t.id.clone(), i);
    }
    let mut stmt =
        conn.prepare("SELECT teacher_id, subject FROM teacher_expertise ORDER BY teacher_id, sort_order")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (tid, subject) = row?;
        if let Some(&i) = by_id.get(&tid) {
            teachers[i].expertise.push(subject);
        }
    }
    Ok(())
}

pub fn teachers_all(conn: &Connection) -> rusqlite::Result<Vec<Teacher>> {
    let mut teachers = all::<Teacher>(conn)?;
    hydrate_teachers(conn, &mut teachers)?;
    Ok(teachers)
}

pub fn teacher_get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Teacher>> {
    let Some(teacher) = get::<Teacher>(conn, id)? else {
        return Ok(None);
    };
    let mut one = [teacher];
    hydrate_teachers(conn, &mut one)?;
    let [teacher] = one;
    Ok(Some(teacher))
}

/// Inserts or replaces the profile columns of a teacher, including expertise.
/// Class-teacher columns are owned by the lifecycle manager and left untouched
/// on conflict.
pub fn teacher_upsert(conn: &Connection, t: &Teacher) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO teachers(id, name, gender, dob, qualification, subject, contact_number,
           email, address, password_hash, is_class_teacher, class_id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           gender = excluded.gender,
           dob = excluded.dob,
           qualification = excluded.qualification,
           subject = excluded.subject,
           contact_number = excluded.contact_number,
           email = excluded.email,
           address = excluded.address,
           password_hash = excluded.password_hash",
        params![
            t.id,
            t.name,
            t.gender.map(|g| g.as_str()),
            t.dob,
            t.qualification,
            t.subject,
            t.contact_number,
            t.email,
            t.address,
            t.password_hash
        ],
    )?;
    conn.execute("DELETE FROM teacher_expertise WHERE teacher_id = ?", [&t.id])?;
    for (i, subject) in t.expertise.iter().enumerate() {
        conn.execute(
            "INSERT INTO teacher_expertise(teacher_id, sort_order, subject) VALUES(?, ?, ?)",
            params![t.id, i as i64, subject],
        )?;
    }
    Ok(())
}

pub fn teacher_set_class(conn: &Connection, teacher_id: &str, class_id: Option<&str>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE teachers SET is_class_teacher = ?, class_id = ? WHERE id = ?",
        params![class_id.is_some() as i64, class_id, teacher_id],
    )
}

pub fn teacher_delete_with_records(conn: &Connection, teacher_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM teacher_expertise WHERE teacher_id = ?", [teacher_id])?;
    delete::<Teacher>(conn, teacher_id)
}

// ===== Class-teacher mappings =====

pub fn mapping_for_class(conn: &Connection, class_id: &str) -> rusqlite::Result<Option<ClassTeacherMapping>> {
    Ok(all_where::<ClassTeacherMapping>(conn, "class_id", class_id)?
        .into_iter()
        .next())
}

pub fn mappings_for_teacher(conn: &Connection, teacher_id: &str) -> rusqlite::Result<Vec<ClassTeacherMapping>> {
    all_where::<ClassTeacherMapping>(conn, "teacher_id", teacher_id)
}

/// Makes `m` the only mapping for its class.
pub fn mapping_replace(conn: &Connection, m: &ClassTeacherMapping) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM class_teacher_mappings WHERE class_id = ?",
        [&m.class_id],
    )?;
    conn.execute(
        "INSERT INTO class_teacher_mappings(id, class_id, teacher_id, assigned_at)
         VALUES(?, ?, ?, ?)",
        params![m.id, m.class_id, m.teacher_id, m.assigned_at],
    )?;
    Ok(())
}

pub fn mapping_delete_for_class(conn: &Connection, class_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM class_teacher_mappings WHERE class_id = ?",
        [class_id],
    )
}

pub fn mapping_delete_for_teacher(conn: &Connection, teacher_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM class_teacher_mappings WHERE teacher_id = ?",
        [teacher_id],
    )
}

// ===== Subjects, fees, exams, notices =====

pub fn subject_upsert(conn: &Connection, s: &Subject) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO subjects(id, name, code, type, class_id) VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           code = excluded.code,
           type = excluded.type,
           class_id = excluded.class_id",
        params![s.id, s.name, s.code, s.subject_type.as_str(), s.class_id],
    )?;
    Ok(())
}

pub fn fee_upsert(conn: &Connection, f: &Fee) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO fees(id, class_id, type, amount, applicable_gender, due_date)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           amount = excluded.amount,
           applicable_gender = excluded.applicable_gender,
           due_date = excluded.due_date",
        params![
            f.id,
            f.class_id,
            f.fee_type.as_str(),
            f.amount,
            f.applicable_gender.as_str(),
            f.due_date
        ],
    )?;
    Ok(())
}

pub fn exam_insert(conn: &Connection, e: &Exam) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO exams(id, class_id, name, total_marks, passing_marks, start_date, end_date)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            e.id,
            e.class_id,
            e.name,
            e.total_marks,
            e.passing_marks,
            e.start_date,
            e.end_date
        ],
    )?;
    Ok(())
}

/// Drops every mark recorded against the exams of one class. Returns the
/// number of subject scores removed.
pub fn exam_marks_delete_for_class(conn: &Connection, class_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM mark_totals WHERE exam_id IN (SELECT id FROM exams WHERE class_id = ?)",
        [class_id],
    )?;
    conn.execute(
        "DELETE FROM marks WHERE exam_id IN (SELECT id FROM exams WHERE class_id = ?)",
        [class_id],
    )
}

pub fn notice_insert(conn: &Connection, n: &Notice) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO notices(id, title, message, created_at, active, audience, event_date, expiry_date)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            n.id,
            n.title,
            n.message,
            n.created_at,
            n.active as i64,
            n.audience.as_str(),
            n.event_date,
            n.expiry_date
        ],
    )?;
    Ok(())
}

// ===== Timetables =====

fn timetable_entries(conn: &Connection, class_id: &str) -> rusqlite::Result<Vec<TimetableEntry>> {
    let mut stmt = conn.prepare(
        "SELECT day, period, subject, teacher_id
         FROM timetable_entries
         WHERE class_id = ?
         ORDER BY position",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(TimetableEntry {
                day: r.get(0)?,
                period: r.get(1)?,
                subject: r.get(2)?,
                teacher_id: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn timetable_get(conn: &Connection, class_id: &str) -> rusqlite::Result<Option<ClassTimetable>> {
    let academic_year: Option<Option<String>> = conn
        .query_row(
            "SELECT academic_year FROM class_timetables WHERE class_id = ?",
            [class_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(academic_year) = academic_year else {
        return Ok(None);
    };
    Ok(Some(ClassTimetable {
        class_id: class_id.to_string(),
        academic_year,
        entries: timetable_entries(conn, class_id)?,
    }))
}

pub fn timetables_all(conn: &Connection) -> rusqlite::Result<Vec<ClassTimetable>> {
    let mut stmt = conn.prepare("SELECT class_id, academic_year FROM class_timetables ORDER BY rowid")?;
    let heads = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    heads
        .into_iter()
        .map(|(class_id, academic_year)| {
            let entries = timetable_entries(conn, &class_id)?;
            Ok(ClassTimetable {
                class_id,
                academic_year,
                entries,
            })
        })
        .collect()
}

/// Replaces the whole entry list of a class timetable, creating it if needed.
pub fn timetable_replace(
    conn: &Connection,
    class_id: &str,
    academic_year: Option<&str>,
    entries: &[TimetableEntry],
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO class_timetables(class_id, academic_year) VALUES(?, ?)
         ON CONFLICT(class_id) DO UPDATE SET academic_year = excluded.academic_year",
        params![class_id, academic_year],
    )?;
    conn.execute("DELETE FROM timetable_entries WHERE class_id = ?", [class_id])?;
    for (i, e) in entries.iter().enumerate() {
        conn.execute(
            "INSERT INTO timetable_entries(class_id, position, day, period, subject, teacher_id)
             VALUES(?, ?, ?, ?, ?, ?)",
            params![class_id, i as i64, e.day, e.period, e.subject, e.teacher_id],
        )?;
    }
    Ok(())
}

pub fn timetable_delete(conn: &Connection, class_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM timetable_entries WHERE class_id = ?", [class_id])?;
    conn.execute("DELETE FROM class_timetables WHERE class_id = ?", [class_id])
}

/// Drops every entry taught by one of `teacher_ids`, in every class timetable.
pub fn timetable_prune_teachers(conn: &Connection, teacher_ids: &[String]) -> rusqlite::Result<usize> {
    let mut removed = 0;
    for tid in teacher_ids {
        removed += conn.execute("DELETE FROM timetable_entries WHERE teacher_id = ?", [tid])?;
    }
    Ok(removed)
}

pub fn timetable_repoint_teacher(conn: &Connection, from: &str, to: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE timetable_entries SET teacher_id = ? WHERE teacher_id = ?",
        params![to, from],
    )
}

// ===== Snapshot =====

pub fn load_snapshot(conn: &Connection) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        classes: all(conn)?,
        students: students_all(conn)?,
        teachers: teachers_all(conn)?,
        class_timetables: timetables_all(conn)?,
        notices: all(conn)?,
        exams: all(conn)?,
        subjects: all(conn)?,
        fees: all(conn)?,
        class_teacher_mappings: all(conn)?,
    })
}
