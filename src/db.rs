use crate::config::DB_FILE_NAME;
use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    create_schema(&conn)?;
    tracing::info!(workspace = %workspace.display(), "opened workspace database");
    Ok(conn)
}

fn create_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            section TEXT NOT NULL DEFAULT '',
            academic_year TEXT,
            max_strength INTEGER,
            legacy_subjects TEXT NOT NULL DEFAULT '[]',
            legacy_fees TEXT NOT NULL DEFAULT '{}'
        )",
        [],
    )?;

    // Student rows carry no foreign key to classes: a class may be deleted while
    // its students are reassigned in the same cascade.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            gender TEXT NOT NULL,
            dob TEXT,
            admission_no TEXT NOT NULL,
            class_id TEXT NOT NULL,
            section TEXT,
            roll_no INTEGER NOT NULL,
            guardian_name TEXT,
            guardian_phone TEXT,
            address TEXT,
            email TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            present INTEGER NOT NULL,
            PRIMARY KEY(student_id, date),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fee_payments(
            student_id TEXT NOT NULL,
            fee_type TEXT NOT NULL,
            paid INTEGER NOT NULL,
            PRIMARY KEY(student_id, fee_type),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS mark_totals(
            student_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            total REAL NOT NULL,
            PRIMARY KEY(student_id, exam_id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            student_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            score REAL NOT NULL,
            PRIMARY KEY(student_id, exam_id, subject),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_exam ON marks(exam_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            gender TEXT,
            dob TEXT,
            qualification TEXT,
            subject TEXT,
            contact_number TEXT,
            email TEXT,
            address TEXT,
            password_hash TEXT NOT NULL,
            is_class_teacher INTEGER NOT NULL DEFAULT 0,
            class_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_class ON teachers(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_expertise(
            teacher_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            subject TEXT NOT NULL,
            PRIMARY KEY(teacher_id, sort_order),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_teacher_mappings(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL UNIQUE,
            teacher_id TEXT NOT NULL,
            assigned_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            type TEXT NOT NULL,
            class_id TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_class ON subjects(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fees(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            type TEXT NOT NULL,
            amount REAL NOT NULL,
            applicable_gender TEXT NOT NULL,
            due_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fees_class ON fees(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_timetables(
            class_id TEXT PRIMARY KEY,
            academic_year TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_entries(
            class_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            day TEXT NOT NULL,
            period INTEGER NOT NULL,
            subject TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            PRIMARY KEY(class_id, position),
            FOREIGN KEY(class_id) REFERENCES class_timetables(class_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_entries_teacher ON timetable_entries(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            total_marks INTEGER,
            passing_marks INTEGER,
            start_date TEXT,
            end_date TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exams_class ON exams(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notices(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            event_date TEXT,
            expiry_date TEXT
        )",
        [],
    )?;

    // Workspaces created before notices had an audience.
    ensure_notices_audience(conn)?;

    Ok(())
}

fn ensure_notices_audience(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "notices", "audience")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE notices ADD COLUMN audience TEXT NOT NULL DEFAULT 'Both'",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
