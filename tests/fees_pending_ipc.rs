use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    token: Option<String>,
}

impl Sidecar {
    fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_schoold");
        let mut child = Command::new(exe)
            .env_remove("SCHOOLD_WORKSPACE")
            .env_remove("SCHOOLD_ADMIN_ID")
            .env_remove("SCHOOLD_ADMIN_PASSWORD")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn schoold");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
            token: None,
        }
    }

    fn read_line(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response");
        serde_json::from_str(line.trim()).expect("parse response json")
    }

    fn call(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let mut payload = json!({ "id": id, "method": method, "params": params });
        if let Some(token) = &self.token {
            payload["token"] = json!(token);
        }
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");
        let value = self.read_line();
        assert_eq!(value["id"], json!(id));
        value
    }

    fn ok(&mut self, method: &str, params: Value) -> Value {
        let v = self.call(method, params);
        assert_eq!(v["ok"], json!(true), "{} failed: {}", method, v["error"]);
        v["result"].clone()
    }

    fn err_code(&mut self, method: &str, params: Value) -> String {
        let v = self.call(method, params);
        assert_eq!(v["ok"], json!(false), "{} unexpectedly ok: {}", method, v["result"]);
        v["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    fn login(&mut self, username: &str, password: &str) -> String {
        let r = self.ok("auth.login", json!({ "username": username, "password": password }));
        let token = r["token"].as_str().expect("token").to_string();
        self.token = Some(token.clone());
        token
    }

    fn open_as_admin(&mut self, workspace: &Path) {
        self.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
        self.login("admin", "admin123");
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn pending_by_name(result: &Value) -> Vec<(String, Value, f64)> {
    result["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| {
            (
                s["name"].as_str().expect("name").to_string(),
                s["pending"].clone(),
                s["pendingAmount"].as_f64().expect("pendingAmount"),
            )
        })
        .collect()
}

#[test]
fn pending_fees_follow_gender_and_payments() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.open_as_admin(dir.path());
    sc.ok("classes.create", json!({ "name": "10", "section": "A" }));

    let term = sc.ok("fees.upsert", json!({ "classId": "c10A", "type": "term", "amount": 900 }));
    assert_eq!(term["fee"]["id"], json!("fee_c10A_term"));
    assert_eq!(term["fee"]["applicableGender"], json!("Male"));
    sc.ok(
        "fees.upsert",
        json!({ "classId": "c10A", "type": "exam", "amount": 200, "applicableGender": "Both", "dueDate": "2026-03-31" }),
    );
    // Upserting the same type replaces the amount.
    sc.ok("fees.upsert", json!({ "classId": "c10A", "type": "term", "amount": 1000 }));
    assert_eq!(sc.ok("fees.list", json!({ "classId": "c10A" }))["fees"].as_array().map(Vec::len), Some(2));

    let arjun = sc.ok("students.create", json!({ "name": "Arjun Rao", "gender": "Male", "classId": "c10A" }));
    let arjun = arjun["student"]["id"].as_str().expect("id").to_string();
    sc.ok("students.create", json!({ "name": "Diya Paul", "gender": "Female", "classId": "c10A" }));

    let all = sc.ok("views.pendingFees", json!({}));
    assert_eq!(
        pending_by_name(&all),
        vec![
            ("Arjun Rao".to_string(), json!(["term", "exam"]), 1200.0),
            ("Diya Paul".to_string(), json!(["exam"]), 200.0),
        ]
    );
    assert_eq!(all["totalPending"].as_f64(), Some(1400.0));

    sc.ok("students.setFeePaid", json!({ "studentId": arjun, "type": "term" }));
    let after = sc.ok("views.pendingFees", json!({ "classId": "c10A" }));
    assert_eq!(pending_by_name(&after)[0], ("Arjun Rao".to_string(), json!(["exam"]), 200.0));

    sc.ok("students.setFeePaid", json!({ "studentId": arjun, "type": "exam" }));
    let girls = sc.ok("views.pendingFees", json!({ "gender": "Female" }));
    assert_eq!(pending_by_name(&girls).len(), 1);
    let boys = sc.ok("views.pendingFees", json!({ "gender": "Male" }));
    assert_eq!(boys["students"], json!([]));

    // Marking a fee unpaid again brings it back.
    sc.ok("students.setFeePaid", json!({ "studentId": arjun, "type": "exam", "paid": false }));
    let boys = sc.ok("views.pendingFees", json!({ "gender": "Male" }));
    assert_eq!(pending_by_name(&boys)[0].1, json!(["exam"]));

    for (params, field) in [
        (json!({ "classId": "c10A", "type": "library", "amount": 5 }), "type"),
        (json!({ "classId": "c10A", "type": "term", "amount": -5 }), "amount"),
        (json!({ "classId": "c10A", "type": "term", "amount": 5, "applicableGender": "Any" }), "applicableGender"),
        (json!({ "classId": "c10A", "type": "term", "amount": 5, "dueDate": "31-03-2026" }), "dueDate"),
        (json!({ "classId": "c11", "type": "term", "amount": 5 }), "classId"),
    ] {
        let v = sc.call("fees.upsert", params);
        assert_eq!(v["error"]["details"]["field"], json!(field), "{}", v);
    }
}

#[test]
fn legacy_class_fees_and_subjects_migrate_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.open_as_admin(dir.path());
    sc.ok("classes.create", json!({ "name": "9" }));
    sc.ok(
        "classes.setLegacyFees",
        json!({ "classId": "c9", "fees": { "exam": 300, "term": 0, "utilities": 75.5 } }),
    );
    sc.ok("classes.addLegacySubject", json!({ "classId": "c9", "name": "Hindi" }));
    let subjects = sc.ok("classes.addLegacySubject", json!({ "classId": "c9", "name": "Hindi" }));
    assert_eq!(subjects["subjects"], json!(["Hindi"]));

    // Re-saving the class keeps the embedded legacy data.
    sc.ok("classes.create", json!({ "name": "9", "academicYear": "2026-27" }));
    let listed = sc.ok("classes.list", json!({}));
    assert_eq!(listed["classes"][0]["subjects"], json!(["Hindi"]));
    assert_eq!(listed["classes"][0]["academicYear"], json!("2026-27"));

    let first = sc.ok("migrate.legacy", json!({}));
    assert_eq!(first["steps"], json!([{ "step": "subjects", "affected": 1 }, { "step": "fees", "affected": 2 }]));
    let again = sc.ok("migrate.legacy", json!({}));
    assert_eq!(again["steps"], first["steps"]);

    let fees = sc.ok("fees.list", json!({ "classId": "c9" }))["fees"].clone();
    assert_eq!(fees.as_array().map(Vec::len), Some(2));
    assert_eq!(fees[0]["id"], json!("fee_c9_exam"));
    assert_eq!(fees[0]["amount"].as_f64(), Some(300.0));
    assert_eq!(fees[0]["applicableGender"], json!("Male"));
    assert_eq!(fees[1]["type"], json!("utilities"));

    let subjects = sc.ok("subjects.list", json!({ "classId": "c9" }))["subjects"].clone();
    assert_eq!(
        subjects,
        json!([{ "id": "c9_hindi", "name": "Hindi", "code": "C9_HINDI", "type": "Core", "classId": "c9" }])
    );

    let created = sc.ok(
        "subjects.create",
        json!({ "classId": "c9", "name": "Social Studies", "type": "Elective" }),
    );
    assert_eq!(created["subject"]["code"], json!("socialst"));
    assert_eq!(created["subject"]["id"], json!("c9_social_studies"));

    let bad = sc.call("classes.setLegacyFees", json!({ "classId": "c9", "fees": { "exam": -1 } }));
    assert_eq!(bad["error"]["details"]["field"], json!("fees.exam"));
}
