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

fn mapping_pairs(sc: &mut Sidecar) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = sc.ok("classTeacher.list", json!({}))["mappings"]
        .as_array()
        .expect("mappings")
        .iter()
        .map(|m| {
            (
                m["classId"].as_str().expect("classId").to_string(),
                m["teacherId"].as_str().expect("teacherId").to_string(),
            )
        })
        .collect();
    pairs.sort();
    pairs
}

fn teacher(sc: &mut Sidecar, id: &str) -> Value {
    sc.ok("teachers.get", json!({ "teacherId": id }))["teacher"].clone()
}

#[test]
fn one_class_teacher_per_class_and_per_teacher() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.open_as_admin(dir.path());
    sc.ok("classes.create", json!({ "name": "6", "section": "A" }));
    sc.ok("classes.create", json!({ "name": "6", "section": "B" }));
    sc.ok("teachers.create", json!({ "id": "T1", "name": "Leela Nair" }));
    sc.ok("teachers.create", json!({ "id": "T2", "name": "Joseph Mathew" }));

    let assigned = sc.ok("classTeacher.assign", json!({ "classId": "c6A", "teacherId": "T1" }));
    assert_eq!(assigned["mapping"]["id"], json!("ct_c6A_T1"));
    assert_eq!(teacher(&mut sc, "T1")["isClassTeacher"], json!(true));
    assert_eq!(teacher(&mut sc, "T1")["classId"], json!("c6A"));

    // A new class teacher displaces the previous one.
    sc.ok("classTeacher.assign", json!({ "classId": "c6A", "teacherId": "T2" }));
    assert_eq!(mapping_pairs(&mut sc), vec![("c6A".to_string(), "T2".to_string())]);
    assert_eq!(teacher(&mut sc, "T1")["isClassTeacher"], json!(false));
    assert!(teacher(&mut sc, "T1").get("classId").is_none());

    // Assigning a teacher to a second class moves them.
    sc.ok("classTeacher.assign", json!({ "classId": "c6B", "teacherId": "T2" }));
    assert_eq!(mapping_pairs(&mut sc), vec![("c6B".to_string(), "T2".to_string())]);
    assert_eq!(teacher(&mut sc, "T2")["classId"], json!("c6B"));

    let listed = sc.ok("teachers.list", json!({ "isClassTeacher": true }));
    assert_eq!(listed["teachers"].as_array().map(Vec::len), Some(1));
    assert_eq!(listed["teachers"][0]["id"], json!("T2"));
    let by_class = sc.ok("teachers.list", json!({ "classId": "c6B" }));
    assert_eq!(by_class["teachers"][0]["id"], json!("T2"));

    let removed = sc.ok("classTeacher.unassign", json!({ "classId": "c6B" }));
    assert_eq!(removed["steps"][1]["step"], json!("mapping"));
    assert_eq!(removed["steps"][1]["affected"], json!(1));
    assert!(mapping_pairs(&mut sc).is_empty());
    assert_eq!(teacher(&mut sc, "T2")["isClassTeacher"], json!(false));

    assert_eq!(
        sc.err_code("classTeacher.assign", json!({ "classId": "c6A", "teacherId": "T9" })),
        "not_found"
    );
    assert_eq!(
        sc.err_code("classTeacher.assign", json!({ "classId": "c1", "teacherId": "T1" })),
        "not_found"
    );
}

#[test]
fn teacher_profile_drives_the_mapping() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.open_as_admin(dir.path());
    sc.ok("classes.create", json!({ "name": "5" }));
    sc.ok("classes.create", json!({ "name": "4" }));

    let created = sc.ok(
        "teachers.create",
        json!({ "id": "T7", "name": "Farah Khan", "subject": "English", "isClassTeacher": true, "classId": "c5" }),
    );
    assert_eq!(created["teacher"]["classId"], json!("c5"));
    assert_eq!(mapping_pairs(&mut sc), vec![("c5".to_string(), "T7".to_string())]);

    let missing = sc.call("teachers.update", json!({ "teacherId": "T7", "isClassTeacher": true, "classId": "c40" }));
    assert_eq!(missing["error"]["code"], json!("not_found"));

    let updated = sc.ok(
        "teachers.update",
        json!({ "teacherId": "T7", "qualification": "MA", "isClassTeacher": true, "classId": "c4" }),
    );
    assert_eq!(updated["teacher"]["qualification"], json!("MA"));
    assert_eq!(updated["teacher"]["subject"], json!("English"));
    assert_eq!(mapping_pairs(&mut sc), vec![("c4".to_string(), "T7".to_string())]);

    sc.ok("teachers.update", json!({ "teacherId": "T7", "isClassTeacher": false }));
    assert!(mapping_pairs(&mut sc).is_empty());

    let by_subject = sc.ok("teachers.list", json!({ "subject": "English" }));
    assert_eq!(by_subject["teachers"].as_array().map(Vec::len), Some(1));

    let needs_class = sc.call("teachers.create", json!({ "name": "No Class", "isClassTeacher": true }));
    assert_eq!(needs_class["error"]["details"]["field"], json!("classId"));
}

#[test]
fn teacher_subjects_can_be_handed_over() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.open_as_admin(dir.path());
    sc.ok("classes.create", json!({ "name": "3" }));
    sc.ok("teachers.create", json!({ "id": "T1", "name": "Leela Nair" }));
    sc.ok("teachers.create", json!({ "id": "T2", "name": "Joseph Mathew" }));
    sc.ok(
        "timetable.set",
        json!({ "classId": "c3", "entries": [
            { "day": "Wed", "period": 1, "subject": "EVS", "teacherId": "T1" },
            { "day": "Thu", "period": 2, "subject": "EVS", "teacherId": "T1" }
        ] }),
    );

    let moved = sc.ok("teachers.reassignSubjects", json!({ "teacherId": "T1", "toTeacherId": "T2" }));
    assert_eq!(moved["steps"][0]["affected"], json!(2));
    let slots = sc.ok("timetable.teacher", json!({ "teacherId": "T2" }))["slots"].clone();
    assert_eq!(slots.as_array().map(Vec::len), Some(2));
    assert_eq!(slots[0]["classId"], json!("c3"));

    let same = sc.call("teachers.reassignSubjects", json!({ "teacherId": "T2", "toTeacherId": "T2" }));
    assert_eq!(same["error"]["details"]["field"], json!("toTeacherId"));

    let unassigned = sc.ok("teachers.unassign", json!({ "teacherId": "T2" }));
    assert_eq!(unassigned["steps"][2]["step"], json!("timetableEntries"));
    assert_eq!(unassigned["steps"][2]["affected"], json!(2));

    sc.ok(
        "timetable.set",
        json!({ "classId": "c3", "entries": [{ "day": "Fri", "period": 6, "subject": "Art", "teacherId": "T1" }] }),
    );
    let deleted = sc.ok("teachers.delete", json!({ "teacherId": "T1", "reassignTo": "T2" }));
    assert_eq!(deleted["steps"][0]["step"], json!("timetableReassign"));
    let tt = sc.ok("timetable.get", json!({ "classId": "c3" }));
    assert_eq!(tt["timetable"]["entries"][0]["teacherId"], json!("T2"));
    assert_eq!(sc.err_code("teachers.get", json!({ "teacherId": "T1" })), "not_found");
}
