#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_grouptoold");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn grouptoold");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

/// A selected workspace with one course, one grouptool instance (`cmid`) and
/// the named groups, each activated in turn.
pub struct Seeded {
    pub workspace: PathBuf,
    pub course_id: i64,
    pub cmid: i64,
    pub group_ids: Vec<i64>,
}

pub fn seed_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
    tool: serde_json::Value,
    names: &[&str],
) -> Seeded {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "seed-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course = request_ok(
        stdin,
        reader,
        "seed-course",
        "courses.create",
        json!({ "name": "Seed course" }),
    );
    let course_id = course["courseId"].as_i64().expect("courseId");

    let mut params = tool;
    params["courseId"] = json!(course_id);
    let created = request_ok(stdin, reader, "seed-tool", "grouptool.create", params);
    let cmid = created["grouptool"]["cmid"].as_i64().expect("cmid");

    let mut group_ids = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let group = request_ok(
            stdin,
            reader,
            &format!("seed-group-{}", i),
            "groups.create",
            json!({ "courseId": course_id, "name": name }),
        );
        let gid = group["groupId"].as_i64().expect("groupId");
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-activate-{}", i),
            "agrps.activate",
            json!({ "cmid": cmid, "groupId": gid }),
        );
        group_ids.push(gid);
    }

    Seeded {
        workspace,
        course_id,
        cmid,
        group_ids,
    }
}

/// Group ids of a `sortlist.open` result in display order.
pub fn listed_ids(sortlist: &serde_json::Value) -> Vec<i64> {
    sortlist["groups"]
        .as_array()
        .expect("groups")
        .iter()
        .map(|g| g["groupId"].as_i64().expect("groupId"))
        .collect()
}
