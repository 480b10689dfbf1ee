use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
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

/// Each daemon run opens the same workspace with its clock pinned to `now`.
fn spawn_at(workspace: &Path, now: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .arg("--workspace")
        .arg(workspace)
        .arg("--fixed-now")
        .arg(now)
        .env_remove("GRADEBOOK_UNENROLL_GRADES")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn create_students(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
    n: usize,
) {
    for i in 0..n {
        let handle = format!("{}-{}", prefix, i);
        request_ok(
            stdin,
            reader,
            &handle,
            "users.create",
            json!({ "name": handle, "handle": handle, "role": "STUDENT", "credential": "x" }),
        );
    }
}

#[test]
fn growth_is_zero_when_previous_month_is_empty() {
    let workspace = temp_dir("gradebook-growth-empty");
    let (mut child, mut stdin, mut reader) = spawn_at(&workspace, "2026-03-15T12:00:00Z");

    create_students(&mut stdin, &mut reader, "mar", 5);
    let growth = request_ok(&mut stdin, &mut reader, "g", "stats.monthlyGrowth", json!({}));
    assert_eq!(growth["users"]["current"], json!(5));
    assert_eq!(growth["users"]["previous"], json!(0));
    assert_eq!(growth["users"]["growthPercent"], json!(0));
    assert_eq!(growth["currentMonthStart"], json!("2026-03-01T00:00:00.000Z"));
    assert_eq!(growth["previousMonthStart"], json!("2026-02-01T00:00:00.000Z"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn growth_compares_calendar_months_across_restarts() {
    let workspace = temp_dir("gradebook-growth-restart");

    let (mut child, mut stdin, mut reader) = spawn_at(&workspace, "2026-01-31T23:59:59Z");
    create_students(&mut stdin, &mut reader, "jan", 3);
    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_at(&workspace, "2026-02-10T08:00:00Z");
    create_students(&mut stdin, &mut reader, "feb", 2);
    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_at(&workspace, "2026-03-01T00:00:00Z");
    create_students(&mut stdin, &mut reader, "mar", 3);
    let growth = request_ok(&mut stdin, &mut reader, "g", "stats.monthlyGrowth", json!({}));
    // January rows fall outside both windows.
    assert_eq!(growth["users"]["previous"], json!(2));
    assert_eq!(growth["users"]["current"], json!(3));
    assert_eq!(growth["users"]["growthPercent"], json!(50));
    assert_eq!(growth["subjects"]["growthPercent"], json!(0));

    let overview = request_ok(&mut stdin, &mut reader, "o", "stats.systemOverview", json!({}));
    assert_eq!(overview["users"]["students"], json!(8));
    // Trailing seven days from March 1 reach back to February 22.
    assert_eq!(overview["recentActivity"]["users"], json!(3));
    assert_eq!(overview["academic"]["minGrade"], json!(0));
    assert_eq!(overview["academic"]["passRate"], json!(0));

    drop(stdin);
    let _ = child.wait();
}
