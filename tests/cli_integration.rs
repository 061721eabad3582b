// CLI integration tests for the decode and filter flows. Render is not
// exercised here because it needs ffmpeg and a real video on the machine.
use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_recrop");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    parse_json(line)
}

const KEYFRAMES: &str =
    r#"[{"time":0,"x":0,"y":0,"w":100,"h":100},{"time":10,"x":50,"y":0,"w":50,"h":100}]"#;

#[test]
fn decode_flow_normalizes_records() {
    let output = cmd()
        .args(["decode", r#"[{"time":0,"x":1,"y":2,"w":3,"h":4},{"time":5,"x":6}]"#])
        .output()
        .expect("decode");
    assert!(output.status.success());
    let json = parse_json_line(&output.stdout);
    assert_eq!(json.get("count").unwrap().as_u64().unwrap(), 2);
    let frames = json.get("keyframes").unwrap().as_array().unwrap();
    assert_eq!(frames[0]["w"], 3.0);
    assert_eq!(frames[1]["time"], 5.0);
    assert!(frames[1].get("y").is_none());
}

#[test]
fn decode_reads_keyframes_from_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("keyframes.json");
    std::fs::write(&path, KEYFRAMES).expect("write keyframes");

    let output = cmd()
        .args(["decode", "-f", path.to_str().unwrap()])
        .output()
        .expect("decode");
    assert!(output.status.success());
    let json = parse_json_line(&output.stdout);
    assert_eq!(json.get("count").unwrap().as_u64().unwrap(), 2);
}

#[test]
fn decode_reads_stdin_when_no_argument() {
    let mut child = cmd()
        .arg("decode")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(KEYFRAMES.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
    let json = parse_json_line(&output.stdout);
    assert_eq!(json.get("count").unwrap().as_u64().unwrap(), 2);
}

#[test]
fn filter_raw_prints_escaped_expression() {
    let output = cmd()
        .args(["filter", KEYFRAMES, "--width", "200", "--height", "100", "--raw"])
        .output()
        .expect("filter");
    assert!(output.status.success());
    let filter = String::from_utf8_lossy(&output.stdout);
    let filter = filter.trim();
    assert!(filter.starts_with("crop=if(lte(t\\,10.000)"));
    assert!(filter.contains("-10.000000*t+200.000000"));
    assert!(!filter.replace("\\,", "").contains(','));
}

#[test]
fn filter_envelope_carries_frame_size() {
    let output = cmd()
        .args(["filter", KEYFRAMES, "--width", "200", "--height", "100"])
        .output()
        .expect("filter");
    assert!(output.status.success());
    let json = parse_json_line(&output.stdout);
    assert_eq!(json.get("width").unwrap().as_f64().unwrap(), 200.0);
    assert_eq!(json.get("height").unwrap().as_f64().unwrap(), 100.0);
    assert!(json.get("filter").unwrap().as_str().unwrap().starts_with("crop="));
}

#[test]
fn malformed_json_exit_code_and_kind() {
    let output = cmd().args(["decode", "[{"]).output().expect("decode");
    assert_eq!(output.status.code().unwrap(), 3);
    let json = parse_json_line(&output.stderr);
    assert_eq!(
        json.get("error").unwrap().get("kind").unwrap().as_str().unwrap(),
        "Parse"
    );
}

#[test]
fn non_array_keyframes_is_usage_error() {
    let output = cmd()
        .args(["decode", r#"{"time":0}"#])
        .output()
        .expect("decode");
    assert_eq!(output.status.code().unwrap(), 2);
}

#[test]
fn incomplete_keyframe_exit_code_and_kind() {
    let output = cmd()
        .args(["filter", r#"[{"time":0}]"#, "--width", "100", "--height", "100"])
        .output()
        .expect("filter");
    assert_eq!(output.status.code().unwrap(), 4);
    let json = parse_json_line(&output.stderr);
    assert_eq!(
        json.get("error").unwrap().get("kind").unwrap().as_str().unwrap(),
        "Incomplete"
    );
}

#[test]
fn missing_required_flag_is_usage_exit() {
    let output = cmd().args(["filter", KEYFRAMES]).output().expect("filter");
    assert_eq!(output.status.code().unwrap(), 2);
}

#[test]
fn missing_keyframes_file_is_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nope.json");

    let output = cmd()
        .args(["decode", "-f", path.to_str().unwrap()])
        .output()
        .expect("decode");
    assert_eq!(output.status.code().unwrap(), 5);
    let json = parse_json_line(&output.stderr);
    assert_eq!(
        json.get("error").unwrap().get("kind").unwrap().as_str().unwrap(),
        "NotFound"
    );
}

#[test]
fn check_reports_tool_availability() {
    let output = cmd().arg("check").output().expect("check");
    let json = parse_json_line(&output.stdout);
    let check = json.get("check").unwrap();
    assert!(check.get("ffmpeg").unwrap().is_boolean());
    assert!(check.get("ffprobe").unwrap().is_boolean());
    let code = output.status.code().unwrap();
    assert!(code == 0 || code == 7);
}
