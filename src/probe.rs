//! Purpose: Probe input videos with ffprobe for dimensions and duration.
//! Exports: `video_dimensions`, `video_duration`, `ffmpeg_available`, `ffprobe_available`.
//! Role: Thin wrappers over the ffprobe CLI; parsing lives here, policy in callers.
//! Invariants: Probes never modify the input; failures carry the tool context.
//! Invariants: Availability checks are silent (no output reaches the terminal).

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use recrop::core::error::{Error, ErrorKind};

pub(crate) fn video_dimensions(path: &Path) -> Result<(f64, f64), Error> {
    let output = run_ffprobe(
        path,
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
        ],
        "read video dimensions",
    )?;
    parse_dimensions(output.trim()).ok_or_else(|| {
        Error::new(ErrorKind::Tool)
            .with_message(format!(
                "unexpected ffprobe dimensions output: {}",
                output.trim()
            ))
            .with_path(path)
    })
}

pub(crate) fn video_duration(path: &Path) -> Result<f64, Error> {
    let output = run_ffprobe(
        path,
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
        "read video duration",
    )?;
    output.trim().parse().map_err(|_| {
        Error::new(ErrorKind::Tool)
            .with_message(format!(
                "unexpected ffprobe duration output: {}",
                output.trim()
            ))
            .with_path(path)
    })
}

pub(crate) fn ffmpeg_available() -> bool {
    tool_available("ffmpeg")
}

pub(crate) fn ffprobe_available() -> bool {
    tool_available("ffprobe")
}

fn run_ffprobe(path: &Path, args: &[&str], action: &str) -> Result<String, Error> {
    let output = Command::new("ffprobe")
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| spawn_error("ffprobe", err))?;
    if !output.status.success() {
        let mut error = Error::new(ErrorKind::Tool)
            .with_message(format!("ffprobe failed to {action}"))
            .with_path(path);
        if let Some(line) = last_line(&output.stderr) {
            error = error.with_hint(line);
        }
        return Err(error);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn spawn_error(tool: &str, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::new(ErrorKind::Tool)
            .with_message(format!("{tool} is not installed"))
            .with_hint("Install FFmpeg (ffmpeg + ffprobe) and make sure it is on PATH.")
            .with_source(err)
    } else {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to run {tool}"))
            .with_source(err)
    }
}

fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn parse_dimensions(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.split(',').filter(|part| !part.trim().is_empty());
    let width = parts.next()?.trim().parse().ok()?;
    let height = parts.next()?.trim().parse().ok()?;
    Some((width, height))
}

fn last_line(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
}
