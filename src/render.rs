//! Purpose: Drive ffmpeg to re-render a video with an animated crop.
//! Exports: `RenderRequest`, `RenderOutcome`, `render`, `build_filter`, `init_tracing`.
//! Role: Orchestrates probing, normalization, filter building, and the ffmpeg run.
//! Invariants: Progress is reported as percent of probed duration, clamped to [0, 100].
//! Invariants: The input video is never modified; output defaults to `cropped_<name>`.
//! Invariants: Child stderr is drained off-thread so the progress pipe cannot stall.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use recrop::core::crop;
use recrop::core::error::{Error, ErrorKind};
use recrop::core::keyframe::Keyframe;
use recrop::core::track;

use crate::probe;

pub(crate) struct RenderRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub frame_size: Option<(f64, f64)>,
}

pub(crate) struct RenderOutcome {
    pub output: PathBuf,
    pub filter: String,
    pub duration: f64,
}

/// Normalize keyframes against a frame size and build the escaped crop filter.
pub(crate) fn build_filter(frames: &[Keyframe], width: f64, height: f64) -> Result<String, Error> {
    let mut samples = track::resolve(frames)?;
    track::sort_by_time(&mut samples);
    track::rebase_to_zero(&mut samples);
    track::scale_to_frame(&mut samples, width, height);
    let filter = crop::crop_filter(&samples)?;
    Ok(crop::escape_filter_commas(&filter))
}

/// Run the full crop pipeline, reporting percent progress to the callback.
pub(crate) fn render(
    request: &RenderRequest,
    frames: &[Keyframe],
    mut on_progress: impl FnMut(f64),
) -> Result<RenderOutcome, Error> {
    if !request.input.exists() {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message("input video not found")
            .with_path(&request.input));
    }

    let (width, height) = match request.frame_size {
        Some(size) => size,
        None => probe::video_dimensions(&request.input)?,
    };
    let duration = probe::video_duration(&request.input)?;
    let filter = build_filter(frames, width, height)?;
    let output = request
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&request.input));

    info!(
        input = %request.input.display(),
        output = %output.display(),
        width,
        height,
        duration,
        "starting ffmpeg"
    );
    debug!(%filter, "crop filter");

    let mut child = Command::new("ffmpeg")
        .arg("-i")
        .arg(&request.input)
        .arg("-vf")
        .arg(&filter)
        .args(["-c:a", "copy", "-y"])
        .arg(&output)
        .args(["-progress", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    // The log drain keeps ffmpeg from blocking on a full stderr pipe while
    // the progress stream is read here.
    let stderr_tail = child.stderr.take().map(|stderr| {
        thread::spawn(move || {
            let mut lines = Vec::new();
            for line in BufReader::new(stderr).lines() {
                let Ok(line) = line else { break };
                debug!(target: "ffmpeg", "{line}");
                lines.push(line);
            }
            lines
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if let Some(seconds) = progress_seconds(&line) {
                let percent = if duration > 0.0 {
                    (seconds / duration) * 100.0
                } else {
                    0.0
                };
                on_progress(percent.clamp(0.0, 100.0));
            }
        }
    }

    let status = child.wait().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to wait for ffmpeg")
            .with_source(err)
    })?;
    let log_lines = stderr_tail
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if !status.success() {
        let mut error = Error::new(ErrorKind::Tool)
            .with_message(format!("ffmpeg exited with {status}"))
            .with_path(&request.input);
        if let Some(line) = log_lines.iter().rev().find(|line| !line.trim().is_empty()) {
            error = error.with_hint(line.clone());
        }
        return Err(error);
    }

    Ok(RenderOutcome {
        output,
        filter,
        duration,
    })
}

pub(crate) fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn spawn_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::new(ErrorKind::Tool)
            .with_message("ffmpeg is not installed")
            .with_hint("Install FFmpeg (ffmpeg + ffprobe) and make sure it is on PATH.")
            .with_source(err)
    } else {
        Error::new(ErrorKind::Io)
            .with_message("failed to start ffmpeg")
            .with_source(err)
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    let name = match input.file_name() {
        Some(name) => {
            let mut prefixed = OsString::from("cropped_");
            prefixed.push(name);
            prefixed
        }
        None => OsString::from("cropped_output.mp4"),
    };
    input.with_file_name(name)
}

/// Decode one `-progress pipe:1` line into seconds of rendered output.
///
/// `out_time_ms` carries microseconds despite its name; `out_time` is an
/// `HH:MM:SS.frac` clock. Unrelated lines and `N/A` values decode to `None`.
fn progress_seconds(line: &str) -> Option<f64> {
    if let Some(value) = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))
    {
        let micros: f64 = value.trim().parse().ok()?;
        return Some(micros / 1_000_000.0);
    }
    if let Some(value) = line.strip_prefix("out_time=") {
        return clock_seconds(value.trim());
    }
    None
}

fn clock_seconds(value: &str) -> Option<f64> {
    let (clock, frac) = match value.split_once('.') {
        Some((clock, frac)) => (clock, Some(frac)),
        None => (value, None),
    };
    let mut parts = clock.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let mut total = hours * 3600.0 + minutes * 60.0 + seconds;
    if let Some(frac) = frac {
        let digits: f64 = frac.parse().ok()?;
        total += digits / 10f64.powi(frac.len() as i32);
    }
    Some(total)
}
