//! Purpose: `recrop` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (human or JSON by command/flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::fmt::Write as _;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod color_json;
mod command_dispatch;
mod probe;
mod render;

use color_json::colorize_json;
use recrop::core::error::{Error, ErrorKind, to_exit_code};
use recrop::core::keyframe::{Keyframe, Payload};
use recrop::core::track;
use recrop::notice::{Notice, notice_json};
use render::RenderRequest;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Run `recrop --help` for usage."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, color_mode).map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "recrop",
    version,
    about = "Animate a crop window across a video with JSON keyframes",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Keyframes are JSON objects with `time` (seconds) and a crop window
`x`, `y`, `w`, `h` given in percent of the frame. Between keyframes the
window moves linearly; the first keyframe is anchored at the start.
"#,
    after_help = r#"EXAMPLES
  $ recrop check
  $ recrop decode '[{"time":0,"x":0,"y":0,"w":100,"h":100}]'
  $ recrop render clip.mp4 -f keyframes.json
  # writes cropped_clip.mp4 next to the input

LEARN MORE
  $ recrop <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Args)]
struct KeyframeInput {
    #[arg(help = "Inline JSON keyframe array")]
    keyframes: Option<String>,
    #[arg(
        short = 'f',
        long = "file",
        help = "Keyframes file path (use - for stdin)",
        conflicts_with = "keyframes",
        value_hint = ValueHint::FilePath
    )]
    file: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Decode keyframes and print the normalized records",
        long_about = r#"Decode a keyframe array and print what the renderer would see.

Input is permissive: missing or non-numeric fields decode as absent and are
omitted from the output rather than failing."#,
        after_help = r#"EXAMPLES
  $ recrop decode '[{"time":0,"x":0,"y":0,"w":100,"h":100}]'
  $ recrop decode -f keyframes.json
  $ cat keyframes.json | recrop decode"#
    )]
    Decode {
        #[command(flatten)]
        input: KeyframeInput,
    },
    #[command(
        about = "Build the FFmpeg crop filter without running ffmpeg",
        after_help = r#"EXAMPLES
  $ recrop filter -f keyframes.json --width 1920 --height 1080
  $ recrop filter --raw -f keyframes.json --width 1920 --height 1080

NOTES
  - Keyframe x/y/w/h are percent of the frame; --width/--height map them to pixels
  - Commas inside the filter come back escaped for filtergraph use"#
    )]
    Filter {
        #[command(flatten)]
        input: KeyframeInput,
        #[arg(long, help = "Frame width in pixels")]
        width: f64,
        #[arg(long, help = "Frame height in pixels")]
        height: f64,
        #[arg(long, help = "Print the bare filter instead of a JSON envelope")]
        raw: bool,
    },
    #[command(
        about = "Re-render a video with the animated crop",
        long_about = r#"Probe the input, build the crop filter from the keyframes, and run
ffmpeg with audio copied through. Progress is reported on stderr."#,
        after_help = r#"EXAMPLES
  $ recrop render clip.mp4 -f keyframes.json
  $ recrop render clip.mp4 -f keyframes.json --output out.mp4
  $ recrop render clip.mp4 '[{"time":0,"x":0,"y":0,"w":50,"h":100}]'

NOTES
  - Default output: cropped_<input name> next to the input
  - --width/--height skip the ffprobe dimension probe (useful for odd containers)
  - RUST_LOG=debug surfaces the ffmpeg log lines"#
    )]
    Render {
        #[arg(help = "Input video path", value_hint = ValueHint::FilePath)]
        video: PathBuf,
        #[command(flatten)]
        input: KeyframeInput,
        #[arg(
            long,
            help = "Output path (default: cropped_<input name>)",
            value_hint = ValueHint::FilePath
        )]
        output: Option<PathBuf>,
        #[arg(long, requires = "height", help = "Override the probed frame width in pixels")]
        width: Option<f64>,
        #[arg(long, requires = "width", help = "Override the probed frame height in pixels")]
        height: Option<f64>,
    },
    #[command(about = "Check that ffmpeg and ffprobe are installed")]
    Check,
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn read_keyframes(input: &KeyframeInput) -> Result<Vec<Keyframe>, Error> {
    let text = match (&input.keyframes, &input.file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(file)) if file == "-" => read_stdin()?,
        (None, Some(file)) => fs::read_to_string(file).map_err(|err| {
            let kind = if err.kind() == io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message("failed to read keyframes file")
                .with_path(file)
                .with_source(err)
        })?,
        (None, None) => {
            if io::stdin().is_terminal() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("no keyframes provided")
                    .with_hint("Pass inline JSON, -f <file>, or pipe JSON on stdin."));
            }
            read_stdin()?
        }
    };
    track::decode_keyframes(Payload::Text(&text))
}

fn read_stdin() -> Result<String, Error> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(text)
}

fn ensure_positive_frame(width: f64, height: f64) -> Result<(), Error> {
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Usage)
        .with_message("frame size must be positive")
        .with_hint("Use pixel values like --width 1920 --height 1080."))
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or("invalid arguments");
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let pretty = is_tty || use_color;
    let json = if pretty {
        colorize_json(&value, use_color)
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        eprintln!("{label} {} ({})", notice.message, notice.input);
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn emit_progress(cmd: &str, input: &str, percent: f64, color_mode: ColorMode) {
    let mut details = Map::new();
    details.insert("percent".to_string(), json!(percent));
    let notice = Notice {
        kind: "progress".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: cmd.to_string(),
        input: input.to_string(),
        message: format!("rendered {percent:.0}%"),
        details,
    };
    emit_notice(&notice, color_mode);
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn error_message(err: &Error) -> String {
    err.message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err.kind()))
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let label = colorize_label("error:", use_color, AnsiColor::Red);
    let mut text = format!("{label} {}", error_message(err));
    if let Some(path) = err.path() {
        let _ = write!(text, " (path: {})", path.display());
    }
    if let Some(hint) = err.hint() {
        let _ = write!(text, "\n  hint: {hint}");
    }
    text
}

#[derive(Clone, Copy)]
enum AnsiColor {
    Red,
    Yellow,
}

impl AnsiColor {
    fn code(self) -> &'static str {
        match self {
            AnsiColor::Red => "31",
            AnsiColor::Yellow => "33",
        }
    }
}

fn colorize_label(label: &str, use_color: bool, color: AnsiColor) -> String {
    if use_color {
        format!("\x1b[{}m{label}\x1b[0m", color.code())
    } else {
        label.to_string()
    }
}
