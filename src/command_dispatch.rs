//! Purpose: Hold top-level CLI command dispatch for `recrop`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command behavior, output envelopes, and exit code semantics stay stable.
//! Invariants: Helpers in `main.rs` remain the source of emission logic.

use super::*;

pub(super) fn dispatch_command(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "recrop", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Decode { input } => {
            let frames = read_keyframes(&input)?;
            let values = frames
                .iter()
                .map(Keyframe::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            emit_json(
                json!({ "keyframes": values, "count": frames.len() }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Filter {
            input,
            width,
            height,
            raw,
        } => {
            ensure_positive_frame(width, height)?;
            let frames = read_keyframes(&input)?;
            let filter = render::build_filter(&frames, width, height)?;
            if raw {
                println!("{filter}");
            } else {
                emit_json(
                    json!({ "filter": filter, "width": width, "height": height }),
                    color_mode,
                );
            }
            Ok(RunOutcome::ok())
        }
        Command::Render {
            video,
            input,
            output,
            width,
            height,
        } => {
            render::init_tracing();
            let frames = read_keyframes(&input)?;
            let frame_size = match (width, height) {
                (Some(width), Some(height)) => {
                    ensure_positive_frame(width, height)?;
                    Some((width, height))
                }
                _ => None,
            };
            let request = RenderRequest {
                input: video,
                output,
                frame_size,
            };
            let input_name = request.input.display().to_string();
            let mut last_step: i64 = -1;
            let outcome = render::render(&request, &frames, |percent| {
                let step = percent.floor() as i64;
                if step > last_step {
                    last_step = step;
                    emit_progress("render", &input_name, percent, color_mode);
                }
            })?;
            emit_json(
                json!({
                    "render": {
                        "input": input_name,
                        "output": outcome.output.display().to_string(),
                        "filter": outcome.filter,
                        "duration": outcome.duration,
                    }
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Check => {
            let ffmpeg = probe::ffmpeg_available();
            let ffprobe = probe::ffprobe_available();
            emit_json(json!({ "check": { "ffmpeg": ffmpeg, "ffprobe": ffprobe } }), color_mode);
            if ffmpeg && ffprobe {
                Ok(RunOutcome::ok())
            } else {
                Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Tool)))
            }
        }
    }
}
