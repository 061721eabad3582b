//! Purpose: Build FFmpeg piecewise-linear crop expressions from keyframe samples.
//! Exports: `crop_filter`, `escape_filter_commas`.
//! Role: Pure formatter from samples to filtergraph text; no process handling here.
//! Invariants: Times must be strictly increasing; a zero step would put a division by zero in the filter.
//! Invariants: Output format is stable: times at 3 decimals, values and slopes at 6.

use std::fmt::Write as _;

use crate::core::error::{Error, ErrorKind};
use crate::core::track::CropSample;

#[derive(Clone, Copy, Debug)]
enum Channel {
    X,
    Y,
    W,
    H,
}

impl Channel {
    fn of(self, sample: &CropSample) -> f64 {
        match self {
            Channel::X => sample.x,
            Channel::Y => sample.y,
            Channel::W => sample.w,
            Channel::H => sample.h,
        }
    }
}

/// Assemble the full `crop=w:h:x:y` filter for a sample sequence.
///
/// Requires at least one sample, already sorted by strictly increasing time.
pub fn crop_filter(samples: &[CropSample]) -> Result<String, Error> {
    if samples.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("no keyframes provided")
            .with_hint("Provide at least one keyframe."));
    }
    ensure_increasing(samples)?;
    let w = channel_expr(samples, Channel::W);
    let h = channel_expr(samples, Channel::H);
    let x = channel_expr(samples, Channel::X);
    let y = channel_expr(samples, Channel::Y);
    Ok(format!("crop={w}:{h}:{x}:{y}"))
}

/// Escape commas so the filter survives embedding in a larger filtergraph.
pub fn escape_filter_commas(filter: &str) -> String {
    filter.replace(',', "\\,")
}

fn ensure_increasing(samples: &[CropSample]) -> Result<(), Error> {
    for pair in samples.windows(2) {
        if pair[1].time <= pair[0].time {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "keyframe times must be strictly increasing (got {} after {})",
                    pair[1].time, pair[0].time
                ))
                .with_hint("Sort the keyframes and drop duplicate times before rendering."));
        }
    }
    Ok(())
}

/// Nested piecewise-linear expression for one crop channel.
///
/// Each adjacent pair contributes an `if(lte(t,..),slope*t+intercept,..)`
/// segment; the innermost branch holds the last sample's value.
fn channel_expr(samples: &[CropSample], channel: Channel) -> String {
    let Some(last) = samples.last() else {
        return String::new();
    };
    let mut expr = String::new();
    for pair in samples.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        let dt = to.time - from.time;
        let slope = (channel.of(to) - channel.of(from)) / dt;
        let intercept = channel.of(from) - slope * from.time;
        let _ = write!(
            expr,
            "if(lte(t,{:.3}),{:.6}*t+{:.6},",
            to.time, slope, intercept
        );
    }
    let _ = write!(expr, "{:.6}", channel.of(last));
    expr.push_str(&")".repeat(samples.len() - 1));
    expr
}
