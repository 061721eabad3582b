//! Purpose: Decode and normalize keyframe sequences ahead of filter building.
//! Exports: `CropSample`, `decode_keyframes`, `resolve`, `sort_by_time`, `rebase_to_zero`, `scale_to_frame`.
//! Role: Bridge between the permissive boundary codec and the strict crop expressions.
//! Invariants: Ordering stays a caller decision; helpers mutate in place and are deterministic.
//! Invariants: Absent fields surface here as Incomplete errors, never in the codec.

use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::core::keyframe::{Keyframe, Payload};
use crate::json;

/// A keyframe with all five fields present, ready for expression building.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropSample {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Decode a JSON array of boundary payloads into keyframes, one fresh record
/// per element. Each element is classified text-vs-structured on its own.
pub fn decode_keyframes(payload: Payload<'_>) -> Result<Vec<Keyframe>, Error> {
    let parsed;
    let value = match payload {
        Payload::Text(text) => {
            parsed = json::parse::from_str::<Value>(text).map_err(|err| {
                Error::new(ErrorKind::Parse)
                    .with_message("invalid keyframes json")
                    .with_source(err)
            })?;
            &parsed
        }
        Payload::Structured(value) => value,
    };
    let items = value.as_array().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("keyframes must be a json array")
            .with_hint(r#"Pass an array like [{"time":0,"x":0,"y":0,"w":100,"h":100}]."#)
    })?;
    items
        .iter()
        .map(|item| Keyframe::decode(Payload::from(item)))
        .collect()
}

/// Convert decoded keyframes into fully-present samples, failing on the
/// first absent field. This is where downstream code pays the codec's
/// permissiveness back.
pub fn resolve(frames: &[Keyframe]) -> Result<Vec<CropSample>, Error> {
    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            Ok(CropSample {
                time: require(frame.time, index, "time")?,
                x: require(frame.x, index, "x")?,
                y: require(frame.y, index, "y")?,
                w: require(frame.w, index, "w")?,
                h: require(frame.h, index, "h")?,
            })
        })
        .collect()
}

fn require(value: Option<f64>, index: usize, name: &str) -> Result<f64, Error> {
    value.ok_or_else(|| {
        Error::new(ErrorKind::Incomplete)
            .with_message(format!("keyframe {index} is missing `{name}`"))
            .with_hint("Every keyframe needs numeric time, x, y, w, and h to render.")
    })
}

/// Sort by time. Ordering is the caller's responsibility; this helper gives
/// callers a deterministic total order even for pathological floats.
pub fn sort_by_time(samples: &mut [CropSample]) {
    samples.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Anchor the crop animation at the start of the video.
pub fn rebase_to_zero(samples: &mut [CropSample]) {
    if let Some(first) = samples.first_mut() {
        first.time = 0.0;
    }
}

/// Convert percent-of-frame coordinates into pixels for a given frame size.
pub fn scale_to_frame(samples: &mut [CropSample], width: f64, height: f64) {
    for sample in samples.iter_mut() {
        sample.x = sample.x * width / 100.0;
        sample.y = sample.y * height / 100.0;
        sample.w = sample.w * width / 100.0;
        sample.h = sample.h * height / 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CropSample, decode_keyframes, rebase_to_zero, resolve, scale_to_frame, sort_by_time,
    };
    use crate::core::error::ErrorKind;
    use crate::core::keyframe::{Keyframe, Payload};
    use serde_json::json;

    fn sample(time: f64) -> CropSample {
        CropSample {
            time,
            x: 0.0,
            y: 0.0,
            w: 100.0,
            h: 100.0,
        }
    }

    #[test]
    fn decodes_array_of_mixed_payload_shapes() {
        let text = r#"[{"time":0,"x":1,"y":2,"w":3,"h":4}, "{\"time\":5}"]"#;
        let frames = decode_keyframes(Payload::Text(text)).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].x, Some(1.0));
        assert_eq!(frames[1].time, Some(5.0));
        assert_eq!(frames[1].x, None);
    }

    #[test]
    fn non_array_payload_is_usage_error() {
        let err = decode_keyframes(Payload::Text(r#"{"time":0}"#)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn malformed_array_text_is_parse_error() {
        let err = decode_keyframes(Payload::Text("[{")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn resolve_requires_every_field() {
        let frames = vec![
            Keyframe {
                time: Some(0.0),
                x: Some(0.0),
                y: Some(0.0),
                w: Some(100.0),
                h: Some(100.0),
            },
            Keyframe {
                time: Some(1.0),
                x: Some(0.0),
                y: Some(0.0),
                w: None,
                h: Some(100.0),
            },
        ];
        let err = resolve(&frames).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Incomplete);
        assert!(err.message().unwrap().contains("keyframe 1"));
        assert!(err.message().unwrap().contains("`w`"));
    }

    #[test]
    fn resolve_passes_complete_frames_through() {
        let source = json!([{"time":0,"x":10,"y":20,"w":30,"h":40}]);
        let frames = decode_keyframes(Payload::Structured(&source)).unwrap();
        let samples = resolve(&frames).unwrap();
        assert_eq!(
            samples,
            vec![CropSample {
                time: 0.0,
                x: 10.0,
                y: 20.0,
                w: 30.0,
                h: 40.0,
            }]
        );
    }

    #[test]
    fn sort_orders_by_time() {
        let mut samples = vec![sample(3.0), sample(1.0), sample(2.0)];
        sort_by_time(&mut samples);
        let times: Vec<f64> = samples.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn rebase_zeroes_only_the_first_sample() {
        let mut samples = vec![sample(0.5), sample(2.0)];
        rebase_to_zero(&mut samples);
        assert_eq!(samples[0].time, 0.0);
        assert_eq!(samples[1].time, 2.0);

        let mut empty: Vec<CropSample> = Vec::new();
        rebase_to_zero(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn scale_maps_percent_to_pixels() {
        let mut samples = vec![CropSample {
            time: 0.0,
            x: 25.0,
            y: 50.0,
            w: 100.0,
            h: 10.0,
        }];
        scale_to_frame(&mut samples, 1920.0, 1080.0);
        assert_eq!(samples[0].x, 480.0);
        assert_eq!(samples[0].y, 540.0);
        assert_eq!(samples[0].w, 1920.0);
        assert_eq!(samples[0].h, 108.0);
        assert_eq!(samples[0].time, 0.0);
    }
}
