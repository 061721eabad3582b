//! Purpose: Decode keyframe records crossing the JSON boundary into typed values.
//! Exports: `Keyframe`, `Payload`.
//! Role: Leaf codec for boundary payloads; callers own construction and ordering.
//! Invariants: Field extraction is permissive: absent or non-numeric keys decode as `None`.
//! Invariants: Malformed JSON text fails with a Parse error; nothing else fails.
//! Invariants: Decoding is pure and allocates only the output record.

use serde::Serialize;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::json;

/// A point-in-time crop sample: position and size at `time` seconds.
///
/// Each field is either present-numeric or absent. Absence is data, not a
/// failure; consumers that need all five fields go through
/// [`resolve`](crate::core::track::resolve).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Keyframe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
}

/// A boundary payload, classified up front so extraction has a single path.
#[derive(Clone, Copy, Debug)]
pub enum Payload<'a> {
    /// JSON text; parsed before field extraction.
    Text(&'a str),
    /// An already-decoded value, used as-is.
    Structured(&'a Value),
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Payload::Text(text)
    }
}

impl<'a> From<&'a Value> for Payload<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(text) => Payload::Text(text),
            other => Payload::Structured(other),
        }
    }
}

impl Keyframe {
    /// Decode one keyframe from a boundary payload.
    ///
    /// Text payloads are parsed as JSON first; a malformed string is the only
    /// failure. Extraction then reads the keys `time`, `x`, `y`, `w`, `h` and
    /// keeps whatever numeric values it finds. Missing keys, non-numeric
    /// values, extra keys, and non-object payloads all decode without error.
    pub fn decode(payload: Payload<'_>) -> Result<Self, Error> {
        let parsed;
        let fields = match payload {
            Payload::Text(text) => {
                parsed = json::parse::from_str::<Value>(text).map_err(|err| {
                    Error::new(ErrorKind::Parse)
                        .with_message("invalid keyframe json")
                        .with_source(err)
                })?;
                &parsed
            }
            Payload::Structured(value) => value,
        };
        Ok(Self::from_fields(fields))
    }

    /// Named constructor with semantics identical to [`Keyframe::decode`].
    pub fn from_source<'a>(source: impl Into<Payload<'a>>) -> Result<Self, Error> {
        Self::decode(source.into())
    }

    /// Serialize with absent fields omitted, so decoding the result
    /// reproduces `self` exactly.
    pub fn to_value(&self) -> Result<Value, Error> {
        serde_json::to_value(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("keyframe encode failed")
                .with_source(err)
        })
    }

    fn from_fields(fields: &Value) -> Self {
        Self {
            time: field(fields, "time"),
            x: field(fields, "x"),
            y: field(fields, "y"),
            w: field(fields, "w"),
            h: field(fields, "h"),
        }
    }
}

fn field(fields: &Value, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::{Keyframe, Payload};
    use crate::core::error::ErrorKind;
    use serde_json::{Value, json};

    #[test]
    fn structured_input_preserves_numeric_fields() {
        let source = json!({"time": 1.0, "x": 2.0, "y": 3.0, "w": 4.0, "h": 5.0});
        let frame = Keyframe::decode(Payload::Structured(&source)).unwrap();
        assert_eq!(
            frame,
            Keyframe {
                time: Some(1.0),
                x: Some(2.0),
                y: Some(3.0),
                w: Some(4.0),
                h: Some(5.0),
            }
        );
    }

    #[test]
    fn text_round_trip_reproduces_fields() {
        let source = json!({"time": 0.25, "x": 10.0, "y": 20.0, "w": 50.0, "h": 40.0});
        let text = serde_json::to_string(&source).unwrap();
        let from_text = Keyframe::decode(Payload::Text(&text)).unwrap();
        let from_value = Keyframe::decode(Payload::Structured(&source)).unwrap();
        assert_eq!(from_text, from_value);
    }

    #[test]
    fn default_is_all_absent() {
        let frame = Keyframe::default();
        assert_eq!(frame.time, None);
        assert_eq!(frame.x, None);
        assert_eq!(frame.y, None);
        assert_eq!(frame.w, None);
        assert_eq!(frame.h, None);
    }

    #[test]
    fn malformed_text_is_parse_error() {
        let err = Keyframe::decode(Payload::Text("{time:")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn missing_keys_decode_as_absent() {
        let source = json!({"time": 1.0, "x": 2.0});
        let frame = Keyframe::decode(Payload::Structured(&source)).unwrap();
        assert_eq!(frame.time, Some(1.0));
        assert_eq!(frame.x, Some(2.0));
        assert_eq!(frame.y, None);
        assert_eq!(frame.w, None);
        assert_eq!(frame.h, None);
    }

    #[test]
    fn non_numeric_values_decode_as_absent() {
        let source = json!({"time": "soon", "x": true, "y": null, "w": [4], "h": 5});
        let frame = Keyframe::decode(Payload::Structured(&source)).unwrap();
        assert_eq!(frame.time, None);
        assert_eq!(frame.x, None);
        assert_eq!(frame.y, None);
        assert_eq!(frame.w, None);
        assert_eq!(frame.h, Some(5.0));
    }

    #[test]
    fn extra_keys_are_ignored() {
        let source = json!({"time": 1.0, "easing": "linear"});
        let frame = Keyframe::decode(Payload::Structured(&source)).unwrap();
        assert_eq!(frame.time, Some(1.0));
    }

    #[test]
    fn non_object_payload_decodes_all_absent() {
        let frame = Keyframe::decode(Payload::Text("42")).unwrap();
        assert_eq!(frame, Keyframe::default());
    }

    #[test]
    fn string_value_classifies_as_text() {
        let nested = Value::String(r#"{"time": 2.0}"#.to_string());
        let frame = Keyframe::from_source(&nested).unwrap();
        assert_eq!(frame.time, Some(2.0));
    }

    #[test]
    fn decoding_own_output_is_identity() {
        let frame = Keyframe {
            time: Some(1.0),
            x: Some(2.0),
            y: None,
            w: Some(4.0),
            h: None,
        };
        let encoded = frame.to_value().unwrap();
        let decoded = Keyframe::decode(Payload::Structured(&encoded)).unwrap();
        assert_eq!(decoded, frame);

        let text = serde_json::to_string(&encoded).unwrap();
        let decoded_text = Keyframe::decode(Payload::Text(&text)).unwrap();
        assert_eq!(decoded_text, frame);
    }

    #[test]
    fn from_source_matches_decode() {
        let source = json!({"time": 1.0, "x": 2.0, "y": 3.0, "w": 4.0, "h": 5.0});
        let direct = Keyframe::decode(Payload::Structured(&source)).unwrap();
        let named = Keyframe::from_source(&source).unwrap();
        assert_eq!(named, direct);
    }
}
