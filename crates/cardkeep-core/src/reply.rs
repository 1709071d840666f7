//! Parsing of extraction replies.
//!
//! The inference service is asked for a single JSON object, but replies are
//! free text: often wrapped in markdown code fences, sometimes with fields
//! of the wrong type. [`parse_reply`] strips every fence marker, parses the
//! remainder as JSON, and then validates the shape field by field, repairing
//! what can be repaired into documented defaults.
//!
//! | Reply value | Text field becomes |
//! |-------------|--------------------|
//! | string | the string, trimmed |
//! | number / bool | its textual form |
//! | array of scalars | items joined with `", "` |
//! | null / missing / object | `""` |
//!
//! `suggested_rotation` accepts an integer, an integral float, or a numeric
//! string, normalized with [`Rotation::from_degrees`]; anything else is `0`.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{ExtractedFields, Rotation};

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply is empty")]
    Empty,
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reply is JSON but not an object")]
    NotAnObject,
    #[error("reply has no usable name")]
    MissingName,
}

/// Remove every ```` ```json ```` and ```` ``` ```` marker (not just a
/// matched pair) and trim the result.
pub fn clean_reply(text: &str) -> String {
    text.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Clean, parse, and validate a raw reply.
pub fn parse_reply(text: &str) -> Result<ExtractedFields, ReplyError> {
    let cleaned = clean_reply(text);
    if cleaned.is_empty() {
        return Err(ReplyError::Empty);
    }

    let value: Value = serde_json::from_str(&cleaned)?;
    let object = value.as_object().ok_or(ReplyError::NotAnObject)?;
    let fields = validate_fields(object);

    if fields.name.is_empty() {
        return Err(ReplyError::MissingName);
    }
    Ok(fields)
}

/// Coerce a parsed object into [`ExtractedFields`].
pub fn validate_fields(object: &Map<String, Value>) -> ExtractedFields {
    let text = |key: &str| object.get(key).map(coerce_text).unwrap_or_default();

    ExtractedFields {
        suggested_rotation: object
            .get("suggested_rotation")
            .map(coerce_rotation)
            .unwrap_or_default(),
        name: text("name"),
        title: text("title"),
        company: text("company"),
        phone: text("phone"),
        mobile_phone: text("mobile_phone"),
        email: text("email"),
        address: text("address"),
        website: text("website"),
    }
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_array() && !v.is_object())
            .map(coerce_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => String::new(),
    }
}

fn coerce_rotation(value: &Value) -> Rotation {
    let degrees = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 1e9)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().trim_end_matches('°').parse::<i64>().ok(),
        _ => None,
    };
    degrees.map(Rotation::from_degrees).unwrap_or_default()
}
