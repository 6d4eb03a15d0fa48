//! NDJSON input decoding.
//!
//! Each input line is a JSON object:
//!
//! ```text
//! {"index":"logs","type":"_doc","id":"42","pipeline":"geoip","message":{"msg":"hello"}}
//! ```
//!
//! Only `message` is required. A missing `index` falls back to
//! `dispatch.default_index`. A string `message` is wrapped as
//! `{"message": "..."}`; any other JSON value is sent as-is.

use serde::Deserialize;
use serde_json::Value;

use bulkpost_core::types::{Record, RoutingKey};

/// Reasons an input line cannot become a record.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The line is not a JSON object of the expected shape.
    #[error("malformed input line: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The object has no `message` field.
    #[error("input line has no message")]
    MissingMessage,

    /// A routing field is present but empty.
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),
}

#[derive(Debug, Deserialize)]
struct InputLine {
    #[serde(default)]
    index: Option<String>,
    #[serde(default, rename = "type")]
    doc_type: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    pipeline: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

/// Decode one input line into a record.
pub fn parse_line(line: &str, default_index: &str) -> Result<Record, InputError> {
    let input: InputLine = serde_json::from_str(line)?;

    let index = input.index.unwrap_or_else(|| default_index.to_owned());
    if index.is_empty() {
        return Err(InputError::EmptyField("index"));
    }
    let mut target = RoutingKey::new(index);
    if let Some(doc_type) = non_empty(input.doc_type, "type")? {
        target = target.with_doc_type(doc_type);
    }
    if let Some(pipeline) = non_empty(input.pipeline, "pipeline")? {
        target = target.with_pipeline(pipeline);
    }

    let payload = match input.message {
        None | Some(Value::Null) => return Err(InputError::MissingMessage),
        Some(Value::String(text)) => serde_json::to_vec(&serde_json::json!({ "message": text }))?,
        Some(value) => serde_json::to_vec(&value)?,
    };

    let record = Record::new(target, payload);
    Ok(match non_empty(input.id, "id")? {
        Some(id) => record.with_id(id),
        None => record,
    })
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<Option<String>, InputError> {
    match value {
        Some(v) if v.is_empty() => Err(InputError::EmptyField(field)),
        other => Ok(other),
    }
}
