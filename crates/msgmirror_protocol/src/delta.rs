//! Inbound deltas and their wire codec.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::Record;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Action tag of a full snapshot frame.
pub const ACTION_SYNC: &str = "sync";
/// Action tag of an upsert frame.
pub const ACTION_ADD: &str = "add";
/// Action tag of a removal frame.
pub const ACTION_DEL: &str = "del";

/// Mapping from record identifier to record.
pub type RecordMap = BTreeMap<String, Record>;

/// One unit of change information pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    /// Replace the whole replica.
    Sync(RecordMap),
    /// Insert or overwrite one entry.
    Add {
        /// Record identifier.
        id: String,
        /// New value.
        record: Record,
    },
    /// Remove one entry if present.
    Delete {
        /// Record identifier.
        id: String,
    },
}

/// Borrowed view used when encoding a frame.
#[derive(Serialize)]
struct FrameRef<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<DataRef<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum DataRef<'a> {
    Map(&'a RecordMap),
    Record(&'a Record),
}

impl Delta {
    /// Returns the wire action tag of this delta.
    pub fn action(&self) -> &'static str {
        match self {
            Delta::Sync(_) => ACTION_SYNC,
            Delta::Add { .. } => ACTION_ADD,
            Delta::Delete { .. } => ACTION_DEL,
        }
    }

    /// Returns the identifier targeted by an `add` or `del` delta.
    pub fn id(&self) -> Option<&str> {
        match self {
            Delta::Sync(_) => None,
            Delta::Add { id, .. } | Delta::Delete { id } => Some(id),
        }
    }

    /// Decodes one inbound frame.
    ///
    /// Accepts either text or raw bytes holding UTF-8 JSON. Record contents
    /// are not validated beyond being non-null JSON values. A `null` entry
    /// inside a `sync` snapshot is skipped with a warning; the rest of the
    /// snapshot is kept.
    pub fn decode(raw: impl AsRef<[u8]>) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(raw.as_ref())?;
        let Value::Object(mut frame) = value else {
            return Err(ProtocolError::Malformed("frame is not a JSON object".into()));
        };

        let action = match frame.remove("action") {
            Some(Value::String(action)) => action,
            Some(Value::Null) | None => return Err(ProtocolError::missing("?", "action")),
            Some(other) => {
                return Err(ProtocolError::Malformed(format!(
                    "action must be a string, got {}",
                    json_kind(&other)
                )))
            }
        };

        match action.as_str() {
            ACTION_SYNC => {
                let data = match take_present(&mut frame, "data") {
                    Some(Value::Object(data)) => data,
                    Some(other) => {
                        return Err(ProtocolError::invalid(
                            &action,
                            format!("data must be an object, got {}", json_kind(&other)),
                        ))
                    }
                    None => return Err(ProtocolError::missing(&action, "data")),
                };
                Ok(Delta::Sync(decode_record_map(data)))
            }
            ACTION_ADD => {
                let id = take_id(&action, &mut frame)?;
                let record = take_present(&mut frame, "data")
                    .map(Record::new)
                    .ok_or_else(|| ProtocolError::missing(&action, "data"))?;
                Ok(Delta::Add { id, record })
            }
            ACTION_DEL => {
                let id = take_id(&action, &mut frame)?;
                Ok(Delta::Delete { id })
            }
            _ => Err(ProtocolError::UnknownAction(action)),
        }
    }

    /// Encodes this delta as a text frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        let frame = match self {
            Delta::Sync(records) => FrameRef {
                action: ACTION_SYNC,
                id: None,
                data: Some(DataRef::Map(records)),
            },
            Delta::Add { id, record } => FrameRef {
                action: ACTION_ADD,
                id: Some(id),
                data: Some(DataRef::Record(record)),
            },
            Delta::Delete { id } => FrameRef {
                action: ACTION_DEL,
                id: Some(id),
                data: None,
            },
        };
        serde_json::to_string(&frame).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Removes a field, treating an explicit `null` the same as absence.
fn take_present(frame: &mut Map<String, Value>, field: &str) -> Option<Value> {
    match frame.remove(field) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

fn take_id(action: &str, frame: &mut Map<String, Value>) -> ProtocolResult<String> {
    match take_present(frame, "id") {
        Some(Value::String(id)) => Ok(id),
        Some(other) => Err(ProtocolError::invalid(
            action,
            format!("id must be a string, got {}", json_kind(&other)),
        )),
        None => Err(ProtocolError::missing(action, "id")),
    }
}

fn decode_record_map(data: Map<String, Value>) -> RecordMap {
    data.into_iter()
        .filter_map(|(id, value)| {
            if value.is_null() {
                warn!(id = %id, "skipping null record in sync snapshot");
                None
            } else {
                Some((id, Record::new(value)))
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
