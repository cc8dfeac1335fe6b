//! Decode command implementation.

use msgmirror_protocol::{Delta, ProtocolError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Decoded frame, as printed in JSON format.
#[derive(Debug, Serialize)]
pub struct DecodeResult {
    /// Frame action.
    pub action: String,
    /// Target id for `add` and `del`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Record count for `sync`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    /// Record payloads by id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl From<&Delta> for DecodeResult {
    fn from(delta: &Delta) -> Self {
        let mut result = DecodeResult {
            action: delta.action().to_string(),
            id: delta.id().map(str::to_owned),
            records: None,
            data: BTreeMap::new(),
        };
        match delta {
            Delta::Sync(records) => {
                result.records = Some(records.len());
                result.data = records
                    .iter()
                    .map(|(id, record)| (id.clone(), record.as_value().clone()))
                    .collect();
            }
            Delta::Add { id, record } => {
                result.data.insert(id.clone(), record.as_value().clone());
            }
            Delta::Delete { .. } => {}
        }
        result
    }
}

/// Runs the decode command.
pub fn run(frame: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let delta = Delta::decode(frame).map_err(rejection)?;
    let result = DecodeResult::from(&delta);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print!("{}", describe(&result));
        }
    }

    Ok(())
}

fn rejection(err: ProtocolError) -> String {
    if err.is_unknown_action() {
        format!("frame ignored: {err}")
    } else {
        format!("frame rejected: {err}")
    }
}

fn describe(result: &DecodeResult) -> String {
    let mut out = String::new();
    match (&result.id, result.records) {
        (_, Some(n)) => out.push_str(&format!("{} ({n} records)\n", result.action)),
        (Some(id), None) => out.push_str(&format!("{} {id}\n", result.action)),
        (None, None) => out.push_str(&format!("{}\n", result.action)),
    }
    for (id, value) in &result.data {
        out.push_str(&format!("  {id}: {value}\n"));
    }
    out
}
