//! Records, frames and a reference replica model.
//!
//! Frames are built with `serde_json` directly rather than through the
//! protocol encoder, so tests exercise the decoder against independent
//! input.

use msgmirror_protocol::{Delta, Record, RecordMap};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Builds a message record with the fields clients render.
pub fn message(from: &str, to: &str, body: &str) -> Record {
    Record::new(json!({
        "From": from,
        "To": to,
        "Body": body,
    }))
}

/// Builds `n` distinct message records keyed `m0`, `m1`, ...
pub fn messages(n: usize) -> RecordMap {
    (0..n)
        .map(|i| {
            let record = message(&format!("+1555000{i:04}"), "+15559999", &format!("body {i}"));
            (format!("m{i}"), record)
        })
        .collect()
}

/// Encodes a `sync` frame.
pub fn sync_frame(records: &RecordMap) -> String {
    let data: serde_json::Map<String, Value> = records
        .iter()
        .map(|(id, record)| (id.clone(), record.as_value().clone()))
        .collect();
    json!({ "action": "sync", "data": data }).to_string()
}

/// Encodes an `add` frame.
pub fn add_frame(id: &str, record: &Record) -> String {
    json!({ "action": "add", "id": id, "data": record.as_value() }).to_string()
}

/// Encodes a `del` frame.
pub fn del_frame(id: &str) -> String {
    json!({ "action": "del", "id": id }).to_string()
}

/// Encodes any delta with the fixture builders.
pub fn frame_for(delta: &Delta) -> String {
    match delta {
        Delta::Sync(records) => sync_frame(records),
        Delta::Add { id, record } => add_frame(id, record),
        Delta::Delete { id } => del_frame(id),
    }
}

/// Straightforward model of what a replica should hold.
///
/// Engine tests apply the same deltas to the real store and to the model
/// and compare the results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicaModel {
    /// Records by id.
    pub records: BTreeMap<String, Record>,
}

impl ReplicaModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one delta.
    pub fn apply(&mut self, delta: &Delta) {
        match delta {
            Delta::Sync(records) => self.records = records.clone(),
            Delta::Add { id, record } => {
                self.records.insert(id.clone(), record.clone());
            }
            Delta::Delete { id } => {
                self.records.remove(id);
            }
        }
    }

    /// Applies deltas in order.
    pub fn apply_all<'a>(&mut self, deltas: impl IntoIterator<Item = &'a Delta>) {
        for delta in deltas {
            self.apply(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_decode() {
        let records = messages(3);
        assert_eq!(
            Delta::decode(sync_frame(&records)).unwrap(),
            Delta::Sync(records.clone())
        );

        let record = message("a", "b", "c");
        assert_eq!(
            Delta::decode(add_frame("x", &record)).unwrap(),
            Delta::Add {
                id: "x".into(),
                record
            }
        );
        assert_eq!(
            Delta::decode(del_frame("x")).unwrap(),
            Delta::Delete { id: "x".into() }
        );
    }

    #[test]
    fn model_semantics() {
        let mut model = ReplicaModel::new();
        model.apply_all(&[
            Delta::Sync(messages(2)),
            Delta::Add {
                id: "m9".into(),
                record: message("a", "b", "c"),
            },
            Delta::Delete { id: "m0".into() },
            Delta::Delete {
                id: "absent".into(),
            },
        ]);

        let ids: Vec<_> = model.records.keys().cloned().collect();
        assert_eq!(ids, vec!["m1", "m9"]);

        model.apply(&Delta::Sync(RecordMap::new()));
        assert!(model.records.is_empty());
    }
}
