//! The opaque record value held in a replica.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record received from the server.
///
/// The engine treats records as immutable opaque values. Only presentation
/// code looks inside, typically at the `From`, `To` and `Body` fields of a
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    /// Wraps a JSON value as a record.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the record, returning the JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Looks up a string field of an object record.
    ///
    /// Returns `None` when the record is not an object, the field is absent,
    /// or the field is not a string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
