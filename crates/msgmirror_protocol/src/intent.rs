//! Outbound client intents.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Action tag asking the server to remove a record.
pub const ACTION_REMOVE: &str = "remove";

/// A user-initiated request sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Requested operation, e.g. `"remove"`.
    pub action: String,
    /// Target record identifier.
    pub id: String,
}

impl Intent {
    /// Creates an intent with an arbitrary action name.
    pub fn new(action: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            id: id.into(),
        }
    }

    /// Creates a `remove` intent.
    pub fn remove(id: impl Into<String>) -> Self {
        Self::new(ACTION_REMOVE, id)
    }

    /// Returns true if this is a `remove` intent.
    pub fn is_remove(&self) -> bool {
        self.action == ACTION_REMOVE
    }

    /// Encodes to a text frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decodes from a text frame.
    pub fn decode(raw: impl AsRef<[u8]>) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(raw.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_intent_wire_format() {
        let intent = Intent::remove("MG-1");
        assert!(intent.is_remove());
        assert_eq!(
            intent.encode().unwrap(),
            r#"{"action":"remove","id":"MG-1"}"#
        );
    }

    #[test]
    fn decode_intent() {
        let intent = Intent::decode(r#"{"action":"webhook","id":"x"}"#).unwrap();
        assert_eq!(intent, Intent::new("webhook", "x"));
        assert!(!intent.is_remove());

        assert!(Intent::decode(r#"{"action":"remove"}"#).is_err());
        assert!(Intent::decode("garbage").unwrap_err().is_decode_error());
    }
}
