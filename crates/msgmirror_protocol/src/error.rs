//! Error types for frame decoding and encoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while decoding or encoding wire frames.
///
/// None of these are fatal to a channel: the receiver logs the error
/// and discards the frame.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame is not a well-formed JSON object.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A field required by the frame's action is absent or null.
    #[error("`{action}` frame is missing `{field}`")]
    MissingField {
        /// Action tag of the frame.
        action: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field is present but has the wrong shape.
    #[error("invalid `{action}` payload: {reason}")]
    InvalidPayload {
        /// Action tag of the frame.
        action: String,
        /// Description of the problem.
        reason: String,
    },

    /// The frame is well formed but its action tag is not recognised.
    #[error("unknown action: {0:?}")]
    UnknownAction(String),

    /// Serializing an outbound frame failed.
    #[error("encode error: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub(crate) fn missing(action: &str, field: &'static str) -> Self {
        Self::MissingField {
            action: action.to_string(),
            field,
        }
    }

    pub(crate) fn invalid(action: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if the frame was structurally broken.
    ///
    /// Every decoding failure except [`ProtocolError::UnknownAction`]
    /// falls in this class.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::Malformed(_)
                | ProtocolError::MissingField { .. }
                | ProtocolError::InvalidPayload { .. }
        )
    }

    /// Returns true if the frame carried an unrecognised action tag.
    pub fn is_unknown_action(&self) -> bool {
        matches!(self, ProtocolError::UnknownAction(_))
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ProtocolError::Malformed("eof".into()).is_decode_error());
        assert!(ProtocolError::missing("add", "id").is_decode_error());
        assert!(ProtocolError::invalid("sync", "not an object").is_decode_error());

        let unknown = ProtocolError::UnknownAction("frobnicate".into());
        assert!(unknown.is_unknown_action());
        assert!(!unknown.is_decode_error());
    }

    #[test]
    fn error_display() {
        let err = ProtocolError::missing("del", "id");
        assert_eq!(err.to_string(), "`del` frame is missing `id`");

        let err = ProtocolError::UnknownAction("frobnicate".into());
        assert!(err.to_string().contains("frobnicate"));
    }
}
