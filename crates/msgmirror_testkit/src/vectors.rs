//! Shared frame decoding vectors.
//!
//! Each vector pairs a raw inbound frame with the outcome every decoder
//! must produce. The engine's frame tests walk this table through a
//! channel; the tests below walk it through the bare decoder.

use serde::{Deserialize, Serialize};

/// What decoding a vector's frame must yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expected {
    /// A `sync` delta holding this many records.
    Sync(usize),
    /// An `add` delta.
    Add,
    /// A `del` delta.
    Del,
    /// A decode error: the frame must not touch the replica.
    DecodeError,
    /// A well-formed frame with an unrecognized action.
    UnknownAction,
}

/// A frame decoding test vector.
#[derive(Debug, Clone, Serialize)]
pub struct FrameVector {
    /// Unique identifier for this vector.
    pub id: &'static str,
    /// Raw frame text.
    pub frame: &'static str,
    /// Required outcome.
    pub expected: Expected,
}

/// Frame decoding vectors.
pub fn frame_vectors() -> Vec<FrameVector> {
    use Expected::*;

    fn v(id: &'static str, frame: &'static str, expected: Expected) -> FrameVector {
        FrameVector {
            id,
            frame,
            expected,
        }
    }

    vec![
        v("sync_empty", r#"{"action":"sync","data":{}}"#, Sync(0)),
        v(
            "sync_two",
            r#"{"action":"sync","data":{"a":{"Body":"x"},"b":{"Body":"y"}}}"#,
            Sync(2),
        ),
        v(
            "sync_scalar_records",
            r#"{"action":"sync","data":{"a":1,"b":"two"}}"#,
            Sync(2),
        ),
        v(
            "sync_extra_fields",
            r#"{"action":"sync","id":"ignored","data":{},"extra":true}"#,
            Sync(0),
        ),
        v("sync_missing_data", r#"{"action":"sync"}"#, DecodeError),
        v("sync_null_data", r#"{"action":"sync","data":null}"#, DecodeError),
        v("sync_array_data", r#"{"action":"sync","data":[]}"#, DecodeError),
        v("sync_null_record", r#"{"action":"sync","data":{"a":null}}"#, Sync(0)),
        v(
            "sync_null_record_among_others",
            r#"{"action":"sync","data":{"a":null,"b":{"Body":"x"}}}"#,
            Sync(1),
        ),
        v("add", r#"{"action":"add","id":"a","data":{"Body":"x"}}"#, Add),
        v("add_scalar", r#"{"action":"add","id":"a","data":7}"#, Add),
        v("add_missing_id", r#"{"action":"add","data":{}}"#, DecodeError),
        v("add_missing_data", r#"{"action":"add","id":"a"}"#, DecodeError),
        v("add_null_data", r#"{"action":"add","id":"a","data":null}"#, DecodeError),
        v("add_numeric_id", r#"{"action":"add","id":1,"data":{}}"#, DecodeError),
        v("del", r#"{"action":"del","id":"a"}"#, Del),
        v("del_with_data", r#"{"action":"del","id":"a","data":{}}"#, Del),
        v("del_missing_id", r#"{"action":"del"}"#, DecodeError),
        v("del_null_id", r#"{"action":"del","id":null}"#, DecodeError),
        v("unknown_action", r#"{"action":"ping"}"#, UnknownAction),
        v("remove_is_outbound_only", r#"{"action":"remove","id":"a"}"#, UnknownAction),
        v("missing_action", r#"{"id":"a"}"#, DecodeError),
        v("numeric_action", r#"{"action":3}"#, DecodeError),
        v("not_json", "hello", DecodeError),
        v("truncated", r#"{"action":"add","id":"#, DecodeError),
        v("json_array", "[1,2]", DecodeError),
        v("json_null", "null", DecodeError),
        v("empty", "", DecodeError),
    ]
}
