//! # msgmirror Protocol
//!
//! Wire types and JSON codecs for the msgmirror push channel.
//!
//! This crate provides:
//! - `Record`, the opaque value object held in the replica
//! - `Delta` (`sync`, `add`, `del`) decoded from inbound text frames
//! - `Intent` for outbound client commands (e.g. `remove`)
//! - `ProtocolError` separating malformed frames from unknown actions
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Frame shape
//!
//! ```text
//! server -> client  {"action":"sync","data":{"<id>":{..record..}, ..}}
//!                   {"action":"add","id":"<id>","data":{..record..}}
//!                   {"action":"del","id":"<id>"}
//! client -> server  {"action":"remove","id":"<id>"}
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod delta;
mod error;
mod intent;
mod record;

pub use delta::{Delta, RecordMap, ACTION_ADD, ACTION_DEL, ACTION_SYNC};
pub use error::{ProtocolError, ProtocolResult};
pub use intent::{Intent, ACTION_REMOVE};
pub use record::Record;
