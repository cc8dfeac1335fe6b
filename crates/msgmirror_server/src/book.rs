//! In-memory message book.
//!
//! Messages are keyed by `Sid` and serialized with the field names the
//! feed has always used, so records look the same to every client.

use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, Local, Utc};
use msgmirror_protocol::{Record, RecordMap};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix of every generated message id.
pub const SID_PREFIX: &str = "MG-msgmirror-";

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    /// When the message was posted, RFC 1123 with numeric zone.
    pub date: String,
    /// Unique message id.
    pub sid: String,
    /// Recipient.
    pub to: String,
    /// Sender.
    pub from: String,
    /// Message text.
    pub body: String,
    /// Account the message was posted under.
    pub account_sid: String,
    /// Messaging service, if any.
    pub messaging_service_sid: String,
    /// Status callback URL, if any.
    pub status_callback: String,
}

impl Message {
    /// Converts the message into an opaque replica record.
    pub fn to_record(&self) -> ServerResult<Record> {
        serde_json::to_value(self)
            .map(Record::new)
            .map_err(|e| ServerError::Internal(format!("failed to encode message: {e}")))
    }
}

/// Fields supplied by whoever posts a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct NewMessage {
    pub from: String,
    pub to: String,
    pub body: String,
    pub account_sid: String,
    pub messaging_service_sid: String,
    pub status_callback: String,
}

impl NewMessage {
    /// Creates a message with the three fields every client renders.
    pub fn new(from: impl Into<String>, to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Sets the account the message is posted under.
    pub fn with_account_sid(mut self, sid: impl Into<String>) -> Self {
        self.account_sid = sid.into();
        self
    }
}

#[derive(Default)]
struct BookState {
    messages: BTreeMap<String, Message>,
    last_stamp: i64,
}

/// Thread-safe message store.
#[derive(Default)]
pub struct MessageBook {
    state: RwLock<BookState>,
}

impl MessageBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps and stores a new message.
    ///
    /// Ids are derived from the wall clock in nanoseconds and are strictly
    /// increasing within one book.
    pub fn insert(&self, new: NewMessage) -> Message {
        let now = Utc::now();
        let mut state = self.state.write();

        let stamp = now
            .timestamp_nanos_opt()
            .unwrap_or(state.last_stamp)
            .max(state.last_stamp + 1);
        state.last_stamp = stamp;

        let message = Message {
            date: format_date(now),
            sid: format!("{SID_PREFIX}{stamp}"),
            to: new.to,
            from: new.from,
            body: new.body,
            account_sid: new.account_sid,
            messaging_service_sid: new.messaging_service_sid,
            status_callback: new.status_callback,
        };
        state.messages.insert(message.sid.clone(), message.clone());
        message
    }

    /// Removes a message. Returns the removed message, if any.
    pub fn remove(&self, sid: &str) -> Option<Message> {
        self.state.write().messages.remove(sid)
    }

    /// Looks up a message by id.
    pub fn get(&self, sid: &str) -> Option<Message> {
        self.state.read().messages.get(sid).cloned()
    }

    /// Returns the number of stored messages.
    pub fn len(&self) -> usize {
        self.state.read().messages.len()
    }

    /// Returns true if no messages are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every message as a record map, ready for a `sync` frame.
    pub fn snapshot(&self) -> ServerResult<RecordMap> {
        let state = self.state.read();
        state
            .messages
            .iter()
            .map(|(sid, message)| Ok((sid.clone(), message.to_record()?)))
            .collect()
    }
}

fn format_date(now: DateTime<Utc>) -> String {
    now.with_timezone(&Local).format(DATE_FORMAT).to_string()
}
