//! # msgmirror feed server
//!
//! Reference WebSocket server for the msgmirror push channel.
//!
//! The server keeps a book of messages in memory and mirrors it to every
//! connected client:
//! - on connect, one `sync` frame with the whole book
//! - after every change, an `add` or `del` frame
//! - `{"action":"remove","id":..}` from any client deletes a message
//!
//! Each client gets a bounded outbound queue and a keep-alive ping. A
//! client that cannot keep up is dropped; it will reconnect and resync.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod book;
mod config;
mod error;
mod hub;
mod server;

pub use book::{Message, MessageBook, NewMessage, SID_PREFIX};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use hub::{ClientHub, ClientId};
pub use server::{FeedServer, RunningServer};
