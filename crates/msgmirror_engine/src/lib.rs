//! # msgmirror Sync Engine
//!
//! Keeps a client-side replica of a server-held record collection current
//! over a persistent push channel, and recovers the channel after drops.
//!
//! This crate provides:
//! - Replica store (observable mapping from identifier to record)
//! - Channel state machine (disconnected → connecting → connected)
//! - Fixed-interval reconnect with a single pending attempt
//! - WebSocket transport plus an in-memory mock
//! - Command sink for best-effort outbound intents
//!
//! ## Architecture
//!
//! ```text
//! Connector ──► ChannelManager ──► Delta::decode ──► ReplicaStore ──► observers
//!                     ▲
//! CommandSink ────────┘ (write if connected, else drop)
//! ```
//!
//! ## Key Invariants
//!
//! - The server is authoritative; a `sync` delta replaces the replica
//! - Deltas from one transport are applied in arrival order
//! - At most one reconnect attempt is pending at any time
//! - Bad frames are logged and discarded, never fatal
//! - Intents are never queued across a disconnect

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod config;
mod endpoint;
mod engine;
mod error;
mod replica;
mod sink;
mod transport;
mod websocket;

pub use channel::{ChannelManager, ChannelStats, ChannelStatus, FrameOutcome, PendingReconnect};
pub use config::{EngineConfig, ReconnectPolicy, DEFAULT_RECONNECT_DELAY, MIN_RECONNECT_DELAY};
pub use endpoint::{endpoint_from_origin, CHANNEL_PATH};
pub use engine::{EngineHandle, SyncEngine};
pub use error::{EngineError, EngineResult};
pub use replica::{ChangeKind, Replica, ReplicaChange, ReplicaStore};
pub use sink::{CommandSink, SendOutcome};
pub use transport::{Connector, Inbound, Link, MockConnector, MockLink, MockPeer, MockRemote};
pub use websocket::{WsConnector, WsLink};
