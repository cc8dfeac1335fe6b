//! Channel manager state machine.
//!
//! ```text
//!   Disconnected ──(attempt due)──► Connecting ──(open)──► Connected
//!        ▲                               │                    │
//!        └────────(fail / close / send error, schedule retry)─┘
//! ```
//!
//! The manager owns the live link and the single pending reconnect slot.
//! It performs no I/O itself; the async driver in `engine` feeds it
//! transport events and asks it what to do next.

use crate::config::ReconnectPolicy;
use crate::error::EngineError;
use crate::replica::{ReplicaChange, ReplicaStore};
use msgmirror_protocol::{Delta, ProtocolError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Externally visible channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// No transport; a reconnect attempt is pending.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// A transport is open.
    Connected,
}

impl ChannelStatus {
    /// Returns true if a transport is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelStatus::Connected)
    }
}

enum ChannelState<L> {
    Disconnected,
    Connecting,
    Connected(L),
}

impl<L> ChannelState<L> {
    fn status(&self) -> ChannelStatus {
        match self {
            ChannelState::Disconnected => ChannelStatus::Disconnected,
            ChannelState::Connecting => ChannelStatus::Connecting,
            ChannelState::Connected(_) => ChannelStatus::Connected,
        }
    }
}

/// The one scheduled reconnect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReconnect {
    /// Consecutive attempt number since the last successful open.
    pub attempt: u32,
    /// When the attempt fires.
    pub due: Instant,
}

/// Statistics about channel activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Transports opened.
    pub connects: u64,
    /// Transitions into `Disconnected`.
    pub disconnects: u64,
    /// Reconnect attempts scheduled.
    pub reconnects_scheduled: u64,
    /// Disconnects caused by errors a retry is unlikely to fix.
    pub fatal_errors: u64,
    /// Inbound frames applied to the replica.
    pub frames_applied: u64,
    /// Inbound frames discarded by the protocol layer.
    pub frames_rejected: u64,
    /// Intents written to a transport.
    pub commands_written: u64,
    /// Intents dropped for lack of a transport.
    pub commands_dropped: u64,
}

/// Result of handing one inbound frame to the manager.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The frame decoded and was applied.
    Applied(ReplicaChange),
    /// The frame was discarded.
    Rejected(ProtocolError),
}

/// Owns the transport and drives the reconnect state machine.
pub struct ChannelManager<L> {
    state: ChannelState<L>,
    pending: Option<PendingReconnect>,
    failures: u32,
    policy: ReconnectPolicy,
    replica: Arc<ReplicaStore>,
    status: watch::Sender<ChannelStatus>,
    stats: ChannelStats,
}

impl<L> ChannelManager<L> {
    /// Creates a manager in the `Disconnected` state with nothing scheduled.
    pub fn new(policy: ReconnectPolicy, replica: Arc<ReplicaStore>) -> Self {
        let (status, _) = watch::channel(ChannelStatus::Disconnected);
        Self {
            state: ChannelState::Disconnected,
            pending: None,
            failures: 0,
            policy,
            replica,
            status,
            stats: ChannelStats::default(),
        }
    }

    /// Gets the current status.
    pub fn status(&self) -> ChannelStatus {
        self.state.status()
    }

    /// Returns true if a transport is open.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns a receiver that tracks every status transition.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    /// Gets the pending reconnect attempt, if any.
    pub fn pending_reconnect(&self) -> Option<PendingReconnect> {
        self.pending
    }

    /// Gets the current stats.
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Gets the replica this channel feeds.
    pub fn replica(&self) -> &Arc<ReplicaStore> {
        &self.replica
    }

    /// Starts a connection attempt.
    ///
    /// Consumes the pending reconnect slot. Returns false, changing
    /// nothing, unless the channel is `Disconnected`.
    pub fn begin_connect(&mut self) -> bool {
        if !matches!(self.state, ChannelState::Disconnected) {
            debug!(status = ?self.status(), "connect requested while not disconnected");
            return false;
        }
        let attempt = self.pending.take().map_or(0, |p| p.attempt);
        debug!(attempt, "connecting");
        self.set_state(ChannelState::Connecting);
        true
    }

    /// Records a successful open, taking ownership of the link.
    ///
    /// A link that arrives outside `Connecting` is dropped.
    pub fn opened(&mut self, link: L) {
        if !matches!(self.state, ChannelState::Connecting) {
            warn!(status = ?self.status(), "transport opened unexpectedly, dropping it");
            return;
        }
        info!(after_failures = self.failures, "channel connected");
        self.failures = 0;
        self.stats.connects += 1;
        self.set_state(ChannelState::Connected(link));
    }

    /// Records a close, error or failed attempt.
    ///
    /// Drops any live link and schedules one reconnect attempt. If an
    /// attempt is already pending nothing new is scheduled and `None` is
    /// returned.
    pub fn closed(&mut self, reason: &EngineError, now: Instant) -> Option<PendingReconnect> {
        if !reason.is_retryable() {
            // Retried anyway; the channel never gives up.
            error!(error = %reason, "channel failed with a non-retryable error");
            self.stats.fatal_errors += 1;
        }
        if !matches!(self.state, ChannelState::Disconnected) {
            info!(error = %reason, "channel disconnected");
            self.stats.disconnects += 1;
            // Replacing the state drops the link.
            self.set_state(ChannelState::Disconnected);
        }

        if let Some(pending) = self.pending {
            debug!(attempt = pending.attempt, "reconnect already pending");
            return None;
        }

        self.failures = self.failures.saturating_add(1);
        let delay = self.policy.delay_for_attempt(self.failures);
        let pending = PendingReconnect {
            attempt: self.failures,
            due: now + delay,
        };
        info!(
            attempt = pending.attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        self.stats.reconnects_scheduled += 1;
        self.pending = Some(pending);
        Some(pending)
    }

    /// Decodes one inbound frame and applies it to the replica.
    ///
    /// Malformed frames and unknown actions are logged and discarded; they
    /// never affect the channel.
    pub fn handle_frame(&mut self, raw: &[u8]) -> FrameOutcome {
        match Delta::decode(raw) {
            Ok(delta) => {
                debug!(action = delta.action(), id = delta.id(), "applying delta");
                self.stats.frames_applied += 1;
                FrameOutcome::Applied(self.replica.apply_delta(delta))
            }
            Err(e) => {
                if e.is_unknown_action() {
                    debug!(error = %e, "discarding frame with unknown action");
                } else {
                    warn!(error = %e, "discarding malformed frame");
                }
                self.stats.frames_rejected += 1;
                FrameOutcome::Rejected(e)
            }
        }
    }

    /// Borrows the live link, if connected.
    pub fn link_mut(&mut self) -> Option<&mut L> {
        match &mut self.state {
            ChannelState::Connected(link) => Some(link),
            _ => None,
        }
    }

    /// Records an intent written to the link.
    pub fn command_written(&mut self) {
        self.stats.commands_written += 1;
    }

    /// Records an intent dropped for lack of a link.
    pub fn command_dropped(&mut self) {
        self.stats.commands_dropped += 1;
    }

    fn set_state(&mut self, state: ChannelState<L>) {
        self.state = state;
        let status = self.state.status();
        self.status.send_replace(status);
    }
}
