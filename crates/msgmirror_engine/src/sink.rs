//! Command sink for outbound user intents.

use crate::channel::ChannelStatus;
use msgmirror_protocol::Intent;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tracing::trace;

/// What happened to an intent handed to [`CommandSink::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The channel was connected and the intent was passed to it for writing.
    Forwarded,
    /// No live transport; the intent was discarded.
    Dropped,
}

/// Best-effort, at-most-once delivery of intents.
///
/// Intents are never queued across a disconnect: if no transport is live
/// the intent is discarded silently. Cloning the sink is cheap.
#[derive(Debug, Clone)]
pub struct CommandSink {
    commands: UnboundedSender<Intent>,
    status: watch::Receiver<ChannelStatus>,
}

impl CommandSink {
    pub(crate) fn new(
        commands: UnboundedSender<Intent>,
        status: watch::Receiver<ChannelStatus>,
    ) -> Self {
        Self { commands, status }
    }

    /// Returns true if the channel currently has a live transport.
    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    /// Sends an intent if connected, otherwise drops it.
    ///
    /// Never fails. The channel also drops intents that were forwarded
    /// just before a disconnect.
    pub fn send(&self, intent: Intent) -> SendOutcome {
        if !self.is_connected() {
            trace!(action = %intent.action, id = %intent.id, "no live transport, dropping intent");
            return SendOutcome::Dropped;
        }
        match self.commands.send(intent) {
            Ok(()) => SendOutcome::Forwarded,
            Err(err) => {
                trace!(action = %err.0.action, "channel stopped, dropping intent");
                SendOutcome::Dropped
            }
        }
    }
}
