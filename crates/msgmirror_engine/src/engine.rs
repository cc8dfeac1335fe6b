//! The sync engine: drives a [`ChannelManager`] over a [`Connector`].
//!
//! All work runs on one task. Each transport event, timer fire and
//! outbound command is handled to completion before the next is polled, so
//! inbound frames are applied in exactly the order the transport delivered
//! them.

use crate::channel::{ChannelManager, ChannelStats, ChannelStatus};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::replica::ReplicaStore;
use crate::sink::CommandSink;
use crate::transport::{Connector, Link};
use msgmirror_protocol::Intent;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{info, trace, warn};

/// The sync engine keeps a [`ReplicaStore`] current over a push channel.
pub struct SyncEngine<C: Connector> {
    config: EngineConfig,
    connector: C,
    channel: ChannelManager<C::Link>,
    commands: UnboundedReceiver<Intent>,
    commands_open: bool,
}

/// Handle to a spawned engine.
///
/// The engine retries forever; aborting the task (or dropping the runtime)
/// is the only way to stop it.
pub struct EngineHandle {
    sink: CommandSink,
    status: watch::Receiver<ChannelStatus>,
    replica: Arc<ReplicaStore>,
    task: JoinHandle<()>,
}

impl<C: Connector> SyncEngine<C> {
    /// Creates a new engine feeding `replica`.
    ///
    /// Returns the engine and the sink through which intents reach it.
    pub fn new(config: EngineConfig, connector: C, replica: Arc<ReplicaStore>) -> (Self, CommandSink) {
        let channel = ChannelManager::new(config.reconnect.clone(), replica);
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = CommandSink::new(tx, channel.watch_status());

        let engine = Self {
            config,
            connector,
            channel,
            commands: rx,
            commands_open: true,
        };
        (engine, sink)
    }

    /// Creates an engine and spawns it on the current runtime.
    pub fn start(config: EngineConfig, connector: C, replica: Arc<ReplicaStore>) -> EngineHandle {
        let (engine, sink) = Self::new(config, connector, Arc::clone(&replica));
        let status = engine.watch_status();
        let task = tokio::spawn(engine.run());
        EngineHandle {
            sink,
            status,
            replica,
            task,
        }
    }

    /// Gets the current status.
    pub fn status(&self) -> ChannelStatus {
        self.channel.status()
    }

    /// Returns a receiver tracking status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.channel.watch_status()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> &ChannelStats {
        self.channel.stats()
    }

    /// Runs the engine. Connects immediately and never returns.
    pub async fn run(mut self) {
        info!(endpoint = %self.config.endpoint, "sync engine starting");
        self.channel.begin_connect();
        loop {
            self.step().await;
        }
    }

    /// Handles one event for the current state.
    pub async fn step(&mut self) {
        match self.channel.status() {
            ChannelStatus::Disconnected => self.wait_for_reconnect().await,
            ChannelStatus::Connecting => self.connect().await,
            ChannelStatus::Connected => self.pump().await,
        }
    }

    async fn wait_for_reconnect(&mut self) {
        let Some(pending) = self.channel.pending_reconnect() else {
            self.channel.begin_connect();
            return;
        };

        tokio::select! {
            _ = sleep_until(pending.due) => {
                self.channel.begin_connect();
            }
            intent = self.commands.recv(), if self.commands_open => {
                self.drop_command(intent);
            }
        }
    }

    async fn connect(&mut self) {
        let limit = self.config.connect_timeout;
        let result = {
            let attempt = self.connector.connect(&self.config.endpoint);
            let attempt = async move {
                match limit {
                    Some(limit) => timeout(limit, attempt)
                        .await
                        .unwrap_or(Err(EngineError::ConnectTimeout)),
                    None => attempt.await,
                }
            };
            tokio::pin!(attempt);

            loop {
                tokio::select! {
                    result = &mut attempt => break result,
                    intent = self.commands.recv(), if self.commands_open => {
                        match intent {
                            Some(intent) => {
                                trace!(action = %intent.action, "connecting, dropping intent");
                                self.channel.command_dropped();
                            }
                            None => self.commands_open = false,
                        }
                    }
                }
            }
        };

        match result {
            Ok(link) => self.channel.opened(link),
            Err(e) => {
                warn!(error = %e, endpoint = %self.config.endpoint, "connection attempt failed");
                self.disconnect(e);
            }
        }
    }

    async fn pump(&mut self) {
        let Some(link) = self.channel.link_mut() else {
            return;
        };

        tokio::select! {
            frame = link.recv() => match frame {
                Some(Ok(frame)) => {
                    self.channel.handle_frame(frame.as_bytes());
                }
                Some(Err(e)) => self.disconnect(e),
                None => self.disconnect(EngineError::Closed),
            },
            intent = self.commands.recv(), if self.commands_open => match intent {
                Some(intent) => self.write_intent(intent).await,
                None => self.commands_open = false,
            },
        }
    }

    async fn write_intent(&mut self, intent: Intent) {
        let frame = match intent.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode intent");
                return;
            }
        };

        let Some(link) = self.channel.link_mut() else {
            self.drop_command(Some(intent));
            return;
        };

        match link.send(frame).await {
            Ok(()) => {
                trace!(action = %intent.action, id = %intent.id, "intent written");
                self.channel.command_written();
            }
            Err(e) => {
                warn!(error = %e, "failed to write intent");
                self.channel.command_dropped();
                self.disconnect(e);
            }
        }
    }

    fn drop_command(&mut self, intent: Option<Intent>) {
        match intent {
            Some(intent) => {
                trace!(action = %intent.action, id = %intent.id, "no live transport, dropping intent");
                self.channel.command_dropped();
            }
            None => self.commands_open = false,
        }
    }

    /// Moves to `Disconnected` and discards intents queued for the old link.
    fn disconnect(&mut self, reason: EngineError) {
        self.channel.closed(&reason, Instant::now());
        while let Ok(intent) = self.commands.try_recv() {
            self.drop_command(Some(intent));
        }
    }
}

impl EngineHandle {
    /// Gets the command sink.
    pub fn sink(&self) -> &CommandSink {
        &self.sink
    }

    /// Gets the replica the engine feeds.
    pub fn replica(&self) -> &Arc<ReplicaStore> {
        &self.replica
    }

    /// Gets the current status.
    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    /// Returns a receiver tracking status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Waits until the channel reaches `status`.
    pub async fn wait_for(&mut self, status: ChannelStatus) {
        // The engine task owns the sender, so this only fails if it was aborted.
        let _ = self.status.wait_for(|s| *s == status).await;
    }

    /// Stops the engine task.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReconnectPolicy, MIN_RECONNECT_DELAY};
    use crate::sink::SendOutcome;
    use crate::transport::{MockConnector, MockRemote};
    use std::time::Duration;
    use tokio::time::advance;
    use url::Url;

    fn config() -> EngineConfig {
        EngineConfig::new(Url::parse("ws://localhost:8080/ws").unwrap())
    }

    fn engine() -> (SyncEngine<MockConnector>, CommandSink, MockRemote) {
        let (connector, remote) = MockConnector::new();
        let (engine, sink) = SyncEngine::new(config(), connector, Arc::new(ReplicaStore::new()));
        (engine, sink, remote)
    }

    #[tokio::test(start_paused = true)]
    async fn connects_immediately_and_applies_frames_in_order() {
        let (mut engine, _sink, remote) = engine();
        let peer = remote.accept();

        engine.channel.begin_connect();
        engine.step().await;
        assert_eq!(engine.status(), ChannelStatus::Connected);

        peer.push(r#"{"action":"add","id":"a","data":{"Body":"1"}}"#);
        peer.push(r#"{"action":"add","id":"a","data":{"Body":"2"}}"#);
        engine.step().await;
        engine.step().await;

        let record = engine.channel.replica().get("a").unwrap();
        assert_eq!(record.field_str("Body"), Some("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn binary_frames_are_applied_like_text() {
        let (mut engine, _sink, remote) = engine();
        let peer = remote.accept();
        engine.channel.begin_connect();
        engine.step().await;

        peer.push_binary(br#"{"action":"add","id":"b","data":{"Body":"bin"}}"#.to_vec());
        engine.step().await;

        let record = engine.channel.replica().get("b").unwrap();
        assert_eq!(record.field_str("Body"), Some("bin"));
        assert_eq!(engine.stats().frames_applied, 1);
        assert_eq!(engine.status(), ChannelStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_policy_makes_one_attempt_per_interval() {
        let (connector, remote) = MockConnector::new();
        for _ in 0..100 {
            remote.refuse("refused");
        }
        let config = config().with_reconnect(ReconnectPolicy::fixed(Duration::ZERO));
        let (mut engine, _sink) = SyncEngine::new(config, connector, Arc::new(ReplicaStore::new()));

        let started = Instant::now();
        engine.channel.begin_connect();
        // One connect, then 99 timer/connect pairs, then the last timer.
        for _ in 0..200 {
            engine.step().await;
        }

        let attempts = remote.attempts();
        assert_eq!(attempts, 100);
        assert!(Instant::now() - started >= MIN_RECONNECT_DELAY * attempts);
        assert_eq!(engine.status(), ChannelStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_schedules_one_reconnect_after_five_seconds() {
        let (mut engine, _sink, remote) = engine();
        let peer = remote.accept();
        engine.channel.begin_connect();
        engine.step().await;

        let closed_at = Instant::now();
        drop(peer);
        engine.step().await;
        assert_eq!(engine.status(), ChannelStatus::Disconnected);
        let pending = engine.channel.pending_reconnect().unwrap();
        assert_eq!(pending.due, closed_at + Duration::from_secs(5));

        // Timer fires; the next attempt starts.
        engine.step().await;
        assert_eq!(engine.status(), ChannelStatus::Connecting);
        assert!(Instant::now() >= closed_at + Duration::from_secs(5));
        assert!(engine.channel.pending_reconnect().is_none());
        assert_eq!(engine.stats().reconnects_scheduled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_retries_at_fixed_interval() {
        let (mut engine, _sink, remote) = engine();
        remote.refuse("refused");
        remote.refuse("refused");

        engine.channel.begin_connect();
        engine.step().await;
        assert_eq!(engine.status(), ChannelStatus::Disconnected);
        assert_eq!(engine.channel.pending_reconnect().unwrap().attempt, 1);

        engine.step().await; // timer
        engine.step().await; // second refusal
        let pending = engine.channel.pending_reconnect().unwrap();
        assert_eq!(pending.attempt, 2);
        assert_eq!(pending.due, Instant::now() + Duration::from_secs(5));
        assert_eq!(remote.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_attempt_times_out_when_configured() {
        let (connector, remote) = MockConnector::new();
        let config = config()
            .with_connect_timeout(Duration::from_secs(2))
            .with_reconnect(ReconnectPolicy::fixed(Duration::from_secs(1)));
        let (mut engine, _sink) = SyncEngine::new(config, connector, Arc::new(ReplicaStore::new()));

        engine.channel.begin_connect();
        engine.step().await;
        assert_eq!(engine.status(), ChannelStatus::Disconnected);
        assert_eq!(remote.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sink_drops_while_disconnected() {
        let (engine, sink, _remote) = engine();
        assert_eq!(engine.status(), ChannelStatus::Disconnected);
        assert_eq!(sink.send(Intent::remove("a")), SendOutcome::Dropped);
    }

    #[tokio::test(start_paused = true)]
    async fn intents_are_written_while_connected() {
        let (mut engine, sink, remote) = engine();
        let mut peer = remote.accept();
        engine.channel.begin_connect();
        engine.step().await;

        assert_eq!(sink.send(Intent::remove("a")), SendOutcome::Forwarded);
        engine.step().await;
        assert_eq!(
            peer.try_sent().as_deref(),
            Some(r#"{"action":"remove","id":"a"}"#)
        );
        assert_eq!(engine.stats().commands_written, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_intents_do_not_survive_a_disconnect() {
        let (mut engine, sink, remote) = engine();
        let peer = remote.accept();
        engine.channel.begin_connect();
        engine.step().await;

        // Forwarded while connected, but the link fails before it is written.
        assert_eq!(sink.send(Intent::remove("a")), SendOutcome::Forwarded);
        peer.fail("reset");
        engine.disconnect(EngineError::transport_retryable("reset"));

        assert!(!sink.is_connected());
        assert_eq!(engine.stats().commands_dropped, 1);

        let mut next_peer = remote.accept();
        advance(Duration::from_secs(5)).await;
        engine.step().await; // timer
        engine.step().await; // connect
        assert_eq!(engine.status(), ChannelStatus::Connected);
        assert!(next_peer.try_sent().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_engine_recovers_and_resyncs() {
        let (connector, remote) = MockConnector::new();
        let replica = Arc::new(ReplicaStore::new());
        let mut handle = SyncEngine::start(config(), connector, Arc::clone(&replica));

        let peer = remote.accept();
        handle.wait_for(ChannelStatus::Connected).await;
        let mut changes = replica.subscribe();
        peer.push(r#"{"action":"sync","data":{"a":{"Body":"hi"},"b":{"Body":"yo"}}}"#);
        changes.recv().await.unwrap();
        assert_eq!(replica.len(), 2);

        drop(peer);
        handle.wait_for(ChannelStatus::Disconnected).await;
        assert_eq!(handle.sink().send(Intent::remove("a")), SendOutcome::Dropped);

        // Stale until the server re-establishes state with a fresh sync.
        assert_eq!(replica.len(), 2);
        let peer = remote.accept();
        handle.wait_for(ChannelStatus::Connected).await;
        peer.push(r#"{"action":"sync","data":{"b":{"Body":"yo"}}}"#);
        changes.recv().await.unwrap();

        assert_eq!(replica.len(), 1);
        assert!(replica.get("a").is_none());
        assert_eq!(remote.attempts(), 2);
        handle.abort();
    }
}
