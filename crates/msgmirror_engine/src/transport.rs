//! Transport layer abstraction for the push channel.

use crate::error::{EngineError, EngineResult};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use url::Url;

/// One inbound frame as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

impl Inbound {
    /// Returns the raw frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Inbound::Text(text) => text.as_bytes(),
            Inbound::Binary(bytes) => bytes,
        }
    }
}

/// Establishes duplex transports to the feed.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (WebSocket, in-memory mock for testing, etc.).
pub trait Connector: Send + Sync + 'static {
    /// The live transport produced by a successful attempt.
    type Link: Link;

    /// Opens a new transport. Resolving to `Ok` is the "open" signal.
    fn connect(&self, endpoint: &Url) -> impl Future<Output = EngineResult<Self::Link>> + Send;
}

/// A live duplex transport.
///
/// Dropping the link relinquishes it; no explicit close is required.
pub trait Link: Send + 'static {
    /// Waits for the next inbound frame.
    ///
    /// `None` means the transport closed. Must be cancel safe: the engine
    /// races it against outbound commands.
    fn recv(&mut self) -> impl Future<Output = Option<EngineResult<Inbound>>> + Send;

    /// Writes one text frame.
    fn send(&mut self, frame: String) -> impl Future<Output = EngineResult<()>> + Send;
}

/// A scripted connector for testing.
///
/// Each call to [`Connector::connect`] waits for the paired [`MockRemote`]
/// to either accept or refuse the attempt. An attempt the remote never
/// answers stays pending, which models a stalled connection.
pub struct MockConnector {
    outcomes: Mutex<UnboundedReceiver<EngineResult<MockLink>>>,
    attempts: Arc<AtomicU32>,
}

/// Test-side control for a [`MockConnector`].
#[derive(Clone)]
pub struct MockRemote {
    outcomes: UnboundedSender<EngineResult<MockLink>>,
    attempts: Arc<AtomicU32>,
}

/// Link handed to the engine by a [`MockConnector`].
#[derive(Debug)]
pub struct MockLink {
    inbound: UnboundedReceiver<EngineResult<Inbound>>,
    outbound: UnboundedSender<String>,
}

/// Server end of a [`MockLink`].
///
/// Dropping the peer closes the link.
#[derive(Debug)]
pub struct MockPeer {
    inbound: UnboundedSender<EngineResult<Inbound>>,
    outbound: UnboundedReceiver<String>,
}

impl MockConnector {
    /// Creates a mock connector and its remote control.
    pub fn new() -> (Self, MockRemote) {
        let (tx, rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicU32::new(0));
        let connector = Self {
            outcomes: Mutex::new(rx),
            attempts: Arc::clone(&attempts),
        };
        let remote = MockRemote {
            outcomes: tx,
            attempts,
        };
        (connector, remote)
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    fn connect(&self, _endpoint: &Url) -> impl Future<Output = EngineResult<MockLink>> + Send {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            let mut outcomes = self.outcomes.lock().await;
            match outcomes.recv().await {
                Some(outcome) => outcome,
                None => Err(EngineError::transport_retryable("mock remote dropped")),
            }
        }
    }
}

impl MockRemote {
    /// Accepts the next connection attempt, returning the server end.
    pub fn accept(&self) -> MockPeer {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let link = MockLink {
            inbound: in_rx,
            outbound: out_tx,
        };
        // The connector may already be gone in tests that stop the engine early.
        let _ = self.outcomes.send(Ok(link));
        MockPeer {
            inbound: in_tx,
            outbound: out_rx,
        }
    }

    /// Fails the next connection attempt.
    pub fn refuse(&self, message: &str) {
        let _ = self
            .outcomes
            .send(Err(EngineError::transport_retryable(message)));
    }

    /// Returns how many connection attempts have started.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Link for MockLink {
    fn recv(&mut self) -> impl Future<Output = Option<EngineResult<Inbound>>> + Send {
        self.inbound.recv()
    }

    fn send(&mut self, frame: String) -> impl Future<Output = EngineResult<()>> + Send {
        let result = self.outbound.send(frame).map_err(|_| EngineError::Closed);
        std::future::ready(result)
    }
}

impl MockPeer {
    /// Pushes a text frame to the engine.
    pub fn push(&self, frame: impl Into<String>) -> bool {
        self.inbound.send(Ok(Inbound::Text(frame.into()))).is_ok()
    }

    /// Pushes a binary frame to the engine.
    pub fn push_binary(&self, frame: Vec<u8>) -> bool {
        self.inbound.send(Ok(Inbound::Binary(frame))).is_ok()
    }

    /// Reports a transport error to the engine.
    pub fn fail(&self, message: &str) -> bool {
        self.inbound
            .send(Err(EngineError::transport_retryable(message)))
            .is_ok()
    }

    /// Waits for the next frame written by the engine.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Returns a frame written by the engine, if one is buffered.
    pub fn try_sent(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Returns true once the engine has dropped its end of the link.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("ws://localhost/ws").unwrap()
    }

    #[tokio::test]
    async fn mock_accept_and_exchange() {
        let (connector, remote) = MockConnector::new();
        let mut peer = remote.accept();

        let mut link = connector.connect(&endpoint()).await.unwrap();
        assert_eq!(remote.attempts(), 1);

        assert!(peer.push("hello"));
        let frame = link.recv().await.unwrap().unwrap();
        assert_eq!(frame, Inbound::Text("hello".into()));

        link.send("out".into()).await.unwrap();
        assert_eq!(peer.next_sent().await.as_deref(), Some("out"));
    }

    #[tokio::test]
    async fn mock_refuse() {
        let (connector, remote) = MockConnector::new();
        remote.refuse("connection refused");

        let result = connector.connect(&endpoint()).await;
        assert!(matches!(result, Err(EngineError::Transport { .. })));
    }

    #[tokio::test]
    async fn dropping_peer_closes_link() {
        let (connector, remote) = MockConnector::new();
        let peer = remote.accept();
        let mut link = connector.connect(&endpoint()).await.unwrap();

        drop(peer);
        assert!(link.recv().await.is_none());
        assert!(matches!(link.send("x".into()).await, Err(EngineError::Closed)));
    }

    #[tokio::test]
    async fn dropping_link_is_visible_to_peer() {
        let (connector, remote) = MockConnector::new();
        let peer = remote.accept();
        let link = connector.connect(&endpoint()).await.unwrap();

        assert!(!peer.is_closed());
        drop(link);
        assert!(peer.is_closed());
    }

    #[test]
    fn inbound_bytes() {
        assert_eq!(Inbound::Text("ab".into()).as_bytes(), b"ab");
        assert_eq!(Inbound::Binary(vec![1, 2]).as_bytes(), &[1, 2]);
    }
}
