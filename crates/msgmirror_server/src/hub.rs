//! Registry of connected clients and their outbound queues.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Identifies one connected client.
pub type ClientId = u64;

/// Fan-out of frames to every registered client.
///
/// Each client owns a bounded queue. A client whose queue is full or whose
/// writer has gone away is unregistered on the next broadcast, so a slow
/// reader never stalls the others.
pub struct ClientHub {
    clients: RwLock<HashMap<ClientId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl ClientHub {
    /// Creates a hub with the given per-client queue size.
    pub fn new(buffer: usize) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Registers a client, queueing `first` ahead of any broadcast.
    ///
    /// `first` runs while the registry is locked: a broadcast either lands
    /// before it (and `first` already reflects it) or after it in the queue.
    pub fn register<F>(&self, first: F) -> (ClientId, mpsc::Receiver<String>)
    where
        F: FnOnce() -> Option<String>,
    {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut clients = self.clients.write();
        if let Some(frame) = first() {
            // Fresh queue with capacity >= 1.
            let _ = tx.try_send(frame);
        }
        clients.insert(id, tx);
        debug!(client = id, clients = clients.len(), "client registered");
        (id, rx)
    }

    /// Removes a client. Its queue closes once drained.
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.write().remove(&id).is_some();
        if removed {
            debug!(client = id, "client unregistered");
        }
        removed
    }

    /// Queues a frame for every client. Returns how many accepted it.
    pub fn broadcast(&self, frame: &str) -> usize {
        let mut delivered = 0;
        let mut evicted = Vec::new();
        {
            let clients = self.clients.read();
            for (&id, tx) in clients.iter() {
                match tx.try_send(frame.to_owned()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(client = id, "client buffer full, dropping client");
                        evicted.push(id);
                    }
                    Err(TrySendError::Closed(_)) => evicted.push(id),
                }
            }
        }
        if !evicted.is_empty() {
            let mut clients = self.clients.write();
            for id in evicted {
                clients.remove(&id);
            }
        }
        delivered
    }

    /// Unregisters every client. Their connections close after draining.
    pub fn close_all(&self) {
        let mut clients = self.clients.write();
        debug!(clients = clients.len(), "closing all clients");
        clients.clear();
    }

    /// Returns the number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Returns true if no client is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
