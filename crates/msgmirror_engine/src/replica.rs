//! Replica store: the client-local mirror of the server's records.
//!
//! The store is a plain mapping from identifier to [`Record`] plus a list of
//! observers. Every call to [`ReplicaStore::apply_delta`] emits exactly one
//! [`ReplicaChange`], even when the delta changes nothing, so observers can
//! re-render on every event without diffing.
//!
//! # Usage
//!
//! ```
//! use msgmirror_engine::ReplicaStore;
//! use msgmirror_protocol::Delta;
//!
//! let store = ReplicaStore::new();
//! let mut changes = store.subscribe();
//!
//! store.apply_delta(Delta::Delete { id: "a".into() });
//! assert_eq!(changes.try_recv().unwrap().version, 1);
//! assert!(store.is_empty());
//! ```

use msgmirror_protocol::{Delta, Record, RecordMap};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// The replica contents.
pub type Replica = RecordMap;

/// What a single apply did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// The replica was replaced wholesale.
    Synced {
        /// Number of entries after the sync.
        len: usize,
    },
    /// One entry was inserted or overwritten.
    Added {
        /// Record identifier.
        id: String,
        /// Whether an existing entry was overwritten.
        replaced: bool,
    },
    /// One entry was removed, or was already absent.
    Deleted {
        /// Record identifier.
        id: String,
        /// Whether the entry was present before the delete.
        existed: bool,
    },
}

/// Notification emitted after every apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaChange {
    /// Replica version after the apply. Starts at 1 and increases by one per apply.
    pub version: u64,
    /// What the apply did.
    pub kind: ChangeKind,
}

impl ReplicaChange {
    /// Returns true if the apply left the replica unchanged.
    ///
    /// Only a delete of an absent identifier is known to be a no-op; syncs
    /// and adds are always reported as changes.
    pub fn is_noop(&self) -> bool {
        matches!(self.kind, ChangeKind::Deleted { existed: false, .. })
    }
}

#[derive(Debug, Default)]
struct ReplicaState {
    records: Replica,
    version: u64,
}

/// An observable replica of the server's record collection.
///
/// The store is constructed explicitly and shared by `Arc` with the
/// components that need it; there is no process-wide instance.
pub struct ReplicaStore {
    state: RwLock<ReplicaState>,
    subscribers: RwLock<Vec<UnboundedSender<ReplicaChange>>>,
}

impl ReplicaStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ReplicaState::default()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Applies a delta and notifies observers exactly once.
    pub fn apply_delta(&self, delta: Delta) -> ReplicaChange {
        let mut state = self.state.write();

        let kind = match delta {
            Delta::Sync(records) => {
                state.records = records;
                ChangeKind::Synced {
                    len: state.records.len(),
                }
            }
            Delta::Add { id, record } => {
                let replaced = state.records.insert(id.clone(), record).is_some();
                ChangeKind::Added { id, replaced }
            }
            Delta::Delete { id } => {
                let existed = state.records.remove(&id).is_some();
                ChangeKind::Deleted { id, existed }
            }
        };

        state.version += 1;
        let change = ReplicaChange {
            version: state.version,
            kind,
        };

        // Emit while the state lock is held so observers see versions in order.
        self.emit(&change);
        change
    }

    /// Returns a copy of the current entries.
    pub fn snapshot(&self) -> Replica {
        self.state.read().records.clone()
    }

    /// Returns a copy of one entry.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.state.read().records.get(id).cloned()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Returns true if the replica holds no entries.
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Returns the number of applies performed so far.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Subscribes to change notifications.
    ///
    /// The receiver gets one [`ReplicaChange`] per future apply. Dropped
    /// receivers are pruned on the next apply.
    pub fn subscribe(&self) -> UnboundedReceiver<ReplicaChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn emit(&self, change: &ReplicaChange) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

impl Default for ReplicaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReplicaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ReplicaStore")
            .field("len", &state.records.len())
            .field("version", &state.version)
            .finish()
    }
}
