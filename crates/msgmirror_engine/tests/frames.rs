//! Frame handling against the shared decoding vectors.

use msgmirror_engine::{ChangeKind, ChannelManager, FrameOutcome, MockLink, ReconnectPolicy, ReplicaStore};
use msgmirror_protocol::Delta;
use msgmirror_testkit::{frame_vectors, messages, Expected};
use std::sync::Arc;

fn channel(replica: &Arc<ReplicaStore>) -> ChannelManager<MockLink> {
    ChannelManager::new(ReconnectPolicy::default(), Arc::clone(replica))
}

#[test]
fn vectors_apply_or_reject() {
    for vector in frame_vectors() {
        let replica = Arc::new(ReplicaStore::new());
        replica.apply_delta(Delta::Sync(messages(2)));
        let before = replica.snapshot();
        let mut channel = channel(&replica);

        let outcome = channel.handle_frame(vector.frame.as_bytes());
        match (vector.expected, outcome) {
            (Expected::Sync(len), FrameOutcome::Applied(change)) => {
                assert_eq!(change.kind, ChangeKind::Synced { len }, "{}", vector.id);
                assert_eq!(replica.len(), len, "{}", vector.id);
            }
            (Expected::Add, FrameOutcome::Applied(change)) => {
                assert!(matches!(change.kind, ChangeKind::Added { .. }), "{}", vector.id);
            }
            (Expected::Del, FrameOutcome::Applied(change)) => {
                assert!(matches!(change.kind, ChangeKind::Deleted { .. }), "{}", vector.id);
            }
            (Expected::DecodeError, FrameOutcome::Rejected(e)) => {
                assert!(e.is_decode_error(), "{}: {e}", vector.id);
                assert_eq!(replica.snapshot(), before, "{}", vector.id);
                assert_eq!(replica.version(), 1, "{}", vector.id);
            }
            (Expected::UnknownAction, FrameOutcome::Rejected(e)) => {
                assert!(e.is_unknown_action(), "{}: {e}", vector.id);
                assert_eq!(replica.snapshot(), before, "{}", vector.id);
            }
            (expected, outcome) => {
                panic!("{}: expected {expected:?}, got {outcome:?}", vector.id)
            }
        }
    }
}

#[test]
fn rejected_frames_are_counted() {
    let replica = Arc::new(ReplicaStore::new());
    let mut channel = channel(&replica);

    for vector in frame_vectors() {
        channel.handle_frame(vector.frame.as_bytes());
    }

    let rejected = frame_vectors()
        .iter()
        .filter(|v| matches!(v.expected, Expected::DecodeError | Expected::UnknownAction))
        .count() as u64;
    let stats = channel.stats();
    assert_eq!(stats.frames_rejected, rejected);
    assert_eq!(stats.frames_applied + stats.frames_rejected, frame_vectors().len() as u64);
}
