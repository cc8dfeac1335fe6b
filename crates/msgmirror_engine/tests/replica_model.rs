//! Property tests: the replica store against a reference model.

use msgmirror_engine::{ChangeKind, ChannelManager, FrameOutcome, MockLink, ReconnectPolicy, ReplicaStore};
use msgmirror_protocol::Delta;
use msgmirror_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn store_matches_model(deltas in delta_sequence_strategy(0, 40)) {
        let store = ReplicaStore::new();
        let mut model = ReplicaModel::new();

        for delta in &deltas {
            store.apply_delta(delta.clone());
            model.apply(delta);
            prop_assert_eq!(&store.snapshot(), &model.records);
        }
        prop_assert_eq!(store.version(), deltas.len() as u64);
    }

    #[test]
    fn sync_forgets_history(
        history in delta_sequence_strategy(0, 20),
        records in record_map_strategy(8),
    ) {
        let store = ReplicaStore::new();
        for delta in history {
            store.apply_delta(delta);
        }

        store.apply_delta(Delta::Sync(records.clone()));
        prop_assert_eq!(store.snapshot(), records);
    }

    #[test]
    fn add_then_delete_leaves_no_trace(
        records in record_map_strategy(8),
        id in id_strategy(),
        record in record_strategy(),
    ) {
        let store = ReplicaStore::new();
        store.apply_delta(Delta::Sync(records.clone()));
        store.apply_delta(Delta::Add { id: id.clone(), record });
        store.apply_delta(Delta::Delete { id: id.clone() });

        let mut expected = records;
        expected.remove(&id);
        prop_assert_eq!(store.snapshot(), expected);
    }

    #[test]
    fn change_kinds_describe_effect(deltas in delta_sequence_strategy(1, 30)) {
        let store = ReplicaStore::new();
        let mut model = ReplicaModel::new();

        for delta in &deltas {
            let before = model.records.clone();
            model.apply(delta);
            let change = store.apply_delta(delta.clone());

            match change.kind {
                ChangeKind::Synced { len } => prop_assert_eq!(len, model.records.len()),
                ChangeKind::Added { id, replaced } => {
                    prop_assert_eq!(replaced, before.contains_key(&id));
                }
                ChangeKind::Deleted { id, existed } => {
                    prop_assert_eq!(existed, before.contains_key(&id));
                }
            }
        }
    }

    #[test]
    fn junk_frames_never_touch_replica(
        records in record_map_strategy(4),
        frames in prop::collection::vec(junk_frame_strategy(), 1..10),
    ) {
        let replica = Arc::new(ReplicaStore::new());
        replica.apply_delta(Delta::Sync(records.clone()));
        let mut channel: ChannelManager<MockLink> =
            ChannelManager::new(ReconnectPolicy::default(), Arc::clone(&replica));

        for frame in frames {
            if let FrameOutcome::Applied(_) = channel.handle_frame(frame.as_bytes()) {
                // Only a well-formed frame can get this far; keep the model in step.
                let delta = Delta::decode(frame.as_bytes()).unwrap();
                let mut model = ReplicaModel { records: records.clone() };
                model.apply(&delta);
                prop_assert_eq!(replica.snapshot(), model.records);
                return Ok(());
            }
        }
        prop_assert_eq!(replica.snapshot(), records);
    }
}
