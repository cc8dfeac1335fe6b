//! Property-based test generators using proptest.
//!
//! Ids are drawn from a small alphabet so that generated sequences add,
//! replace and delete the same records often.

use msgmirror_protocol::{Delta, Record, RecordMap};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating record ids.
pub fn id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("m[0-9]{1,2}").expect("Invalid regex")
}

/// Strategy for generating non-null JSON values used as records.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    let text = "[ -~]{0,16}";
    prop_oneof![
        4 => (text, text, text).prop_map(|(from, to, body)| {
            Record::new(json!({ "From": from, "To": to, "Body": body }))
        }),
        1 => any::<i64>().prop_map(|n| Record::new(Value::from(n))),
        1 => text.prop_map(|s| Record::new(Value::String(s))),
        1 => any::<bool>().prop_map(|b| Record::new(Value::Bool(b))),
        1 => prop::collection::vec(any::<i32>(), 0..4)
            .prop_map(|items| Record::new(json!(items))),
    ]
}

/// Strategy for generating a full replica map.
pub fn record_map_strategy(max_len: usize) -> impl Strategy<Value = RecordMap> {
    prop::collection::btree_map(id_strategy(), record_strategy(), 0..=max_len)
}

/// Strategy for generating single deltas.
pub fn delta_strategy() -> impl Strategy<Value = Delta> {
    prop_oneof![
        1 => record_map_strategy(8).prop_map(Delta::Sync),
        4 => (id_strategy(), record_strategy())
            .prop_map(|(id, record)| Delta::Add { id, record }),
        3 => id_strategy().prop_map(|id| Delta::Delete { id }),
    ]
}

/// Strategy for generating a sequence of deltas.
pub fn delta_sequence_strategy(
    min_len: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Delta>> {
    prop::collection::vec(delta_strategy(), min_len..max_len)
}

/// Strategy for generating arbitrary inbound text, most of it not a frame.
pub fn junk_frame_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        "\\{\"action\":\"[a-z]{0,5}\"(,\"id\":[0-9a-z\"]{0,4})?\\}",
        Just("null".to_string()),
        Just("[]".to_string()),
    ]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::frame_for;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_ids_are_short(id in id_strategy()) {
            prop_assert!(id.starts_with('m'));
            prop_assert!(id.len() <= 3);
        }

        #[test]
        fn generated_records_are_not_null(record in record_strategy()) {
            prop_assert!(!record.as_value().is_null());
        }

        #[test]
        fn generated_deltas_decode(delta in delta_strategy()) {
            prop_assert_eq!(Delta::decode(frame_for(&delta)).unwrap(), delta);
        }

        #[test]
        fn junk_never_panics(frame in junk_frame_strategy()) {
            let _ = Delta::decode(frame);
        }
    }
}
