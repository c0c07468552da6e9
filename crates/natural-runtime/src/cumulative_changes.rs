#![forbid(unsafe_code)]

//! Field-level change tracking for an edit session.
//!
//! [`CumulativeChanges`] remembers a baseline snapshot of a record and, given
//! later full snapshots, reports only the fields that were touched since the
//! last commit.
//!
//! # Cumulation
//!
//! A field that changed once stays in the reported differences until it is
//! committed, even if the user puts the original value back. The reported
//! value is then the original one. This is what lets a debounced updater that
//! only ever sees the latest differences converge: if a pending update
//! carrying `a = 2` is cancelled and replayed after the user reverted to
//! `a = 1`, the replay still carries `a = 1` instead of silently dropping the
//! field.
//!
//! # Invariants
//!
//! 1. [`differences`](CumulativeChanges::differences) never mutates the
//!    baseline.
//! 2. It returns `None` rather than an empty map, so "nothing changed" is
//!    never confused with "changed to an empty object".
//! 3. [`commit`](CumulativeChanges::commit) only forgets a touched field when
//!    the committed value equals the last reported value.
//! 4. Resource handles are kept by reference and compare by identity; all
//!    other values are deep copies compared structurally.

use natural_core::Map;

/// Baseline snapshot plus the cumulated set of touched fields.
#[derive(Debug, Clone, Default)]
pub struct CumulativeChanges {
    original: Map,
    diff: Map,
}

impl CumulativeChanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session from `baseline`, forgetting any touched fields.
    pub fn initialize(&mut self, baseline: &Map) {
        self.original = baseline.clone();
        self.diff.clear();
    }

    /// Fields of `candidate` touched since the last commit, or `None`.
    ///
    /// A field is recorded when it is already being tracked, or when it is
    /// missing from the baseline, or when its value differs from the
    /// baseline value. Fields absent from `candidate` are left as they are.
    pub fn differences(&mut self, candidate: &Map) -> Option<Map> {
        for (key, value) in candidate {
            let touched = self.diff.contains_key(key)
                || self.original.get(key).is_none_or(|original| original != value);
            if touched {
                self.diff.insert(key.clone(), value.clone());
            }
        }
        (!self.diff.is_empty()).then(|| self.diff.clone())
    }

    /// Fold `partial` into the baseline.
    ///
    /// Touched fields whose tracked value equals the committed value are
    /// settled and no longer reported. An empty `partial` is a no-op.
    pub fn commit(&mut self, partial: &Map) {
        for (key, value) in partial {
            self.original.insert(key.clone(), value.clone());
            if self.diff.get(key) == Some(value) {
                self.diff.remove(key);
            }
        }
    }

    /// The committed baseline.
    #[must_use]
    pub fn baseline(&self) -> &Map {
        &self.original
    }

    /// Whether any field is waiting to be committed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.diff.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natural_core::{Handle, Value, object};
    use serde_json::json;

    fn map(json: serde_json::Value) -> Map {
        object(json).unwrap()
    }

    fn session(baseline: serde_json::Value) -> CumulativeChanges {
        let mut changes = CumulativeChanges::new();
        changes.initialize(&map(baseline));
        changes
    }

    #[test]
    fn unchanged_baseline_has_no_differences() {
        let baseline = json!({"a": 1, "b": {"c": [1, 2]}, "d": null});
        let mut changes = session(baseline.clone());
        assert_eq!(changes.differences(&map(baseline)), None);
        assert!(!changes.is_dirty());
    }

    #[test]
    fn only_changed_fields_are_reported() {
        let mut changes = session(json!({"a": 1, "b": 1}));
        assert_eq!(
            changes.differences(&map(json!({"a": 1, "b": 2}))),
            Some(map(json!({"b": 2})))
        );
    }

    #[test]
    fn new_fields_are_reported() {
        let mut changes = session(json!({"a": 1}));
        assert_eq!(
            changes.differences(&map(json!({"a": 1, "b": null}))),
            Some(map(json!({"b": null})))
        );
    }

    #[test]
    fn reverted_field_stays_touched() {
        let mut changes = session(json!({"a": 1}));
        assert_eq!(
            changes.differences(&map(json!({"a": 2}))),
            Some(map(json!({"a": 2})))
        );
        assert_eq!(
            changes.differences(&map(json!({"a": 1}))),
            Some(map(json!({"a": 1})))
        );
    }

    #[test]
    fn commit_settles_only_matching_fields() {
        let mut changes = session(json!({"a": 1}));
        assert_eq!(
            changes.differences(&map(json!({"a": 2, "b": 2}))),
            Some(map(json!({"a": 2, "b": 2})))
        );
        assert_eq!(
            changes.differences(&map(json!({"a": 3}))),
            Some(map(json!({"a": 3, "b": 2})))
        );

        changes.commit(&map(json!({"a": 2, "b": 2})));
        assert_eq!(changes.differences(&Map::new()), Some(map(json!({"a": 3}))));
        assert_eq!(changes.baseline(), &map(json!({"a": 2, "b": 2})));
    }

    #[test]
    fn commit_of_empty_partial_is_a_no_op() {
        let mut changes = session(json!({"a": 1}));
        changes.differences(&map(json!({"a": 2})));
        changes.commit(&Map::new());
        assert_eq!(changes.differences(&Map::new()), Some(map(json!({"a": 2}))));
    }

    #[test]
    fn fully_committed_session_is_clean() {
        let mut changes = session(json!({"a": 1}));
        let diff = changes.differences(&map(json!({"a": 2}))).unwrap();
        changes.commit(&diff);
        assert_eq!(changes.differences(&map(json!({"a": 2}))), None);
    }

    #[test]
    fn initialize_starts_a_new_session() {
        let mut changes = session(json!({"a": 1}));
        changes.differences(&map(json!({"a": 2})));
        changes.initialize(&map(json!({"a": 5})));
        assert_eq!(changes.differences(&map(json!({"a": 5}))), None);
    }

    #[test]
    fn baseline_is_a_copy() {
        let mut baseline = map(json!({"a": {"b": 1}}));
        let mut changes = CumulativeChanges::new();
        changes.initialize(&baseline);
        baseline.insert("a".into(), Value::Null);
        assert_eq!(changes.differences(&map(json!({"a": {"b": 1}}))), None);
    }

    #[test]
    fn handles_compare_by_identity() {
        let file1 = Handle::new("file1", String::from("content"));
        let file2 = Handle::new("file2", String::from("content"));
        let with = |file: &Handle| {
            let mut inner = Map::new();
            inner.insert("b".into(), file.clone().into());
            let mut outer = Map::new();
            outer.insert("a".into(), inner.into());
            outer
        };

        let mut changes = CumulativeChanges::new();
        changes.initialize(&with(&file1));
        assert_eq!(changes.differences(&with(&file1)), None);
        assert_eq!(changes.differences(&with(&file2)), Some(with(&file2)));
    }
}
