#![no_main]

//! Drive a change-tracking session with arbitrary snapshots and commits and
//! compare every report against a plain touched-field model.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use natural_core::{Map, Value};
use natural_runtime::CumulativeChanges;

#[derive(Debug, Arbitrary)]
enum Step {
    Snapshot(Vec<(u8, u8)>),
    Commit(Vec<(u8, u8)>),
}

fn record(fields: &[(u8, u8)]) -> Map {
    fields
        .iter()
        .map(|(key, value)| (format!("f{}", key % 5), Value::from(i64::from(value % 4))))
        .collect()
}

fuzz_target!(|input: (Vec<(u8, u8)>, Vec<Step>)| {
    let (baseline, steps) = input;
    let baseline = record(&baseline);
    let mut changes = CumulativeChanges::new();
    changes.initialize(&baseline);
    assert_eq!(changes.differences(&baseline), None);

    let mut original = baseline;
    let mut touched = Map::new();

    for step in steps {
        match step {
            Step::Snapshot(fields) => {
                let snapshot = record(&fields);
                for (key, value) in &snapshot {
                    if touched.contains_key(key) || original.get(key) != Some(value) {
                        touched.insert(key.clone(), value.clone());
                    }
                }
                let reported = changes.differences(&snapshot);
                assert_eq!(changes.baseline(), &original);
                match reported {
                    None => assert!(touched.is_empty()),
                    Some(diff) => assert_eq!(diff, touched),
                }
            }
            Step::Commit(fields) => {
                let partial = record(&fields);
                changes.commit(&partial);
                for (key, value) in &partial {
                    original.insert(key.clone(), value.clone());
                    if touched.get(key) == Some(value) {
                        touched.remove(key);
                    }
                }
                assert_eq!(changes.baseline(), &original);
                assert_eq!(changes.is_dirty(), !touched.is_empty());
            }
        }
    }
});
