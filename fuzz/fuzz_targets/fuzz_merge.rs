#![no_main]

//! Merge laws over arbitrary nested values: idempotence, self-merge identity,
//! and `defaults_deep` never overriding what `merge_into` wrote.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use natural_core::{Map, Value, defaults_deep, merge_into};

#[derive(Debug, Arbitrary)]
enum Node {
    Null,
    Bool(bool),
    Int(i16),
    Text(u8),
    List(Vec<Node>),
    Object(Vec<(u8, Node)>),
}

fn build(node: &Node, depth: usize) -> Value {
    match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::from(*b),
        Node::Int(n) => Value::from(i64::from(*n)),
        Node::Text(t) => Value::from(format!("t{}", t % 8)),
        Node::List(items) if depth < 4 => {
            Value::from(items.iter().map(|n| build(n, depth + 1)).collect::<Vec<_>>())
        }
        Node::Object(entries) if depth < 4 => Value::from(build_map(entries, depth + 1)),
        _ => Value::Null,
    }
}

fn build_map(entries: &[(u8, Node)], depth: usize) -> Map {
    entries
        .iter()
        .map(|(key, node)| (format!("k{}", key % 6), build(node, depth)))
        .collect()
}

#[derive(Debug, Arbitrary)]
struct Input {
    target: Vec<(u8, Node)>,
    source: Vec<(u8, Node)>,
}

fuzz_target!(|input: Input| {
    let target = build_map(&input.target, 0);
    let source = build_map(&input.source, 0);

    let mut once = target.clone();
    merge_into(&mut once, &source);
    let mut twice = once.clone();
    merge_into(&mut twice, &source);
    assert_eq!(once, twice);

    let mut itself = source.clone();
    merge_into(&mut itself, &source);
    assert_eq!(itself, source);

    let mut completed = once.clone();
    defaults_deep(&mut completed, &target);
    for (key, value) in &source {
        if !value.is_object() {
            assert_eq!(&completed[key], value);
        }
    }
});
