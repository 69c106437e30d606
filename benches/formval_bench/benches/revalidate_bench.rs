//! Live revalidation benchmarks
//!
//! Cost of a single edit when cross-field rules keep sibling fields live.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use formval::{RuleMetadata, ValidationManager};
use formval_tree::FormTree;
use serde_json::{json, Map, Value};

/// `fields` phone numbers, each required to differ from all others.
fn phone_book(fields: usize) -> (FormTree, RuleMetadata) {
    let names: Vec<String> = (0..fields).map(|i| format!("phone{i}")).collect();
    let mut values = Map::new();
    let mut rules = Map::new();
    for name in &names {
        values.insert(name.clone(), json!(""));
        let others: Vec<&String> = names.iter().filter(|other| *other != name).collect();
        rules.insert(
            name.clone(),
            json!([{ "name": "doesNotMatch", "config": { "source": others, "subscribe": true } }]),
        );
    }
    let metadata = RuleMetadata::from_value(Value::Object(rules)).unwrap();
    (FormTree::from_json(Value::Object(values)), metadata)
}

fn bench_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_with_live_rules");

    for fields in [4, 16, 64] {
        let (tree, metadata) = phone_book(fields);
        let mut manager = ValidationManager::default();
        manager.apply_validators(&tree.root(), &metadata);
        let first = tree.node("phone0").unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                first.input(json!(format!("555-{n}")));
            })
        });
    }

    group.finish();
}

fn bench_invoke(c: &mut Criterion) {
    let (tree, metadata) = phone_book(64);
    let mut manager = ValidationManager::default();
    manager.apply_validators(&tree.root(), &metadata);

    c.bench_function("invoke_validators_64", |b| {
        b.iter(|| manager.invoke_validators(&tree.root()))
    });
}

criterion_group!(benches, bench_edit, bench_invoke);
criterion_main!(benches);
