//! Composition benchmarks
//!
//! Cost of turning rule metadata into attached validators and of running them.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use formval::{Composer, Control, RuleMetadata, ValidatorRegistry};
use formval_tree::FormTree;
use serde_json::{json, Map, Value};

fn wide_form(fields: usize) -> (Value, RuleMetadata) {
    let mut values = Map::new();
    let mut rules = Map::new();
    for i in 0..fields {
        let name = format!("field{i}");
        values.insert(name.clone(), json!(""));
        rules.insert(
            name,
            json!([
                { "name": "required" },
                { "name": "len", "config": { "minLength": 3, "maxLength": 40 } },
                { "name": "pattern", "config": "[a-z0-9]+" }
            ]),
        );
    }
    let metadata = RuleMetadata::from_value(Value::Object(rules)).unwrap();
    (Value::Object(values), metadata)
}

/// Benchmark metadata parsing
fn bench_metadata_parse(c: &mut Criterion) {
    let json = r#"{
        "username": [{ "name": "required" }, { "name": "len", "config": { "minLength": 3, "maxLength": 20 } }],
        "email": [{ "name": "required" }, { "name": "email" }],
        "backupEmail": [{ "name": "email" }, { "name": "doesNotMatch", "config": { "source": ["email"], "subscribe": true } }]
    }"#;
    c.bench_function("metadata_from_json", |b| {
        b.iter(|| RuleMetadata::from_json_str(black_box(json)).unwrap())
    });
}

/// Benchmark applying metadata to trees of growing width
fn bench_apply(c: &mut Criterion) {
    let registry = ValidatorRegistry::with_builtins();
    let mut group = c.benchmark_group("apply_form_validators");

    for fields in [10, 100, 500] {
        let (values, metadata) = wide_form(fields);
        let tree = FormTree::from_json(values);
        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            b.iter(|| Composer::new(&registry).apply_form_validators(&tree.root(), &metadata))
        });
    }

    group.finish();
}

/// Benchmark one composed validator run
fn bench_validate(c: &mut Criterion) {
    let registry = ValidatorRegistry::with_builtins();
    let (values, metadata) = wide_form(1);
    let tree = FormTree::from_json(values);
    Composer::new(&registry).apply_form_validators(&tree.root(), &metadata);

    let field = tree.control("field0").unwrap();
    let validator = field.validator().unwrap();
    tree.node("field0").unwrap().set_value(json!("Not Valid!"));

    c.bench_function("composed_sync_validator", |b| {
        b.iter(|| validator(black_box(&field)))
    });
}

criterion_group!(benches, bench_metadata_parse, bench_apply, bench_validate);
criterion_main!(benches);
