#![allow(dead_code)]

use formval::{ControlRef, RuleMetadata, ValidationManager};
use formval_tree::FormTree;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test output; `RUST_LOG=formval=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a tree and apply `rules` to it with a default manager.
pub fn form(value: Value, rules: &str) -> (FormTree, ValidationManager) {
    init_tracing();
    let tree = FormTree::from_json(value);
    let metadata = RuleMetadata::from_json_str(rules).expect("rule metadata parses");
    let mut manager = ValidationManager::default();
    manager.apply_validators(&tree.root(), &metadata);
    (tree, manager)
}

pub fn error_kinds(control: &ControlRef) -> Vec<String> {
    control
        .errors()
        .map(|errors| errors.kinds().map(str::to_string).collect())
        .unwrap_or_default()
}
