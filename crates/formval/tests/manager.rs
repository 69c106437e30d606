//! Tree-wide apply / clear / invoke and the live subscription.

mod common;

use common::{error_kinds, form, init_tracing};
use formval::{Control, ControlRef, RuleMetadata, ValidationManager};
use formval_tree::FormTree;
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;

const SIGNUP_RULES: &str = r#"{
    "name": [{ "name": "required" }],
    "address.city": [{ "name": "required" }],
    "address.zip": [{ "name": "pattern", "config": "[0-9]{5}" }]
}"#;

fn signup() -> (FormTree, ValidationManager) {
    form(
        json!({ "name": "", "address": { "city": "", "zip": "" } }),
        SIGNUP_RULES,
    )
}

#[test]
fn absent_tree_is_a_no_op() {
    init_tracing();
    let mut manager = ValidationManager::default();
    let metadata = RuleMetadata::from_json_str(SIGNUP_RULES).unwrap();

    manager.apply_validators(None::<&ControlRef>, &metadata);
    manager.clear_validators(None::<&ControlRef>);
    manager.invoke_validators(None::<&ControlRef>);
}

#[test]
fn apply_installs_a_live_subscription() {
    let (tree, manager) = signup();
    assert!(manager.is_live(&tree.root()));
}

#[test]
fn invoke_surfaces_errors_without_notifications() {
    let (tree, manager) = signup();
    let notifications = Rc::new(Cell::new(0));
    let counter = Rc::clone(&notifications);
    let _subscription = tree
        .root()
        .on_value_change(Rc::new(move |_: &Value| counter.set(counter.get() + 1)));

    manager.invoke_validators(&tree.root());

    assert_eq!(notifications.get(), 0);
    assert!(!tree.root().is_pristine());
    assert!(!tree.control("address.zip").unwrap().is_pristine());
    assert_eq!(error_kinds(&tree.control("name").unwrap()), vec!["required"]);
    assert_eq!(
        error_kinds(&tree.control("address.city").unwrap()),
        vec!["required"]
    );
    // pattern skips empty values
    assert!(tree.control("address.zip").unwrap().is_valid());
}

#[test]
fn collect_errors_keys_by_dotted_path() {
    let (tree, manager) = signup();
    manager.invoke_validators(&tree.root());

    let collected = manager.collect_errors(&tree.root());
    let paths: Vec<&str> = collected.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["address.city", "name"]);
    assert!(collected["name"].contains("required"));
}

#[test]
fn clear_detaches_and_resets_recursively() {
    let (tree, mut manager) = signup();
    let name = tree.node("name").unwrap();
    let city = tree.node("address.city").unwrap();
    let zip = tree.node("address.zip").unwrap();

    name.input(json!(""));
    city.input(json!("Paris"));
    zip.input(json!("12"));
    assert!(name.is_invalid());
    assert!(zip.is_invalid());

    manager.clear_validators(&tree.control("address").unwrap());

    assert!(city.validator().is_none());
    assert!(zip.validator().is_none());
    assert_eq!(city.value(), Value::Null);
    assert_eq!(zip.value(), Value::Null);
    assert!(city.is_pristine() && zip.is_pristine());
    assert!(zip.is_valid());
    // outside the cleared subtree nothing changed
    assert!(name.validator().is_some());
    assert!(name.is_invalid());
    assert!(manager.is_live(&tree.root()));

    manager.clear_validators(&tree.root());

    assert!(name.validator().is_none());
    assert!(name.is_valid());
    assert!(name.is_pristine());
    assert!(tree.root().is_pristine());
    assert!(!manager.is_live(&tree.root()));
}

#[test]
fn clear_leaves_pristine_valid_values_alone() {
    let (tree, mut manager) = form(
        json!({ "name": "Ada", "city": "" }),
        r#"{ "name": [{ "name": "required" }] }"#,
    );
    manager.clear_validators(&tree.control("name").unwrap());
    assert_eq!(tree.control("name").unwrap().value(), json!("Ada"));
}

#[test]
fn subscriber_receives_duplicate_error_and_recovers() {
    let (tree, _manager) = form(
        json!({ "a": "", "b": "" }),
        r#"{ "a": [{ "name": "doesNotMatch", "config": { "subscriber": "b", "source": ["b"] } }] }"#,
    );
    let a = tree.node("a").unwrap();
    let b = tree.node("b").unwrap();

    b.input(json!("x@y.z"));
    assert!(b.is_valid());

    a.input(json!("x@y.z"));
    assert!(a.is_valid());
    assert!(b.is_invalid());
    assert_eq!(
        b.errors().unwrap().get("doesNotMatch"),
        Some(&json!({ "value": "x@y.z", "match": ["b"] }))
    );

    a.input(json!("q@r.s"));
    assert!(b.is_valid());
    assert!(b.is_pristine());
    assert!(a.is_valid());
}

#[test]
fn side_channel_write_keeps_other_error_kinds() {
    let (tree, _manager) = form(
        json!({ "a": "", "b": "" }),
        r#"{
            "a": [{ "name": "doesNotMatch", "config": { "subscriber": "b", "source": ["b"] } }],
            "b": [{ "name": "minLength", "config": 10 }]
        }"#,
    );
    let a = tree.node("a").unwrap();
    let b = tree.node("b").unwrap();

    b.input(json!("short"));
    a.input(json!("short"));
    let mut kinds = error_kinds(&tree.control("b").unwrap());
    kinds.sort();
    assert_eq!(kinds, vec!["doesNotMatch", "minlength"]);

    a.input(json!("different"));
    assert_eq!(error_kinds(&tree.control("b").unwrap()), vec!["minlength"]);
}

#[test]
fn required_if_follows_its_condition() {
    init_tracing();
    let tree = FormTree::from_json(json!({ "contactBy": "email", "phone": "" }));
    let metadata = RuleMetadata::from_json_str(
        r#"{ "phone": [{ "name": "requiredIf", "config": { "field": "contactBy", "equals": "phone", "subscribe": true } }] }"#,
    )
    .unwrap();

    let mut manager = ValidationManager::default();
    manager.register_required_if(|node, config| {
        let Some(config) = config else {
            return false;
        };
        let field = config.get("field").and_then(Value::as_str).unwrap_or_default();
        node.parent()
            .and_then(|group| group.get(field))
            .is_some_and(|other| Some(&other.value()) == config.get("equals"))
    });
    manager.apply_validators(&tree.root(), &metadata);

    let phone = tree.node("phone").unwrap();
    tree.node("contactBy").unwrap().input(json!("phone"));
    assert_eq!(error_kinds(&tree.control("phone").unwrap()), vec!["requiredIf"]);

    phone.input(json!("555-0100"));
    assert!(phone.is_valid());

    phone.input(json!(""));
    assert!(phone.is_invalid());
    tree.node("contactBy").unwrap().input(json!("email"));
    assert!(phone.is_valid());
}

#[test]
fn reapplying_replaces_the_live_subscription() {
    init_tracing();
    let tree = FormTree::from_json(json!({ "code": "", "other": "" }));
    let metadata = RuleMetadata::from_json_str(
        r#"{ "code": [
            { "name": "codeFree", "isAsync": true },
            { "name": "doesNotMatch", "config": { "source": ["other"], "subscribe": true } }
        ] }"#,
    )
    .unwrap();

    let checks = Rc::new(Cell::new(0));
    let counter = Rc::clone(&checks);
    let mut manager = ValidationManager::default();
    manager.register_async("codeFree", move |_value| {
        counter.set(counter.get() + 1);
        async { true }
    });

    manager.apply_validators(&tree.root(), &metadata);
    manager.apply_validators(&tree.root(), &metadata);

    tree.node("other").unwrap().input(json!("x"));
    assert_eq!(checks.get(), 1);
}

const SUBSCRIBER_RULES: &str =
    r#"{ "a": [{ "name": "doesNotMatch", "config": { "subscriber": "b", "source": ["b"] } }] }"#;

#[test]
fn subscriber_carries_the_rule_in_its_own_pipeline() {
    let (tree, _manager) = form(json!({ "a": "", "b": "" }), SUBSCRIBER_RULES);
    let b = tree.control("b").unwrap();
    let validator = b.validator().expect("subscriber has a composed validator");

    tree.node("a").unwrap().set_value(json!("x"));
    tree.node("b").unwrap().input(json!("x"));

    assert!(b.errors().unwrap().contains("doesNotMatch"));
    assert!(validator(&b).unwrap_err().contains("doesNotMatch"));
}

#[test]
fn reapplying_without_the_rule_releases_the_subscriber() {
    let (tree, mut manager) = form(json!({ "a": "", "b": "" }), SUBSCRIBER_RULES);
    let a = tree.node("a").unwrap();
    let b = tree.node("b").unwrap();

    a.input(json!("x"));
    b.input(json!("x"));
    assert!(b.is_invalid());

    let without = RuleMetadata::from_json_str(r#"{ "a": [{ "name": "required" }] }"#).unwrap();
    manager.apply_validators(&tree.root(), &without);
    assert!(b.is_valid());

    a.input(json!("y"));
    a.input(json!("x"));
    b.input(json!("x"));
    assert!(b.is_valid());
    assert!(a.is_valid());
}

#[test]
fn clearing_the_owner_releases_the_subscriber() {
    let (tree, mut manager) = form(json!({ "a": "", "b": "" }), SUBSCRIBER_RULES);
    let a = tree.node("a").unwrap();
    let b = tree.node("b").unwrap();

    a.input(json!("x"));
    b.input(json!("x"));
    assert!(b.is_invalid());

    manager.clear_validators(&tree.control("a").unwrap());
    assert!(a.validator().is_none());
    assert!(b.is_valid());

    a.input(json!("x"));
    b.input(json!("x"));
    assert!(b.is_valid());
}

#[test]
fn nested_subscriber_is_kept_live() {
    let (tree, _manager) = form(
        json!({ "contact": { "email": "", "phone": "" } }),
        r#"{ "contact.email": [
            { "name": "doesNotMatch", "config": { "subscriber": "phone", "source": ["phone"] } }
        ] }"#,
    );
    let email = tree.node("contact.email").unwrap();
    let phone = tree.node("contact.phone").unwrap();

    email.input(json!("x"));
    phone.input(json!("x"));
    assert!(phone.is_invalid());
    assert!(!phone.is_pristine());
    assert!(email.is_valid());

    email.input(json!("y"));
    assert!(phone.is_valid());
    assert!(phone.is_pristine());
}

#[test]
fn subscriber_under_a_group_scope_is_kept_live() {
    let (tree, _manager) = form(
        json!({ "contact": { "email": "", "phone": "" } }),
        r#"{
            "contact": [],
            "email": [{ "name": "doesNotMatch", "config": { "subscriber": "phone", "source": ["phone"] } }]
        }"#,
    );
    let email = tree.node("contact.email").unwrap();
    let phone = tree.node("contact.phone").unwrap();

    email.input(json!("x"));
    phone.input(json!("x"));
    assert!(phone.is_invalid());
    assert!(!phone.is_pristine());

    email.input(json!("y"));
    assert!(phone.is_valid());
    assert!(phone.is_pristine());
}
