//! Rules whose outcome depends on, or is written to, other fields.

use super::is_empty_input_value;
use super::names::DOES_NOT_MATCH;
use crate::config::GroupValidatorConfig;
use crate::control::{resolve_sibling, same_control, ControlRef};
use crate::error::{FieldErrors, ValidationResult};
use serde_json::{json, Value};
use std::fmt::Debug;

/// A rule evaluated against one node whose outcome is written to another.
///
/// The write target is explicit in [`evaluate`](Self::evaluate) instead of
/// being implied by configuration, so every side-channel write is visible at
/// the call site.
pub trait CrossFieldRule: Debug {
    /// Error kind this rule writes and reports.
    fn kind(&self) -> &'static str;

    /// Sibling path that receives the outcome, if not the evaluated node.
    fn subscriber(&self) -> Option<&str>;

    /// Evaluate against `node`, record the outcome on `write_errors_to`, and
    /// report the same outcome to the caller.
    fn evaluate(&self, node: &ControlRef, write_errors_to: &ControlRef) -> ValidationResult;

    /// The node the outcome is written to when `node` is evaluated.
    ///
    /// Falls back to `node` itself when no subscriber is configured or the
    /// subscriber path does not resolve.
    fn write_target(&self, node: &ControlRef) -> ControlRef {
        self.subscriber()
            .and_then(|path| resolve_sibling(node, path))
            .unwrap_or_else(|| node.clone())
    }
}

/// Flags a field whose value duplicates one of the configured siblings.
///
/// Empty values never take part: if the target's or the node's value is
/// empty the outcome is "no error", and empty siblings never count as a
/// duplicate. Source paths that do not resolve are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoesNotMatchRule {
    config: GroupValidatorConfig,
}

impl DoesNotMatchRule {
    /// Create the rule from its configuration.
    pub fn new(config: GroupValidatorConfig) -> Self {
        Self { config }
    }

    /// The rule's configuration.
    pub fn config(&self) -> &GroupValidatorConfig {
        &self.config
    }

    fn duplicates(&self, node_value: &Value, target: &ControlRef) -> Vec<String> {
        let Some(group) = target.parent() else {
            return Vec::new();
        };
        self.config
            .source
            .iter()
            .filter(|path| match group.get(path) {
                Some(sibling) => {
                    let value = sibling.value();
                    !is_empty_input_value(&value) && &value == node_value
                }
                None => {
                    trace_debug!(path = %path, "doesNotMatch source path not found, skipping");
                    false
                }
            })
            .cloned()
            .collect()
    }
}

impl CrossFieldRule for DoesNotMatchRule {
    fn kind(&self) -> &'static str {
        DOES_NOT_MATCH
    }

    fn subscriber(&self) -> Option<&str> {
        self.config.subscriber.as_deref()
    }

    fn evaluate(&self, node: &ControlRef, write_errors_to: &ControlRef) -> ValidationResult {
        let node_value = node.value();
        let outcome = if is_empty_input_value(&write_errors_to.value())
            || is_empty_input_value(&node_value)
        {
            Ok(())
        } else {
            let matches = self.duplicates(&node_value, write_errors_to);
            if matches.is_empty() {
                Ok(())
            } else {
                FieldErrors::single(
                    self.kind(),
                    json!({ "value": node_value, "match": matches }),
                )
                .into_result()
            }
        };

        if !same_control(node, write_errors_to) {
            write_scoped(write_errors_to, self.kind(), &outcome);
        }
        outcome
    }
}

/// Record `outcome` for one error kind on `target`, leaving its other kinds alone.
pub(crate) fn write_scoped(target: &ControlRef, kind: &str, outcome: &ValidationResult) {
    let mut errors = target.errors().unwrap_or_default();
    match outcome {
        Err(reported) => match reported.get(kind) {
            Some(payload) => errors.insert(kind, payload.clone()),
            None => return,
        },
        Ok(()) => {
            if errors.remove(kind).is_none() {
                return;
            }
        }
    }
    target.set_errors(errors.into_option());
}
