use super::is_empty_input_value;
use super::names::REQUIRED_IF;
use crate::control::ControlRef;
use crate::error::{FieldErrors, ValidationResult};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Predicate deciding whether a conditional-required rule is active for a node.
///
/// Receives the node under validation and the descriptor's opaque config.
pub type RequiredIfCondition = Rc<dyn Fn(&ControlRef, Option<&Value>) -> bool>;

/// Required, but only while an integrator-supplied condition holds.
///
/// Reports `{ "requiredIf": true }` when the condition holds and the value is empty.
#[derive(Clone)]
pub struct RequiredIfRule {
    condition: RequiredIfCondition,
    config: Option<Value>,
}

impl RequiredIfRule {
    /// Bind a condition to one descriptor's config.
    pub fn new(condition: RequiredIfCondition, config: Option<Value>) -> Self {
        Self { condition, config }
    }

    /// Check the node.
    pub fn validate(&self, control: &ControlRef) -> ValidationResult {
        if (self.condition)(control, self.config.as_ref()) && is_empty_input_value(&control.value())
        {
            FieldErrors::single(REQUIRED_IF, true).into_result()
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for RequiredIfRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequiredIfRule")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
