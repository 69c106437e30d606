//! Built-in validation rules.
//!
//! Single-value rules implement [`ValueRule`] and only look at the field's own
//! value. Rules that read or write other fields implement
//! [`CrossFieldRule`](cross_field::CrossFieldRule).

mod conditional;
mod cross_field;
mod standard;

pub use conditional::{RequiredIfCondition, RequiredIfRule};
pub use cross_field::{CrossFieldRule, DoesNotMatchRule};
pub(crate) use cross_field::write_scoped;
pub use standard::{
    EmailRule, MaxLengthRule, MaxRule, MinLengthRule, MinRule, PatternRule, RequiredRule,
    RequiredTrueRule,
};

use crate::control::{ControlRef, SyncValidatorFn};
use crate::error::ValidationResult;
use serde_json::Value;
use std::fmt::Debug;
use std::rc::Rc;

/// Rule names understood by [`ValidatorRegistry::with_builtins`](crate::ValidatorRegistry::with_builtins).
pub mod names {
    /// Value must not be empty
    pub const REQUIRED: &str = "required";
    /// Value must be `true`
    pub const REQUIRED_TRUE: &str = "requiredTrue";
    /// Value must look like an email address
    pub const EMAIL: &str = "email";
    /// Minimum length
    pub const MIN_LENGTH: &str = "minLength";
    /// Maximum length
    pub const MAX_LENGTH: &str = "maxLength";
    /// Minimum number
    pub const MIN: &str = "min";
    /// Maximum number
    pub const MAX: &str = "max";
    /// Regex pattern
    pub const PATTERN: &str = "pattern";
    /// Length bounds from a `LengthConfig`
    pub const LEN: &str = "len";
    /// Cross-field duplicate detection
    pub const DOES_NOT_MATCH: &str = "doesNotMatch";
    /// Conditional required, semantics supplied by the integrator
    pub const REQUIRED_IF: &str = "requiredIf";
}

/// A rule over a single field value.
pub trait ValueRule: Debug {
    /// Check the value.
    fn validate(&self, value: &Value) -> ValidationResult;

    /// Error kind reported on failure.
    fn kind(&self) -> &'static str;
}

/// Turn a value rule into a node validation function.
pub fn value_validator<R: ValueRule + 'static>(rule: R) -> SyncValidatorFn {
    Rc::new(move |control: &ControlRef| rule.validate(&control.value()))
}

/// Whether a value counts as "not provided": `null`, or a zero-length string or array.
pub fn is_empty_input_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Length of a value: characters of a string, elements of an array.
pub fn value_length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Numeric reading of a value; numeric strings count.
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
        _ => None,
    }
}
