//! Single-value rules.
//!
//! Every rule except `required` and `requiredTrue` lets empty values through,
//! so optional fields stay valid until something is entered.

use super::names::{EMAIL, MAX, MIN, PATTERN, REQUIRED};
use super::{is_empty_input_value, numeric_value, value_length, ValueRule};
use crate::error::{FieldErrors, ValidationResult};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        // WHATWG-style email check
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email regex is valid")
    })
}

/// Value must be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredRule;

impl ValueRule for RequiredRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_input_value(value) {
            FieldErrors::single(self.kind(), true).into_result()
        } else {
            Ok(())
        }
    }

    fn kind(&self) -> &'static str {
        REQUIRED
    }
}

/// Value must be exactly `true` (checkbox consent and the like).
///
/// Reports under the `required` kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredTrueRule;

impl ValueRule for RequiredTrueRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        if value == &Value::Bool(true) {
            Ok(())
        } else {
            FieldErrors::single(self.kind(), true).into_result()
        }
    }

    fn kind(&self) -> &'static str {
        REQUIRED
    }
}

/// Value must look like an email address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmailRule;

impl ValueRule for EmailRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_input_value(value) {
            return Ok(());
        }
        match value.as_str() {
            Some(s) if email_regex().is_match(s) => Ok(()),
            _ => FieldErrors::single(self.kind(), true).into_result(),
        }
    }

    fn kind(&self) -> &'static str {
        EMAIL
    }
}

/// Minimum length, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinLengthRule {
    /// Smallest accepted length
    pub min: usize,
}

impl MinLengthRule {
    /// Create the rule.
    pub fn new(min: usize) -> Self {
        Self { min }
    }
}

impl ValueRule for MinLengthRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_input_value(value) {
            return Ok(());
        }
        match value_length(value) {
            Some(actual) if actual < self.min => FieldErrors::single(
                self.kind(),
                json!({ "requiredLength": self.min, "actualLength": actual }),
            )
            .into_result(),
            _ => Ok(()),
        }
    }

    fn kind(&self) -> &'static str {
        "minlength"
    }
}

/// Maximum length, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxLengthRule {
    /// Largest accepted length
    pub max: usize,
}

impl MaxLengthRule {
    /// Create the rule.
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl ValueRule for MaxLengthRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        match value_length(value) {
            Some(actual) if actual > self.max => FieldErrors::single(
                self.kind(),
                json!({ "requiredLength": self.max, "actualLength": actual }),
            )
            .into_result(),
            _ => Ok(()),
        }
    }

    fn kind(&self) -> &'static str {
        "maxlength"
    }
}

/// Smallest accepted number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinRule {
    /// Lower bound (inclusive)
    pub min: f64,
}

impl MinRule {
    /// Create the rule.
    pub fn new(min: f64) -> Self {
        Self { min }
    }
}

impl ValueRule for MinRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_input_value(value) {
            return Ok(());
        }
        match numeric_value(value) {
            Some(actual) if actual < self.min => {
                FieldErrors::single(self.kind(), json!({ "min": self.min, "actual": value })).into_result()
            }
            _ => Ok(()),
        }
    }

    fn kind(&self) -> &'static str {
        MIN
    }
}

/// Largest accepted number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxRule {
    /// Upper bound (inclusive)
    pub max: f64,
}

impl MaxRule {
    /// Create the rule.
    pub fn new(max: f64) -> Self {
        Self { max }
    }
}

impl ValueRule for MaxRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_input_value(value) {
            return Ok(());
        }
        match numeric_value(value) {
            Some(actual) if actual > self.max => {
                FieldErrors::single(self.kind(), json!({ "max": self.max, "actual": value })).into_result()
            }
            _ => Ok(()),
        }
    }

    fn kind(&self) -> &'static str {
        MAX
    }
}

/// Whole-value regex match.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: String,
    regex: Regex,
}

impl PatternRule {
    /// Compile the pattern, anchoring it with `^...$` unless already anchored.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut anchored = String::with_capacity(pattern.len() + 2);
        if !pattern.starts_with('^') {
            anchored.push('^');
        }
        anchored.push_str(pattern);
        if !pattern.ends_with('$') {
            anchored.push('$');
        }
        let regex = Regex::new(&anchored)?;
        Ok(Self {
            pattern: anchored,
            regex,
        })
    }

    /// The anchored pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl PartialEq for PatternRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl ValueRule for PatternRule {
    fn validate(&self, value: &Value) -> ValidationResult {
        if is_empty_input_value(value) {
            return Ok(());
        }
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if self.regex.is_match(&text) {
            Ok(())
        } else {
            FieldErrors::single(
                self.kind(),
                json!({ "requiredPattern": self.pattern, "actualValue": value }),
            )
            .into_result()
        }
    }

    fn kind(&self) -> &'static str {
        PATTERN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_report_under_their_kind() {
        let failing: Vec<(Box<dyn ValueRule>, Value)> = vec![
            (Box::new(RequiredRule), json!("")),
            (Box::new(RequiredTrueRule), json!(false)),
            (Box::new(EmailRule), json!("nope")),
            (Box::new(MinLengthRule::new(3)), json!("ab")),
            (Box::new(MaxLengthRule::new(1)), json!("ab")),
            (Box::new(MinRule::new(5.0)), json!(1)),
            (Box::new(MaxRule::new(5.0)), json!(9)),
            (Box::new(PatternRule::new("[0-9]+").unwrap()), json!("x")),
        ];
        for (rule, value) in failing {
            let errors = rule.validate(&value).unwrap_err();
            assert_eq!(errors.kinds().collect::<Vec<_>>(), vec![rule.kind()], "{rule:?}");
        }
    }

    #[test]
    fn required_rule() {
        assert!(RequiredRule.validate(&json!("x")).is_ok());
        assert!(RequiredRule.validate(&json!(0)).is_ok());
        let err = RequiredRule.validate(&json!("")).unwrap_err();
        assert_eq!(err.get("required"), Some(&json!(true)));
        assert!(RequiredRule.validate(&Value::Null).is_err());
    }

    #[test]
    fn required_true_rule() {
        assert!(RequiredTrueRule.validate(&json!(true)).is_ok());
        assert!(RequiredTrueRule.validate(&json!(false)).is_err());
        assert!(RequiredTrueRule.validate(&json!("true")).is_err());
    }

    #[test]
    fn email_rule() {
        assert!(EmailRule.validate(&json!("test@example.com")).is_ok());
        assert!(EmailRule.validate(&json!("")).is_ok());
        assert!(EmailRule.validate(&json!("not-an-email")).is_err());
        assert!(EmailRule.validate(&json!(42)).is_err());
    }

    #[test]
    fn min_length_payload() {
        let err = MinLengthRule::new(3).validate(&json!("ab")).unwrap_err();
        assert_eq!(
            err.get("minlength"),
            Some(&json!({ "requiredLength": 3, "actualLength": 2 }))
        );
        assert!(MinLengthRule::new(3).validate(&json!("")).is_ok());
        assert!(MinLengthRule::new(3).validate(&json!(7)).is_ok());
    }

    #[test]
    fn max_length_payload() {
        let err = MaxLengthRule::new(2).validate(&json!(["a", "b", "c"])).unwrap_err();
        assert_eq!(
            err.get("maxlength"),
            Some(&json!({ "requiredLength": 2, "actualLength": 3 }))
        );
        assert!(MaxLengthRule::new(2).validate(&json!("ab")).is_ok());
    }

    #[test]
    fn numeric_bounds() {
        assert!(MinRule::new(18.0).validate(&json!(18)).is_ok());
        assert!(MinRule::new(18.0).validate(&json!("17")).is_err());
        assert!(MinRule::new(18.0).validate(&json!("abc")).is_ok());
        assert!(MaxRule::new(120.0).validate(&json!(121)).is_err());
        assert!(MaxRule::new(120.0).validate(&Value::Null).is_ok());
    }

    #[test]
    fn pattern_is_anchored() {
        let rule = PatternRule::new("[a-z]+").unwrap();
        assert_eq!(rule.pattern(), "^[a-z]+$");
        assert!(rule.validate(&json!("abc")).is_ok());

        let err = rule.validate(&json!("abc1")).unwrap_err();
        assert_eq!(
            err.get("pattern"),
            Some(&json!({ "requiredPattern": "^[a-z]+$", "actualValue": "abc1" }))
        );

        assert_eq!(PatternRule::new("^\\d+$").unwrap().pattern(), "^\\d+$");
        assert!(PatternRule::new("(").is_err());
    }
}
