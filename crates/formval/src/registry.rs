//! Validator registry: rule name to validator factory.
//!
//! A registry is an ordinary value. The [`ValidationManager`](crate::ValidationManager)
//! owns one per application or session; nothing is looked up from global state.
//!
//! ```rust,ignore
//! let mut registry = ValidatorRegistry::with_builtins();
//! registry.register_async("usernameFree", |value| async move {
//!     lookup_username(value.as_str().unwrap_or_default()).await.is_none()
//! });
//! ```

use crate::compose::compose_sync;
use crate::config::{GroupValidatorConfig, LengthConfig};
use crate::control::{AsyncValidatorFn, ControlRef, SyncValidatorFn};
use crate::error::{FieldErrors, RegistryError};
use crate::rules::names::{
    DOES_NOT_MATCH, EMAIL, LEN, MAX, MAX_LENGTH, MIN, MIN_LENGTH, PATTERN, REQUIRED,
    REQUIRED_IF, REQUIRED_TRUE,
};
use crate::rules::{
    numeric_value, value_validator, CrossFieldRule, DoesNotMatchRule, EmailRule, MaxLengthRule,
    MaxRule, MinLengthRule, MinRule, PatternRule, RequiredIfCondition, RequiredIfRule, RequiredRule,
    RequiredTrueRule,
};
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// A validation function built from one descriptor.
#[derive(Clone)]
pub enum Validator {
    /// Evaluated synchronously against the node
    Sync(SyncValidatorFn),
    /// Evaluated asynchronously; the result is deferred
    Async(AsyncValidatorFn),
    /// Evaluated synchronously and may write its outcome to a sibling
    CrossField(Rc<dyn CrossFieldRule>),
}

impl Validator {
    /// Short label for logs.
    pub fn flavor(&self) -> &'static str {
        match self {
            Validator::Sync(_) => "sync",
            Validator::Async(_) => "async",
            Validator::CrossField(_) => "cross-field",
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::CrossField(rule) => f.debug_tuple("CrossField").field(rule).finish(),
            other => f.debug_tuple(other.flavor()).finish(),
        }
    }
}

/// Builds a validator from a descriptor's optional config.
///
/// Returning `None` means the config does not yield a usable rule; the
/// descriptor is then dropped like an unknown name.
pub type ValidatorFactory = Rc<dyn Fn(Option<&Value>) -> Option<Validator>>;

/// Lookup table from rule name to [`ValidatorFactory`].
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    factories: HashMap<String, ValidatorFactory>,
}

impl ValidatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in rules.
    ///
    /// `requiredIf` is not included; install it with
    /// [`register_required_if`](Self::register_required_if).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(REQUIRED, |_| Some(Validator::Sync(value_validator(RequiredRule))));
        registry.register(REQUIRED_TRUE, |_| {
            Some(Validator::Sync(value_validator(RequiredTrueRule)))
        });
        registry.register(EMAIL, |_| Some(Validator::Sync(value_validator(EmailRule))));

        registry.register(MIN_LENGTH, |config| {
            let min = length_param(MIN_LENGTH, config)?;
            Some(Validator::Sync(value_validator(MinLengthRule::new(min))))
        });
        registry.register(MAX_LENGTH, |config| {
            let max = length_param(MAX_LENGTH, config)?;
            Some(Validator::Sync(value_validator(MaxLengthRule::new(max))))
        });

        registry.register(MIN, |config| {
            let min = number_param(MIN, config)?;
            Some(Validator::Sync(value_validator(MinRule::new(min))))
        });
        registry.register(MAX, |config| {
            let max = number_param(MAX, config)?;
            Some(Validator::Sync(value_validator(MaxRule::new(max))))
        });

        registry.register(PATTERN, |config| {
            let Some(pattern) = config.and_then(Value::as_str) else {
                trace_warn!(rule = PATTERN, "pattern rule needs a string config");
                return None;
            };
            match PatternRule::new(pattern) {
                Ok(rule) => Some(Validator::Sync(value_validator(rule))),
                Err(err) => {
                    trace_warn!(rule = PATTERN, error = %err, "invalid pattern, rule dropped");
                    None
                }
            }
        });

        registry.register(LEN, len_factory);

        registry.register(DOES_NOT_MATCH, |config| {
            let Some(config) = config.and_then(GroupValidatorConfig::from_value) else {
                trace_warn!(rule = DOES_NOT_MATCH, "doesNotMatch needs a group validator config");
                return None;
            };
            Some(Validator::CrossField(Rc::new(DoesNotMatchRule::new(config))))
        });

        registry
    }

    /// Register a factory under `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<&Value>) -> Option<Validator> + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            trace_debug!(rule = %name, "replacing registered validator");
        }
        self.factories.insert(name, Rc::new(factory));
    }

    /// Look up the factory for `name`.
    pub fn resolve(&self, name: &str) -> Result<ValidatorFactory, RegistryError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownValidator {
                name: name.to_string(),
            })
    }

    /// Register an async rule from a predicate over the field value.
    ///
    /// The rule resolves to "no error" when the predicate yields `true` and to
    /// `{ <name>: true }` otherwise. Registering an existing name replaces it.
    pub fn register_async<F, Fut>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        let name = name.into();
        let kind = name.clone();
        let predicate = Rc::new(predicate);

        self.register(name, move |_config| {
            let predicate = Rc::clone(&predicate);
            let kind = kind.clone();
            let validator: AsyncValidatorFn = Rc::new(move |control: &ControlRef| {
                let check = predicate(control.value());
                let kind = kind.clone();
                async move {
                    if check.await {
                        Ok(())
                    } else {
                        FieldErrors::single(kind, true).into_result()
                    }
                }
                .boxed_local()
            });
            Some(Validator::Async(validator))
        });
    }

    /// Install the semantics of the `requiredIf` rule.
    ///
    /// `condition(node, config)` decides whether the field is currently
    /// required; `config` is the descriptor's opaque config.
    pub fn register_required_if<F>(&mut self, condition: F)
    where
        F: Fn(&ControlRef, Option<&Value>) -> bool + 'static,
    {
        let condition: RequiredIfCondition = Rc::new(condition);
        self.register(REQUIRED_IF, move |config| {
            let rule = RequiredIfRule::new(Rc::clone(&condition), config.cloned());
            let validator: SyncValidatorFn = Rc::new(move |control: &ControlRef| rule.validate(control));
            Some(Validator::Sync(validator))
        });
    }

    /// Whether a factory is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("validators", &self.names())
            .finish()
    }
}

fn len_factory(config: Option<&Value>) -> Option<Validator> {
    let config = match config.map(|c| serde_json::from_value::<LengthConfig>(c.clone())) {
        Some(Ok(config)) => config,
        Some(Err(err)) => {
            trace_warn!(rule = LEN, error = %err, "invalid length config, rule dropped");
            return None;
        }
        None => return None,
    };

    let mut validators: Vec<SyncValidatorFn> = Vec::new();
    if let Some(min) = config.min_length.filter(|&min| min > 0) {
        validators.push(value_validator(MinLengthRule::new(min)));
    }
    if let Some(max) = config.max_length.filter(|&max| max > 0) {
        validators.push(value_validator(MaxLengthRule::new(max)));
    }

    if validators.is_empty() {
        trace_debug!(rule = LEN, "length config has no bounds, rule dropped");
        None
    } else {
        Some(Validator::Sync(compose_sync(validators)))
    }
}

fn length_param(rule: &'static str, config: Option<&Value>) -> Option<usize> {
    match config.and_then(Value::as_u64) {
        Some(n) => usize::try_from(n).ok(),
        None => {
            trace_warn!(rule, "length rule needs a non-negative integer config");
            None
        }
    }
}

fn number_param(rule: &'static str, config: Option<&Value>) -> Option<f64> {
    let number = config.and_then(numeric_value);
    if number.is_none() {
        trace_warn!(rule, "bound rule needs a numeric config");
    }
    number
}
