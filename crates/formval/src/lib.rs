//! # formval
//!
//! Declarative, metadata-driven validation for hierarchical data-entry forms.
//! A tree of fields gets validation rules attached, removed and re-evaluated
//! from a rule table instead of per-field code.
//!
//! ## Pieces
//!
//! - [`ValidatorRegistry`] - rule name to validator factory, with built-ins
//!   and runtime-registered async predicates
//! - [`Composer`] - resolves descriptors and attaches one composed sync and
//!   one composed async validator per node
//! - [`find_controls_requiring_subscription`] - which fields cross-field rules
//!   make dependent on the rest of the tree
//! - [`ValidationManager`] - recursive apply / clear / invoke, plus the live
//!   subscription that revalidates dependent fields
//!
//! The field tree itself is supplied by the caller through the [`Control`]
//! trait; `formval-tree` ships an in-memory implementation.
//!
//! ## Rule metadata
//!
//! ```json
//! {
//!   "username": [
//!     { "name": "required" },
//!     { "name": "len", "config": { "minLength": 3, "maxLength": 20 } },
//!     { "name": "usernameFree", "isAsync": true }
//!   ],
//!   "backupEmail": [
//!     { "name": "email" },
//!     { "name": "doesNotMatch", "config": { "source": ["email"], "subscribe": true } }
//!   ]
//! }
//! ```
//!
//! ## Error format
//!
//! A field's error set is a JSON object keyed by rule kind:
//!
//! ```json
//! { "minlength": { "requiredLength": 3, "actualLength": 2 },
//!   "doesNotMatch": { "value": "a@b.c", "match": ["email"] } }
//! ```

#[macro_use]
mod tracing_macros;

mod compose;
mod config;
mod control;
mod error;
mod manager;
mod pending;
mod registry;
pub mod rules;
mod tracker;

pub use compose::{compose_async, compose_sync, merge_outcomes, Composer, CrossFieldLink};
pub use config::{GroupValidatorConfig, LengthConfig, RuleMetadata, ValidatorDescriptor};
pub use control::{
    resolve_sibling, same_control, AsyncValidatorFn, ChangeListener, Control, ControlRef, NodeId,
    RecomputeOptions, Subscription, SyncValidatorFn, ValidityStatus,
};
pub use error::{ConfigError, FieldErrors, RegistryError, ValidationResult};
pub use manager::ValidationManager;
pub use pending::{PendingValidation, Revision, RevisionCounter, SettledValidation};
pub use registry::{Validator, ValidatorFactory, ValidatorRegistry};
pub use tracker::find_controls_requiring_subscription;

/// Prelude module for formval
pub mod prelude {
    pub use crate::config::{GroupValidatorConfig, LengthConfig, RuleMetadata, ValidatorDescriptor};
    pub use crate::control::{Control, ControlRef, RecomputeOptions, ValidityStatus};
    pub use crate::error::{FieldErrors, ValidationResult};
    pub use crate::manager::ValidationManager;
    pub use crate::registry::{Validator, ValidatorRegistry};
}
