//! The field-tree contract the engine runs against.
//!
//! The engine never builds or owns field nodes. It is handed a tree that
//! implements [`Control`] and only attaches or detaches validators, writes
//! error sets, silently resets values, flips dirty/pristine flags and listens
//! for value changes.

use crate::error::{FieldErrors, ValidationResult};
use futures_util::future::LocalBoxFuture;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a node of the field tree.
pub type ControlRef = Rc<dyn Control>;

/// Synchronous validation function attached to a node.
pub type SyncValidatorFn = Rc<dyn Fn(&ControlRef) -> ValidationResult>;

/// Asynchronous validation function attached to a node.
///
/// The returned future is the deferred (pending, then resolved) result.
pub type AsyncValidatorFn = Rc<dyn Fn(&ControlRef) -> LocalBoxFuture<'static, ValidationResult>>;

/// Callback invoked with the new value whenever a value changes.
pub type ChangeListener = Rc<dyn Fn(&Value)>;

/// Stable identity of a node within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a raw identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Validity state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValidityStatus {
    /// No errors and no async evaluation in flight
    #[default]
    Valid,
    /// The node's error set is non-empty
    Invalid,
    /// An async evaluation for the current value has not settled yet
    Pending,
}

/// Options for [`Control::recompute_validity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeOptions {
    /// Recompute only this node, not its ancestors
    pub isolated: bool,
    /// Do not emit a value-change notification
    pub silent: bool,
}

impl RecomputeOptions {
    /// Recompute this node and its ancestors, notifying listeners.
    pub const fn propagate() -> Self {
        Self {
            isolated: false,
            silent: false,
        }
    }

    /// Recompute this node and its ancestors without notifying.
    pub const fn silent() -> Self {
        Self {
            isolated: false,
            silent: true,
        }
    }

    /// Recompute only this node without notifying.
    pub const fn isolated_silent() -> Self {
        Self {
            isolated: true,
            silent: true,
        }
    }
}

/// RAII guard for a value-change listener.
///
/// Trees keep only a weak reference to the listener; dropping the guard
/// releases the last strong one and the tree forgets the listener before its
/// next notification.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    _listener: ChangeListener,
}

impl Subscription {
    /// Wrap the strong reference to a listener.
    pub fn new(listener: ChangeListener) -> Self {
        Self {
            _listener: listener,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// A node of the field tree: a leaf holding a value, or a group of named
/// children whose value is derived from theirs.
///
/// Every method takes `&self`; implementations use interior mutability and
/// must not hold internal borrows while calling validators or listeners,
/// since both re-enter the tree.
pub trait Control {
    /// Identity of this node.
    fn id(&self) -> NodeId;

    /// Resolve a dot-separated path relative to this node.
    fn get(&self, path: &str) -> Option<ControlRef>;

    /// The enclosing group, `None` for the root.
    fn parent(&self) -> Option<ControlRef>;

    /// Whether this node is a group.
    fn is_group(&self) -> bool;

    /// Named children in declaration order; empty for leaves.
    fn children(&self) -> Vec<(String, ControlRef)>;

    /// Current value. Groups return an object built from their children.
    fn value(&self) -> Value;

    /// Attach (or with `None`, detach) the synchronous validator.
    fn set_validator(&self, validator: Option<SyncValidatorFn>);

    /// Attach (or with `None`, detach) the asynchronous validator.
    fn set_async_validator(&self, validator: Option<AsyncValidatorFn>);

    /// The attached synchronous validator.
    fn validator(&self) -> Option<SyncValidatorFn>;

    /// The attached asynchronous validator.
    fn async_validator(&self) -> Option<AsyncValidatorFn>;

    /// Current error set, `None` when there are no errors.
    fn errors(&self) -> Option<FieldErrors>;

    /// Replace the error set and update the validity state to match.
    fn set_errors(&self, errors: Option<FieldErrors>);

    /// Mark as interacted with.
    fn mark_dirty(&self);

    /// Mark as untouched.
    fn mark_pristine(&self);

    /// Whether the node is untouched.
    fn is_pristine(&self) -> bool;

    /// Current validity state.
    fn status(&self) -> ValidityStatus;

    /// Run the attached validators and update errors and validity state.
    fn recompute_validity(&self, options: RecomputeOptions);

    /// Reset the value to empty and mark pristine; `silent` suppresses notifications.
    fn reset_value(&self, silent: bool);

    /// Listen for value changes on this node or anywhere below it.
    fn on_value_change(&self, listener: ChangeListener) -> Subscription;

    /// Whether the validity state is [`ValidityStatus::Valid`].
    fn is_valid(&self) -> bool {
        self.status() == ValidityStatus::Valid
    }

    /// Whether the validity state is [`ValidityStatus::Invalid`].
    fn is_invalid(&self) -> bool {
        self.status() == ValidityStatus::Invalid
    }

    /// Whether the validity state is [`ValidityStatus::Pending`].
    fn is_pending(&self) -> bool {
        self.status() == ValidityStatus::Pending
    }
}

/// Resolve `path` among the siblings of `control`, i.e. within its parent.
pub fn resolve_sibling(control: &ControlRef, path: &str) -> Option<ControlRef> {
    control.parent()?.get(path)
}

/// Whether two handles point at the same node.
pub fn same_control(a: &ControlRef, b: &ControlRef) -> bool {
    a.id() == b.id()
}
