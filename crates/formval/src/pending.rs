//! Asynchronous validation results and the stale-result policy.
//!
//! Each node carries a [`RevisionCounter`]. Every validity recomputation
//! advances it, and an async evaluation started by that recomputation is
//! tagged with the revision it belongs to. When the evaluation settles the
//! result is applied only if no newer recomputation happened meanwhile, so a
//! slow check for an old value can never overwrite the outcome for a newer one.

use crate::control::{AsyncValidatorFn, ControlRef};
use crate::error::ValidationResult;
use futures_util::future::LocalBoxFuture;
use std::cell::Cell;
use std::fmt;

/// Revision of a node's validity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(u64);

/// Per-node revision source.
#[derive(Debug, Default)]
pub struct RevisionCounter {
    current: Cell<u64>,
}

impl RevisionCounter {
    /// Create a counter at revision zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new revision, superseding every earlier one.
    pub fn advance(&self) -> Revision {
        let next = self.current.get().wrapping_add(1);
        self.current.set(next);
        Revision(next)
    }

    /// The latest revision.
    pub fn current(&self) -> Revision {
        Revision(self.current.get())
    }

    /// Whether `revision` is still the latest.
    pub fn is_current(&self, revision: Revision) -> bool {
        self.current.get() == revision.0
    }
}

/// An async evaluation in flight.
pub struct PendingValidation {
    revision: Revision,
    outcome: LocalBoxFuture<'static, ValidationResult>,
}

impl PendingValidation {
    /// Wrap an outcome future started at `revision`.
    pub fn new(revision: Revision, outcome: LocalBoxFuture<'static, ValidationResult>) -> Self {
        Self { revision, outcome }
    }

    /// Start `validator` against `control` at `revision`.
    pub fn start(revision: Revision, validator: &AsyncValidatorFn, control: &ControlRef) -> Self {
        Self::new(revision, validator(control))
    }

    /// Revision this evaluation belongs to.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Wait for the outcome.
    pub async fn settle(self) -> SettledValidation {
        let result = self.outcome.await;
        SettledValidation {
            revision: self.revision,
            result,
        }
    }
}

impl fmt::Debug for PendingValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingValidation")
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

/// A settled async evaluation.
#[derive(Debug)]
pub struct SettledValidation {
    revision: Revision,
    result: ValidationResult,
}

impl SettledValidation {
    /// Revision the evaluation was started at.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// The result, if it still applies to the node's latest revision.
    ///
    /// Stale results are dropped.
    pub fn accept(self, counter: &RevisionCounter) -> Option<ValidationResult> {
        if counter.is_current(self.revision) {
            Some(self.result)
        } else {
            trace_debug!(
                revision = self.revision.0,
                latest = counter.current().0,
                "discarding stale async validation result"
            );
            None
        }
    }
}
