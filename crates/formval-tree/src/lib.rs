//! # formval-tree
//!
//! An in-memory field tree implementing [`formval::Control`].
//!
//! Used by the engine's tests and benches, and usable as a headless form
//! model on its own. Async validations are not polled in the background:
//! they queue on the tree and run when [`FormTree::settle`] is awaited.
//!
//! ```rust,ignore
//! let tree = FormTree::from_json(json!({ "email": "", "backupEmail": "" }));
//! manager.apply_validators(&tree.root(), &metadata);
//! tree.node("email").unwrap().input(json!("a@b.c"));
//! tree.settle().await;
//! ```

mod node;

pub use node::FormControl;

use formval::{Control, ControlRef, RecomputeOptions};
use futures_util::future::join_all;
use node::Shared;
use serde_json::Value;
use std::rc::{Rc, Weak};

/// Owner of a field tree.
#[derive(Debug)]
pub struct FormTree {
    root: Rc<FormControl>,
}

impl FormTree {
    /// Build a tree from a JSON value. Objects become groups.
    pub fn from_json(value: Value) -> Self {
        let shared = Rc::new(Shared::default());
        Self {
            root: FormControl::build(&shared, value, Weak::new()),
        }
    }

    /// The root as a trait-object handle.
    pub fn root(&self) -> ControlRef {
        Rc::clone(&self.root) as ControlRef
    }

    /// The concrete root node.
    pub fn root_node(&self) -> &Rc<FormControl> {
        &self.root
    }

    /// Concrete node at a dotted path.
    pub fn node(&self, path: &str) -> Option<Rc<FormControl>> {
        self.root.find(path)
    }

    /// Node at a dotted path as a trait-object handle.
    pub fn control(&self, path: &str) -> Option<ControlRef> {
        self.node(path).map(|node| node as ControlRef)
    }

    /// Add `name` under the group at `parent_path` (empty for the root),
    /// replacing an existing child of that name.
    ///
    /// The new child has no validators. Returns `false` when the parent is
    /// missing or not a group.
    pub fn add_control(&self, parent_path: &str, name: impl Into<String>, value: Value) -> bool {
        let Some(parent) = self.group_at(parent_path) else {
            return false;
        };
        let child = FormControl::build(parent.shared(), value, Weak::new());
        if !parent.attach_child(name.into(), child) {
            return false;
        }
        parent.recompute_validity(RecomputeOptions::propagate());
        true
    }

    /// Remove the node at `path`. Returns the detached node.
    pub fn remove_control(&self, path: &str) -> Option<Rc<FormControl>> {
        let (parent_path, name) = match path.rsplit_once('.') {
            Some((parent, name)) => (parent, name),
            None => ("", path),
        };
        let parent = self.group_at(parent_path)?;
        let removed = parent.detach_child(name)?;
        parent.recompute_validity(RecomputeOptions::propagate());
        Some(removed)
    }

    /// Number of async evaluations waiting to be settled.
    pub fn pending_count(&self) -> usize {
        self.root.shared().pending_len()
    }

    /// Drive every queued async evaluation to completion and apply the
    /// results that are still current. Returns how many were applied.
    ///
    /// Evaluations queued while settling are driven too.
    pub async fn settle(&self) -> usize {
        let mut applied = 0;
        loop {
            let pending = self.root.shared().take_pending();
            if pending.is_empty() {
                return applied;
            }
            let (nodes, evaluations): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
            let settled = join_all(evaluations.into_iter().map(|pending| pending.settle())).await;
            for (node, settled) in nodes.iter().zip(settled) {
                if let Some(node) = node.upgrade() {
                    if node.apply_settled(settled) {
                        applied += 1;
                    }
                }
            }
        }
    }

    fn group_at(&self, path: &str) -> Option<Rc<FormControl>> {
        let node = if path.is_empty() {
            Rc::clone(&self.root)
        } else {
            self.node(path)?
        };
        node.is_group().then_some(node)
    }
}
