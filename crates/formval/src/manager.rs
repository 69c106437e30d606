//! The validation manager: apply, clear and invoke validators over a whole
//! field tree, and keep cross-field rules live.
//!
//! ## Example
//!
//! ```rust,ignore
//! use formval::prelude::*;
//!
//! let mut manager = ValidationManager::new(ValidatorRegistry::with_builtins());
//! manager.register_async("usernameFree", |value| async move { is_free(value).await });
//!
//! let metadata = RuleMetadata::from_json_str(RULES)?;
//! manager.apply_validators(&form, &metadata);
//!
//! // on submit
//! manager.invoke_validators(&form);
//! if !manager.collect_errors(&form).is_empty() {
//!     // render errors
//! }
//! ```

use crate::compose::{Composer, CrossFieldLink};
use crate::config::RuleMetadata;
use crate::control::{ChangeListener, Control, ControlRef, NodeId, RecomputeOptions, Subscription};
use crate::error::FieldErrors;
use crate::registry::ValidatorRegistry;
use crate::rules::write_scoped;
use crate::tracker::find_controls_requiring_subscription;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

/// Orchestrates the registry, composer and dependency tracker over field trees.
///
/// Holds one live subscription per tree it has applied metadata to. Dropping
/// the manager drops those subscriptions. It also remembers which cross-field
/// rules write into other fields, so their errors can be withdrawn when the
/// rule goes away.
pub struct ValidationManager {
    registry: ValidatorRegistry,
    live: HashMap<NodeId, Subscription>,
    links: HashMap<NodeId, Vec<CrossFieldLink>>,
}

impl ValidationManager {
    /// Create a manager around a registry.
    pub fn new(registry: ValidatorRegistry) -> Self {
        Self {
            registry,
            live: HashMap::new(),
            links: HashMap::new(),
        }
    }

    /// The registry used for composition.
    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Mutable access to the registry.
    pub fn registry_mut(&mut self) -> &mut ValidatorRegistry {
        &mut self.registry
    }

    /// Register an async rule; see [`ValidatorRegistry::register_async`].
    ///
    /// Takes effect for trees composed after the call.
    pub fn register_async<F, Fut>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        self.registry.register_async(name, predicate);
    }

    /// Install `requiredIf`; see [`ValidatorRegistry::register_required_if`].
    pub fn register_required_if<F>(&mut self, condition: F)
    where
        F: Fn(&ControlRef, Option<&Value>) -> bool + 'static,
    {
        self.registry.register_required_if(condition);
    }

    /// Compose and attach validators for every configured path, then install
    /// the live subscription that keeps tracked fields revalidated.
    ///
    /// An absent tree is a no-op. Reapplying to the same tree replaces its
    /// previous subscription, and errors written by cross-field rules that
    /// the new metadata no longer configures are withdrawn.
    pub fn apply_validators<'a>(
        &mut self,
        tree: impl Into<Option<&'a ControlRef>>,
        metadata: &RuleMetadata,
    ) {
        let Some(tree) = tree.into() else {
            trace_debug!("apply_validators called without a tree");
            return;
        };

        let links = Composer::new(&self.registry).apply_form_validators(tree, metadata);
        let previous = self.links.remove(&tree.id()).unwrap_or_default();
        withdraw_links(
            previous
                .iter()
                .filter(|old| !links.iter().any(|link| link.same_edge(old))),
        );
        if !links.is_empty() {
            self.links.insert(tree.id(), links);
        }
        self.subscribe_tracked_controls(tree, metadata);
    }

    /// Detach validators from `node` and all its descendants.
    ///
    /// Every cleared node that is invalid or not pristine gets its value reset
    /// silently, so the reset does not ripple through other rules'
    /// subscriptions. A live subscription rooted at `node` is dropped too, and
    /// errors that cleared nodes' cross-field rules wrote into other fields
    /// are withdrawn.
    pub fn clear_validators<'a>(&mut self, node: impl Into<Option<&'a ControlRef>>) {
        let Some(node) = node.into() else {
            return;
        };

        if self.live.remove(&node.id()).is_some() {
            trace_debug!(node = %node.id(), "dropped live subscription");
        }
        let mut cleared = HashSet::new();
        detach_validators(node, &mut cleared);
        self.withdraw_owned_by(&cleared);
        reset_cleared(node);
    }

    /// Mark every leaf dirty and recompute its validity without emitting
    /// change notifications. Used to surface errors on submit.
    pub fn invoke_validators<'a>(&self, tree: impl Into<Option<&'a ControlRef>>) {
        let Some(tree) = tree.into() else {
            return;
        };
        invoke_recursive(tree);
    }

    /// Every non-empty error set under `tree`, keyed by dotted path.
    ///
    /// The root itself is keyed by the empty path.
    pub fn collect_errors(&self, tree: &ControlRef) -> BTreeMap<String, FieldErrors> {
        let mut collected = BTreeMap::new();
        collect_recursive(tree, String::new(), &mut collected);
        collected
    }

    /// Whether a live subscription is installed for the tree rooted at `tree`.
    pub fn is_live(&self, tree: &ControlRef) -> bool {
        self.live.contains_key(&tree.id())
    }

    fn withdraw_owned_by(&mut self, owners: &HashSet<NodeId>) {
        for links in self.links.values_mut() {
            let (withdrawn, kept): (Vec<_>, Vec<_>) = links
                .drain(..)
                .partition(|link| owners.contains(&link.owner()));
            withdraw_links(&withdrawn);
            *links = kept;
        }
        self.links.retain(|_, links| !links.is_empty());
    }

    fn subscribe_tracked_controls(&mut self, tree: &ControlRef, metadata: &RuleMetadata) {
        let tracked = find_controls_requiring_subscription(metadata);
        let scope_paths: Vec<String> = metadata.paths().map(str::to_string).collect();
        trace_debug!(tracked = ?tracked, "installing live subscription");

        let root: Weak<dyn Control> = Rc::downgrade(tree);
        let listener: ChangeListener = Rc::new(move |_value: &Value| {
            if let Some(root) = root.upgrade() {
                revalidate_tracked(&root, &scope_paths, &tracked);
            }
        });

        // replacing the entry drops, and so unsubscribes, the previous listener
        self.live.insert(tree.id(), tree.on_value_change(listener));
    }
}

impl Default for ValidationManager {
    fn default() -> Self {
        Self::new(ValidatorRegistry::with_builtins())
    }
}

impl fmt::Debug for ValidationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationManager")
            .field("registry", &self.registry)
            .field("live_trees", &self.live.len())
            .field("cross_field_links", &self.links.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

/// Recompute each tracked field on its own, without notifying, and return
/// fields that came out valid to pristine.
///
/// Tracked paths resolve under the root and under every group the metadata
/// was re-applied to, matching how the composer resolved them.
fn revalidate_tracked(root: &ControlRef, scope_paths: &[String], tracked: &[String]) {
    if tracked.is_empty() {
        return;
    }
    let mut seen = HashSet::new();
    for scope in validation_scopes(root, scope_paths) {
        for path in tracked {
            let Some(control) = scope.get(path) else {
                continue;
            };
            if !seen.insert(control.id()) {
                continue;
            }
            control.recompute_validity(RecomputeOptions::isolated_silent());
            if control.is_valid() {
                control.mark_pristine();
            }
            trace_trace!(path = %path, status = ?control.status(), "revalidated tracked field");
        }
    }
}

/// The root plus every group reachable through configured paths.
fn validation_scopes(root: &ControlRef, scope_paths: &[String]) -> Vec<ControlRef> {
    let mut seen = HashSet::from([root.id()]);
    let mut scopes = vec![root.clone()];
    let mut next = 0;
    while let Some(scope) = scopes.get(next).cloned() {
        next += 1;
        for path in scope_paths {
            if let Some(group) = scope.get(path).filter(|control| control.is_group()) {
                if seen.insert(group.id()) {
                    scopes.push(group);
                }
            }
        }
    }
    scopes
}

/// Remove the error kind each link wrote into its target.
fn withdraw_links<'a>(links: impl IntoIterator<Item = &'a CrossFieldLink>) {
    for link in links {
        let Some(target) = link.target() else {
            continue;
        };
        trace_debug!(owner = %link.owner(), target = %target.id(), kind = link.kind(), "withdrawing cross-field error");
        write_scoped(&target, link.kind(), &Ok(()));
    }
}

fn detach_validators(node: &ControlRef, cleared: &mut HashSet<NodeId>) {
    cleared.insert(node.id());
    node.set_validator(None);
    node.set_async_validator(None);
    for (_, child) in node.children() {
        detach_validators(&child, cleared);
    }
}

fn reset_cleared(node: &ControlRef) {
    if node.is_invalid() || !node.is_pristine() {
        node.reset_value(true);
    }
    for (_, child) in node.children() {
        reset_cleared(&child);
    }
}

fn invoke_recursive(node: &ControlRef) {
    if !node.is_group() {
        node.mark_dirty();
        node.recompute_validity(RecomputeOptions::silent());
        return;
    }
    for (_, child) in node.children() {
        invoke_recursive(&child);
    }
}

fn collect_recursive(node: &ControlRef, path: String, collected: &mut BTreeMap<String, FieldErrors>) {
    if let Some(errors) = node.errors().filter(|errors| !errors.is_empty()) {
        collected.insert(path.clone(), errors);
    }
    for (name, child) in node.children() {
        let child_path = if path.is_empty() {
            name
        } else {
            format!("{path}.{name}")
        };
        collect_recursive(&child, child_path, collected);
    }
}
