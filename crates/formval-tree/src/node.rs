//! A single node of the in-memory tree.

use formval::{
    AsyncValidatorFn, ChangeListener, Control, ControlRef, FieldErrors, NodeId, PendingValidation,
    RecomputeOptions, RevisionCounter, SettledValidation, Subscription, SyncValidatorFn,
    ValidityStatus,
};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// State shared by every node of one tree.
#[derive(Default)]
pub(crate) struct Shared {
    next_id: Cell<u64>,
    pending: RefCell<Vec<(Weak<FormControl>, PendingValidation)>>,
}

impl Shared {
    fn next_id(&self) -> NodeId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        NodeId::new(id)
    }

    pub(crate) fn take_pending(&self) -> Vec<(Weak<FormControl>, PendingValidation)> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}

enum Kind {
    Leaf,
    Group(RefCell<Vec<(String, Rc<FormControl>)>>),
}

struct State {
    value: Value,
    status: ValidityStatus,
    errors: Option<FieldErrors>,
    pristine: bool,
    validator: Option<SyncValidatorFn>,
    async_validator: Option<AsyncValidatorFn>,
}

impl State {
    fn new(value: Value) -> Self {
        Self {
            value,
            status: ValidityStatus::Valid,
            errors: None,
            pristine: true,
            validator: None,
            async_validator: None,
        }
    }

    fn set_errors(&mut self, errors: Option<FieldErrors>) {
        self.errors = errors.filter(|errors| !errors.is_empty());
        self.status = if self.errors.is_some() {
            ValidityStatus::Invalid
        } else {
            ValidityStatus::Valid
        };
    }
}

/// A leaf or group in a [`FormTree`](crate::FormTree).
///
/// Groups own their children; children point back at their group weakly.
/// No internal borrow is held while validators or listeners run, so both may
/// call back into the tree.
pub struct FormControl {
    id: NodeId,
    this: Weak<FormControl>,
    parent: RefCell<Weak<FormControl>>,
    shared: Rc<Shared>,
    kind: Kind,
    state: RefCell<State>,
    revisions: RevisionCounter,
    listeners: RefCell<Vec<Weak<dyn Fn(&Value)>>>,
}

impl FormControl {
    /// Build a node from JSON: objects become groups, anything else a leaf.
    pub(crate) fn build(shared: &Rc<Shared>, value: Value, parent: Weak<FormControl>) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let (kind, leaf_value) = match value {
                Value::Object(fields) => {
                    let children = fields
                        .into_iter()
                        .map(|(name, value)| (name, Self::build(shared, value, this.clone())))
                        .collect();
                    (Kind::Group(RefCell::new(children)), Value::Null)
                }
                leaf => (Kind::Leaf, leaf),
            };

            FormControl {
                id: shared.next_id(),
                this: this.clone(),
                parent: RefCell::new(parent),
                shared: Rc::clone(shared),
                kind,
                state: RefCell::new(State::new(leaf_value)),
                revisions: RevisionCounter::new(),
                listeners: RefCell::new(Vec::new()),
            }
        })
    }

    /// This node as a trait-object handle.
    pub fn as_control(&self) -> Option<ControlRef> {
        self.this.upgrade().map(|this| this as ControlRef)
    }

    /// Resolve a dot-separated path relative to this node.
    pub fn find(&self, path: &str) -> Option<Rc<FormControl>> {
        if path.is_empty() {
            return None;
        }
        let mut current = self.this.upgrade()?;
        for segment in path.split('.') {
            let next = current.child(segment)?;
            current = next;
        }
        Some(current)
    }

    fn child(&self, name: &str) -> Option<Rc<FormControl>> {
        match &self.kind {
            Kind::Group(children) => children
                .borrow()
                .iter()
                .find(|(child, _)| child == name)
                .map(|(_, node)| Rc::clone(node)),
            Kind::Leaf => None,
        }
    }

    fn child_nodes(&self) -> Vec<(String, Rc<FormControl>)> {
        match &self.kind {
            Kind::Group(children) => children.borrow().clone(),
            Kind::Leaf => Vec::new(),
        }
    }

    fn parent_node(&self) -> Option<Rc<FormControl>> {
        self.parent.borrow().upgrade()
    }

    /// Set the value as an edit from outside the engine.
    ///
    /// A group takes an object and assigns matching children. The node and
    /// its ancestors are revalidated and every level notifies its listeners.
    pub fn set_value(&self, value: Value) {
        match &self.kind {
            Kind::Leaf => self.state.borrow_mut().value = value,
            Kind::Group(_) => {
                let Value::Object(fields) = value else {
                    return;
                };
                for (name, value) in fields {
                    if let Some(child) = self.child(&name) {
                        child.assign_silently(value);
                    }
                }
            }
        }
        self.recompute_validity(RecomputeOptions::propagate());
    }

    /// Simulate a user edit: mark dirty, then [`set_value`](Self::set_value).
    pub fn input(&self, value: Value) {
        self.mark_dirty();
        self.set_value(value);
    }

    /// Whether this node and every descendant are valid.
    pub fn is_subtree_valid(&self) -> bool {
        self.status() == ValidityStatus::Valid
            && self
                .child_nodes()
                .iter()
                .all(|(_, child)| child.is_subtree_valid())
    }

    fn assign_silently(&self, value: Value) {
        match &self.kind {
            Kind::Leaf => self.state.borrow_mut().value = value,
            Kind::Group(_) => {
                if let Value::Object(fields) = value {
                    for (name, value) in fields {
                        if let Some(child) = self.child(&name) {
                            child.assign_silently(value);
                        }
                    }
                }
            }
        }
        self.run_validators();
    }

    pub(crate) fn attach_child(&self, name: String, child: Rc<FormControl>) -> bool {
        let Kind::Group(children) = &self.kind else {
            return false;
        };
        *child.parent.borrow_mut() = self.this.clone();
        let mut children = children.borrow_mut();
        match children.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => {
                slot.parent.replace(Weak::new());
                *slot = child;
            }
            None => children.push((name, child)),
        }
        true
    }

    pub(crate) fn detach_child(&self, name: &str) -> Option<Rc<FormControl>> {
        let Kind::Group(children) = &self.kind else {
            return None;
        };
        let mut children = children.borrow_mut();
        let index = children.iter().position(|(existing, _)| existing == name)?;
        let (_, child) = children.remove(index);
        child.parent.replace(Weak::new());
        Some(child)
    }

    pub(crate) fn shared(&self) -> &Rc<Shared> {
        &self.shared
    }

    /// Run the attached validators and record the outcome on this node only.
    fn run_validators(&self) {
        let Some(control) = self.as_control() else {
            return;
        };
        let revision = self.revisions.advance();
        let (validator, async_validator) = {
            let state = self.state.borrow();
            (state.validator.clone(), state.async_validator.clone())
        };

        let outcome = validator.map_or(Ok(()), |validator| validator(&control));
        match (outcome, async_validator) {
            (Err(errors), _) if !errors.is_empty() => self.state.borrow_mut().set_errors(Some(errors)),
            (_, Some(async_validator)) => {
                {
                    let mut state = self.state.borrow_mut();
                    state.errors = None;
                    state.status = ValidityStatus::Pending;
                }
                let pending = PendingValidation::start(revision, &async_validator, &control);
                self.shared
                    .pending
                    .borrow_mut()
                    .push((self.this.clone(), pending));
            }
            (_, None) => self.state.borrow_mut().set_errors(None),
        }
    }

    /// Apply a settled async evaluation unless a newer revision superseded it.
    pub(crate) fn apply_settled(&self, settled: SettledValidation) -> bool {
        match settled.accept(&self.revisions) {
            Some(result) => {
                self.state.borrow_mut().set_errors(result.err());
                true
            }
            None => false,
        }
    }

    fn emit(&self) {
        let listeners: Vec<ChangeListener> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(|listener| listener.upgrade()).collect()
        };
        if listeners.is_empty() {
            return;
        }
        let value = self.value();
        for listener in listeners {
            listener(&value);
        }
    }

    fn reset_subtree(&self) {
        {
            let mut state = self.state.borrow_mut();
            if matches!(self.kind, Kind::Leaf) {
                state.value = Value::Null;
            }
            state.pristine = true;
        }
        for (_, child) in self.child_nodes() {
            child.reset_subtree();
        }
        self.run_validators();
    }

    fn refresh_pristine(&self) {
        let pristine = self
            .child_nodes()
            .iter()
            .all(|(_, child)| child.is_pristine());
        self.state.borrow_mut().pristine = pristine;
        if let Some(parent) = self.parent_node() {
            parent.refresh_pristine();
        }
    }

    fn mark_subtree_pristine(&self) {
        self.state.borrow_mut().pristine = true;
        for (_, child) in self.child_nodes() {
            child.mark_subtree_pristine();
        }
    }
}

impl Control for FormControl {
    fn id(&self) -> NodeId {
        self.id
    }

    fn get(&self, path: &str) -> Option<ControlRef> {
        self.find(path).map(|node| node as ControlRef)
    }

    fn parent(&self) -> Option<ControlRef> {
        self.parent_node().map(|node| node as ControlRef)
    }

    fn is_group(&self) -> bool {
        matches!(self.kind, Kind::Group(_))
    }

    fn children(&self) -> Vec<(String, ControlRef)> {
        self.child_nodes()
            .into_iter()
            .map(|(name, node)| (name, node as ControlRef))
            .collect()
    }

    fn value(&self) -> Value {
        match &self.kind {
            Kind::Leaf => self.state.borrow().value.clone(),
            Kind::Group(_) => {
                let fields: Map<String, Value> = self
                    .child_nodes()
                    .into_iter()
                    .map(|(name, node)| (name, node.value()))
                    .collect();
                Value::Object(fields)
            }
        }
    }

    fn set_validator(&self, validator: Option<SyncValidatorFn>) {
        self.state.borrow_mut().validator = validator;
    }

    fn set_async_validator(&self, validator: Option<AsyncValidatorFn>) {
        self.state.borrow_mut().async_validator = validator;
    }

    fn validator(&self) -> Option<SyncValidatorFn> {
        self.state.borrow().validator.clone()
    }

    fn async_validator(&self) -> Option<AsyncValidatorFn> {
        self.state.borrow().async_validator.clone()
    }

    fn errors(&self) -> Option<FieldErrors> {
        self.state.borrow().errors.clone()
    }

    fn set_errors(&self, errors: Option<FieldErrors>) {
        self.state.borrow_mut().set_errors(errors);
    }

    fn mark_dirty(&self) {
        self.state.borrow_mut().pristine = false;
        if let Some(parent) = self.parent_node() {
            parent.mark_dirty();
        }
    }

    fn mark_pristine(&self) {
        self.mark_subtree_pristine();
        if let Some(parent) = self.parent_node() {
            parent.refresh_pristine();
        }
    }

    fn is_pristine(&self) -> bool {
        self.state.borrow().pristine
    }

    fn status(&self) -> ValidityStatus {
        self.state.borrow().status
    }

    fn recompute_validity(&self, options: RecomputeOptions) {
        self.run_validators();
        if !options.silent {
            self.emit();
        }
        if !options.isolated {
            if let Some(parent) = self.parent_node() {
                parent.recompute_validity(options);
            }
        }
    }

    fn reset_value(&self, silent: bool) {
        self.reset_subtree();
        self.mark_pristine();
        if !silent {
            self.emit();
        }
        if let Some(parent) = self.parent_node() {
            parent.recompute_validity(RecomputeOptions {
                isolated: false,
                silent,
            });
        }
    }

    fn on_value_change(&self, listener: ChangeListener) -> Subscription {
        self.listeners.borrow_mut().push(Rc::downgrade(&listener));
        Subscription::new(listener)
    }
}

impl fmt::Debug for FormControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FormControl")
            .field("id", &self.id)
            .field("group", &self.is_group())
            .field("status", &state.status)
            .field("pristine", &state.pristine)
            .field("errors", &state.errors)
            .finish_non_exhaustive()
    }
}
