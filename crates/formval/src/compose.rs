//! Turning descriptor lists into composed validators attached to nodes.
//!
//! Composition runs in two passes. Planning walks the tree, resolves every
//! descriptor through the registry and records per node which validators it
//! gets, including cross-field rules that write into it from a sibling.
//! Committing then attaches the composed functions. A node therefore never
//! observes a half-applied rule set.

use crate::config::{RuleMetadata, ValidatorDescriptor};
use crate::control::{AsyncValidatorFn, Control, ControlRef, NodeId, SyncValidatorFn};
use crate::error::{FieldErrors, ValidationResult};
use crate::registry::{Validator, ValidatorRegistry};
use crate::rules::CrossFieldRule;
use futures_util::future::{join_all, ready};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Merge outcomes in order; later error kinds overwrite earlier ones.
pub fn merge_outcomes(outcomes: impl IntoIterator<Item = ValidationResult>) -> ValidationResult {
    let mut merged = FieldErrors::new();
    for outcome in outcomes {
        if let Err(errors) = outcome {
            merged.merge(errors);
        }
    }
    merged.into_result()
}

/// Compose synchronous validators into one.
///
/// Every member runs; with no members the result is always "no error".
pub fn compose_sync(validators: Vec<SyncValidatorFn>) -> SyncValidatorFn {
    Rc::new(move |control: &ControlRef| {
        merge_outcomes(validators.iter().map(|validator| validator(control)))
    })
}

/// Compose asynchronous validators into one, or `None` when there are none.
///
/// Members start together and the composed result resolves once all have
/// settled; there is no short-circuit on the first error.
pub fn compose_async(validators: Vec<AsyncValidatorFn>) -> Option<AsyncValidatorFn> {
    if validators.is_empty() {
        return None;
    }
    Some(Rc::new(move |control: &ControlRef| {
        let checks: Vec<_> = validators.iter().map(|validator| validator(control)).collect();
        async move { merge_outcomes(join_all(checks).await) }.boxed_local()
    }))
}

/// A cross-field rule attached to one node that writes its outcome into another.
///
/// Returned by composition so the caller can withdraw the written error kind
/// once the owning rule is detached or no longer configured.
#[derive(Clone)]
pub struct CrossFieldLink {
    owner: NodeId,
    target: Weak<dyn Control>,
    kind: &'static str,
}

impl CrossFieldLink {
    /// Node that owns the rule.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Node the rule writes into, if it is still alive.
    pub fn target(&self) -> Option<ControlRef> {
        self.target.upgrade()
    }

    /// Error kind the rule writes.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Whether both links connect the same owner and target with the same kind.
    pub fn same_edge(&self, other: &CrossFieldLink) -> bool {
        self.owner == other.owner
            && self.kind == other.kind
            && match (self.target(), other.target()) {
                (Some(a), Some(b)) => a.id() == b.id(),
                _ => false,
            }
    }
}

impl fmt::Debug for CrossFieldLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossFieldLink")
            .field("owner", &self.owner)
            .field("target", &self.target().map(|target| target.id()))
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Default)]
struct PlannedControl {
    sync: Vec<SyncValidatorFn>,
    asynchronous: Vec<AsyncValidatorFn>,
}

struct InboundRule {
    owner: NodeId,
    validator: SyncValidatorFn,
}

#[derive(Default)]
struct Plan {
    order: Vec<ControlRef>,
    own: HashMap<NodeId, PlannedControl>,
    inbound: HashMap<NodeId, Vec<InboundRule>>,
    links: Vec<CrossFieldLink>,
}

impl Plan {
    fn touch(&mut self, control: &ControlRef) {
        let id = control.id();
        if !self.own.contains_key(&id) && !self.inbound.contains_key(&id) {
            self.order.push(control.clone());
        }
    }

    /// Drop what an earlier plan of `owner` in this pass sent to other nodes.
    fn forget_outbound(&mut self, owner: NodeId) {
        for rules in self.inbound.values_mut() {
            rules.retain(|rule| rule.owner != owner);
        }
        self.links.retain(|link| link.owner != owner);
    }

    fn set_own(&mut self, control: &ControlRef, planned: PlannedControl) {
        self.touch(control);
        self.own.insert(control.id(), planned);
    }

    fn add_inbound(&mut self, target: &ControlRef, rule: InboundRule, kind: &'static str) {
        self.touch(target);
        self.links.push(CrossFieldLink {
            owner: rule.owner,
            target: Rc::downgrade(target),
            kind,
        });
        self.inbound.entry(target.id()).or_default().push(rule);
    }

    fn commit(mut self) -> Vec<CrossFieldLink> {
        for control in self.order {
            let id = control.id();
            let planned = self.own.remove(&id);
            let inbound = self.inbound.remove(&id).unwrap_or_default();

            if planned.is_none() && inbound.is_empty() {
                continue;
            }
            let PlannedControl {
                mut sync,
                asynchronous,
            } = planned.unwrap_or_default();

            sync.extend(inbound.into_iter().map(|rule| rule.validator));
            trace_trace!(
                node = %id,
                sync = sync.len(),
                asynchronous = asynchronous.len(),
                "attaching composed validators"
            );
            control.set_validator(Some(compose_sync(sync)));
            control.set_async_validator(compose_async(asynchronous));
        }
        self.links
    }
}

/// Resolves descriptors through a registry and attaches composed validators.
pub struct Composer<'r> {
    registry: &'r ValidatorRegistry,
}

impl<'r> Composer<'r> {
    /// Compose with the given registry.
    pub fn new(registry: &'r ValidatorRegistry) -> Self {
        Self { registry }
    }

    /// Apply every metadata path that resolves under `scope`, recursing into groups.
    ///
    /// Returns the cross-field links the applied rules established.
    pub fn apply_form_validators(&self, scope: &ControlRef, metadata: &RuleMetadata) -> Vec<CrossFieldLink> {
        let mut plan = Plan::default();
        self.plan_scope(scope, metadata, &mut plan);
        plan.commit()
    }

    /// Apply the rules of one path, resolved under `scope`.
    ///
    /// A path that does not resolve is a no-op. When the node is a group, the
    /// metadata is applied again relative to it, so nested nodes get their own
    /// rules composed independently.
    pub fn apply_control_validators(
        &self,
        path: &str,
        scope: &ControlRef,
        metadata: &RuleMetadata,
    ) -> Vec<CrossFieldLink> {
        let mut plan = Plan::default();
        self.plan_control(path, scope, metadata, &mut plan);
        plan.commit()
    }

    fn plan_scope(&self, scope: &ControlRef, metadata: &RuleMetadata, plan: &mut Plan) {
        for path in metadata.paths() {
            self.plan_control(path, scope, metadata, plan);
        }
    }

    fn plan_control(&self, path: &str, scope: &ControlRef, metadata: &RuleMetadata, plan: &mut Plan) {
        let Some(control) = scope.get(path) else {
            return;
        };
        let descriptors = metadata.get(path).unwrap_or_default();
        self.plan_descriptors(path, &control, descriptors, plan);

        if control.is_group() {
            self.plan_scope(&control, metadata, plan);
        }
    }

    fn plan_descriptors(
        &self,
        path: &str,
        control: &ControlRef,
        descriptors: &[ValidatorDescriptor],
        plan: &mut Plan,
    ) {
        // a node reached twice in one pass keeps only its latest plan
        plan.forget_outbound(control.id());
        let mut planned = PlannedControl::default();

        for descriptor in descriptors {
            let factory = match self.registry.resolve(&descriptor.name) {
                Ok(factory) => factory,
                Err(err) => {
                    trace_debug!(path, error = %err, "skipping unknown validator");
                    continue;
                }
            };
            let Some(validator) = factory(descriptor.config.as_ref()) else {
                trace_debug!(path, rule = %descriptor.name, "validator factory produced no rule");
                continue;
            };

            match validator {
                Validator::Sync(validator) if descriptor.is_async => {
                    planned.asynchronous.push(lift_sync(validator));
                }
                Validator::Sync(validator) => planned.sync.push(validator),
                Validator::Async(validator) => {
                    if !descriptor.is_async {
                        trace_debug!(path, rule = %descriptor.name, "async rule not flagged isAsync, composing as async");
                    }
                    planned.asynchronous.push(validator);
                }
                Validator::CrossField(rule) => {
                    let target = rule.write_target(control);
                    if target.id() != control.id() {
                        plan.add_inbound(
                            &target,
                            InboundRule {
                                owner: control.id(),
                                validator: inbound_validator(
                                    Rc::downgrade(&rule),
                                    Rc::downgrade(control),
                                ),
                            },
                            rule.kind(),
                        );
                    }
                    planned.sync.push(cross_field_validator(rule));
                }
            }
        }

        plan.set_own(control, planned);
    }
}

fn lift_sync(validator: SyncValidatorFn) -> AsyncValidatorFn {
    Rc::new(move |control: &ControlRef| ready(validator(control)).boxed_local())
}

/// Cross-field rule as seen from the field that owns it.
///
/// When the outcome belongs to another field it is written there and the
/// owner's own result stays clean. This closure holds the only strong
/// reference to the rule.
fn cross_field_validator(rule: Rc<dyn CrossFieldRule>) -> SyncValidatorFn {
    Rc::new(move |control: &ControlRef| {
        let target = rule.write_target(control);
        let outcome = rule.evaluate(control, &target);
        if target.id() == control.id() {
            outcome
        } else {
            Ok(())
        }
    })
}

/// Cross-field rule as seen from the field it writes to.
///
/// Lets the target's own recomputation keep the error alive instead of
/// wiping it. Goes inert once the owner's composed validator is replaced or
/// detached, since that drops the rule.
fn inbound_validator(rule: Weak<dyn CrossFieldRule>, owner: Weak<dyn Control>) -> SyncValidatorFn {
    Rc::new(move |target: &ControlRef| {
        let (Some(rule), Some(owner)) = (rule.upgrade(), owner.upgrade()) else {
            return Ok(());
        };
        if rule.write_target(&owner).id() != target.id() {
            return Ok(());
        }
        rule.evaluate(&owner, target)
    })
}
