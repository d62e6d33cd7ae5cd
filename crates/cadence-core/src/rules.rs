//! Declarative rule couplings between resources, states and operations
//!
//! Rules are plain records holding ids of the entities they couple. They are
//! owned by the entity that conceptually carries them (states carry modifier
//! rules, operations carry resource-trigger rules, the character carries
//! regen and operation-trigger rules) and are executed against the owning
//! character's arenas.

use crate::state::StateManager;
use crate::{MetaId, OpId, ResourceId, ResourcePool, Result, StateId};
use serde::{Deserialize, Serialize};

/// Comparison mode for threshold rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cmp {
    /// value >= threshold
    Ge,
    /// value <= threshold
    Le,
    /// value == threshold
    Eq,
}

impl Cmp {
    /// Evaluate the comparison
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Cmp::Ge => value >= threshold,
            Cmp::Le => value <= threshold,
            Cmp::Eq => value == threshold,
        }
    }
}

/// Which flow of an operation a modifier applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectTarget {
    Consume,
    Produce,
    Both,
}

impl EffectTarget {
    /// Whether this target covers the given flow
    pub fn applies_to(&self, kind: FlowKind) -> bool {
        match self {
            EffectTarget::Both => true,
            EffectTarget::Consume => kind == FlowKind::Consume,
            EffectTarget::Produce => kind == FlowKind::Produce,
        }
    }
}

/// One side of an operation's resource flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Consume,
    Produce,
}

/// Arithmetic applied by a `StateEffect`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl EffectOp {
    /// Apply this operation to an amount. Division by zero keeps the amount
    /// unchanged.
    pub fn apply(&self, amount: f64, value: f64) -> f64 {
        match self {
            EffectOp::Add => amount + value,
            EffectOp::Sub => amount - value,
            EffectOp::Mul => amount * value,
            EffectOp::Div => {
                if value != 0.0 {
                    amount / value
                } else {
                    amount
                }
            }
        }
    }
}

/// A state gate: the state must carry at least `min_stacks` stacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRequirement {
    pub state: StateId,
    #[serde(default = "default_min_stacks")]
    pub min_stacks: u32,
}

impl StateRequirement {
    pub fn new(state: impl Into<StateId>, min_stacks: u32) -> Self {
        Self {
            state: state.into(),
            min_stacks,
        }
    }
}

fn default_min_stacks() -> u32 {
    1
}

/// One-shot resource change fired when a state gains or loses stacks.
///
/// When a ratio is set for a direction, the resource is instead set to
/// `upper_limit * ratio` in a single update, overriding the flat amount for
/// that direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResourceEffect {
    pub resource: ResourceId,
    #[serde(default)]
    pub on_add: f64,
    #[serde(default)]
    pub on_remove: f64,
    /// Multiply the flat amount by the number of stacks changed
    #[serde(default)]
    pub per_stack: bool,
    #[serde(default)]
    pub ratio_on_add: Option<f64>,
    #[serde(default)]
    pub ratio_on_remove: Option<f64>,
}

impl StateResourceEffect {
    pub fn new(resource: impl Into<ResourceId>) -> Self {
        Self {
            resource: resource.into(),
            on_add: 0.0,
            on_remove: 0.0,
            per_stack: false,
            ratio_on_add: None,
            ratio_on_remove: None,
        }
    }

    pub fn on_add(mut self, amount: f64) -> Self {
        self.on_add = amount;
        self
    }

    pub fn on_remove(mut self, amount: f64) -> Self {
        self.on_remove = amount;
        self
    }

    pub fn per_stack(mut self) -> Self {
        self.per_stack = true;
        self
    }

    pub fn ratio_on_add(mut self, ratio: f64) -> Self {
        self.ratio_on_add = Some(ratio);
        self
    }

    pub fn ratio_on_remove(mut self, ratio: f64) -> Self {
        self.ratio_on_remove = Some(ratio);
        self
    }
}

/// Modifies an operation's consume or produce amounts while a state is
/// active within a stack window. Carried by the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEffect {
    pub state: StateId,
    pub target: EffectTarget,
    /// Affected resource, or `None` for every resource of the flow
    #[serde(default)]
    pub resource: Option<ResourceId>,
    pub op: EffectOp,
    pub value: f64,
    #[serde(default = "default_min_stacks")]
    pub min_stacks: u32,
    #[serde(default)]
    pub max_stacks: Option<u32>,
}

impl StateEffect {
    pub fn new(state: impl Into<StateId>, target: EffectTarget, op: EffectOp, value: f64) -> Self {
        Self {
            state: state.into(),
            target,
            resource: None,
            op,
            value,
            min_stacks: 1,
            max_stacks: None,
        }
    }

    pub fn for_resource(mut self, resource: impl Into<ResourceId>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn stack_window(mut self, min: u32, max: Option<u32>) -> Self {
        self.min_stacks = min;
        self.max_stacks = max;
        self
    }

    fn active(&self, states: &StateManager) -> Result<bool> {
        let stacks = states.stacks_of(&self.state)?;
        if stacks < self.min_stacks {
            return Ok(false);
        }
        if let Some(max) = self.max_stacks {
            if stacks > max {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Apply this modifier to a single resource amount of the given flow.
    /// Returns the amount unchanged when the modifier does not apply.
    pub fn apply_to_amount(
        &self,
        resource: &ResourceId,
        amount: f64,
        kind: FlowKind,
        states: &StateManager,
    ) -> Result<f64> {
        if !self.target.applies_to(kind) {
            return Ok(amount);
        }
        if !self.active(states)? {
            return Ok(amount);
        }
        if let Some(limited) = &self.resource {
            if limited != resource {
                return Ok(amount);
            }
        }
        Ok(self.op.apply(amount, self.value))
    }
}

/// Priority delta a state applies to a meta-operation while active.
/// Carried by the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPriorityRule {
    pub meta: MetaId,
    pub delta: i64,
}

impl MetaPriorityRule {
    pub fn new(meta: impl Into<MetaId>, delta: i64) -> Self {
        Self {
            meta: meta.into(),
            delta,
        }
    }
}

/// Time acceleration a state grants to one operation while active.
/// Carried by the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationAccelerate {
    pub operation: OpId,
    /// Flat acceleration ratio
    #[serde(default)]
    pub ratio: f64,
    /// Additional ratio per current stack
    #[serde(default)]
    pub ratio_per_stack: f64,
    #[serde(default = "default_true")]
    pub by_current_stack: bool,
    #[serde(default)]
    pub min_ratio: f64,
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_ratio() -> f64 {
    0.95
}

impl OperationAccelerate {
    pub fn new(operation: impl Into<OpId>) -> Self {
        Self {
            operation: operation.into(),
            ratio: 0.0,
            ratio_per_stack: 0.0,
            by_current_stack: true,
            min_ratio: 0.0,
            max_ratio: 0.95,
        }
    }

    pub fn ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn ratio_per_stack(mut self, ratio: f64) -> Self {
        self.ratio_per_stack = ratio;
        self
    }

    pub fn clamp_range(mut self, min: f64, max: f64) -> Self {
        self.min_ratio = min;
        self.max_ratio = max;
        self
    }

    /// Acceleration contribution for the given stack count, clamped into
    /// `[min_ratio, max_ratio]`.
    pub fn contribution(&self, stacks: u32) -> f64 {
        let mut ratio = self.ratio;
        if self.ratio_per_stack != 0.0 && self.by_current_stack {
            ratio += self.ratio_per_stack * stacks as f64;
        }
        ratio.clamp(self.min_ratio, self.max_ratio)
    }
}

/// Consume/produce efficiency multiplier a state grants to one operation
/// while active. Carried by the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResourceEfficiency {
    pub operation: OpId,
    #[serde(default = "default_target_both")]
    pub target: EffectTarget,
    /// Affected resource, or `None` for every resource of the flow
    #[serde(default)]
    pub resource: Option<ResourceId>,
    #[serde(default = "default_mul")]
    pub mul: f64,
    #[serde(default)]
    pub mul_per_stack: f64,
    #[serde(default = "default_true")]
    pub by_current_stack: bool,
    #[serde(default)]
    pub min_mul: f64,
    #[serde(default = "default_max_mul")]
    pub max_mul: f64,
}

fn default_target_both() -> EffectTarget {
    EffectTarget::Both
}

fn default_mul() -> f64 {
    1.0
}

fn default_max_mul() -> f64 {
    10.0
}

impl OperationResourceEfficiency {
    pub fn new(operation: impl Into<OpId>, target: EffectTarget) -> Self {
        Self {
            operation: operation.into(),
            target,
            resource: None,
            mul: 1.0,
            mul_per_stack: 0.0,
            by_current_stack: true,
            min_mul: 0.0,
            max_mul: 10.0,
        }
    }

    pub fn for_resource(mut self, resource: impl Into<ResourceId>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn mul(mut self, mul: f64) -> Self {
        self.mul = mul;
        self
    }

    pub fn mul_per_stack(mut self, mul: f64) -> Self {
        self.mul_per_stack = mul;
        self
    }

    /// Effective multiplier for the given stack count, clamped into
    /// `[min_mul, max_mul]`.
    pub fn multiplier(&self, stacks: u32) -> f64 {
        let mut mul = self.mul;
        if self.mul_per_stack != 0.0 && self.by_current_stack {
            mul += self.mul_per_stack * stacks as f64;
        }
        mul.clamp(self.min_mul, self.max_mul)
    }
}

/// Adds a stack to a state when a resource crosses a threshold.
/// Carried by the operation and checked after its resource flows settle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStateRule {
    pub resource: ResourceId,
    pub threshold: f64,
    pub state: StateId,
    #[serde(default = "default_cmp_ge")]
    pub mode: Cmp,
    /// When true, fire only on the crossing from unsatisfied to satisfied.
    /// When false, fire on every check while satisfied.
    #[serde(default = "default_true")]
    pub once: bool,
    /// Edge detector for `once`
    #[serde(skip)]
    was_active: bool,
}

fn default_cmp_ge() -> Cmp {
    Cmp::Ge
}

impl ResourceStateRule {
    pub fn new(
        resource: impl Into<ResourceId>,
        threshold: f64,
        state: impl Into<StateId>,
        mode: Cmp,
        once: bool,
    ) -> Self {
        Self {
            resource: resource.into(),
            threshold,
            state: state.into(),
            mode,
            once,
            was_active: false,
        }
    }

    /// Check the resource against the threshold and add a stack if triggered
    pub fn check_and_apply(
        &mut self,
        now: f64,
        resources: &mut ResourcePool,
        states: &mut StateManager,
    ) -> Result<()> {
        let value = resources.get(&self.resource)?.current;
        let active = self.mode.compare(value, self.threshold);

        if self.once {
            if active && !self.was_active {
                states.add_stack(&self.state, now, resources)?;
                self.was_active = true;
            } else if !active {
                // Re-arm so the next crossing triggers again.
                self.was_active = false;
            }
        } else if active {
            states.add_stack(&self.state, now, resources)?;
        }
        Ok(())
    }
}

/// Force-clears a state when a resource satisfies a condition.
/// Carried by the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStateRemoveRule {
    pub resource: ResourceId,
    pub state: StateId,
    pub threshold: f64,
    #[serde(default = "default_cmp_le")]
    pub mode: Cmp,
    /// Only clear while the state is actually active
    #[serde(default = "default_true")]
    pub require_active: bool,
}

fn default_cmp_le() -> Cmp {
    Cmp::Le
}

impl ResourceStateRemoveRule {
    pub fn new(
        resource: impl Into<ResourceId>,
        state: impl Into<StateId>,
        threshold: f64,
        mode: Cmp,
    ) -> Self {
        Self {
            resource: resource.into(),
            state: state.into(),
            threshold,
            mode,
            require_active: true,
        }
    }

    /// Check the resource and clear the state if the condition holds
    pub fn check_and_apply(
        &self,
        resources: &mut ResourcePool,
        states: &mut StateManager,
    ) -> Result<()> {
        let value = resources.get(&self.resource)?.current;
        if !self.mode.compare(value, self.threshold) {
            return Ok(());
        }
        if self.require_active && states.stacks_of(&self.state)? == 0 {
            return Ok(());
        }
        states.force_clear(&self.state, resources)
    }
}

/// Time-driven resource change, gated by states. Carried by the character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenRule {
    pub resource: ResourceId,
    /// Amount per time unit; negative for decay
    pub rate_per_sec: f64,
    #[serde(default)]
    pub state_requirements: Vec<StateRequirement>,
    #[serde(default)]
    pub state_forbids: Vec<StateId>,
}

impl RegenRule {
    pub fn new(resource: impl Into<ResourceId>, rate_per_sec: f64) -> Self {
        Self {
            resource: resource.into(),
            rate_per_sec,
            state_requirements: Vec::new(),
            state_forbids: Vec::new(),
        }
    }

    pub fn requires(mut self, state: impl Into<StateId>, min_stacks: u32) -> Self {
        self.state_requirements
            .push(StateRequirement::new(state, min_stacks));
        self
    }

    pub fn forbids(mut self, state: impl Into<StateId>) -> Self {
        self.state_forbids.push(state.into());
        self
    }

    /// Apply `rate_per_sec * dt` to the resource if the state gates allow it
    pub fn apply(&self, dt: f64, resources: &mut ResourcePool, states: &StateManager) -> Result<()> {
        if dt <= 0.0 {
            return Ok(());
        }
        if !states.requirements_met(&self.state_requirements)? {
            return Ok(());
        }
        if !states.none_active(&self.state_forbids)? {
            return Ok(());
        }
        let amount = self.rate_per_sec * dt;
        if amount != 0.0 {
            resources.get_mut(&self.resource)?.update(amount)?;
        }
        Ok(())
    }
}

/// A standalone resource threshold condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceThreshold {
    pub resource: ResourceId,
    pub threshold: f64,
    #[serde(default = "default_cmp_ge")]
    pub mode: Cmp,
}

impl ResourceThreshold {
    pub fn new(resource: impl Into<ResourceId>, threshold: f64, mode: Cmp) -> Self {
        Self {
            resource: resource.into(),
            threshold,
            mode,
        }
    }

    /// Evaluate the condition against the pool
    pub fn check(&self, resources: &ResourcePool) -> Result<bool> {
        let value = resources.get(&self.resource)?.current;
        Ok(self.mode.compare(value, self.threshold))
    }
}

/// Adds stacks to a state when a specific operation executes and every
/// listed condition holds. Carried by the character and checked after each
/// executed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationTriggeredStateRule {
    pub trigger_operation: OpId,
    pub target_state: StateId,
    #[serde(default)]
    pub required_states: Vec<StateRequirement>,
    #[serde(default)]
    pub forbidden_states: Vec<StateId>,
    #[serde(default)]
    pub resource_thresholds: Vec<ResourceThreshold>,
    #[serde(default = "default_add_stacks")]
    pub add_stacks: u32,
    /// Reserved for multi-proc control; a rule currently fires at most once
    /// per executed operation.
    #[serde(default = "default_true")]
    pub once_per_operation_call: bool,
}

fn default_add_stacks() -> u32 {
    1
}

impl OperationTriggeredStateRule {
    pub fn new(trigger_operation: impl Into<OpId>, target_state: impl Into<StateId>) -> Self {
        Self {
            trigger_operation: trigger_operation.into(),
            target_state: target_state.into(),
            required_states: Vec::new(),
            forbidden_states: Vec::new(),
            resource_thresholds: Vec::new(),
            add_stacks: 1,
            once_per_operation_call: true,
        }
    }

    pub fn requires(mut self, state: impl Into<StateId>, min_stacks: u32) -> Self {
        self.required_states
            .push(StateRequirement::new(state, min_stacks));
        self
    }

    pub fn forbids(mut self, state: impl Into<StateId>) -> Self {
        self.forbidden_states.push(state.into());
        self
    }

    pub fn threshold(mut self, threshold: ResourceThreshold) -> Self {
        self.resource_thresholds.push(threshold);
        self
    }

    pub fn stacks(mut self, add_stacks: u32) -> Self {
        self.add_stacks = add_stacks;
        self
    }

    /// Fire the rule if `executed` is the trigger operation and all
    /// conditions hold
    pub fn try_apply(
        &self,
        executed: &OpId,
        now: f64,
        resources: &mut ResourcePool,
        states: &mut StateManager,
    ) -> Result<()> {
        if executed != &self.trigger_operation {
            return Ok(());
        }
        if !states.requirements_met(&self.required_states)? {
            return Ok(());
        }
        if !states.none_active(&self.forbidden_states)? {
            return Ok(());
        }
        for threshold in &self.resource_thresholds {
            if !threshold.check(resources)? {
                return Ok(());
            }
        }
        for _ in 0..self.add_stacks {
            states.add_stack(&self.target_state, now, resources)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Resource, State, StateExpiry};

    #[test]
    fn test_cmp() {
        assert!(Cmp::Ge.compare(5.0, 5.0));
        assert!(Cmp::Ge.compare(6.0, 5.0));
        assert!(!Cmp::Ge.compare(4.0, 5.0));
        assert!(Cmp::Le.compare(4.0, 5.0));
        assert!(Cmp::Eq.compare(5.0, 5.0));
        assert!(!Cmp::Eq.compare(5.1, 5.0));
    }

    #[test]
    fn test_effect_op() {
        assert_eq!(EffectOp::Add.apply(10.0, 5.0), 15.0);
        assert_eq!(EffectOp::Sub.apply(10.0, 5.0), 5.0);
        assert_eq!(EffectOp::Mul.apply(10.0, 0.5), 5.0);
        assert_eq!(EffectOp::Div.apply(10.0, 4.0), 2.5);
        // Division by zero keeps the amount.
        assert_eq!(EffectOp::Div.apply(10.0, 0.0), 10.0);
    }

    #[test]
    fn test_accelerate_contribution_clamped() {
        let rule = OperationAccelerate::new("strike")
            .ratio_per_stack(0.4)
            .clamp_range(0.0, 0.9);
        assert_eq!(rule.contribution(1), 0.4);
        assert_eq!(rule.contribution(2), 0.8);
        // Three stacks would be 1.2, clamped to the max.
        assert_eq!(rule.contribution(3), 0.9);
    }

    #[test]
    fn test_efficiency_multiplier() {
        let rule = OperationResourceEfficiency::new("strike", EffectTarget::Consume)
            .mul(1.0)
            .mul_per_stack(-0.05);
        assert_eq!(rule.multiplier(3), 0.85);
        assert_eq!(rule.multiplier(0), 1.0);
    }

    fn world_with_rage() -> (ResourcePool, StateManager) {
        let mut resources = ResourcePool::new();
        resources.insert(Resource::new("rage", 100.0, 0.0)).unwrap();
        let mut states = StateManager::new();
        states
            .insert(State::new(
                "overheat",
                0,
                5,
                StateExpiry::keep_after_last_touch(10.0),
            ))
            .unwrap();
        (resources, states)
    }

    #[test]
    fn test_resource_state_rule_edge_triggered() {
        let (mut resources, mut states) = world_with_rage();
        let mut rule = ResourceStateRule::new("rage", 50.0, "overheat", Cmp::Ge, true);
        let rage = ResourceId::new("rage");
        let overheat = StateId::new("overheat");

        resources.get_mut(&rage).unwrap().update(60.0).unwrap();
        rule.check_and_apply(0.0, &mut resources, &mut states).unwrap();
        rule.check_and_apply(0.0, &mut resources, &mut states).unwrap();
        // Still satisfied, but only the crossing fired.
        assert_eq!(states.stacks_of(&overheat).unwrap(), 1);

        // Drop below, re-arm, cross again.
        resources.get_mut(&rage).unwrap().update(-60.0).unwrap();
        rule.check_and_apply(0.0, &mut resources, &mut states).unwrap();
        resources.get_mut(&rage).unwrap().update(60.0).unwrap();
        rule.check_and_apply(0.0, &mut resources, &mut states).unwrap();
        assert_eq!(states.stacks_of(&overheat).unwrap(), 2);
    }

    #[test]
    fn test_resource_state_rule_repeating() {
        let (mut resources, mut states) = world_with_rage();
        let mut rule = ResourceStateRule::new("rage", 50.0, "overheat", Cmp::Ge, false);
        resources
            .get_mut(&ResourceId::new("rage"))
            .unwrap()
            .update(60.0)
            .unwrap();
        for _ in 0..3 {
            rule.check_and_apply(0.0, &mut resources, &mut states).unwrap();
        }
        assert_eq!(states.stacks_of(&StateId::new("overheat")).unwrap(), 3);
    }

    #[test]
    fn test_remove_rule_requires_active() {
        let (mut resources, mut states) = world_with_rage();
        let rule = ResourceStateRemoveRule::new("rage", "overheat", 0.0, Cmp::Le);
        // Inactive state: nothing to clear, nothing fires.
        rule.check_and_apply(&mut resources, &mut states).unwrap();
        assert_eq!(states.stacks_of(&StateId::new("overheat")).unwrap(), 0);

        states
            .add_stack(&StateId::new("overheat"), 0.0, &mut resources)
            .unwrap();
        rule.check_and_apply(&mut resources, &mut states).unwrap();
        assert_eq!(states.stacks_of(&StateId::new("overheat")).unwrap(), 0);
    }

    #[test]
    fn test_regen_respects_gates() {
        let (mut resources, mut states) = world_with_rage();
        let rule = RegenRule::new("rage", 2.0).forbids("overheat");

        rule.apply(3.0, &mut resources, &states).unwrap();
        assert_eq!(resources.get(&ResourceId::new("rage")).unwrap().current, 6.0);

        states
            .add_stack(&StateId::new("overheat"), 0.0, &mut resources)
            .unwrap();
        rule.apply(3.0, &mut resources, &states).unwrap();
        assert_eq!(resources.get(&ResourceId::new("rage")).unwrap().current, 6.0);
    }
}
