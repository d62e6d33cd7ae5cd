//! Operations: atomic moves with resource flows, state gates and rules
//!
//! An operation is data plus the logic to test and execute it against the
//! arenas of its owning character. Execution order is fixed: consume, then
//! produce, then resource-driven state rules, then time advance, then the
//! operation's own state outputs.

use crate::rules::{FlowKind, ResourceStateRemoveRule, ResourceStateRule, StateEffect, StateRequirement};
use crate::state::StateManager;
use crate::{Error, OpId, ResourceId, ResourcePool, Result, RotationRecord, StateId, Timer};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One entry of an operation's consume or produce flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub resource: ResourceId,
    pub amount: f64,
}

impl ResourceAmount {
    pub fn new(resource: impl Into<ResourceId>, amount: f64) -> Self {
        Self {
            resource: resource.into(),
            amount,
        }
    }
}

/// An atomic move a character can perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identifier
    pub id: OpId,
    /// Duration before any acceleration
    pub base_time: f64,
    /// Resources this operation consumes, with base amounts
    #[serde(default)]
    pub consumes: Vec<ResourceAmount>,
    /// Resources this operation produces, with base amounts
    #[serde(default)]
    pub produces: Vec<ResourceAmount>,
    /// Per-execution cap on the consume amount of every resource
    #[serde(default)]
    pub consume_upper_limit: Option<f64>,
    /// Per-execution floor on the consume amount of every resource
    #[serde(default)]
    pub consume_lower_limit: Option<f64>,
    /// States this operation applies after executing
    #[serde(default)]
    pub states_output: Vec<StateId>,
    /// States required to perform this operation
    #[serde(default)]
    pub state_requirements: Vec<StateRequirement>,
    /// States that block this operation while active
    #[serde(default)]
    pub state_forbids: Vec<StateId>,
    /// State-conditional modifiers to this operation's flows
    #[serde(default)]
    pub state_effects: Vec<StateEffect>,
    /// Resource-threshold rules fired after this operation's flows settle
    #[serde(default)]
    pub resource_state_rules: Vec<ResourceStateRule>,
    /// Resource-threshold state removals fired after the add rules
    #[serde(default)]
    pub resource_state_remove_rules: Vec<ResourceStateRemoveRule>,
    /// Number of successful executions
    #[serde(default)]
    pub counter: u64,
}

impl Operation {
    /// Create a new operation with no flows or gates
    pub fn new(id: impl Into<OpId>, base_time: f64) -> Self {
        Self {
            id: id.into(),
            base_time,
            consumes: Vec::new(),
            produces: Vec::new(),
            consume_upper_limit: None,
            consume_lower_limit: None,
            states_output: Vec::new(),
            state_requirements: Vec::new(),
            state_forbids: Vec::new(),
            state_effects: Vec::new(),
            resource_state_rules: Vec::new(),
            resource_state_remove_rules: Vec::new(),
            counter: 0,
        }
    }

    pub fn consume(mut self, resource: impl Into<ResourceId>, amount: f64) -> Self {
        self.consumes.push(ResourceAmount::new(resource, amount));
        self
    }

    pub fn produce(mut self, resource: impl Into<ResourceId>, amount: f64) -> Self {
        self.produces.push(ResourceAmount::new(resource, amount));
        self
    }

    pub fn consume_limits(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.consume_lower_limit = lower;
        self.consume_upper_limit = upper;
        self
    }

    pub fn output_state(mut self, state: impl Into<StateId>) -> Self {
        self.states_output.push(state.into());
        self
    }

    pub fn requires_state(mut self, state: impl Into<StateId>, min_stacks: u32) -> Self {
        self.state_requirements
            .push(StateRequirement::new(state, min_stacks));
        self
    }

    pub fn forbids_state(mut self, state: impl Into<StateId>) -> Self {
        self.state_forbids.push(state.into());
        self
    }

    pub fn with_state_effect(mut self, effect: StateEffect) -> Self {
        self.state_effects.push(effect);
        self
    }

    pub fn with_resource_state_rule(mut self, rule: ResourceStateRule) -> Self {
        self.resource_state_rules.push(rule);
        self
    }

    pub fn with_resource_state_remove_rule(mut self, rule: ResourceStateRemoveRule) -> Self {
        self.resource_state_remove_rules.push(rule);
        self
    }

    /// Theoretical consume amounts per resource for the current states.
    ///
    /// Pipeline: clamp the base amount into the scalar limits, apply the
    /// operation's state effects, apply active states' efficiency rules,
    /// floor at zero, then re-apply the upper limit. The upper limit is
    /// deliberately enforced on both sides of the modifiers while the lower
    /// limit only shapes the base amount.
    pub fn consume_amounts(&self, states: &StateManager) -> Result<IndexMap<ResourceId, f64>> {
        let mut raw = IndexMap::new();
        for cost in &self.consumes {
            let mut amount = cost.amount;
            if let Some(upper) = self.consume_upper_limit {
                amount = amount.min(upper);
            }
            if let Some(lower) = self.consume_lower_limit {
                amount = amount.max(lower);
            }
            raw.insert(cost.resource.clone(), amount);
        }

        let mut shaped = self.apply_state_effects(raw, FlowKind::Consume, states)?;
        self.apply_efficiency_rules(&mut shaped, FlowKind::Consume, states);

        let mut out = IndexMap::new();
        for (resource, amount) in shaped {
            let mut amount = amount.max(0.0);
            if let Some(upper) = self.consume_upper_limit {
                amount = amount.min(upper);
            }
            out.insert(resource, amount);
        }
        Ok(out)
    }

    /// Theoretical produce amounts per resource for the current states.
    /// No clamping here; saturation happens when the pool is updated.
    pub fn produce_amounts(&self, states: &StateManager) -> Result<IndexMap<ResourceId, f64>> {
        let mut raw = IndexMap::new();
        for gain in &self.produces {
            raw.insert(gain.resource.clone(), gain.amount);
        }
        let mut shaped = self.apply_state_effects(raw, FlowKind::Produce, states)?;
        self.apply_efficiency_rules(&mut shaped, FlowKind::Produce, states);
        Ok(shaped)
    }

    fn apply_state_effects(
        &self,
        amounts: IndexMap<ResourceId, f64>,
        kind: FlowKind,
        states: &StateManager,
    ) -> Result<IndexMap<ResourceId, f64>> {
        if self.state_effects.is_empty() {
            return Ok(amounts);
        }
        let mut shaped = IndexMap::new();
        for (resource, base) in amounts {
            let mut amount = base;
            for effect in &self.state_effects {
                amount = effect.apply_to_amount(&resource, amount, kind, states)?;
            }
            shaped.insert(resource, amount);
        }
        Ok(shaped)
    }

    fn apply_efficiency_rules(
        &self,
        amounts: &mut IndexMap<ResourceId, f64>,
        kind: FlowKind,
        states: &StateManager,
    ) {
        for state in states.iter() {
            if !state.is_active() {
                continue;
            }
            for rule in &state.efficiency_rules {
                if rule.operation != self.id || !rule.target.applies_to(kind) {
                    continue;
                }
                let mul = rule.multiplier(state.stacks);
                match &rule.resource {
                    None => {
                        for amount in amounts.values_mut() {
                            *amount *= mul;
                        }
                    }
                    Some(resource) => {
                        if let Some(amount) = amounts.get_mut(resource) {
                            *amount *= mul;
                        }
                    }
                }
            }
        }
    }

    /// Effective duration after active states' acceleration rules.
    ///
    /// Each rule contributes a clamped ratio; the total shortens the base
    /// time, floored so the duration never goes negative.
    pub fn effective_time(&self, states: &StateManager) -> f64 {
        let mut total_ratio = 0.0;
        for state in states.iter() {
            if !state.is_active() {
                continue;
            }
            for rule in &state.accelerate_rules {
                if rule.operation == self.id {
                    total_ratio += rule.contribution(state.stacks);
                }
            }
        }
        self.base_time * (1.0 - total_ratio).max(0.0)
    }

    fn state_gates_open(&self, states: &StateManager) -> Result<bool> {
        Ok(states.requirements_met(&self.state_requirements)?
            && states.none_active(&self.state_forbids)?)
    }

    /// Whether the operation can be performed right now: state gates open
    /// and every theoretical consume amount is covered.
    pub fn test(&self, resources: &ResourcePool, states: &StateManager) -> Result<bool> {
        if !self.state_gates_open(states)? {
            return Ok(false);
        }
        for (resource, need) in self.consume_amounts(states)? {
            if resources.get(&resource)?.current < need {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Execute the operation, mutating the real world.
    ///
    /// Order: consume, produce, resource-state rules, time advance, state
    /// outputs. Side effects already applied are not rolled back on error;
    /// callers are expected to pre-check with `test`.
    pub fn operate(
        &mut self,
        timer: &mut Timer,
        resources: &mut ResourcePool,
        states: &mut StateManager,
    ) -> Result<RotationRecord> {
        if !self.test(resources, states)? {
            return Err(Error::IllegalOperation(self.id.clone()));
        }
        self.counter += 1;

        let consumed = self.consume_amounts(states)?;
        for (resource, need) in &consumed {
            let res = resources.get_mut(resource)?;
            if *need > res.current {
                return Err(Error::InsufficientResource {
                    id: resource.clone(),
                    need: *need,
                    have: res.current,
                });
            }
            res.update(-*need)?;
        }

        for (resource, amount) in self.produce_amounts(states)? {
            if amount > 0.0 {
                resources.get_mut(&resource)?.update(amount)?;
            }
        }

        let now = timer.now();
        for rule in &mut self.resource_state_rules {
            rule.check_and_apply(now, resources, states)?;
        }
        for rule in &self.resource_state_remove_rules {
            rule.check_and_apply(resources, states)?;
        }

        timer.update(self.effective_time(states));

        for state in &self.states_output {
            states.add_stack(state, timer.now(), resources)?;
        }

        Ok(RotationRecord {
            op: self.id.clone(),
            counter: self.counter,
            time: timer.now(),
            consumed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Cmp, EffectOp, EffectTarget, OperationAccelerate, OperationResourceEfficiency};
    use crate::{Resource, State, StateExpiry};

    fn world() -> (Timer, ResourcePool, StateManager) {
        let mut resources = ResourcePool::new();
        resources.insert(Resource::new("energy", 10.0, 5.0)).unwrap();
        resources.insert(Resource::new("heat", 100.0, 0.0)).unwrap();
        (Timer::new(), resources, StateManager::new())
    }

    #[test]
    fn test_operate_happy_path() {
        let (mut timer, mut resources, mut states) = world();
        let mut op = Operation::new("strike", 1.5)
            .consume("energy", 2.0)
            .produce("heat", 10.0);

        let record = op.operate(&mut timer, &mut resources, &mut states).unwrap();
        assert_eq!(record.op, OpId::new("strike"));
        assert_eq!(record.counter, 1);
        assert_eq!(record.time, 1.5);
        assert_eq!(record.consumed.get(&ResourceId::new("energy")), Some(&2.0));
        assert_eq!(resources.get(&ResourceId::new("energy")).unwrap().current, 3.0);
        assert_eq!(resources.get(&ResourceId::new("heat")).unwrap().current, 10.0);
    }

    #[test]
    fn test_operate_fails_when_test_fails() {
        let (mut timer, mut resources, mut states) = world();
        let mut op = Operation::new("strike", 1.0).consume("energy", 20.0);

        assert!(!op.test(&resources, &states).unwrap());
        let err = op.operate(&mut timer, &mut resources, &mut states).unwrap_err();
        assert!(matches!(err, Error::IllegalOperation(_)));
        // Failed execution leaves no trace.
        assert_eq!(op.counter, 0);
        assert_eq!(timer.now(), 0.0);
        assert_eq!(resources.get(&ResourceId::new("energy")).unwrap().current, 5.0);
    }

    #[test]
    fn test_counter_tracks_successes() {
        let (mut timer, mut resources, mut states) = world();
        let mut op = Operation::new("strike", 1.0).consume("energy", 2.0);

        op.operate(&mut timer, &mut resources, &mut states).unwrap();
        op.operate(&mut timer, &mut resources, &mut states).unwrap();
        assert_eq!(op.counter, 2);
        op.operate(&mut timer, &mut resources, &mut states).unwrap_err();
        assert_eq!(op.counter, 2);
    }

    #[test]
    fn test_state_gates() {
        let (mut timer, mut resources, mut states) = world();
        states
            .insert(State::new("stance", 0, 1, StateExpiry::keep_after_last_touch(10.0)))
            .unwrap();
        states
            .insert(State::new("stunned", 0, 1, StateExpiry::keep_after_last_touch(10.0)))
            .unwrap();

        let mut op = Operation::new("strike", 1.0)
            .requires_state("stance", 1)
            .forbids_state("stunned");

        assert!(!op.test(&resources, &states).unwrap());
        states.add_stack(&StateId::new("stance"), 0.0, &mut resources).unwrap();
        assert!(op.test(&resources, &states).unwrap());
        states.add_stack(&StateId::new("stunned"), 0.0, &mut resources).unwrap();
        assert!(!op.test(&resources, &states).unwrap());
        let err = op.operate(&mut timer, &mut resources, &mut states).unwrap_err();
        assert!(matches!(err, Error::IllegalOperation(_)));
    }

    #[test]
    fn test_state_effect_modifies_consume() {
        let (_, _, mut states) = world();
        states
            .insert(State::new("frugal", 1, 1, StateExpiry::keep_after_last_touch(10.0)))
            .unwrap();

        let op = Operation::new("strike", 1.0)
            .consume("energy", 4.0)
            .produce("heat", 8.0)
            .with_state_effect(StateEffect::new("frugal", EffectTarget::Consume, EffectOp::Mul, 0.5));

        let consume = op.consume_amounts(&states).unwrap();
        assert_eq!(consume.get(&ResourceId::new("energy")), Some(&2.0));
        // The produce flow is untouched by a consume-targeted effect.
        let produce = op.produce_amounts(&states).unwrap();
        assert_eq!(produce.get(&ResourceId::new("heat")), Some(&8.0));
    }

    #[test]
    fn test_consume_floor_at_zero() {
        let (_, _, mut states) = world();
        states
            .insert(State::new("gift", 1, 1, StateExpiry::keep_after_last_touch(10.0)))
            .unwrap();
        let op = Operation::new("strike", 1.0)
            .consume("energy", 1.0)
            .with_state_effect(StateEffect::new("gift", EffectTarget::Consume, EffectOp::Sub, 5.0));

        let consume = op.consume_amounts(&states).unwrap();
        assert_eq!(consume.get(&ResourceId::new("energy")), Some(&0.0));
    }

    #[test]
    fn test_upper_clamp_reapplied_after_modifiers() {
        let (_, _, mut states) = world();
        states
            .insert(State::new("greed", 1, 1, StateExpiry::keep_after_last_touch(10.0)))
            .unwrap();
        // Base 6 is clamped to 5 first, doubled to 10 by the state effect,
        // then clamped back to 5. The lower limit shapes only the base.
        let op = Operation::new("strike", 1.0)
            .consume("energy", 6.0)
            .consume_limits(Some(1.0), Some(5.0))
            .with_state_effect(StateEffect::new("greed", EffectTarget::Consume, EffectOp::Mul, 2.0));

        let consume = op.consume_amounts(&states).unwrap();
        assert_eq!(consume.get(&ResourceId::new("energy")), Some(&5.0));
    }

    #[test]
    fn test_efficiency_rule_scales_flows() {
        let (_, _, mut states) = world();
        states
            .insert(
                State::new("attuned", 2, 3, StateExpiry::keep_after_last_touch(10.0))
                    .with_efficiency(
                        OperationResourceEfficiency::new("strike", EffectTarget::Consume)
                            .mul(1.0)
                            .mul_per_stack(-0.25),
                    ),
            )
            .unwrap();

        let op = Operation::new("strike", 1.0).consume("energy", 4.0);
        let consume = op.consume_amounts(&states).unwrap();
        // 4 * (1.0 - 0.25 * 2) = 2
        assert_eq!(consume.get(&ResourceId::new("energy")), Some(&2.0));
    }

    #[test]
    fn test_effective_time_acceleration() {
        let (_, _, mut states) = world();
        states
            .insert(
                State::new("haste", 2, 3, StateExpiry::keep_after_last_touch(10.0)).with_accelerate(
                    OperationAccelerate::new("strike")
                        .ratio_per_stack(0.25)
                        .clamp_range(0.0, 0.9),
                ),
            )
            .unwrap();

        let op = Operation::new("strike", 2.0);
        assert_eq!(op.effective_time(&states), 1.0);

        // An unrelated operation keeps its base time.
        let other = Operation::new("guard", 2.0);
        assert_eq!(other.effective_time(&states), 2.0);
    }

    #[test]
    fn test_effective_time_floors_at_zero() {
        let (_, _, mut states) = world();
        states
            .insert(
                State::new("haste", 1, 1, StateExpiry::keep_after_last_touch(10.0))
                    .with_accelerate(OperationAccelerate::new("strike").ratio(0.9).clamp_range(0.0, 0.95)),
            )
            .unwrap();
        states
            .insert(
                State::new("frenzy", 1, 1, StateExpiry::keep_after_last_touch(10.0))
                    .with_accelerate(OperationAccelerate::new("strike").ratio(0.8).clamp_range(0.0, 0.95)),
            )
            .unwrap();

        // Contributions are clamped individually but the sum may exceed 1.
        let op = Operation::new("strike", 2.0);
        assert_eq!(op.effective_time(&states), 0.0);
    }

    #[test]
    fn test_resource_state_rule_fires_during_operate() {
        let (mut timer, mut resources, mut states) = world();
        states
            .insert(State::new("overheat", 0, 1, StateExpiry::keep_after_last_touch(10.0)))
            .unwrap();

        let mut op = Operation::new("vent", 1.0)
            .produce("heat", 60.0)
            .with_resource_state_rule(ResourceStateRule::new("heat", 50.0, "overheat", Cmp::Ge, true));

        op.operate(&mut timer, &mut resources, &mut states).unwrap();
        assert_eq!(states.stacks_of(&StateId::new("overheat")).unwrap(), 1);
    }

    #[test]
    fn test_states_output_applied_after_time_advance() {
        let (mut timer, mut resources, mut states) = world();
        states
            .insert(State::new("momentum", 0, 5, StateExpiry::per_stack_timed(10.0, 5)))
            .unwrap();

        let mut op = Operation::new("strike", 2.0).output_state("momentum");
        op.operate(&mut timer, &mut resources, &mut states).unwrap();

        // The stack's timestamp is the post-advance time.
        let state = states.get(&StateId::new("momentum")).unwrap();
        match &state.expiry {
            StateExpiry::PerStackTimed { slots, .. } => assert_eq!(slots[0], Some(2.0)),
            _ => unreachable!(),
        }
    }
}
