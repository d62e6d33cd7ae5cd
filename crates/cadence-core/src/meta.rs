//! Meta-operations: ordered operation sequences vetted as a unit
//!
//! A meta-operation is legal only if its whole sequence can run. Two
//! vetting modes exist:
//!
//! - `Linear`: every operation must test legal against the current world.
//!   Cheap, but blind to one operation draining the inputs of a later one.
//! - `Simulated`: the sequence is replayed against a disposable shadow
//!   world (copied resources, states and timer). Catches non-linear
//!   resource flows; the real world is untouched either way.

use crate::state::StateManager;
use crate::{MetaId, OpId, Operation, ResourcePool, Result, StateId, Timer};
use crate::rules::StateRequirement;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::trace;

/// How a meta-operation's legality is vetted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaKind {
    /// Every operation tests legal against the current world
    Linear,
    /// The sequence is replayed against a shadow world
    Simulated,
}

/// An ordered sequence of operations executed as one unit by the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaOperation {
    /// Unique identifier
    pub id: MetaId,
    /// The sequence, in execution order. Never empty.
    pub operations: Vec<OpId>,
    pub kind: MetaKind,
    /// Priority before any state-driven deltas. Higher runs first.
    #[serde(default)]
    pub base_priority: i64,
    /// States required for this meta to be a candidate at all
    #[serde(default)]
    pub state_requirements: Vec<StateRequirement>,
    /// States that remove this meta from candidacy while active
    #[serde(default)]
    pub state_forbids: Vec<StateId>,
}

impl MetaOperation {
    /// Create a new meta-operation
    pub fn new(id: impl Into<MetaId>, kind: MetaKind, operations: Vec<OpId>) -> Self {
        Self {
            id: id.into(),
            operations,
            kind,
            base_priority: 0,
            state_requirements: Vec::new(),
            state_forbids: Vec::new(),
        }
    }

    pub fn priority_base(mut self, priority: i64) -> Self {
        self.base_priority = priority;
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

    fn gate_open(&self, states: &StateManager) -> Result<bool> {
        Ok(states.requirements_met(&self.state_requirements)?
            && states.none_active(&self.state_forbids)?)
    }

    /// Current priority, or `None` when the state gates disable this meta
    /// entirely. Active states add their matching priority deltas on top of
    /// the base; once they expire the priority falls back by itself.
    pub fn priority(&self, states: &StateManager) -> Result<Option<i64>> {
        if !self.gate_open(states)? {
            return Ok(None);
        }
        let mut priority = self.base_priority;
        for state in states.iter() {
            if !state.is_active() {
                continue;
            }
            for rule in &state.meta_priority_rules {
                if rule.meta == self.id {
                    priority += rule.delta;
                }
            }
        }
        Ok(Some(priority))
    }

    /// Whether the whole sequence can execute right now.
    ///
    /// A shadow simulation that fails internally (broken references and the
    /// like) is reported as "cannot execute" rather than an error: the
    /// pre-check must never damage the caller.
    pub fn can_execute(
        &self,
        operations: &IndexMap<OpId, Operation>,
        timer: &Timer,
        resources: &ResourcePool,
        states: &StateManager,
    ) -> Result<bool> {
        if !self.gate_open(states)? {
            return Ok(false);
        }
        match self.kind {
            MetaKind::Linear => {
                for op_id in &self.operations {
                    let op = operations
                        .get(op_id)
                        .ok_or_else(|| crate::Error::UnknownOperation(op_id.clone()))?;
                    if !op.test(resources, states)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            MetaKind::Simulated => {
                let verdict = self
                    .simulate(operations, timer, resources, states)
                    .unwrap_or(false);
                if !verdict {
                    trace!(meta = %self.id, "shadow execution rejected sequence");
                }
                Ok(verdict)
            }
        }
    }

    /// Replay the sequence against a disposable shadow world.
    ///
    /// The shadow covers only the subgraph the sequence touches: copies of
    /// every resource named by a consume or produce entry, and structural
    /// copies (resource effects stripped) of every state referenced by an
    /// operation's requirements, forbids, effects, outputs or threshold
    /// rules. The shadow timer starts at the real time. Each step re-checks
    /// gates, deducts, produces, advances shadow time, expires shadow
    /// states and applies state outputs, exactly like a real run.
    fn simulate(
        &self,
        operations: &IndexMap<OpId, Operation>,
        timer: &Timer,
        resources: &ResourcePool,
        states: &StateManager,
    ) -> Result<bool> {
        let mut shadow_resources = ResourcePool::new();
        let mut touched_states: HashSet<StateId> = HashSet::new();
        for op_id in &self.operations {
            let op = operations
                .get(op_id)
                .ok_or_else(|| crate::Error::UnknownOperation(op_id.clone()))?;
            for entry in op.consumes.iter().chain(op.produces.iter()) {
                if !shadow_resources.contains(&entry.resource) {
                    shadow_resources.insert(resources.get(&entry.resource)?.clone())?;
                }
            }
            for req in &op.state_requirements {
                touched_states.insert(req.state.clone());
            }
            for state in op.state_forbids.iter().chain(op.states_output.iter()) {
                touched_states.insert(state.clone());
            }
            for effect in &op.state_effects {
                touched_states.insert(effect.state.clone());
            }
            for rule in &op.resource_state_rules {
                touched_states.insert(rule.state.clone());
            }
            for rule in &op.resource_state_remove_rules {
                touched_states.insert(rule.state.clone());
            }
        }

        let mut shadow_states = states.shadow_clone(&touched_states);
        let mut shadow_timer = timer.clone();

        for op_id in &self.operations {
            let op = operations
                .get(op_id)
                .ok_or_else(|| crate::Error::UnknownOperation(op_id.clone()))?;

            if !shadow_states.requirements_met(&op.state_requirements)?
                || !shadow_states.none_active(&op.state_forbids)?
            {
                return Ok(false);
            }

            if let Some(lower) = op.consume_lower_limit {
                for entry in &op.consumes {
                    if shadow_resources.get(&entry.resource)?.current < lower {
                        return Ok(false);
                    }
                }
            }

            let consume = op.consume_amounts(&shadow_states)?;
            for (resource, need) in &consume {
                let res = shadow_resources.get_mut(resource)?;
                if res.current < *need {
                    return Ok(false);
                }
                res.update(-*need)?;
            }

            for (resource, amount) in op.produce_amounts(&shadow_states)? {
                if amount > 0.0 {
                    shadow_resources.get_mut(&resource)?.update(amount)?;
                }
            }

            shadow_timer.update(op.effective_time(&shadow_states));
            shadow_states.sweep(shadow_timer.now(), &mut shadow_resources)?;

            for state in &op.states_output {
                shadow_states.add_stack(state, shadow_timer.now(), &mut shadow_resources)?;
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MetaPriorityRule;
    use crate::{Resource, State, StateExpiry};

    fn arena(ops: Vec<Operation>) -> IndexMap<OpId, Operation> {
        ops.into_iter().map(|op| (op.id.clone(), op)).collect()
    }

    fn energy_world(current: f64) -> (Timer, ResourcePool, StateManager) {
        let mut resources = ResourcePool::new();
        resources
            .insert(Resource::new("energy", 10.0, current))
            .unwrap();
        (Timer::new(), resources, StateManager::new())
    }

    #[test]
    fn test_priority_from_states() {
        let (_, _, mut states) = energy_world(5.0);
        states
            .insert(
                State::new("surge", 0, 1, StateExpiry::keep_after_last_touch(5.0))
                    .with_meta_priority(MetaPriorityRule::new("burst", 20)),
            )
            .unwrap();

        let meta = MetaOperation::new("burst", MetaKind::Linear, vec![OpId::new("a")])
            .priority_base(5);
        assert_eq!(meta.priority(&states).unwrap(), Some(5));

        let mut pool = ResourcePool::new();
        states.add_stack(&StateId::new("surge"), 0.0, &mut pool).unwrap();
        assert_eq!(meta.priority(&states).unwrap(), Some(25));
    }

    #[test]
    fn test_gated_meta_has_no_priority() {
        let (_, _, mut states) = energy_world(5.0);
        states
            .insert(State::new("locked", 1, 1, StateExpiry::keep_after_last_touch(5.0)))
            .unwrap();

        let meta = MetaOperation::new("burst", MetaKind::Linear, vec![OpId::new("a")])
            .priority_base(5)
            .forbids_state("locked");
        assert_eq!(meta.priority(&states).unwrap(), None);
    }

    #[test]
    fn test_linear_accepts_what_simulation_rejects() {
        // Each op alone needs 3 of 5 energy, so the linear check passes,
        // but the sequence needs 9 and the shadow replay refuses it.
        let (timer, resources, states) = energy_world(5.0);
        let ops = arena(vec![
            Operation::new("a", 1.0).consume("energy", 3.0),
            Operation::new("b", 1.0).consume("energy", 3.0),
        ]);
        let sequence = vec![OpId::new("a"), OpId::new("b"), OpId::new("b")];

        let linear = MetaOperation::new("m1", MetaKind::Linear, sequence.clone());
        assert!(linear.can_execute(&ops, &timer, &resources, &states).unwrap());

        let simulated = MetaOperation::new("m2", MetaKind::Simulated, sequence);
        assert!(!simulated.can_execute(&ops, &timer, &resources, &states).unwrap());
    }

    #[test]
    fn test_modes_agree_on_independent_sequences() {
        let (timer, resources, states) = energy_world(10.0);
        let ops = arena(vec![
            Operation::new("a", 1.0).consume("energy", 2.0),
            Operation::new("b", 1.0).consume("energy", 2.0),
        ]);
        let sequence = vec![OpId::new("a"), OpId::new("b")];

        let linear = MetaOperation::new("m1", MetaKind::Linear, sequence.clone());
        let simulated = MetaOperation::new("m2", MetaKind::Simulated, sequence);
        assert_eq!(
            linear.can_execute(&ops, &timer, &resources, &states).unwrap(),
            simulated.can_execute(&ops, &timer, &resources, &states).unwrap(),
        );
    }

    #[test]
    fn test_simulation_sees_produced_resources() {
        // The first op produces what the second op needs.
        let mut resources = ResourcePool::new();
        resources.insert(Resource::new("energy", 10.0, 3.0)).unwrap();
        resources.insert(Resource::new("heat", 10.0, 0.0)).unwrap();
        let (timer, states) = (Timer::new(), StateManager::new());

        let ops = arena(vec![
            Operation::new("vent", 1.0).consume("energy", 3.0).produce("heat", 5.0),
            Operation::new("flare", 1.0).consume("heat", 5.0),
        ]);
        let meta = MetaOperation::new(
            "combo",
            MetaKind::Simulated,
            vec![OpId::new("vent"), OpId::new("flare")],
        );
        assert!(meta.can_execute(&ops, &timer, &resources, &states).unwrap());

        // Linear mode cannot see the intermediate production.
        let linear = MetaOperation::new(
            "combo_linear",
            MetaKind::Linear,
            vec![OpId::new("vent"), OpId::new("flare")],
        );
        assert!(!linear.can_execute(&ops, &timer, &resources, &states).unwrap());
    }

    #[test]
    fn test_simulation_sees_emitted_states() {
        // The first op emits the state the second op requires.
        let (timer, resources, mut states) = energy_world(10.0);
        states
            .insert(State::new("opened", 0, 1, StateExpiry::keep_after_last_touch(10.0)))
            .unwrap();

        let ops = arena(vec![
            Operation::new("opener", 1.0).output_state("opened"),
            Operation::new("finisher", 1.0).requires_state("opened", 1),
        ]);
        let meta = MetaOperation::new(
            "combo",
            MetaKind::Simulated,
            vec![OpId::new("opener"), OpId::new("finisher")],
        );
        assert!(meta.can_execute(&ops, &timer, &resources, &states).unwrap());

        // The emitted state only ever existed in the shadow.
        assert_eq!(states.stacks_of(&StateId::new("opened")).unwrap(), 0);
    }

    #[test]
    fn test_shadow_never_mutates_real_world() {
        use crate::ResourceId;
        let (timer, resources, mut states) = energy_world(5.0);
        states
            .insert(
                State::new("surge", 1, 3, StateExpiry::per_stack_timed(4.0, 3))
                    .with_resource_effect(
                        crate::rules::StateResourceEffect::new("energy").on_add(2.0),
                    ),
            )
            .unwrap();

        let ops = arena(vec![
            Operation::new("a", 1.0).consume("energy", 3.0).output_state("surge"),
            Operation::new("b", 1.0).consume("energy", 3.0),
        ]);
        let meta = MetaOperation::new(
            "m",
            MetaKind::Simulated,
            vec![OpId::new("a"), OpId::new("b")],
        );

        let resources_before = resources.clone();
        let states_before = states.clone();
        let timer_before = timer.clone();
        let _ = meta.can_execute(&ops, &timer, &resources, &states).unwrap();

        assert_eq!(resources, resources_before);
        assert_eq!(states, states_before);
        assert_eq!(timer, timer_before);
        assert_eq!(
            resources.get(&ResourceId::new("energy")).unwrap().current,
            5.0
        );
    }

    #[test]
    fn test_shadow_covers_only_referenced_states() {
        use crate::rules::{EffectTarget, OperationResourceEfficiency};

        // A state the sequence never names stays out of the shadow, so its
        // modifier rules do not shape the replay.
        let (timer, resources, mut states) = energy_world(2.0);
        states
            .insert(
                State::new("discount", 1, 1, StateExpiry::keep_after_last_touch(10.0))
                    .with_efficiency(
                        OperationResourceEfficiency::new("a", EffectTarget::Consume).mul(0.0),
                    ),
            )
            .unwrap();

        let ops = arena(vec![Operation::new("a", 1.0).consume("energy", 4.0)]);
        let sequence = vec![OpId::new("a")];

        // Against the live world the discount zeroes the cost.
        let linear = MetaOperation::new("m1", MetaKind::Linear, sequence.clone());
        assert!(linear.can_execute(&ops, &timer, &resources, &states).unwrap());

        // The shadow sees only what the operations reference, which here is
        // nothing, so the replay prices the operation at full cost.
        let simulated = MetaOperation::new("m2", MetaKind::Simulated, sequence);
        assert!(!simulated.can_execute(&ops, &timer, &resources, &states).unwrap());
    }

    #[test]
    fn test_simulation_expires_shadow_states_over_time() {
        // A buff that lasts 1.5s gates the last op of a 2s sequence, so the
        // shadow replay must see it expire mid-sequence.
        let (timer, resources, mut states) = energy_world(10.0);
        states
            .insert(State::new("window", 0, 1, StateExpiry::keep_after_last_touch(1.5)))
            .unwrap();

        let ops = arena(vec![
            Operation::new("open", 1.0).output_state("window"),
            Operation::new("idle", 2.0),
            Operation::new("exploit", 1.0).requires_state("window", 1),
        ]);
        let meta = MetaOperation::new(
            "m",
            MetaKind::Simulated,
            vec![OpId::new("open"), OpId::new("idle"), OpId::new("exploit")],
        );
        assert!(!meta.can_execute(&ops, &timer, &resources, &states).unwrap());

        let quick = MetaOperation::new(
            "m2",
            MetaKind::Simulated,
            vec![OpId::new("open"), OpId::new("exploit")],
        );
        assert!(quick.can_execute(&ops, &timer, &resources, &states).unwrap());
    }
}
