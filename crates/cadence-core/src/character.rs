//! Characters: owners of the simulation arenas and the rotation drivers
//!
//! A character exclusively owns its timer, resources, states, operations,
//! meta-operations and character-level rules. Everything else in the kernel
//! references these arenas by id.

use crate::rules::{OperationTriggeredStateRule, RegenRule};
use crate::state::StateManager;
use crate::{
    Error, MetaId, MetaOperation, OpId, Operation, Resource, ResourceAmount, ResourceId,
    ResourcePool, Result, RotationRecord, Timer,
};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Charge mechanics for an operation: a dedicated (or shared) charge
/// resource consumed one per execution and optionally refilled over time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeSpec {
    /// Maximum charge count. Zero disables the mechanic entirely.
    pub max_charges: u32,
    /// Time to refill one charge; `None` or non-positive means charges
    /// never refill on their own.
    pub cooldown: Option<f64>,
    /// Charge resource id; defaults to `charge_<op_id>`. Operations naming
    /// the same resource share one charge pool.
    pub resource: Option<ResourceId>,
}

impl ChargeSpec {
    pub fn new(max_charges: u32) -> Self {
        Self {
            max_charges,
            cooldown: None,
            resource: None,
        }
    }

    pub fn with_cooldown(mut self, cooldown: f64) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<ResourceId>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

/// A simulated character and its rotation state
#[derive(Debug, Clone)]
pub struct Character {
    pub name: String,
    pub timer: Timer,
    pub resources: ResourcePool,
    pub states: StateManager,
    operations: IndexMap<OpId, Operation>,
    metas: IndexMap<MetaId, MetaOperation>,
    regen_rules: Vec<RegenRule>,
    trigger_rules: Vec<OperationTriggeredStateRule>,
    last_tick_time: f64,
}

impl Character {
    /// Create a character with an empty world
    pub fn new(name: impl Into<String>, timer: Timer) -> Self {
        let last_tick_time = timer.now();
        Self {
            name: name.into(),
            timer,
            resources: ResourcePool::new(),
            states: StateManager::new(),
            operations: IndexMap::new(),
            metas: IndexMap::new(),
            regen_rules: Vec::new(),
            trigger_rules: Vec::new(),
            last_tick_time,
        }
    }

    // ---- registration -----------------------------------------------------

    /// Register a resource
    pub fn add_resource(&mut self, resource: Resource) -> Result<()> {
        self.resources.insert(resource)
    }

    /// Register a state
    pub fn add_state(&mut self, state: crate::State) -> Result<()> {
        self.states.insert(state)
    }

    /// Register an operation. Registration order is the greedy driver's
    /// default priority order.
    pub fn add_operation(&mut self, operation: Operation) -> Result<()> {
        if self.operations.contains_key(&operation.id) {
            return Err(Error::Duplicate(operation.id.to_string()));
        }
        self.operations.insert(operation.id.clone(), operation);
        Ok(())
    }

    /// Register an operation with charge mechanics: the charge resource is
    /// created (or reused and widened), seeded full, appended as an extra
    /// consume of one per execution, and refilled over time when a cooldown
    /// is given.
    pub fn add_operation_with_charges(
        &mut self,
        mut operation: Operation,
        spec: ChargeSpec,
    ) -> Result<()> {
        if spec.max_charges == 0 {
            return self.add_operation(operation);
        }

        let charge_id = spec
            .resource
            .unwrap_or_else(|| ResourceId::new(format!("charge_{}", operation.id)));

        if self.resources.contains(&charge_id) {
            let charges = self.resources.get_mut(&charge_id)?;
            charges.upper_limit = charges.upper_limit.max(spec.max_charges as f64);
            charges.current = charges.current.min(charges.upper_limit);
        } else {
            self.resources.insert(Resource::new(
                charge_id.clone(),
                spec.max_charges as f64,
                spec.max_charges as f64,
            ))?;
        }

        operation
            .consumes
            .push(ResourceAmount::new(charge_id.clone(), 1.0));

        if let Some(cooldown) = spec.cooldown {
            if cooldown > 0.0 {
                self.add_regen_rule(RegenRule::new(charge_id, 1.0 / cooldown));
            }
        }

        self.add_operation(operation)
    }

    /// Register a meta-operation. The sequence must be non-empty;
    /// registration order breaks priority ties in the driver.
    pub fn add_meta_operation(&mut self, meta: MetaOperation) -> Result<()> {
        if meta.operations.is_empty() {
            return Err(Error::Config(format!(
                "meta-operation {} has an empty sequence",
                meta.id
            )));
        }
        if self.metas.contains_key(&meta.id) {
            return Err(Error::Duplicate(meta.id.to_string()));
        }
        self.metas.insert(meta.id.clone(), meta);
        Ok(())
    }

    /// Register a time-driven resource rule
    pub fn add_regen_rule(&mut self, rule: RegenRule) {
        self.regen_rules.push(rule);
    }

    /// Register an operation-triggered state rule
    pub fn add_trigger_rule(&mut self, rule: OperationTriggeredStateRule) {
        self.trigger_rules.push(rule);
    }

    /// Look up a registered operation
    pub fn operation(&self, id: &OpId) -> Result<&Operation> {
        self.operations
            .get(id)
            .ok_or_else(|| Error::UnknownOperation(id.clone()))
    }

    /// Look up a registered meta-operation
    pub fn meta_operation(&self, id: &MetaId) -> Result<&MetaOperation> {
        self.metas
            .get(id)
            .ok_or_else(|| Error::UnknownMeta(id.clone()))
    }

    /// Verify that every id referenced anywhere resolves to a registered
    /// entity. Cross-references may point forward during registration, so
    /// this runs once after everything is in place; builders call it before
    /// handing the character out.
    pub fn validate(&self) -> Result<()> {
        for state in self.states.iter() {
            for effect in &state.resource_effects {
                self.resources.get(&effect.resource)?;
            }
            for rule in &state.meta_priority_rules {
                self.meta_operation(&rule.meta)?;
            }
            for rule in &state.accelerate_rules {
                self.operation(&rule.operation)?;
            }
            for rule in &state.efficiency_rules {
                self.operation(&rule.operation)?;
                if let Some(resource) = &rule.resource {
                    self.resources.get(resource)?;
                }
            }
        }
        for op in self.operations.values() {
            for entry in op.consumes.iter().chain(op.produces.iter()) {
                self.resources.get(&entry.resource)?;
            }
            for state in op.states_output.iter().chain(op.state_forbids.iter()) {
                self.states.get(state)?;
            }
            for req in &op.state_requirements {
                self.states.get(&req.state)?;
            }
            for effect in &op.state_effects {
                self.states.get(&effect.state)?;
                if let Some(resource) = &effect.resource {
                    self.resources.get(resource)?;
                }
            }
            for rule in &op.resource_state_rules {
                self.resources.get(&rule.resource)?;
                self.states.get(&rule.state)?;
            }
            for rule in &op.resource_state_remove_rules {
                self.resources.get(&rule.resource)?;
                self.states.get(&rule.state)?;
            }
        }
        for meta in self.metas.values() {
            for op_id in &meta.operations {
                self.operation(op_id)?;
            }
            for req in &meta.state_requirements {
                self.states.get(&req.state)?;
            }
            for state in &meta.state_forbids {
                self.states.get(state)?;
            }
        }
        for rule in &self.regen_rules {
            self.resources.get(&rule.resource)?;
            for req in &rule.state_requirements {
                self.states.get(&req.state)?;
            }
            for state in &rule.state_forbids {
                self.states.get(state)?;
            }
        }
        for rule in &self.trigger_rules {
            self.operation(&rule.trigger_operation)?;
            self.states.get(&rule.target_state)?;
            for req in &rule.required_states {
                self.states.get(&req.state)?;
            }
            for state in &rule.forbidden_states {
                self.states.get(state)?;
            }
            for threshold in &rule.resource_thresholds {
                self.resources.get(&threshold.resource)?;
            }
        }
        Ok(())
    }

    // ---- execution --------------------------------------------------------

    /// Whether a single operation can be performed right now
    pub fn can_perform(&self, id: &OpId) -> Result<bool> {
        self.operation(id)?.test(&self.resources, &self.states)
    }

    /// Perform a single operation
    pub fn perform(&mut self, id: &OpId) -> Result<RotationRecord> {
        let op = self
            .operations
            .get_mut(id)
            .ok_or_else(|| Error::UnknownOperation(id.clone()))?;
        op.operate(&mut self.timer, &mut self.resources, &mut self.states)
    }

    /// Whether a whole meta-operation can execute right now
    pub fn can_execute_meta(&self, id: &MetaId) -> Result<bool> {
        self.meta_operation(id)?
            .can_execute(&self.operations, &self.timer, &self.resources, &self.states)
    }

    /// Execute a whole meta-operation, appending one record per operation.
    ///
    /// The pre-check is authoritative: a failure mid-sequence after a
    /// successful pre-check is surfaced as `Internal`, with the records of
    /// the operations that did run already appended and their side effects
    /// kept.
    pub fn execute_meta(&mut self, id: &MetaId, log: &mut Vec<RotationRecord>) -> Result<()> {
        if !self.can_execute_meta(id)? {
            return Err(Error::IllegalMeta(id.clone()));
        }
        let sequence = self.meta_operation(id)?.operations.clone();
        for op_id in sequence {
            let record = self.perform(&op_id).map_err(|err| match err {
                Error::IllegalOperation(_) | Error::InsufficientResource { .. } => {
                    Error::Internal(format!(
                        "meta-operation {id}: {op_id} failed after a passing pre-check: {err}"
                    ))
                }
                other => other,
            })?;
            log.push(record);
            self.after_operation_executed(&op_id)?;
        }
        Ok(())
    }

    fn after_operation_executed(&mut self, executed: &OpId) -> Result<()> {
        for rule in &self.trigger_rules {
            rule.try_apply(
                executed,
                self.timer.now(),
                &mut self.resources,
                &mut self.states,
            )?;
        }
        self.states.sweep(self.timer.now(), &mut self.resources)
    }

    /// Settle time-driven resource rules for the span since the last
    /// settlement. Drivers call this after every executed step.
    pub fn apply_time_regen(&mut self) -> Result<()> {
        let now = self.timer.now();
        let dt = now - self.last_tick_time;
        if dt <= 0.0 {
            return Ok(());
        }
        for rule in &self.regen_rules {
            rule.apply(dt, &mut self.resources, &self.states)?;
        }
        self.last_tick_time = now;
        Ok(())
    }

    // ---- drivers ----------------------------------------------------------

    /// Priority-driven rotation: each step, pick the highest-priority
    /// executable meta-operation and run it whole. Ties fall back to
    /// registration order. Stops when no candidate can execute, when a
    /// mid-sequence failure cuts a step short, or after `max_steps` steps.
    pub fn build_rotation_from_meta(&mut self, max_steps: usize) -> Result<Vec<RotationRecord>> {
        let mut log = Vec::new();
        let mut steps = 0;

        while steps < max_steps {
            self.states.sweep(self.timer.now(), &mut self.resources)?;

            let mut candidates: Vec<(i64, MetaId)> = Vec::new();
            for (id, meta) in &self.metas {
                if let Some(priority) = meta.priority(&self.states)? {
                    candidates.push((priority, id.clone()));
                }
            }
            if candidates.is_empty() {
                debug!(steps, "rotation ended: no candidate meta-operations");
                break;
            }
            // Stable sort keeps registration order among equal priorities.
            candidates.sort_by(|a, b| b.0.cmp(&a.0));

            let mut executed = false;
            for (priority, meta_id) in &candidates {
                if !self.can_execute_meta(meta_id)? {
                    continue;
                }
                debug!(meta = %meta_id, priority = *priority, step = steps, "executing meta-operation");
                if let Err(err) = self.execute_meta(meta_id, &mut log) {
                    // A mid-sequence failure keeps the partial records; the
                    // rotation cannot meaningfully continue past it.
                    warn!(meta = %meta_id, %err, "meta-operation failed mid-sequence");
                    return Ok(log);
                }
                self.apply_time_regen()?;
                steps += 1;
                executed = true;
                break;
            }
            if !executed {
                debug!(steps, "rotation ended: no candidate can execute");
                break;
            }
        }

        Ok(log)
    }

    /// Greedy single-operation rotation: each step, run the first legal
    /// operation in priority order. `priority` gives an explicit id order;
    /// unknown ids are skipped. Defaults to registration order.
    pub fn build_rotation_greedy_ops(
        &mut self,
        max_steps: usize,
        priority: Option<&[OpId]>,
    ) -> Result<Vec<RotationRecord>> {
        let ordered: Vec<OpId> = match priority {
            Some(ids) => ids
                .iter()
                .filter(|id| self.operations.contains_key(*id))
                .cloned()
                .collect(),
            None => self.operations.keys().cloned().collect(),
        };

        let mut log = Vec::new();
        for step in 0..max_steps {
            self.states.sweep(self.timer.now(), &mut self.resources)?;

            let mut executed = false;
            for op_id in &ordered {
                if !self.can_perform(op_id)? {
                    continue;
                }
                debug!(op = %op_id, step, "executing operation");
                let record = self.perform(op_id)?;
                log.push(record);
                self.after_operation_executed(op_id)?;
                self.apply_time_regen()?;
                executed = true;
                break;
            }
            if !executed {
                debug!(step, "greedy rotation ended: no legal operation");
                break;
            }
        }

        Ok(log)
    }
}
