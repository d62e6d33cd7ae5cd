//! States: stackable buffs/debuffs with timed expiry
//!
//! A state carries a stack count and one of two expiry models:
//!
//! - `KeepAfterLastTouch`: all stacks share one timestamp refreshed on every
//!   add; everything drops once the keep-alive window since the last touch
//!   has passed.
//! - `PerStackTimed`: a fixed number of timestamp slots; each slot expires
//!   on its own after the per-stack duration, and the stack count is always
//!   the number of live slots.
//!
//! Stack changes settle the state's `StateResourceEffect`s exactly once per
//! net change in either direction.

use crate::rules::{
    MetaPriorityRule, OperationAccelerate, OperationResourceEfficiency, StateRequirement,
    StateResourceEffect,
};
use crate::{Error, ResourcePool, Result, StateId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Expiry model of a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateExpiry {
    /// Stacks persist until `window` time has passed since the last add
    KeepAfterLastTouch {
        window: f64,
        #[serde(default)]
        start_time: f64,
    },
    /// Each stack occupies a timestamp slot and expires `duration` after it
    /// was set
    PerStackTimed {
        duration: f64,
        slots: Vec<Option<f64>>,
    },
}

impl StateExpiry {
    /// Keep-alive expiry with the given window
    pub fn keep_after_last_touch(window: f64) -> Self {
        Self::KeepAfterLastTouch {
            window,
            start_time: 0.0,
        }
    }

    /// Per-stack expiry with the given duration and slot count
    pub fn per_stack_timed(duration: f64, slots: usize) -> Self {
        Self::PerStackTimed {
            duration,
            slots: vec![None; slots],
        }
    }
}

/// A stackable effect owned by a character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Unique identifier
    pub id: StateId,
    /// Current stack count; 0 means the state is absent
    pub stacks: u32,
    /// Maximum stack count
    pub max_stacks: u32,
    /// Expiry model and its timing payload
    pub expiry: StateExpiry,
    /// Resource changes settled on stack gain/loss
    #[serde(default)]
    pub resource_effects: Vec<StateResourceEffect>,
    /// Priority deltas applied to meta-operations while active
    #[serde(default)]
    pub meta_priority_rules: Vec<MetaPriorityRule>,
    /// Operation accelerations granted while active
    #[serde(default)]
    pub accelerate_rules: Vec<OperationAccelerate>,
    /// Operation efficiency multipliers granted while active
    #[serde(default)]
    pub efficiency_rules: Vec<OperationResourceEfficiency>,
}

impl State {
    /// Create a new state
    pub fn new(id: impl Into<StateId>, stacks: u32, max_stacks: u32, expiry: StateExpiry) -> Self {
        Self {
            id: id.into(),
            stacks: stacks.min(max_stacks),
            max_stacks,
            expiry,
            resource_effects: Vec::new(),
            meta_priority_rules: Vec::new(),
            accelerate_rules: Vec::new(),
            efficiency_rules: Vec::new(),
        }
    }

    pub fn with_resource_effect(mut self, effect: StateResourceEffect) -> Self {
        self.resource_effects.push(effect);
        self
    }

    pub fn with_meta_priority(mut self, rule: MetaPriorityRule) -> Self {
        self.meta_priority_rules.push(rule);
        self
    }

    pub fn with_accelerate(mut self, rule: OperationAccelerate) -> Self {
        self.accelerate_rules.push(rule);
        self
    }

    pub fn with_efficiency(mut self, rule: OperationResourceEfficiency) -> Self {
        self.efficiency_rules.push(rule);
        self
    }

    /// Whether the state currently carries any stacks
    pub fn is_active(&self) -> bool {
        self.stacks > 0
    }

    /// Add a stack at the given time and settle resource effects for any
    /// net gain.
    pub fn add(&mut self, now: f64, resources: &mut ResourcePool) -> Result<()> {
        let prev = self.stacks;
        match &mut self.expiry {
            StateExpiry::KeepAfterLastTouch { start_time, .. } => {
                self.stacks = (prev + 1).min(self.max_stacks);
                *start_time = now;
            }
            StateExpiry::PerStackTimed { duration, slots } => {
                // Empty slots sort last; the first slot is the oldest
                // timestamp and gets overwritten by this touch.
                slots.sort_by(compare_slots);
                if let Some(first) = slots.first_mut() {
                    *first = Some(now);
                }
                let live = count_live(slots, *duration, now);
                self.stacks = live.min(self.max_stacks);
            }
        }
        let gained = self.stacks.saturating_sub(prev);
        if gained > 0 {
            self.settle_gain(gained, resources)?;
        }
        Ok(())
    }

    /// Drop expired stacks at the given time and settle resource effects
    /// for any net loss. Called by the manager sweep.
    pub fn expire(&mut self, now: f64, resources: &mut ResourcePool) -> Result<()> {
        let prev = self.stacks;
        match &mut self.expiry {
            StateExpiry::KeepAfterLastTouch { window, start_time } => {
                if now - *start_time > *window {
                    self.stacks = 0;
                    *start_time = 0.0;
                }
            }
            StateExpiry::PerStackTimed { duration, slots } => {
                let live = count_live(slots, *duration, now);
                self.stacks = live.min(self.max_stacks);
            }
        }
        let lost = prev.saturating_sub(self.stacks);
        if lost > 0 {
            self.settle_loss(lost, resources)?;
        }
        Ok(())
    }

    /// Immediately clear all stacks regardless of time, settling the loss
    /// once. Used by removal rules and other external forced removal.
    pub fn force_clear(&mut self, resources: &mut ResourcePool) -> Result<()> {
        if self.stacks == 0 {
            self.reset_timestamps();
            return Ok(());
        }
        let prev = self.stacks;
        self.stacks = 0;
        self.settle_loss(prev, resources)?;
        self.reset_timestamps();
        Ok(())
    }

    fn reset_timestamps(&mut self) {
        match &mut self.expiry {
            StateExpiry::KeepAfterLastTouch { start_time, .. } => *start_time = 0.0,
            StateExpiry::PerStackTimed { slots, .. } => {
                for slot in slots.iter_mut() {
                    *slot = None;
                }
            }
        }
    }

    fn settle_gain(&self, gained: u32, resources: &mut ResourcePool) -> Result<()> {
        for effect in &self.resource_effects {
            if let Some(ratio) = effect.ratio_on_add {
                set_to_ratio(resources, effect, ratio)?;
                continue;
            }
            if effect.on_add == 0.0 {
                continue;
            }
            let amount = effect.on_add * if effect.per_stack { gained as f64 } else { 1.0 };
            if amount != 0.0 {
                resources.get_mut(&effect.resource)?.update(amount)?;
            }
        }
        Ok(())
    }

    fn settle_loss(&self, lost: u32, resources: &mut ResourcePool) -> Result<()> {
        for effect in &self.resource_effects {
            if let Some(ratio) = effect.ratio_on_remove {
                set_to_ratio(resources, effect, ratio)?;
                continue;
            }
            if effect.on_remove == 0.0 {
                continue;
            }
            let amount = effect.on_remove * if effect.per_stack { lost as f64 } else { 1.0 };
            if amount != 0.0 {
                resources.get_mut(&effect.resource)?.update(amount)?;
            }
        }
        Ok(())
    }

    /// Structural copy for shadow execution: timing and modifier rules are
    /// kept, resource effects are stripped so shadow stack changes can never
    /// touch real resources.
    pub(crate) fn shadow_copy(&self) -> State {
        State {
            id: self.id.clone(),
            stacks: self.stacks,
            max_stacks: self.max_stacks,
            expiry: self.expiry.clone(),
            resource_effects: Vec::new(),
            meta_priority_rules: self.meta_priority_rules.clone(),
            accelerate_rules: self.accelerate_rules.clone(),
            efficiency_rules: self.efficiency_rules.clone(),
        }
    }
}

fn compare_slots(a: &Option<f64>, b: &Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn count_live(slots: &[Option<f64>], duration: f64, now: f64) -> u32 {
    slots
        .iter()
        .flatten()
        .filter(|t| now - **t <= duration)
        .count() as u32
}

fn set_to_ratio(
    resources: &mut ResourcePool,
    effect: &StateResourceEffect,
    ratio: f64,
) -> Result<()> {
    let resource = resources.get_mut(&effect.resource)?;
    let target = resource.upper_limit * ratio;
    let delta = target - resource.current;
    if delta != 0.0 {
        resource.update(delta)?;
    }
    Ok(())
}

/// All states of a character, keyed by id. Sweeps run in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateManager {
    states: IndexMap<StateId, State>,
}

impl StateManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state. Fails on a duplicate id.
    pub fn insert(&mut self, state: State) -> Result<()> {
        if self.states.contains_key(&state.id) {
            return Err(Error::Duplicate(state.id.to_string()));
        }
        self.states.insert(state.id.clone(), state);
        Ok(())
    }

    /// Look up a state
    pub fn get(&self, id: &StateId) -> Result<&State> {
        self.states
            .get(id)
            .ok_or_else(|| Error::UnknownState(id.clone()))
    }

    /// Look up a state mutably
    pub fn get_mut(&mut self, id: &StateId) -> Result<&mut State> {
        self.states
            .get_mut(id)
            .ok_or_else(|| Error::UnknownState(id.clone()))
    }

    /// Current stack count of a state
    pub fn stacks_of(&self, id: &StateId) -> Result<u32> {
        Ok(self.get(id)?.stacks)
    }

    /// Whether a state with this id is registered
    pub fn contains(&self, id: &StateId) -> bool {
        self.states.contains_key(id)
    }

    /// Iterate states in registration order
    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// Number of registered states
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the manager is empty
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Add a stack to a state
    pub fn add_stack(
        &mut self,
        id: &StateId,
        now: f64,
        resources: &mut ResourcePool,
    ) -> Result<()> {
        let state = self
            .states
            .get_mut(id)
            .ok_or_else(|| Error::UnknownState(id.clone()))?;
        state.add(now, resources)
    }

    /// Force-clear a state
    pub fn force_clear(&mut self, id: &StateId, resources: &mut ResourcePool) -> Result<()> {
        let state = self
            .states
            .get_mut(id)
            .ok_or_else(|| Error::UnknownState(id.clone()))?;
        state.force_clear(resources)
    }

    /// Expire every state at the given time, in registration order
    pub fn sweep(&mut self, now: f64, resources: &mut ResourcePool) -> Result<()> {
        for state in self.states.values_mut() {
            state.expire(now, resources)?;
        }
        Ok(())
    }

    /// Whether every requirement is met
    pub fn requirements_met(&self, requirements: &[StateRequirement]) -> Result<bool> {
        for req in requirements {
            if self.stacks_of(&req.state)? < req.min_stacks {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether none of the listed states is active
    pub fn none_active(&self, forbids: &[StateId]) -> Result<bool> {
        for id in forbids {
            if self.stacks_of(id)? > 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Shadow copies of the listed states for simulated execution, in
    /// registration order so shadow sweeps expire in the same order as
    /// real sweeps. States outside the set are left out of the shadow.
    pub(crate) fn shadow_clone(&self, touched: &HashSet<StateId>) -> StateManager {
        let mut shadow = StateManager::new();
        for state in self.states.values() {
            if touched.contains(&state.id) {
                shadow.states.insert(state.id.clone(), state.shadow_copy());
            }
        }
        shadow
    }
}
