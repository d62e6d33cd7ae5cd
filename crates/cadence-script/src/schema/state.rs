//! State definition schema

use cadence_core::{
    MetaPriorityRule, OperationAccelerate, OperationResourceEfficiency, StateResourceEffect,
};
use serde::{Deserialize, Serialize};

/// Definition of a state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDef {
    pub id: String,
    /// Initial stack count
    #[serde(default)]
    pub stacks: u32,
    pub max_stacks: u32,
    pub expiry: ExpiryDef,
    #[serde(default)]
    pub resource_effects: Vec<StateResourceEffect>,
    #[serde(default)]
    pub meta_priority: Vec<MetaPriorityRule>,
    #[serde(default)]
    pub accelerates: Vec<OperationAccelerate>,
    #[serde(default)]
    pub efficiencies: Vec<OperationResourceEfficiency>,
}

/// Expiry model of a state definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpiryDef {
    /// All stacks drop `window` after the last add
    KeepAfterLastTouch { window: f64 },
    /// Each stack expires on its own `duration` after it was added, with a
    /// fixed number of stack slots
    PerStackTimed { duration: f64, slots: usize },
}
