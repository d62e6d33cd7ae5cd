//! Operation definition schema

use cadence_core::{
    ResourceAmount, ResourceStateRemoveRule, ResourceStateRule, StateEffect, StateId,
    StateRequirement,
};
use serde::{Deserialize, Serialize};

/// Definition of an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDef {
    pub id: String,
    pub base_time: f64,
    #[serde(default)]
    pub costs: Vec<ResourceAmount>,
    #[serde(default)]
    pub produces: Vec<ResourceAmount>,
    #[serde(default)]
    pub consume_upper_limit: Option<f64>,
    #[serde(default)]
    pub consume_lower_limit: Option<f64>,
    #[serde(default)]
    pub states_output: Vec<StateId>,
    #[serde(default)]
    pub state_requirements: Vec<StateRequirement>,
    #[serde(default)]
    pub state_forbids: Vec<StateId>,
    #[serde(default)]
    pub state_effects: Vec<StateEffect>,
    #[serde(default)]
    pub resource_state_rules: Vec<ResourceStateRule>,
    #[serde(default)]
    pub resource_state_remove_rules: Vec<ResourceStateRemoveRule>,
    /// Optional charge mechanics
    #[serde(default)]
    pub charges: Option<ChargeDef>,
}

/// Charge mechanics of an operation definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeDef {
    pub max_charges: u32,
    #[serde(default)]
    pub cooldown: Option<f64>,
    /// Override for the charge resource id, to share a pool between
    /// operations
    #[serde(default)]
    pub resource: Option<String>,
}
