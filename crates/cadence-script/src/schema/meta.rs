//! Meta-operation definition schema

use cadence_core::{MetaKind, StateId, StateRequirement};
use serde::{Deserialize, Serialize};

/// Definition of a meta-operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaDef {
    pub id: String,
    #[serde(default = "default_meta_kind")]
    pub kind: MetaKind,
    #[serde(default)]
    pub base_priority: i64,
    /// Operation ids in execution order
    pub operations: Vec<String>,
    #[serde(default)]
    pub state_requirements: Vec<StateRequirement>,
    #[serde(default)]
    pub state_forbids: Vec<StateId>,
}

fn default_meta_kind() -> MetaKind {
    MetaKind::Linear
}
