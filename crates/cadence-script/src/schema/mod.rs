//! Definition schema for character RON files
//!
//! Definitions reference each other by string id; the builder resolves and
//! validates everything when the character is assembled. Leaf rule records
//! deserialize straight into their kernel types, so their field names and
//! defaults are documented there.

pub mod meta;
pub mod operation;
pub mod resource;
pub mod state;

pub use meta::MetaDef;
pub use operation::{ChargeDef, OperationDef};
pub use resource::ResourceDef;
pub use state::{ExpiryDef, StateDef};

use cadence_core::{OperationTriggeredStateRule, RegenRule};
use serde::{Deserialize, Serialize};

/// A full character definition document. Every section is optional so a
/// definition set can be split across files and merged by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub states: Vec<StateDef>,
    #[serde(default)]
    pub operations: Vec<OperationDef>,
    #[serde(default)]
    pub metas: Vec<MetaDef>,
    #[serde(default)]
    pub regen_rules: Vec<RegenRule>,
    #[serde(default)]
    pub trigger_rules: Vec<OperationTriggeredStateRule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document() {
        let def: CharacterDef = ron::from_str(
            r#"(
                resources: [(id: "energy", upper_limit: 100.0, current: 50.0)],
            )"#,
        )
        .unwrap();
        assert_eq!(def.resources.len(), 1);
        assert!(def.states.is_empty());
        assert!(def.operations.is_empty());
    }
}
