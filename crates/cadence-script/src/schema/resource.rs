//! Resource definition schema

use serde::{Deserialize, Serialize};

/// Definition of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDef {
    pub id: String,
    pub upper_limit: f64,
    #[serde(default)]
    pub current: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_defaults_to_zero() {
        let def: ResourceDef = ron::from_str(r#"(id: "heat", upper_limit: 100.0)"#).unwrap();
        assert_eq!(def.current, 0.0);
        assert_eq!(def.upper_limit, 100.0);
    }
}
