//! Identity types for kernel entities
//!
//! All cross-references between entities (rules pointing at resources,
//! states pointing at operations, metas pointing at operations) go through
//! these ids and are resolved against the owning `Character`'s arenas on
//! demand. Keeping the references typed catches most wiring mistakes at
//! compile time instead of at rotation time.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new id
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the id as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type! {
    /// Identifier for a resource (energy, blades, charges, ...)
    ResourceId
}

id_type! {
    /// Identifier for a state (buff/debuff)
    StateId
}

id_type! {
    /// Identifier for an operation (an atomic move)
    OpId
}

id_type! {
    /// Identifier for a meta-operation (an ordered operation sequence)
    MetaId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let id = ResourceId::new("energy");
        assert_eq!(id.as_str(), "energy");
        assert_eq!(format!("{}", id), "energy");
        assert_eq!(id, ResourceId::from("energy"));
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // Same spelling, different entity kinds; they never compare across types.
        let res = ResourceId::new("focus");
        let state = StateId::new("focus");
        assert_eq!(res.as_str(), state.as_str());
    }
}
