//! Cadence Script - RON loader and character builder
//!
//! Loads character definitions from RON files and assembles them into a
//! ready-to-drive `cadence_core::Character`:
//! - Resource, state, operation and meta-operation definitions
//! - Rule wiring (regen, triggers, modifiers) by id
//! - Duplicate detection across files and full reference validation

mod builder;
mod error;
mod loader;
mod schema;

pub use builder::build_character;
pub use error::{Error, Result};
pub use loader::Loader;
pub use schema::{
    CharacterDef, ChargeDef, ExpiryDef, MetaDef, OperationDef, ResourceDef, StateDef,
};
