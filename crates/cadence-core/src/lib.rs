//! Cadence Core - Action-rotation simulation kernel
//!
//! This crate provides the data model and rule engine for simulating the
//! action rotation of a combat character:
//! - Bounded resources with consume/produce accounting (`Resource`)
//! - Stackable timed states with side effects on stack changes (`State`)
//! - Atomic operations that consume, produce, emit states and advance time
//!   (`Operation`)
//! - Ordered operation sequences vetted as a unit (`MetaOperation`), with
//!   shadow execution for non-linear resource flows
//! - Declarative rule couplings between resources, states and operations
//! - A `Character` that owns everything and drives the rotation loop
//!
//! The output of a rotation is an append-only log of `RotationRecord`s;
//! interpreting the log (damage, export, reporting) is downstream work.

mod character;
mod error;
mod identity;
mod meta;
mod operation;
mod record;
mod resource;
mod rules;
mod state;
mod timer;

pub use character::{ChargeSpec, Character};
pub use error::{Error, Result};
pub use identity::{MetaId, OpId, ResourceId, StateId};
pub use meta::{MetaKind, MetaOperation};
pub use operation::{Operation, ResourceAmount};
pub use record::RotationRecord;
pub use resource::{Resource, ResourcePool};
pub use rules::{
    Cmp, EffectOp, EffectTarget, FlowKind, MetaPriorityRule, OperationAccelerate,
    OperationResourceEfficiency, OperationTriggeredStateRule, RegenRule, ResourceStateRemoveRule,
    ResourceStateRule, ResourceThreshold, StateEffect, StateRequirement, StateResourceEffect,
};
pub use state::{State, StateExpiry, StateManager};
pub use timer::Timer;
