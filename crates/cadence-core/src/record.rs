//! Rotation log records

use crate::{OpId, ResourceId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One applied operation in a rotation log.
///
/// The rotation log is the ordered, append-only sequence of these records;
/// downstream code (reports, exporters, damage models) interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationRecord {
    /// The executed operation
    pub op: OpId,
    /// The operation's execution count after this execution
    pub counter: u64,
    /// Simulated time after the operation finished
    pub time: f64,
    /// Amount consumed per resource by this execution
    pub consumed: IndexMap<ResourceId, f64>,
}
