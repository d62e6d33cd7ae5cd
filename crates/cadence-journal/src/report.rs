//! Summary reports over rotation logs

use cadence_core::{OpId, ResourceId, RotationRecord};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Aggregate view of a rotation log
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    /// Number of executed operations
    pub steps: usize,
    /// Simulated time when the last operation finished
    pub end_time: f64,
    /// Executions per operation, in first-seen order
    pub operation_counts: IndexMap<OpId, u64>,
    /// Total consumption per resource, in first-seen order
    pub resource_totals: IndexMap<ResourceId, f64>,
}

impl RotationReport {
    /// Aggregate a rotation log
    pub fn from_log(log: &[RotationRecord]) -> Self {
        let mut operation_counts: IndexMap<OpId, u64> = IndexMap::new();
        let mut resource_totals: IndexMap<ResourceId, f64> = IndexMap::new();

        for record in log {
            *operation_counts.entry(record.op.clone()).or_insert(0) += 1;
            for (resource, amount) in &record.consumed {
                *resource_totals.entry(resource.clone()).or_insert(0.0) += amount;
            }
        }

        Self {
            steps: log.len(),
            end_time: log.last().map(|r| r.time).unwrap_or(0.0),
            operation_counts,
            resource_totals,
        }
    }

    /// Operations per time unit, or zero for an empty or instant rotation
    pub fn ops_per_second(&self) -> f64 {
        if self.end_time > 0.0 {
            self.steps as f64 / self.end_time
        } else {
            0.0
        }
    }
}

impl fmt::Display for RotationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Rotation Report ===")?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "End time: {:.3}", self.end_time)?;
        writeln!(f, "Ops/sec: {:.3}", self.ops_per_second())?;
        writeln!(f, "Operations:")?;
        for (op, count) in &self.operation_counts {
            writeln!(f, "  {op}: {count}")?;
        }
        writeln!(f, "Consumed:")?;
        for (resource, total) in &self.resource_totals {
            writeln!(f, "  {resource}: {total:.3}")?;
        }
        Ok(())
    }
}
