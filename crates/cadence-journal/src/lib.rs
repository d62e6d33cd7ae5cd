//! Cadence Journal - Rotation log export and reporting
//!
//! The kernel emits a rotation as an ordered list of `RotationRecord`s.
//! This crate interprets that log:
//!
//! - **Exporter**: serialize a log to RON, JSON, CSV or readable text
//! - **RotationReport**: per-operation counts, per-resource totals and
//!   elapsed simulated time
//!
//! # Example
//!
//! ```rust,ignore
//! use cadence_journal::{Exporter, ExportFormat, RotationReport};
//!
//! let log = character.build_rotation_from_meta(100)?;
//!
//! let report = RotationReport::from_log(&log);
//! println!("{}", report);
//!
//! let exporter = Exporter::new(&log);
//! let csv = exporter.export(ExportFormat::Csv)?;
//! ```

mod error;
mod exporter;
mod report;

pub use error::{Error, Result};
pub use exporter::{ExportFormat, Exporter};
pub use report::RotationReport;

// Re-export the log record type for convenience
pub use cadence_core::RotationRecord;
