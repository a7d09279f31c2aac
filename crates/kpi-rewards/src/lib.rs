//! KPI record lifecycle and reward/penalty calculation.
//!
//! The crate is storage-agnostic: services receive their stores as trait objects and the
//! surrounding application decides how records, programs and calculations are persisted.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

pub use error::ErrorKind;
