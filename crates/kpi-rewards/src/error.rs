use serde::Serialize;
use std::fmt;

/// Coarse failure classification shared by every workflow error so callers can render an
/// accurate message without matching on each concrete error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input to an operation (empty rejection reason, non-finite actual, ...).
    Validation,
    /// The entity's current state does not permit the requested transition.
    GuardViolation,
    /// Missing entity, dangling reference or corrupt data that needs operator remediation.
    DataIntegrity,
    /// Missing reward program or malformed period definition.
    Configuration,
    /// The entity changed between read and write.
    Conflict,
    /// The backing store could not be reached.
    Unavailable,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::GuardViolation => "guard_violation",
            ErrorKind::DataIntegrity => "data_integrity",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
