//! Transition rules for a single KPI record.
//!
//! Everything here is pure: the service fetches a record, asks [`KpiRecord::apply`] for the
//! next version and hands that to the store in one write. A rejected action never produces a
//! partially updated record.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::domain::{KpiRecord, KpiRecordStatus};
use crate::error::ErrorKind;

/// The owning employee may change `actual` or submit a report.
pub const fn is_editable(status: KpiRecordStatus) -> bool {
    match status {
        KpiRecordStatus::Pending | KpiRecordStatus::Rejected => true,
        KpiRecordStatus::AwaitingApproval | KpiRecordStatus::Approved => false,
    }
}

pub fn can_submit(status: KpiRecordStatus, actual: Decimal) -> bool {
    is_editable(status) && actual > Decimal::ZERO
}

pub const fn can_approve(status: KpiRecordStatus) -> bool {
    matches!(status, KpiRecordStatus::AwaitingApproval)
}

/// Parse a user-entered actual value. Any finite number is accepted, including zero.
pub fn parse_actual(raw: &str) -> Result<Decimal, LifecycleError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| LifecycleError::InvalidActual(raw.to_string()))
}

/// Requested change to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    UpdateActual(Decimal),
    SubmitReport(String),
    Approve,
    Reject(String),
}

impl RecordAction {
    pub const fn label(&self) -> &'static str {
        match self {
            RecordAction::UpdateActual(_) => "update_actual",
            RecordAction::SubmitReport(_) => "submit_report",
            RecordAction::Approve => "approve",
            RecordAction::Reject(_) => "reject",
        }
    }
}

impl KpiRecord {
    /// Compute the record that results from `action`, leaving `self` untouched.
    pub fn apply(&self, action: &RecordAction) -> Result<KpiRecord, LifecycleError> {
        let mut next = self.clone();

        match action {
            RecordAction::UpdateActual(actual) => {
                if !is_editable(self.status) {
                    return Err(LifecycleError::NotEditable {
                        status: self.status,
                    });
                }
                next.actual = *actual;
            }
            RecordAction::SubmitReport(report) => {
                let report = report.trim();
                if report.is_empty() {
                    return Err(LifecycleError::MissingReport);
                }
                if !is_editable(self.status) {
                    return Err(LifecycleError::NotEditable {
                        status: self.status,
                    });
                }
                if !can_submit(self.status, self.actual) {
                    return Err(LifecycleError::ActualNotReported {
                        actual: self.actual,
                    });
                }
                next.submitted_report = report.to_string();
                next.status = KpiRecordStatus::AwaitingApproval;
            }
            RecordAction::Approve => {
                if !can_approve(self.status) {
                    return Err(LifecycleError::NotAwaitingApproval {
                        status: self.status,
                    });
                }
                next.status = KpiRecordStatus::Approved;
                next.approval_comment.clear();
            }
            RecordAction::Reject(reason) => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(LifecycleError::EmptyRejectionReason);
                }
                if !can_approve(self.status) {
                    return Err(LifecycleError::NotAwaitingApproval {
                        status: self.status,
                    });
                }
                next.status = KpiRecordStatus::Rejected;
                next.approval_comment = reason.to_string();
            }
        }

        Ok(next)
    }
}

/// Why a record action was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("actual value '{0}' is not a number")]
    InvalidActual(String),
    #[error("a report identifier is required to submit")]
    MissingReport,
    #[error("a rejection reason is required")]
    EmptyRejectionReason,
    #[error("record is {status} and can no longer be edited")]
    NotEditable { status: KpiRecordStatus },
    #[error("actual value {actual} must be greater than zero before submitting")]
    ActualNotReported { actual: Decimal },
    #[error("record is {status}; only records awaiting approval can be reviewed")]
    NotAwaitingApproval { status: KpiRecordStatus },
}

impl LifecycleError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::InvalidActual(_)
            | LifecycleError::MissingReport
            | LifecycleError::EmptyRejectionReason => ErrorKind::Validation,
            LifecycleError::NotEditable { .. }
            | LifecycleError::ActualNotReported { .. }
            | LifecycleError::NotAwaitingApproval { .. } => ErrorKind::GuardViolation,
        }
    }
}
