use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::domain::{EmployeeId, KpiId, KpiRecord, KpiRecordStatus, RecordFilter, RecordId};
use super::lifecycle::{LifecycleError, RecordAction};
use super::repository::{
    EmployeeDirectory, KpiRecordRepository, Notification, NotificationSink, NotificationSubject,
    RepositoryError,
};
use crate::error::ErrorKind;

/// Service applying employee and admin actions to KPI records.
pub struct KpiRecordService {
    repository: Arc<dyn KpiRecordRepository>,
    directory: Arc<dyn EmployeeDirectory>,
    notifications: Arc<dyn NotificationSink>,
}

static RECORD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Fresh ids drawn by `assign` before an id collision is reported as a conflict.
const ASSIGN_ID_ATTEMPTS: u32 = 16;

fn next_record_id() -> RecordId {
    let id = RECORD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RecordId(format!("rec-{id:06}"))
}

impl KpiRecordService {
    pub fn new(
        repository: Arc<dyn KpiRecordRepository>,
        directory: Arc<dyn EmployeeDirectory>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repository,
            directory,
            notifications,
        }
    }

    /// Assign a KPI to an employee for a window, creating a `pending` record.
    pub fn assign(
        &self,
        kpi_id: KpiId,
        employee_id: EmployeeId,
        target: Decimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<KpiRecord, RecordServiceError> {
        if target <= Decimal::ZERO {
            return Err(RecordServiceError::InvalidAssignment(format!(
                "target must be greater than zero (found {target})"
            )));
        }
        if end_date < start_date {
            return Err(RecordServiceError::InvalidAssignment(format!(
                "window ends ({end_date}) before it starts ({start_date})"
            )));
        }

        let mut record = KpiRecord::assigned(
            next_record_id(),
            kpi_id,
            employee_id,
            target,
            start_date,
            end_date,
        );
        self.ensure_references(&record)?;

        let mut attempts = 1;
        let stored = loop {
            match self.repository.insert(record.clone()) {
                Err(RepositoryError::Conflict) if attempts < ASSIGN_ID_ATTEMPTS => {
                    warn!(record_id = %record.id, attempts, "record id taken, drawing another");
                    record.id = next_record_id();
                    attempts += 1;
                }
                result => break result?,
            }
        };
        info!(
            record_id = %stored.id,
            employee_id = %stored.employee_id,
            kpi_id = %stored.kpi_id,
            "kpi assigned"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &RecordId) -> Result<KpiRecord, RecordServiceError> {
        self.repository
            .get(id)?
            .filter(|record| !record.is_deleted)
            .ok_or_else(|| RepositoryError::NotFound.into())
    }

    pub fn list(&self, filter: &RecordFilter) -> Result<Vec<KpiRecord>, RecordServiceError> {
        let mut records = self.repository.query(filter)?;
        records.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    /// Overwrite the actual value. Allowed while the record is editable; status is unchanged.
    pub fn update_actual(
        &self,
        id: &RecordId,
        actual: Decimal,
    ) -> Result<KpiRecord, RecordServiceError> {
        self.transition(id, RecordAction::UpdateActual(actual))
    }

    pub fn submit_report(
        &self,
        id: &RecordId,
        report: impl Into<String>,
    ) -> Result<KpiRecord, RecordServiceError> {
        self.transition(id, RecordAction::SubmitReport(report.into()))
    }

    pub fn approve(&self, id: &RecordId) -> Result<KpiRecord, RecordServiceError> {
        self.transition(id, RecordAction::Approve)
    }

    pub fn reject(
        &self,
        id: &RecordId,
        reason: impl Into<String>,
    ) -> Result<KpiRecord, RecordServiceError> {
        self.transition(id, RecordAction::Reject(reason.into()))
    }

    fn transition(
        &self,
        id: &RecordId,
        action: RecordAction,
    ) -> Result<KpiRecord, RecordServiceError> {
        let current = self.get(id)?;
        let next = current.apply(&action)?;
        self.ensure_references(&current)?;

        let stored = self.repository.update(next, current.version)?;

        info!(
            record_id = %stored.id,
            action = action.label(),
            from = current.status.label(),
            to = stored.status.label(),
            "kpi record updated"
        );

        match stored.status {
            KpiRecordStatus::Approved | KpiRecordStatus::Rejected
                if stored.status != current.status =>
            {
                self.publish_review(&stored)
            }
            _ => {}
        }

        Ok(stored)
    }

    fn ensure_references(&self, record: &KpiRecord) -> Result<(), RecordServiceError> {
        if self.directory.employee(&record.employee_id)?.is_none() {
            return Err(RecordServiceError::DanglingEmployee {
                record_id: record.id.clone(),
                employee_id: record.employee_id.clone(),
            });
        }
        if self.directory.kpi(&record.kpi_id)?.is_none() {
            return Err(RecordServiceError::DanglingKpi {
                record_id: record.id.clone(),
                kpi_id: record.kpi_id.clone(),
            });
        }
        Ok(())
    }

    fn publish_review(&self, record: &KpiRecord) {
        let mut details = BTreeMap::new();
        details.insert("status".to_string(), record.status.label().to_string());
        details.insert("kpi_id".to_string(), record.kpi_id.0.clone());
        if !record.approval_comment.is_empty() {
            details.insert("comment".to_string(), record.approval_comment.clone());
        }

        let notification = Notification {
            template: format!("kpi_record_{}", record.status.label()),
            subject: NotificationSubject::KpiRecord(record.id.clone()),
            recipient: record.employee_id.clone(),
            details,
        };

        if let Err(err) = self.notifications.notify(notification) {
            warn!(record_id = %record.id, error = %err, "review notification not delivered");
        }
    }
}

/// Error raised by the KPI record service.
#[derive(Debug, thiserror::Error)]
pub enum RecordServiceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invalid assignment: {0}")]
    InvalidAssignment(String),
    #[error("record {record_id} references unknown employee {employee_id}")]
    DanglingEmployee {
        record_id: RecordId,
        employee_id: EmployeeId,
    },
    #[error("record {record_id} references unknown kpi {kpi_id}")]
    DanglingKpi { record_id: RecordId, kpi_id: KpiId },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RecordServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordServiceError::Lifecycle(err) => err.kind(),
            RecordServiceError::InvalidAssignment(_) => ErrorKind::Validation,
            RecordServiceError::DanglingEmployee { .. } | RecordServiceError::DanglingKpi { .. } => {
                ErrorKind::DataIntegrity
            }
            RecordServiceError::Repository(err) => err.kind(),
        }
    }
}
