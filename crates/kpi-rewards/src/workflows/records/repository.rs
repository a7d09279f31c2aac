use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    EmployeeId, EmployeeProfile, KpiDefinition, KpiId, KpiRecord, RecordFilter, RecordId,
};
use crate::error::ErrorKind;
use crate::workflows::rewards::domain::CalculationId;

/// Storage abstraction for KPI records.
///
/// `update` is a compare-and-set on [`KpiRecord::version`]: the store must refuse the write with
/// [`RepositoryError::Stale`] when the stored version differs from `expected_version`, and must
/// persist `record` with its version bumped otherwise.
pub trait KpiRecordRepository: Send + Sync {
    fn insert(&self, record: KpiRecord) -> Result<KpiRecord, RepositoryError>;
    fn get(&self, id: &RecordId) -> Result<Option<KpiRecord>, RepositoryError>;
    fn query(&self, filter: &RecordFilter) -> Result<Vec<KpiRecord>, RepositoryError>;
    fn update(&self, record: KpiRecord, expected_version: u64)
        -> Result<KpiRecord, RepositoryError>;
}

/// Read-only lookups for the entities KPI records point at.
pub trait EmployeeDirectory: Send + Sync {
    fn employee(&self, id: &EmployeeId) -> Result<Option<EmployeeProfile>, RepositoryError>;
    fn kpi(&self, id: &KpiId) -> Result<Option<KpiDefinition>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed since it was read")]
    Stale,
    /// Another entry for the same business key already settles the write.
    #[error("an approved or newer entry exists for the same key")]
    KeyClosed,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::Conflict | RepositoryError::Stale | RepositoryError::KeyClosed => {
                ErrorKind::Conflict
            }
            RepositoryError::NotFound => ErrorKind::DataIntegrity,
            RepositoryError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

/// Outbound hook fired after approve/reject transitions. Delivery is best effort.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationSubject {
    KpiRecord(RecordId),
    RewardCalculation(CalculationId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub subject: NotificationSubject,
    pub recipient: EmployeeId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
