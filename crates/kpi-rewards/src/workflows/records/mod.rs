//! KPI record lifecycle: employee updates and submissions, admin approval and rejection.

pub mod domain;
pub mod import;
pub mod lifecycle;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod tests;

pub use domain::{
    EmployeeId, EmployeeProfile, KpiDefinition, KpiId, KpiRecord, KpiRecordStatus, RecordFilter,
    RecordId,
};
pub use lifecycle::{can_approve, can_submit, is_editable, LifecycleError, RecordAction};
pub use repository::{
    EmployeeDirectory, KpiRecordRepository, Notification, NotificationSink, NotificationSubject,
    NotifyError, RepositoryError,
};
pub use service::{KpiRecordService, RecordServiceError};
