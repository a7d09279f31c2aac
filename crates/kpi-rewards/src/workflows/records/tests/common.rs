use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::workflows::records::domain::{
    EmployeeId, EmployeeProfile, KpiDefinition, KpiId, KpiRecord, KpiRecordStatus, RecordFilter,
    RecordId,
};
use crate::workflows::records::repository::{
    EmployeeDirectory, KpiRecordRepository, Notification, NotificationSink, NotifyError,
    RepositoryError,
};
use crate::workflows::records::service::KpiRecordService;

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) fn dec(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

pub(crate) fn employee_id() -> EmployeeId {
    EmployeeId("emp-001".to_string())
}

pub(crate) fn sales_kpi() -> KpiId {
    KpiId("kpi-sales".to_string())
}

pub(crate) fn record(id: &str, target: i64, actual: i64, status: KpiRecordStatus) -> KpiRecord {
    KpiRecord {
        id: RecordId(id.to_string()),
        kpi_id: sales_kpi(),
        employee_id: employee_id(),
        target: dec(target),
        actual: dec(actual),
        start_date: date(2025, 1, 1),
        end_date: date(2025, 1, 31),
        status,
        submitted_report: String::new(),
        approval_comment: String::new(),
        is_deleted: false,
        version: 0,
    }
}

pub(crate) fn pending_record(id: &str) -> KpiRecord {
    record(id, 100, 0, KpiRecordStatus::Pending)
}

#[derive(Default, Clone)]
pub(crate) struct MemoryRecords {
    records: Arc<Mutex<HashMap<RecordId, KpiRecord>>>,
}

impl MemoryRecords {
    pub(crate) fn seeded(records: impl IntoIterator<Item = KpiRecord>) -> Self {
        let repository = Self::default();
        for record in records {
            repository.insert(record).expect("seed record");
        }
        repository
    }

    pub(crate) fn stored(&self, id: &str) -> KpiRecord {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(&RecordId(id.to_string()))
            .cloned()
            .expect("record present")
    }

    /// Simulate a concurrent writer bumping the version behind the service's back.
    pub(crate) fn touch(&self, id: &str) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(record) = guard.get_mut(&RecordId(id.to_string())) {
            record.version += 1;
        }
    }
}

impl KpiRecordRepository for MemoryRecords {
    fn insert(&self, record: KpiRecord) -> Result<KpiRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn get(&self, id: &RecordId) -> Result<Option<KpiRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn query(&self, filter: &RecordFilter) -> Result<Vec<KpiRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn update(
        &self,
        mut record: KpiRecord,
        expected_version: u64,
    ) -> Result<KpiRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Stale);
        }
        record.version = expected_version + 1;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

pub(crate) struct UnavailableRecords;

impl KpiRecordRepository for UnavailableRecords {
    fn insert(&self, _record: KpiRecord) -> Result<KpiRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn get(&self, _id: &RecordId) -> Result<Option<KpiRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn query(&self, _filter: &RecordFilter) -> Result<Vec<KpiRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _record: KpiRecord,
        _expected_version: u64,
    ) -> Result<KpiRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryDirectory {
    employees: Arc<Mutex<HashMap<EmployeeId, EmployeeProfile>>>,
    kpis: Arc<Mutex<HashMap<KpiId, KpiDefinition>>>,
}

impl MemoryDirectory {
    /// Directory knowing `emp-001` (sales associate) and the sales and calls KPIs.
    pub(crate) fn standard() -> Self {
        let directory = Self::default();
        directory.add_employee("emp-001", "Sales Associate");
        directory.add_kpi("kpi-sales");
        directory.add_kpi("kpi-calls");
        directory
    }

    pub(crate) fn add_employee(&self, id: &str, position: &str) {
        let id = EmployeeId(id.to_string());
        self.employees.lock().expect("directory mutex poisoned").insert(
            id.clone(),
            EmployeeProfile {
                id,
                name: "Dana Rivera".to_string(),
                position: position.to_string(),
                department_id: Some("dept-sales".to_string()),
            },
        );
    }

    pub(crate) fn add_kpi(&self, id: &str) {
        let id = KpiId(id.to_string());
        self.kpis.lock().expect("directory mutex poisoned").insert(
            id.clone(),
            KpiDefinition {
                id,
                name: "Monthly revenue".to_string(),
                unit: "IDR".to_string(),
            },
        );
    }

    pub(crate) fn remove_kpi(&self, id: &str) {
        self.kpis
            .lock()
            .expect("directory mutex poisoned")
            .remove(&KpiId(id.to_string()));
    }
}

impl EmployeeDirectory for MemoryDirectory {
    fn employee(&self, id: &EmployeeId) -> Result<Option<EmployeeProfile>, RepositoryError> {
        Ok(self
            .employees
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .cloned())
    }

    fn kpi(&self, id: &KpiId) -> Result<Option<KpiDefinition>, RepositoryError> {
        Ok(self
            .kpis
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifications {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationSink for MemoryNotifications {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(crate) struct BrokenNotifications;

impl NotificationSink for BrokenNotifications {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay down".to_string()))
    }
}

pub(crate) fn build_record_service(
    records: impl IntoIterator<Item = KpiRecord>,
) -> (KpiRecordService, MemoryRecords, MemoryNotifications) {
    let repository = MemoryRecords::seeded(records);
    let notifications = MemoryNotifications::default();
    let service = KpiRecordService::new(
        Arc::new(repository.clone()),
        Arc::new(MemoryDirectory::standard()),
        Arc::new(notifications.clone()),
    );
    (service, repository, notifications)
}
