use chrono::NaiveDate;
use clap::Args;
use kpi_rewards::config::RewardSettings;
use kpi_rewards::workflows::integrity::IntegritySweep;
use kpi_rewards::workflows::records::import::records_from_path;
use kpi_rewards::workflows::records::{
    EmployeeDirectory, EmployeeId, EmployeeProfile, KpiDefinition, KpiId, KpiRecord,
    KpiRecordRepository, KpiRecordService, Notification, NotificationSink, NotifyError,
    RecordFilter, RecordId, RepositoryError,
};
use kpi_rewards::workflows::rewards::{
    ensure_approvable, ensure_key_open, CalculationFilter, CalculationId, CalculationRepository,
    CalculationStatus, RewardCalculation, RewardCalculationService, RewardProgram,
    RewardProgramRepository, RewardStores,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::error::AppError;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services shared by the HTTP handlers.
#[derive(Clone)]
pub(crate) struct ApiState {
    pub(crate) records: Arc<KpiRecordService>,
    pub(crate) rewards: Arc<RewardCalculationService>,
    pub(crate) sweep: Arc<IntegritySweep>,
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<RecordId, KpiRecord>>>,
}

impl KpiRecordRepository for InMemoryRecordStore {
    fn insert(&self, record: KpiRecord) -> Result<KpiRecord, RepositoryError> {
        let mut guard = locked(&self.records)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn get(&self, id: &RecordId) -> Result<Option<KpiRecord>, RepositoryError> {
        Ok(locked(&self.records)?.get(id).cloned())
    }

    fn query(&self, filter: &RecordFilter) -> Result<Vec<KpiRecord>, RepositoryError> {
        Ok(locked(&self.records)?
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
        let mut guard = locked(&self.records)?;
        let stored = guard.get(&record.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::Stale);
        }
        record.version = expected_version + 1;
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

/// Employees and KPI definitions as loaded from a directory seed file.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DirectorySeed {
    #[serde(default)]
    pub(crate) employees: Vec<EmployeeProfile>,
    #[serde(default)]
    pub(crate) kpis: Vec<KpiDefinition>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryDirectory {
    employees: Arc<HashMap<EmployeeId, EmployeeProfile>>,
    kpis: Arc<HashMap<KpiId, KpiDefinition>>,
}

impl InMemoryDirectory {
    pub(crate) fn from_seed(seed: DirectorySeed) -> Self {
        Self {
            employees: Arc::new(
                seed.employees
                    .into_iter()
                    .map(|employee| (employee.id.clone(), employee))
                    .collect(),
            ),
            kpis: Arc::new(
                seed.kpis
                    .into_iter()
                    .map(|kpi| (kpi.id.clone(), kpi))
                    .collect(),
            ),
        }
    }
}

impl EmployeeDirectory for InMemoryDirectory {
    fn employee(&self, id: &EmployeeId) -> Result<Option<EmployeeProfile>, RepositoryError> {
        Ok(self.employees.get(id).cloned())
    }

    fn kpi(&self, id: &KpiId) -> Result<Option<KpiDefinition>, RepositoryError> {
        Ok(self.kpis.get(id).cloned())
    }
}

/// Programs keyed by position. When several versions exist for a position the highest
/// `(year, version)` wins.
#[derive(Default, Clone)]
pub(crate) struct InMemoryProgramStore {
    programs: Arc<HashMap<String, RewardProgram>>,
}

impl InMemoryProgramStore {
    pub(crate) fn from_programs(programs: Vec<RewardProgram>) -> Self {
        let mut by_position: HashMap<String, RewardProgram> = HashMap::new();
        for program in programs {
            let newer = by_position
                .get(&program.position)
                .map_or(true, |current| {
                    (program.year, program.version) > (current.year, current.version)
                });
            if newer {
                by_position.insert(program.position.clone(), program);
            }
        }
        Self {
            programs: Arc::new(by_position),
        }
    }
}

impl RewardProgramRepository for InMemoryProgramStore {
    fn program_for_position(
        &self,
        position: &str,
    ) -> Result<Option<RewardProgram>, RepositoryError> {
        Ok(self.programs.get(position).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCalculationStore {
    calculations: Arc<Mutex<HashMap<CalculationId, RewardCalculation>>>,
}

impl CalculationRepository for InMemoryCalculationStore {
    fn create(&self, calculation: RewardCalculation) -> Result<RewardCalculation, RepositoryError> {
        let mut guard = locked(&self.calculations)?;
        if guard.contains_key(&calculation.id) {
            return Err(RepositoryError::Conflict);
        }
        ensure_key_open(guard.values(), &calculation)?;
        guard.insert(calculation.id.clone(), calculation.clone());
        Ok(calculation)
    }

    fn get(&self, id: &CalculationId) -> Result<Option<RewardCalculation>, RepositoryError> {
        Ok(locked(&self.calculations)?.get(id).cloned())
    }

    fn query(&self, filter: &CalculationFilter) -> Result<Vec<RewardCalculation>, RepositoryError> {
        Ok(locked(&self.calculations)?
            .values()
            .filter(|calculation| filter.matches(calculation))
            .cloned()
            .collect())
    }

    fn update(
        &self,
        calculation: RewardCalculation,
        expected_status: CalculationStatus,
    ) -> Result<RewardCalculation, RepositoryError> {
        let mut guard = locked(&self.calculations)?;
        let stored = guard.get(&calculation.id).ok_or(RepositoryError::NotFound)?;
        if stored.status != expected_status {
            return Err(RepositoryError::Stale);
        }
        ensure_approvable(guard.values(), &calculation)?;
        guard.insert(calculation.id.clone(), calculation.clone());
        Ok(calculation)
    }
}

/// Notification sink that only writes to the log.
#[derive(Default, Clone, Copy)]
pub(crate) struct LogNotifications;

impl NotificationSink for LogNotifications {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            template = %notification.template,
            recipient = %notification.recipient,
            subject = ?notification.subject,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Seed files shared by every command.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct SeedArgs {
    /// KPI record CSV export (id,kpi_id,employee_id,target,actual,start_date,end_date,status)
    #[arg(long)]
    pub(crate) records: Option<PathBuf>,
    /// JSON file with `employees` and `kpis` arrays
    #[arg(long)]
    pub(crate) directory: Option<PathBuf>,
    /// JSON array of reward programs
    #[arg(long)]
    pub(crate) programs: Option<PathBuf>,
}

/// In-memory stores backing the services for one process.
#[derive(Clone, Default)]
pub(crate) struct Stores {
    pub(crate) records: InMemoryRecordStore,
    pub(crate) directory: InMemoryDirectory,
    pub(crate) programs: InMemoryProgramStore,
    pub(crate) calculations: InMemoryCalculationStore,
}

impl Stores {
    pub(crate) fn load(seed: &SeedArgs) -> Result<Self, AppError> {
        let records = InMemoryRecordStore::default();
        if let Some(path) = &seed.records {
            for record in records_from_path(path)? {
                records.insert(record)?;
            }
        }

        let directory = match &seed.directory {
            Some(path) => InMemoryDirectory::from_seed(read_json(path)?),
            None => InMemoryDirectory::default(),
        };

        let programs = match &seed.programs {
            Some(path) => InMemoryProgramStore::from_programs(read_json(path)?),
            None => InMemoryProgramStore::default(),
        };

        info!(
            records = seed.records.is_some(),
            directory = seed.directory.is_some(),
            programs = seed.programs.is_some(),
            "stores seeded"
        );

        Ok(Self {
            records,
            directory,
            programs,
            calculations: InMemoryCalculationStore::default(),
        })
    }

    pub(crate) fn api_state(&self, settings: RewardSettings) -> ApiState {
        ApiState {
            records: Arc::new(self.record_service()),
            rewards: Arc::new(self.reward_service(settings)),
            sweep: Arc::new(self.integrity_sweep()),
        }
    }

    pub(crate) fn record_service(&self) -> KpiRecordService {
        KpiRecordService::new(
            Arc::new(self.records.clone()),
            Arc::new(self.directory.clone()),
            Arc::new(LogNotifications),
        )
    }

    pub(crate) fn reward_service(&self, settings: RewardSettings) -> RewardCalculationService {
        RewardCalculationService::new(
            RewardStores {
                records: Arc::new(self.records.clone()),
                directory: Arc::new(self.directory.clone()),
                programs: Arc::new(self.programs.clone()),
                calculations: Arc::new(self.calculations.clone()),
                notifications: Arc::new(LogNotifications),
            },
            settings,
        )
    }

    pub(crate) fn integrity_sweep(&self) -> IntegritySweep {
        IntegritySweep::new(
            Arc::new(self.records.clone()),
            Arc::new(self.directory.clone()),
        )
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}
