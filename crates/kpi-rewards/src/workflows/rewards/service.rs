use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::calculation::{eligible_records, CalculationError, RewardEngine};
use super::domain::{
    CalculationFilter, CalculationId, CalculationStatus, Frequency, RewardCalculation,
};
use super::period::ReportingPeriod;
use super::repository::{CalculationRepository, RewardProgramRepository};
use crate::config::RewardSettings;
use crate::error::ErrorKind;
use crate::workflows::records::domain::{EmployeeId, KpiRecordStatus, RecordFilter};
use crate::workflows::records::repository::{
    EmployeeDirectory, KpiRecordRepository, Notification, NotificationSink, NotificationSubject,
    RepositoryError,
};

/// Source of `calculated_at` / `approved_at` timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Collaborators the calculation service reads from and writes to.
#[derive(Clone)]
pub struct RewardStores {
    pub records: Arc<dyn KpiRecordRepository>,
    pub directory: Arc<dyn EmployeeDirectory>,
    pub programs: Arc<dyn RewardProgramRepository>,
    pub calculations: Arc<dyn CalculationRepository>,
    pub notifications: Arc<dyn NotificationSink>,
}

/// Runs the calculator against the stores and owns the calculation approval gate.
///
/// Calculations form an append-only history per `(employee, period, frequency)`. Re-running
/// adds a new entry, only the newest entry can be approved, and once one is approved the key
/// is closed to further runs.
pub struct RewardCalculationService {
    stores: RewardStores,
    engine: RewardEngine,
    settings: RewardSettings,
    clock: Arc<dyn Clock>,
}

static CALCULATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_calculation_id() -> CalculationId {
    let id = CALCULATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    CalculationId(format!("calc-{id:06}"))
}

impl RewardCalculationService {
    pub fn new(stores: RewardStores, settings: RewardSettings) -> Self {
        let engine = RewardEngine::with_points_rate(settings.points_rate);
        Self {
            stores,
            engine,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_engine(mut self, engine: RewardEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &RewardSettings {
        &self.settings
    }

    /// Calculate rewards and penalties for one employee and period.
    pub fn calculate(
        &self,
        employee_id: &EmployeeId,
        period: &str,
        frequency: Frequency,
    ) -> Result<RewardCalculation, RewardServiceError> {
        let period = ReportingPeriod::parse(frequency, period).map_err(CalculationError::from)?;

        let employee = self.stores.directory.employee(employee_id)?.ok_or_else(|| {
            CalculationError::EmployeeNotFound {
                employee_id: employee_id.clone(),
            }
        })?;
        let program = self
            .stores
            .programs
            .program_for_position(&employee.position)?
            .ok_or_else(|| CalculationError::NoProgramForPosition {
                employee_id: employee_id.clone(),
                position: employee.position.clone(),
            })?;

        let approved = self.stores.calculations.query(&CalculationFilter {
            status: Some(CalculationStatus::Approved),
            ..CalculationFilter::for_period(employee_id.clone(), &period.key, frequency)
        })?;
        if let Some(existing) = approved.into_iter().next() {
            return Err(GateError::PeriodClosed {
                employee_id: employee_id.clone(),
                period: period.key.clone(),
                frequency,
                approved: existing.id,
            }
            .into());
        }

        let records = self.stores.records.query(
            &RecordFilter::for_employee(employee_id.clone())
                .with_status(KpiRecordStatus::Approved)
                .overlapping(period.start, period.end),
        )?;
        for record in eligible_records(employee_id, &period, &records) {
            if self.stores.directory.kpi(&record.kpi_id)?.is_none() {
                return Err(CalculationError::KpiNotFound {
                    record_id: record.id.clone(),
                    kpi_id: record.kpi_id.clone(),
                }
                .into());
            }
        }

        let outcome = self
            .engine
            .calculate(employee_id, &period, &program, &records)?;

        let calculation = RewardCalculation {
            id: next_calculation_id(),
            employee_id: employee_id.clone(),
            program_id: program.id.clone(),
            program_version: program.version,
            period: period.key.clone(),
            frequency,
            grade: outcome.snapshot.grade(&self.settings.grade_bands),
            breakdown: outcome.breakdown,
            penalties: outcome.penalties,
            total_reward: outcome.total_reward,
            total_penalty: outcome.total_penalty,
            net_amount: outcome.net_amount,
            total_points: outcome.total_points,
            status: CalculationStatus::Calculated,
            calculated_at: self.clock.now(),
            approved_at: None,
            approved_by: None,
            notes: None,
        };

        let stored = self.stores.calculations.create(calculation)?;
        info!(
            calculation_id = %stored.id,
            employee_id = %stored.employee_id,
            period = %stored.period,
            frequency = stored.frequency.label(),
            records = outcome.record_ids.len(),
            total_reward = %stored.total_reward,
            total_penalty = %stored.total_penalty,
            net_amount = %stored.net_amount,
            "reward calculated"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &CalculationId) -> Result<RewardCalculation, RewardServiceError> {
        self.stores
            .calculations
            .get(id)?
            .ok_or_else(|| RepositoryError::NotFound.into())
    }

    /// Every calculation for the employee, newest first.
    pub fn history(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<RewardCalculation>, RewardServiceError> {
        let mut calculations = self.stores.calculations.query(&CalculationFilter {
            employee_id: Some(employee_id.clone()),
            ..CalculationFilter::default()
        })?;
        calculations.sort_by(newest_first);
        Ok(calculations)
    }

    pub fn latest(
        &self,
        employee_id: &EmployeeId,
        period: &str,
        frequency: Frequency,
    ) -> Result<Option<RewardCalculation>, RewardServiceError> {
        let period = ReportingPeriod::parse(frequency, period).map_err(CalculationError::from)?;
        let mut calculations = self.stores.calculations.query(&CalculationFilter::for_period(
            employee_id.clone(),
            &period.key,
            frequency,
        ))?;
        calculations.sort_by(newest_first);
        Ok(calculations.into_iter().next())
    }

    /// Approve a calculated run. Requires an approver identity and the run must be the newest
    /// for its period.
    pub fn approve(
        &self,
        id: &CalculationId,
        approver: &str,
        notes: Option<String>,
    ) -> Result<RewardCalculation, RewardServiceError> {
        let approver = approver.trim();
        if approver.is_empty() {
            return Err(GateError::MissingApprover.into());
        }

        let current = self.get(id)?;
        ensure_calculated(&current)?;

        if let Some(latest) = self.latest(&current.employee_id, &current.period, current.frequency)? {
            if latest.id != current.id {
                return Err(GateError::Superseded {
                    id: current.id.clone(),
                    latest: latest.id,
                }
                .into());
            }
        }

        let mut next = current.clone();
        next.status = CalculationStatus::Approved;
        next.approved_at = Some(self.clock.now());
        next.approved_by = Some(approver.to_string());
        if let Some(notes) = notes.filter(|notes| !notes.trim().is_empty()) {
            next.notes = Some(notes);
        }

        let stored = self
            .stores
            .calculations
            .update(next, CalculationStatus::Calculated)?;
        info!(
            calculation_id = %stored.id,
            approved_by = approver,
            net_amount = %stored.net_amount,
            "reward calculation approved"
        );
        self.publish_review(&stored);
        Ok(stored)
    }

    /// Reject a calculated run. Terminal; a fresh calculation is needed to retry.
    pub fn reject(
        &self,
        id: &CalculationId,
        reason: &str,
    ) -> Result<RewardCalculation, RewardServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(GateError::EmptyRejectionReason.into());
        }

        let current = self.get(id)?;
        ensure_calculated(&current)?;

        let mut next = current.clone();
        next.status = CalculationStatus::Rejected;
        next.notes = Some(reason.to_string());

        let stored = self
            .stores
            .calculations
            .update(next, CalculationStatus::Calculated)?;
        info!(calculation_id = %stored.id, reason, "reward calculation rejected");
        self.publish_review(&stored);
        Ok(stored)
    }

    fn publish_review(&self, calculation: &RewardCalculation) {
        let mut details = BTreeMap::new();
        details.insert("status".to_string(), calculation.status.label().to_string());
        details.insert("period".to_string(), calculation.period.clone());
        details.insert("frequency".to_string(), calculation.frequency.label().to_string());
        details.insert("net_amount".to_string(), calculation.net_amount.to_string());
        if let Some(notes) = &calculation.notes {
            details.insert("notes".to_string(), notes.clone());
        }

        let notification = Notification {
            template: format!("reward_calculation_{}", calculation.status.label()),
            subject: NotificationSubject::RewardCalculation(calculation.id.clone()),
            recipient: calculation.employee_id.clone(),
            details,
        };

        if let Err(err) = self.stores.notifications.notify(notification) {
            warn!(
                calculation_id = %calculation.id,
                error = %err,
                "calculation notification not delivered"
            );
        }
    }
}

fn newest_first(a: &RewardCalculation, b: &RewardCalculation) -> std::cmp::Ordering {
    b.calculated_at
        .cmp(&a.calculated_at)
        .then_with(|| b.id.cmp(&a.id))
}

fn ensure_calculated(calculation: &RewardCalculation) -> Result<(), GateError> {
    if calculation.status == CalculationStatus::Calculated {
        Ok(())
    } else {
        Err(GateError::NotCalculated {
            id: calculation.id.clone(),
            status: calculation.status,
        })
    }
}

/// Approval-gate refusals for calculations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("approver identity is required")]
    MissingApprover,
    #[error("rejection reason must not be empty")]
    EmptyRejectionReason,
    #[error("calculation {id} is {status}, only calculated runs can be reviewed")]
    NotCalculated {
        id: CalculationId,
        status: CalculationStatus,
    },
    #[error("calculation {id} was superseded by {latest}")]
    Superseded {
        id: CalculationId,
        latest: CalculationId,
    },
    #[error("{frequency} period {period} for {employee_id} is already approved in {approved}")]
    PeriodClosed {
        employee_id: EmployeeId,
        period: String,
        frequency: Frequency,
        approved: CalculationId,
    },
}

impl GateError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            GateError::MissingApprover | GateError::EmptyRejectionReason => ErrorKind::Validation,
            GateError::NotCalculated { .. }
            | GateError::Superseded { .. }
            | GateError::PeriodClosed { .. } => ErrorKind::GuardViolation,
        }
    }
}

/// Error raised by the reward calculation service.
#[derive(Debug, thiserror::Error)]
pub enum RewardServiceError {
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RewardServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RewardServiceError::Calculation(err) => err.kind(),
            RewardServiceError::Gate(err) => err.kind(),
            RewardServiceError::Repository(err) => err.kind(),
        }
    }
}
