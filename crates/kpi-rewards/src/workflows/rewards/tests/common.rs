use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::config::RewardSettings;
use crate::workflows::records::domain::KpiRecord;
use crate::workflows::records::repository::RepositoryError;
use crate::workflows::records::tests::common::{MemoryDirectory, MemoryNotifications, MemoryRecords};
use crate::workflows::rewards::domain::{
    CalculationFilter, CalculationId, CalculationStatus, ConditionRule, ConditionSpec,
    CriterionType, MetricSource, PenaltyCriterion, PenaltyType, RewardCalculation,
    RewardCriterion, RewardProgram, Severity,
};
use crate::workflows::rewards::repository::{
    ensure_approvable, ensure_key_open, CalculationRepository, RewardProgramRepository,
};
use crate::workflows::rewards::service::{Clock, RewardCalculationService, RewardStores};

pub(crate) fn met(description: &str) -> ConditionSpec {
    ConditionSpec {
        description: description.to_string(),
        rule: ConditionRule::Manual { met: true },
    }
}

pub(crate) fn unmet(description: &str) -> ConditionSpec {
    ConditionSpec {
        description: description.to_string(),
        rule: ConditionRule::Manual { met: false },
    }
}

pub(crate) fn reward(
    name: &str,
    criterion_type: CriterionType,
    value: Decimal,
    conditions: Vec<ConditionSpec>,
) -> RewardCriterion {
    RewardCriterion {
        name: name.to_string(),
        description: format!("{name} bonus"),
        criterion_type,
        value,
        max_value: None,
        base_value: None,
        metric: MetricSource::TotalActual,
        conditions,
    }
}

pub(crate) fn penalty(
    name: &str,
    penalty_type: PenaltyType,
    value: Decimal,
    conditions: Vec<ConditionSpec>,
) -> PenaltyCriterion {
    PenaltyCriterion {
        name: name.to_string(),
        description: format!("{name} deduction"),
        penalty_type,
        severity: Severity::Medium,
        value,
        max_value: None,
        base_value: None,
        metric: MetricSource::TotalActual,
        conditions,
    }
}

/// Program for the `Sales Associate` position with one monthly target bonus, a commission
/// capped at 500,000 and a late-report deduction.
pub(crate) fn sales_program() -> RewardProgram {
    let mut commission = reward(
        "commission",
        CriterionType::Variable,
        Decimal::new(1, 1),
        vec![ConditionSpec {
            description: "at least one approved record".to_string(),
            rule: ConditionRule::MinApprovedRecords { count: 1 },
        }],
    );
    commission.max_value = Some(Decimal::new(500_000, 0));

    RewardProgram {
        id: "prog-sales".to_string(),
        name: "Sales incentives 2025".to_string(),
        version: 3,
        position: "Sales Associate".to_string(),
        year: 2025,
        monthly_rewards: vec![
            reward(
                "target bonus",
                CriterionType::Fixed,
                Decimal::new(2_000_000, 0),
                vec![ConditionSpec {
                    description: "all targets met".to_string(),
                    rule: ConditionRule::AllTargetsMet,
                }],
            ),
            commission,
        ],
        quarterly_rewards: Vec::new(),
        annual_rewards: Vec::new(),
        penalties: vec![penalty(
            "late report",
            PenaltyType::Fixed,
            Decimal::new(100_000, 0),
            vec![unmet("report filed after the deadline")],
        )],
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryPrograms {
    programs: Arc<Mutex<HashMap<String, RewardProgram>>>,
}

impl MemoryPrograms {
    pub(crate) fn with(programs: impl IntoIterator<Item = RewardProgram>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.programs.lock().expect("program mutex poisoned");
            for program in programs {
                guard.insert(program.position.clone(), program);
            }
        }
        store
    }
}

impl RewardProgramRepository for MemoryPrograms {
    fn program_for_position(
        &self,
        position: &str,
    ) -> Result<Option<RewardProgram>, RepositoryError> {
        Ok(self
            .programs
            .lock()
            .expect("program mutex poisoned")
            .get(position)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryCalculations {
    calculations: Arc<Mutex<HashMap<CalculationId, RewardCalculation>>>,
}

impl MemoryCalculations {
    pub(crate) fn stored(&self, id: &CalculationId) -> RewardCalculation {
        self.calculations
            .lock()
            .expect("calculation mutex poisoned")
            .get(id)
            .cloned()
            .expect("calculation present")
    }

    pub(crate) fn len(&self) -> usize {
        self.calculations
            .lock()
            .expect("calculation mutex poisoned")
            .len()
    }
}

impl CalculationRepository for MemoryCalculations {
    fn create(&self, calculation: RewardCalculation) -> Result<RewardCalculation, RepositoryError> {
        let mut guard = self.calculations.lock().expect("calculation mutex poisoned");
        if guard.contains_key(&calculation.id) {
            return Err(RepositoryError::Conflict);
        }
        ensure_key_open(guard.values(), &calculation)?;
        guard.insert(calculation.id.clone(), calculation.clone());
        Ok(calculation)
    }

    fn get(&self, id: &CalculationId) -> Result<Option<RewardCalculation>, RepositoryError> {
        Ok(self
            .calculations
            .lock()
            .expect("calculation mutex poisoned")
            .get(id)
            .cloned())
    }

    fn query(&self, filter: &CalculationFilter) -> Result<Vec<RewardCalculation>, RepositoryError> {
        Ok(self
            .calculations
            .lock()
            .expect("calculation mutex poisoned")
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
        let mut guard = self.calculations.lock().expect("calculation mutex poisoned");
        let stored = guard.get(&calculation.id).ok_or(RepositoryError::NotFound)?;
        if stored.status != expected_status {
            return Err(RepositoryError::Stale);
        }
        ensure_approvable(guard.values(), &calculation)?;
        guard.insert(calculation.id.clone(), calculation.clone());
        Ok(calculation)
    }
}

/// Clock that advances one minute per reading so runs get distinct timestamps.
pub(crate) struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    pub(crate) fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            next: Mutex::new(start),
        }
    }
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).single().expect("valid time"))
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut guard = self.next.lock().expect("clock mutex poisoned");
        let now = *guard;
        *guard = now + Duration::minutes(1);
        now
    }
}

pub(crate) struct RewardHarness {
    pub service: RewardCalculationService,
    pub records: MemoryRecords,
    pub directory: MemoryDirectory,
    pub calculations: MemoryCalculations,
    pub notifications: MemoryNotifications,
}

pub(crate) fn build_reward_service(
    records: impl IntoIterator<Item = KpiRecord>,
    programs: impl IntoIterator<Item = RewardProgram>,
) -> RewardHarness {
    build_reward_service_with(records, programs, RewardSettings::default())
}

pub(crate) fn build_reward_service_with(
    records: impl IntoIterator<Item = KpiRecord>,
    programs: impl IntoIterator<Item = RewardProgram>,
    settings: RewardSettings,
) -> RewardHarness {
    let records = MemoryRecords::seeded(records);
    let directory = MemoryDirectory::standard();
    let calculations = MemoryCalculations::default();
    let notifications = MemoryNotifications::default();

    let stores = RewardStores {
        records: Arc::new(records.clone()),
        directory: Arc::new(directory.clone()),
        programs: Arc::new(MemoryPrograms::with(programs)),
        calculations: Arc::new(calculations.clone()),
        notifications: Arc::new(notifications.clone()),
    };
    let service = RewardCalculationService::new(stores, settings)
        .with_clock(Arc::new(SteppingClock::default()));

    RewardHarness {
        service,
        records,
        directory,
        calculations,
        notifications,
    }
}
