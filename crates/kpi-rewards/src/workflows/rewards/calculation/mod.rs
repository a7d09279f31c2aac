mod conditions;
mod rules;

pub use conditions::{
    ConditionEvaluator, FixedPointRate, NoCashValue, PointsConverter, RuleEvaluator,
};

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{BreakdownEntry, PenaltyEntry, RewardProgram};
use super::performance::{InvalidTarget, PerformanceSnapshot, SnapshotError};
use super::period::{PeriodError, ReportingPeriod};
use crate::error::ErrorKind;
use crate::workflows::records::domain::{EmployeeId, KpiId, KpiRecord, KpiRecordStatus, RecordId};

/// Pure reward/penalty calculator. Holds the pluggable condition and points policies and
/// nothing else, so identical inputs always produce identical outcomes.
#[derive(Clone)]
pub struct RewardEngine {
    evaluator: Arc<dyn ConditionEvaluator>,
    points: Arc<dyn PointsConverter>,
}

impl Default for RewardEngine {
    fn default() -> Self {
        Self::new(Arc::new(RuleEvaluator), Arc::new(NoCashValue))
    }
}

impl RewardEngine {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>, points: Arc<dyn PointsConverter>) -> Self {
        Self { evaluator, points }
    }

    /// Engine with the built-in rules and an optional cash rate for points.
    pub fn with_points_rate(rate: Option<Decimal>) -> Self {
        let points: Arc<dyn PointsConverter> = match rate {
            Some(rate) => Arc::new(FixedPointRate(rate)),
            None => Arc::new(NoCashValue),
        };
        Self::new(Arc::new(RuleEvaluator), points)
    }

    /// Evaluate `program` for one employee and period.
    ///
    /// Only approved, non-deleted records owned by `employee_id` whose window lies inside
    /// `period` contribute. Reward criteria come from the list matching the period's
    /// frequency and are evaluated in list order, followed by every penalty.
    pub fn calculate(
        &self,
        employee_id: &EmployeeId,
        period: &ReportingPeriod,
        program: &RewardProgram,
        records: &[KpiRecord],
    ) -> Result<CalculationOutcome, CalculationError> {
        let eligible: Vec<&KpiRecord> = eligible_records(employee_id, period, records).collect();
        let snapshot = PerformanceSnapshot::from_records(eligible.iter().copied())?;

        let mut breakdown = Vec::new();
        let mut total_reward = Decimal::ZERO;
        let mut total_points = Decimal::ZERO;
        for criterion in program.criteria_for(period.frequency) {
            let line = rules::reward_line(
                criterion,
                &snapshot,
                self.evaluator.as_ref(),
                self.points.as_ref(),
            )?;
            total_reward = checked_sum(total_reward, line.entry.reward_amount, &criterion.name)?;
            total_points = checked_sum(total_points, line.points, &criterion.name)?;
            breakdown.push(line.entry);
        }

        let mut penalties = Vec::new();
        let mut total_penalty = Decimal::ZERO;
        for criterion in &program.penalties {
            let entry = rules::penalty_line(criterion, &snapshot, self.evaluator.as_ref())?;
            total_penalty = checked_sum(total_penalty, entry.penalty_amount, &criterion.name)?;
            penalties.push(entry);
        }

        let net_amount = total_reward
            .checked_sub(total_penalty)
            .ok_or_else(|| CalculationError::AmountOverflow {
                subject: "net amount".to_string(),
            })?;

        Ok(CalculationOutcome {
            record_ids: eligible.iter().map(|record| record.id.clone()).collect(),
            snapshot,
            breakdown,
            penalties,
            total_reward,
            total_penalty,
            net_amount,
            total_points,
        })
    }
}

/// Records that feed a calculation for `employee_id` over `period`.
pub fn eligible_records<'a>(
    employee_id: &'a EmployeeId,
    period: &'a ReportingPeriod,
    records: &'a [KpiRecord],
) -> impl Iterator<Item = &'a KpiRecord> + 'a {
    records.iter().filter(move |record| {
        record.status == KpiRecordStatus::Approved
            && !record.is_deleted
            && &record.employee_id == employee_id
            && period.contains(record.start_date, record.end_date)
    })
}

fn checked_sum(total: Decimal, amount: Decimal, criterion: &str) -> Result<Decimal, CalculationError> {
    total
        .checked_add(amount)
        .ok_or_else(|| CalculationError::AmountOverflow {
            subject: format!("criterion '{criterion}'"),
        })
}

/// Amounts and audit trail produced by one engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationOutcome {
    pub record_ids: Vec<RecordId>,
    pub snapshot: PerformanceSnapshot,
    pub breakdown: Vec<BreakdownEntry>,
    pub penalties: Vec<PenaltyEntry>,
    pub total_reward: Decimal,
    pub total_penalty: Decimal,
    pub net_amount: Decimal,
    pub total_points: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum CalculationError {
    #[error(transparent)]
    MalformedPeriod(#[from] PeriodError),
    #[error("no reward program for position '{position}' (employee {employee_id})")]
    NoProgramForPosition {
        employee_id: EmployeeId,
        position: String,
    },
    #[error(transparent)]
    InvalidTarget(InvalidTarget),
    #[error("employee {employee_id} not found")]
    EmployeeNotFound { employee_id: EmployeeId },
    #[error("record {record_id} references unknown KPI {kpi_id}")]
    KpiNotFound { record_id: RecordId, kpi_id: KpiId },
    #[error("amount for {subject} is out of range")]
    AmountOverflow { subject: String },
}

impl From<SnapshotError> for CalculationError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::InvalidTarget(invalid) => CalculationError::InvalidTarget(invalid),
            SnapshotError::Overflow { record_id } => CalculationError::AmountOverflow {
                subject: format!("record {record_id}"),
            },
        }
    }
}

impl CalculationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalculationError::MalformedPeriod(_)
            | CalculationError::NoProgramForPosition { .. }
            | CalculationError::AmountOverflow { .. } => ErrorKind::Configuration,
            CalculationError::InvalidTarget(_)
            | CalculationError::EmployeeNotFound { .. }
            | CalculationError::KpiNotFound { .. } => ErrorKind::DataIntegrity,
        }
    }
}
