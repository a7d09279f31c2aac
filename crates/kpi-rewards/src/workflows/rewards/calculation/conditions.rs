use rust_decimal::Decimal;

use super::super::domain::{ConditionRule, ConditionSpec, MetricSource};
use super::super::performance::PerformanceSnapshot;

/// Decides whether one program condition holds for an employee's period snapshot.
///
/// Programs may describe conditions the built-in rules cannot express; deployments plug in
/// their own evaluator for those.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, condition: &ConditionSpec, snapshot: &PerformanceSnapshot) -> bool;
}

/// Evaluator for the declarative [`ConditionRule`] set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEvaluator;

impl ConditionEvaluator for RuleEvaluator {
    fn evaluate(&self, condition: &ConditionSpec, snapshot: &PerformanceSnapshot) -> bool {
        match &condition.rule {
            ConditionRule::AverageAchievementAtLeast { percent } => {
                snapshot.approved_records > 0 && snapshot.average_achievement >= *percent
            }
            ConditionRule::AllTargetsMet => snapshot.all_targets_met(),
            ConditionRule::MinApprovedRecords { count } => snapshot.approved_records >= *count,
            ConditionRule::KpiAchievementAtLeast { kpi_id, percent } => {
                snapshot.per_kpi.contains_key(kpi_id)
                    && snapshot.kpi_achievement(kpi_id) >= *percent
            }
            ConditionRule::TotalActualAtLeast { amount } => snapshot.total_actual >= *amount,
            ConditionRule::Manual { met } => *met,
        }
    }
}

/// Converts accumulated reward points into money.
pub trait PointsConverter: Send + Sync {
    fn to_amount(&self, points: Decimal) -> Decimal;
}

/// Points are tracked but carry no cash value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCashValue;

impl PointsConverter for NoCashValue {
    fn to_amount(&self, _points: Decimal) -> Decimal {
        Decimal::ZERO
    }
}

/// Every point is worth a fixed amount.
#[derive(Debug, Clone, Copy)]
pub struct FixedPointRate(pub Decimal);

impl PointsConverter for FixedPointRate {
    fn to_amount(&self, points: Decimal) -> Decimal {
        points.saturating_mul(self.0)
    }
}

pub(crate) fn metric_value(source: &MetricSource, snapshot: &PerformanceSnapshot) -> Decimal {
    match source {
        MetricSource::TotalActual => snapshot.total_actual,
        MetricSource::AverageAchievement => snapshot.average_achievement,
        MetricSource::KpiActual { kpi_id } => snapshot.kpi_actual(kpi_id),
        MetricSource::ApprovedRecords => Decimal::from(snapshot.approved_records),
    }
}
