//! Reward and penalty calculation over approved KPI records, plus the calculation approval gate.

pub mod calculation;
pub mod domain;
pub mod period;
pub mod performance;
pub mod repository;
pub mod service;

#[cfg(test)]
mod tests;

pub use calculation::{
    CalculationError, CalculationOutcome, ConditionEvaluator, FixedPointRate, NoCashValue,
    PointsConverter, RewardEngine, RuleEvaluator,
};
pub use domain::{
    BreakdownEntry, CalculationFilter, CalculationId, CalculationStatus, ConditionOutcome,
    ConditionRule, ConditionSpec, CriterionType, Frequency, MetricSource, PenaltyCriterion,
    PenaltyEntry, PenaltyType, RewardCalculation, RewardCriterion, RewardProgram, Severity,
};
pub use performance::{Grade, GradeBands, InvalidTarget, KpiTotals, PerformanceSnapshot, SnapshotError};
pub use period::{PeriodError, ReportingPeriod};
pub use repository::{
    ensure_approvable, ensure_key_open, CalculationRepository, RewardProgramRepository,
};
pub use service::{
    Clock, GateError, RewardCalculationService, RewardServiceError, RewardStores, SystemClock,
};
