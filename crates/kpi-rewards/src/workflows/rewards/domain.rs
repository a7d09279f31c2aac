use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::performance::Grade;
use crate::workflows::records::domain::{EmployeeId, KpiId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalculationId(pub String);

impl fmt::Display for CalculationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cadence selecting the criterion list and the `period` key format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Monthly,
    Quarterly,
    Annually,
}

impl Frequency {
    pub const fn label(self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annually => "annually",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "annually" | "annual" | "yearly" => Some(Self::Annually),
            _ => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    Fixed,
    Variable,
    Percentage,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyType {
    Fixed,
    Variable,
    Percentage,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Figure a criterion reads from the employee's approved records as its `actual_value`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MetricSource {
    /// Sum of `actual` across every approved record in the period.
    #[default]
    TotalActual,
    /// Mean achievement percentage across approved records.
    AverageAchievement,
    KpiActual { kpi_id: KpiId },
    ApprovedRecords,
}

/// Declarative predicate understood by the built-in condition evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ConditionRule {
    AverageAchievementAtLeast { percent: Decimal },
    AllTargetsMet,
    MinApprovedRecords { count: u32 },
    KpiAchievementAtLeast { kpi_id: KpiId, percent: Decimal },
    TotalActualAtLeast { amount: Decimal },
    /// Evaluated outside the system (e.g. attendance) and carried on the program.
    Manual { met: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub description: String,
    #[serde(flatten)]
    pub rule: ConditionRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardCriterion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub criterion_type: CriterionType,
    pub value: Decimal,
    #[serde(default)]
    pub max_value: Option<Decimal>,
    /// Amount a `percentage` criterion applies to. Falls back to the metric when absent.
    #[serde(default)]
    pub base_value: Option<Decimal>,
    #[serde(default)]
    pub metric: MetricSource,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyCriterion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub penalty_type: PenaltyType,
    pub severity: Severity,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub max_value: Option<Decimal>,
    #[serde(default)]
    pub base_value: Option<Decimal>,
    #[serde(default)]
    pub metric: MetricSource,
    /// All conditions met means the violation occurred.
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
}

/// Versioned pay policy for one position and year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardProgram {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub position: String,
    pub year: i32,
    #[serde(default)]
    pub monthly_rewards: Vec<RewardCriterion>,
    #[serde(default)]
    pub quarterly_rewards: Vec<RewardCriterion>,
    #[serde(default)]
    pub annual_rewards: Vec<RewardCriterion>,
    #[serde(default)]
    pub penalties: Vec<PenaltyCriterion>,
}

impl RewardProgram {
    pub fn criteria_for(&self, frequency: Frequency) -> &[RewardCriterion] {
        match frequency {
            Frequency::Monthly => &self.monthly_rewards,
            Frequency::Quarterly => &self.quarterly_rewards,
            Frequency::Annually => &self.annual_rewards,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub description: String,
    pub met: bool,
}

/// One evaluated reward criterion.
///
/// `base_value` is the criterion's reference amount: the fixed/variable rate or point value,
/// or the amount a percentage applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    pub criteria_name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub criterion_type: CriterionType,
    pub base_value: Decimal,
    pub actual_value: Decimal,
    pub reward_amount: Decimal,
    pub conditions: Vec<ConditionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyEntry {
    pub criteria_name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub penalty_type: PenaltyType,
    pub severity: Severity,
    pub base_value: Decimal,
    pub actual_value: Decimal,
    pub penalty_amount: Decimal,
    pub conditions: Vec<ConditionOutcome>,
}

impl PenaltyEntry {
    pub fn violated(&self) -> bool {
        self.conditions.iter().all(|condition| condition.met)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    Calculated,
    Approved,
    Rejected,
}

impl CalculationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CalculationStatus::Calculated => "calculated",
            CalculationStatus::Approved => "approved",
            CalculationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one calculator run for `(employee_id, period, frequency)`.
///
/// Reward, penalty and net totals are stored independently; `net_amount` may be negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardCalculation {
    pub id: CalculationId,
    pub employee_id: EmployeeId,
    pub program_id: String,
    pub program_version: u32,
    pub period: String,
    pub frequency: Frequency,
    pub breakdown: Vec<BreakdownEntry>,
    pub penalties: Vec<PenaltyEntry>,
    pub total_reward: Decimal,
    pub total_penalty: Decimal,
    pub net_amount: Decimal,
    pub total_points: Decimal,
    #[serde(default)]
    pub grade: Option<Grade>,
    pub status: CalculationStatus,
    pub calculated_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RewardCalculation {
    /// Same `(employee_id, period, frequency)`.
    pub fn same_key(&self, other: &RewardCalculation) -> bool {
        self.employee_id == other.employee_id
            && self.period == other.period
            && self.frequency == other.frequency
    }

    /// History order: later `calculated_at` wins, ties go to the larger id.
    pub fn is_newer_than(&self, other: &RewardCalculation) -> bool {
        (self.calculated_at, &self.id) > (other.calculated_at, &other.id)
    }

    /// Net amount as paid out, optionally floored at zero.
    pub fn payable_amount(&self, clamp_at_zero: bool) -> Decimal {
        if clamp_at_zero {
            self.net_amount.max(Decimal::ZERO)
        } else {
            self.net_amount
        }
    }
}

/// Query filter over stored calculations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationFilter {
    pub employee_id: Option<EmployeeId>,
    pub period: Option<String>,
    pub frequency: Option<Frequency>,
    pub status: Option<CalculationStatus>,
}

impl CalculationFilter {
    pub fn for_period(employee_id: EmployeeId, period: &str, frequency: Frequency) -> Self {
        Self {
            employee_id: Some(employee_id),
            period: Some(period.to_string()),
            frequency: Some(frequency),
            status: None,
        }
    }

    pub fn matches(&self, calculation: &RewardCalculation) -> bool {
        self.employee_id
            .as_ref()
            .map_or(true, |id| &calculation.employee_id == id)
            && self
                .period
                .as_deref()
                .map_or(true, |period| calculation.period == period)
            && self
                .frequency
                .map_or(true, |frequency| calculation.frequency == frequency)
            && self
                .status
                .map_or(true, |status| calculation.status == status)
    }
}
