use rust_decimal::Decimal;

use super::super::domain::{
    BreakdownEntry, ConditionOutcome, ConditionSpec, CriterionType, PenaltyCriterion,
    PenaltyEntry, PenaltyType, RewardCriterion,
};
use super::super::performance::PerformanceSnapshot;
use super::conditions::{metric_value, ConditionEvaluator, PointsConverter};
use super::CalculationError;

pub(crate) struct RewardLine {
    pub entry: BreakdownEntry,
    pub points: Decimal,
}

fn evaluate_conditions(
    conditions: &[ConditionSpec],
    snapshot: &PerformanceSnapshot,
    evaluator: &dyn ConditionEvaluator,
) -> (Vec<ConditionOutcome>, bool) {
    let outcomes: Vec<ConditionOutcome> = conditions
        .iter()
        .map(|condition| ConditionOutcome {
            description: condition.description.clone(),
            met: evaluator.evaluate(condition, snapshot),
        })
        .collect();
    let all_met = outcomes.iter().all(|outcome| outcome.met);
    (outcomes, all_met)
}

fn overflow(criterion: &str) -> CalculationError {
    CalculationError::AmountOverflow {
        subject: format!("criterion '{criterion}'"),
    }
}

fn capped(amount: Decimal, max_value: Option<Decimal>) -> Decimal {
    match max_value {
        Some(cap) if amount > cap => cap,
        _ => amount,
    }
}

fn percent_of(base: Decimal, rate: Decimal, criterion: &str) -> Result<Decimal, CalculationError> {
    base.checked_mul(rate)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| overflow(criterion))
}

pub(crate) fn reward_line(
    criterion: &RewardCriterion,
    snapshot: &PerformanceSnapshot,
    evaluator: &dyn ConditionEvaluator,
    converter: &dyn PointsConverter,
) -> Result<RewardLine, CalculationError> {
    let (conditions, qualified) = evaluate_conditions(&criterion.conditions, snapshot, evaluator);
    let actual_value = metric_value(&criterion.metric, snapshot);
    let name = criterion.name.as_str();

    let mut points = Decimal::ZERO;
    let (base_value, reward_amount) = match criterion.criterion_type {
        CriterionType::Fixed => (criterion.value, criterion.value),
        CriterionType::Variable => {
            let raw = criterion
                .value
                .checked_mul(actual_value)
                .ok_or_else(|| overflow(name))?;
            (criterion.value, raw)
        }
        CriterionType::Percentage => {
            let base = criterion.base_value.unwrap_or(actual_value);
            (base, percent_of(base, criterion.value, name)?)
        }
        CriterionType::Points => {
            if qualified {
                points = criterion.value;
            }
            (criterion.value, converter.to_amount(points))
        }
    };

    let reward_amount = if qualified {
        capped(reward_amount, criterion.max_value)
    } else {
        Decimal::ZERO
    };

    Ok(RewardLine {
        entry: BreakdownEntry {
            criteria_name: criterion.name.clone(),
            description: criterion.description.clone(),
            criterion_type: criterion.criterion_type,
            base_value,
            actual_value,
            reward_amount,
            conditions,
        },
        points,
    })
}

pub(crate) fn penalty_line(
    criterion: &PenaltyCriterion,
    snapshot: &PerformanceSnapshot,
    evaluator: &dyn ConditionEvaluator,
) -> Result<PenaltyEntry, CalculationError> {
    let (conditions, violated) = evaluate_conditions(&criterion.conditions, snapshot, evaluator);
    let actual_value = metric_value(&criterion.metric, snapshot);
    let name = criterion.name.as_str();

    let (base_value, penalty_amount) = match criterion.penalty_type {
        PenaltyType::Fixed => (criterion.value, criterion.value),
        PenaltyType::Variable => {
            let raw = criterion
                .value
                .checked_mul(actual_value)
                .ok_or_else(|| overflow(name))?;
            (criterion.value, raw)
        }
        PenaltyType::Percentage => {
            let base = criterion.base_value.unwrap_or(actual_value);
            (base, percent_of(base, criterion.value, name)?)
        }
        PenaltyType::Warning => (criterion.value, Decimal::ZERO),
    };

    let penalty_amount = if violated {
        capped(penalty_amount, criterion.max_value)
    } else {
        Decimal::ZERO
    };

    Ok(PenaltyEntry {
        criteria_name: criterion.name.clone(),
        description: criterion.description.clone(),
        penalty_type: criterion.penalty_type,
        severity: criterion.severity,
        base_value,
        actual_value,
        penalty_amount,
        conditions,
    })
}
