use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::workflows::records::domain::{achievement_percent, KpiId, KpiRecord, RecordId};

/// Coarse performance bucket used for reporting. Never feeds the reward arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

/// Minimum average achievement percentage for each grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeBands {
    pub a_min: Decimal,
    pub b_min: Decimal,
    pub c_min: Decimal,
}

impl Default for GradeBands {
    fn default() -> Self {
        Self {
            a_min: Decimal::new(90, 0),
            b_min: Decimal::new(75, 0),
            c_min: Decimal::new(60, 0),
        }
    }
}

impl GradeBands {
    pub fn grade_for(&self, achievement_percent: Decimal) -> Grade {
        if achievement_percent >= self.a_min {
            Grade::A
        } else if achievement_percent >= self.b_min {
            Grade::B
        } else if achievement_percent >= self.c_min {
            Grade::C
        } else {
            Grade::D
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KpiTotals {
    pub actual: Decimal,
    pub target: Decimal,
    pub records: u32,
    /// Summed actual over summed target, as a percentage.
    pub achievement: Decimal,
}

/// Aggregate of one employee's approved records for one period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceSnapshot {
    pub approved_records: u32,
    pub records_meeting_target: u32,
    pub total_actual: Decimal,
    pub total_target: Decimal,
    pub average_achievement: Decimal,
    pub per_kpi: BTreeMap<KpiId, KpiTotals>,
}

/// An approved record whose target cannot produce an achievement figure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record {record_id} has non-positive target {target}")]
pub struct InvalidTarget {
    pub record_id: RecordId,
    pub target: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTarget),
    /// Totals or achievement no longer fit a `Decimal` once this record is added.
    #[error("figures for record {record_id} are out of range")]
    Overflow { record_id: RecordId },
}

impl PerformanceSnapshot {
    /// Aggregate `records`, which the caller has already narrowed to approved ones.
    pub fn from_records<'a, I>(records: I) -> Result<Self, SnapshotError>
    where
        I: IntoIterator<Item = &'a KpiRecord>,
    {
        let mut snapshot = Self::default();
        let mut achievement_sum = Decimal::ZERO;

        for record in records {
            if record.target <= Decimal::ZERO {
                return Err(InvalidTarget {
                    record_id: record.id.clone(),
                    target: record.target,
                }
                .into());
            }
            let overflow = || SnapshotError::Overflow {
                record_id: record.id.clone(),
            };
            let add = |total: Decimal, amount: Decimal| {
                total.checked_add(amount).ok_or_else(overflow)
            };

            let achievement = record.achievement_percent().ok_or_else(overflow)?;

            snapshot.approved_records += 1;
            if record.actual >= record.target {
                snapshot.records_meeting_target += 1;
            }
            snapshot.total_actual = add(snapshot.total_actual, record.actual)?;
            snapshot.total_target = add(snapshot.total_target, record.target)?;
            achievement_sum = add(achievement_sum, achievement)?;

            let totals = snapshot.per_kpi.entry(record.kpi_id.clone()).or_default();
            totals.actual = add(totals.actual, record.actual)?;
            totals.target = add(totals.target, record.target)?;
            totals.records += 1;
            totals.achievement =
                achievement_percent(totals.actual, totals.target).ok_or_else(overflow)?;
        }

        if snapshot.approved_records > 0 {
            // dividing by a count of at least one cannot overflow
            snapshot.average_achievement =
                (achievement_sum / Decimal::from(snapshot.approved_records)).round_dp(2);
        }

        Ok(snapshot)
    }

    pub fn all_targets_met(&self) -> bool {
        self.approved_records > 0 && self.records_meeting_target == self.approved_records
    }

    pub fn kpi_actual(&self, kpi_id: &KpiId) -> Decimal {
        self.per_kpi
            .get(kpi_id)
            .map(|totals| totals.actual)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn kpi_achievement(&self, kpi_id: &KpiId) -> Decimal {
        self.per_kpi
            .get(kpi_id)
            .map(|totals| totals.achievement)
            .unwrap_or(Decimal::ZERO)
    }

    /// `None` when there is nothing to grade.
    pub fn grade(&self, bands: &GradeBands) -> Option<Grade> {
        (self.approved_records > 0).then(|| bands.grade_for(self.average_achievement))
    }
}
