use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a KPI record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KpiId(pub String);

macro_rules! display_id {
    ($($name:ident),*) => {
        $(impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(RecordId, EmployeeId, KpiId);

/// Workflow state of a single KPI assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiRecordStatus {
    Pending,
    AwaitingApproval,
    Approved,
    Rejected,
}

impl KpiRecordStatus {
    pub const fn label(self) -> &'static str {
        match self {
            KpiRecordStatus::Pending => "pending",
            KpiRecordStatus::AwaitingApproval => "awaiting_approval",
            KpiRecordStatus::Approved => "approved",
            KpiRecordStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "awaiting_approval" => Some(Self::AwaitingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for KpiRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One KPI assigned to one employee for one date window.
///
/// `kpi_id` and `employee_id` are not enforced by the store; consumers that need the referenced
/// entities look them up through [`EmployeeDirectory`](super::repository::EmployeeDirectory) and
/// report a data-integrity error when they are missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiRecord {
    pub id: RecordId,
    pub kpi_id: KpiId,
    pub employee_id: EmployeeId,
    pub target: Decimal,
    pub actual: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: KpiRecordStatus,
    #[serde(default)]
    pub submitted_report: String,
    #[serde(default)]
    pub approval_comment: String,
    #[serde(default)]
    pub is_deleted: bool,
    /// Optimistic-concurrency token; bumped by the store on every accepted write.
    #[serde(default)]
    pub version: u64,
}

impl KpiRecord {
    /// Fresh assignment as created when a KPI is handed to an employee.
    pub fn assigned(
        id: RecordId,
        kpi_id: KpiId,
        employee_id: EmployeeId,
        target: Decimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            kpi_id,
            employee_id,
            target,
            actual: Decimal::ZERO,
            start_date,
            end_date,
            status: KpiRecordStatus::Pending,
            submitted_report: String::new(),
            approval_comment: String::new(),
            is_deleted: false,
            version: 0,
        }
    }

    /// Achievement as a percentage of target. `None` when the target is not positive or the
    /// figure is out of range; callers check the target first to tell the two apart.
    pub fn achievement_percent(&self) -> Option<Decimal> {
        achievement_percent(self.actual, self.target)
    }

    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }
}

/// `actual / target × 100` rounded to two places, computed without panicking.
pub fn achievement_percent(actual: Decimal, target: Decimal) -> Option<Decimal> {
    if target <= Decimal::ZERO {
        return None;
    }
    actual
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(target))
        .map(|percent| percent.round_dp(2))
}

/// Employee attributes the core needs: the position selects the reward program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    pub id: EmployeeId,
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiDefinition {
    pub id: KpiId,
    pub name: String,
    #[serde(default)]
    pub unit: String,
}

/// Client-side query filter over KPI records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub employee_id: Option<EmployeeId>,
    pub status: Option<KpiRecordStatus>,
    /// Keep records whose window overlaps `[start, end]`.
    pub overlapping: Option<(NaiveDate, NaiveDate)>,
    pub include_deleted: bool,
}

impl RecordFilter {
    pub fn for_employee(employee_id: EmployeeId) -> Self {
        Self {
            employee_id: Some(employee_id),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: KpiRecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn overlapping(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.overlapping = Some((start, end));
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn matches(&self, record: &KpiRecord) -> bool {
        if record.is_deleted && !self.include_deleted {
            return false;
        }
        if let Some(employee_id) = &self.employee_id {
            if &record.employee_id != employee_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some((start, end)) = self.overlapping {
            if !record.overlaps(start, end) {
                return false;
            }
        }
        true
    }
}
