//! Out-of-band data-integrity pass over KPI records.
//!
//! Read paths never guess around broken references; they fail with a data-integrity error.
//! This sweep finds those records ahead of time so an operator can fix or retire them.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::records::domain::{EmployeeId, KpiId, KpiRecord, RecordFilter, RecordId};
use super::records::repository::{EmployeeDirectory, KpiRecordRepository, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Report findings without writing.
    ReportOnly,
    /// Soft-delete records whose employee or KPI no longer exists.
    Apply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum IntegrityProblem {
    DanglingEmployee { employee_id: EmployeeId },
    DanglingKpi { kpi_id: KpiId },
    InvalidTarget { target: Decimal },
}

impl IntegrityProblem {
    /// Dangling references are retired by soft delete; bad targets need a human.
    pub const fn repairable(&self) -> bool {
        matches!(
            self,
            IntegrityProblem::DanglingEmployee { .. } | IntegrityProblem::DanglingKpi { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityIssue {
    pub record_id: RecordId,
    #[serde(flatten)]
    pub problem: IntegrityProblem,
    pub soft_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub mode: SweepMode,
    pub scanned: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn soft_deleted(&self) -> usize {
        self.issues.iter().filter(|issue| issue.soft_deleted).count()
    }
}

pub struct IntegritySweep {
    records: Arc<dyn KpiRecordRepository>,
    directory: Arc<dyn EmployeeDirectory>,
}

impl IntegritySweep {
    pub fn new(
        records: Arc<dyn KpiRecordRepository>,
        directory: Arc<dyn EmployeeDirectory>,
    ) -> Self {
        Self { records, directory }
    }

    /// Scan every live record. Records are visited in id order so reports are stable.
    pub fn run(&self, mode: SweepMode) -> Result<IntegrityReport, RepositoryError> {
        let mut records = self.records.query(&RecordFilter::default())?;
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let mut employees: BTreeMap<EmployeeId, bool> = BTreeMap::new();
        let mut kpis: BTreeMap<KpiId, bool> = BTreeMap::new();
        let mut issues = Vec::new();

        for record in &records {
            let mut problems = Vec::new();

            if !self.employee_exists(&mut employees, &record.employee_id)? {
                problems.push(IntegrityProblem::DanglingEmployee {
                    employee_id: record.employee_id.clone(),
                });
            }
            if !self.kpi_exists(&mut kpis, &record.kpi_id)? {
                problems.push(IntegrityProblem::DanglingKpi {
                    kpi_id: record.kpi_id.clone(),
                });
            }
            if record.target <= Decimal::ZERO {
                problems.push(IntegrityProblem::InvalidTarget {
                    target: record.target,
                });
            }

            if problems.is_empty() {
                continue;
            }

            let retire = mode == SweepMode::Apply && problems.iter().any(|p| p.repairable());
            let soft_deleted = retire && self.soft_delete(record)?;

            for problem in problems {
                warn!(
                    record_id = %record.id,
                    problem = ?problem,
                    soft_deleted = soft_deleted && problem.repairable(),
                    "kpi record integrity issue"
                );
                issues.push(IntegrityIssue {
                    record_id: record.id.clone(),
                    soft_deleted: soft_deleted && problem.repairable(),
                    problem,
                });
            }
        }

        let report = IntegrityReport {
            mode,
            scanned: records.len(),
            issues,
        };
        info!(
            mode = ?mode,
            scanned = report.scanned,
            issues = report.issues.len(),
            soft_deleted = report.soft_deleted(),
            "integrity sweep finished"
        );
        Ok(report)
    }

    fn employee_exists(
        &self,
        seen: &mut BTreeMap<EmployeeId, bool>,
        id: &EmployeeId,
    ) -> Result<bool, RepositoryError> {
        if let Some(exists) = seen.get(id) {
            return Ok(*exists);
        }
        let exists = self.directory.employee(id)?.is_some();
        seen.insert(id.clone(), exists);
        Ok(exists)
    }

    fn kpi_exists(
        &self,
        seen: &mut BTreeMap<KpiId, bool>,
        id: &KpiId,
    ) -> Result<bool, RepositoryError> {
        if let Some(exists) = seen.get(id) {
            return Ok(*exists);
        }
        let exists = self.directory.kpi(id)?.is_some();
        seen.insert(id.clone(), exists);
        Ok(exists)
    }

    /// Returns `false` when another writer got there first; the record is left for the next run.
    fn soft_delete(&self, record: &KpiRecord) -> Result<bool, RepositoryError> {
        let mut retired = record.clone();
        retired.is_deleted = true;
        match self.records.update(retired, record.version) {
            Ok(_) => Ok(true),
            Err(RepositoryError::Stale) => {
                warn!(record_id = %record.id, "record changed during sweep, skipped");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
