use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::domain::{EmployeeId, KpiId, KpiRecord, KpiRecordStatus, RecordId};
use super::lifecycle::parse_actual;

/// Failure while reading a KPI record export.
#[derive(Debug, thiserror::Error)]
pub enum RecordImportError {
    #[error("failed to read record export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid record CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
}

pub fn records_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<KpiRecord>, RecordImportError> {
    let file = std::fs::File::open(path)?;
    records_from_reader(file)
}

/// Parse `id,kpi_id,employee_id,target,actual,start_date,end_date,status` rows.
///
/// Only `id`, `kpi_id`, `employee_id`, `target` and the dates are required. A missing status
/// means `pending`; `target` is taken as-is so bad data surfaces later as an integrity finding.
pub fn records_from_reader<R: Read>(reader: R) -> Result<Vec<KpiRecord>, RecordImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<RecordRow>().enumerate() {
        let row = row?;
        // header is line 1
        records.push(row.into_record(index + 2)?);
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct RecordRow {
    id: String,
    kpi_id: String,
    employee_id: String,
    target: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    actual: Option<String>,
    start_date: String,
    end_date: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    submitted_report: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    approval_comment: Option<String>,
}

impl RecordRow {
    fn into_record(self, row: usize) -> Result<KpiRecord, RecordImportError> {
        let invalid = |message: String| RecordImportError::Row { row, message };

        let target = parse_actual(&self.target)
            .map_err(|_| invalid(format!("target '{}' is not a number", self.target)))?;
        let actual = match self.actual.as_deref() {
            Some(raw) => parse_actual(raw).map_err(|err| invalid(err.to_string()))?,
            None => Decimal::ZERO,
        };
        let start_date = parse_date(&self.start_date).map_err(invalid)?;
        let end_date = parse_date(&self.end_date).map_err(invalid)?;
        let status = match self.status.as_deref() {
            Some(raw) => KpiRecordStatus::parse(raw)
                .ok_or_else(|| invalid(format!("unknown status '{raw}'")))?,
            None => KpiRecordStatus::Pending,
        };

        // approved records never carry a rejection comment
        let approval_comment = match status {
            KpiRecordStatus::Approved => String::new(),
            _ => self.approval_comment.unwrap_or_default(),
        };

        Ok(KpiRecord {
            id: RecordId(self.id),
            kpi_id: KpiId(self.kpi_id),
            employee_id: EmployeeId(self.employee_id),
            target,
            actual,
            start_date,
            end_date,
            status,
            submitted_report: self.submitted_report.unwrap_or_default(),
            approval_comment,
            is_deleted: false,
            version: 0,
        })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
