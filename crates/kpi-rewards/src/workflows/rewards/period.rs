use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::domain::Frequency;

/// A validated `period` key and the inclusive date window it denotes.
///
/// Keys are `YYYY-MM` (monthly), `YYYY-Qn` (quarterly) and `YYYY` (annually). `key` is rebuilt
/// from the parsed fields, so two spellings of one period never produce two keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportingPeriod {
    pub frequency: Frequency,
    pub key: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("period '{period}' is not a valid {frequency} period (expected {expected})")]
pub struct PeriodError {
    pub frequency: Frequency,
    pub period: String,
    pub expected: &'static str,
}

impl ReportingPeriod {
    pub fn parse(frequency: Frequency, raw: &str) -> Result<Self, PeriodError> {
        let malformed = || PeriodError {
            frequency,
            period: raw.to_string(),
            expected: expected_format(frequency),
        };

        let trimmed = raw.trim();
        let (key, start, end) = match frequency {
            Frequency::Monthly => {
                let (year, month) = trimmed.split_once('-').ok_or_else(malformed)?;
                let year = parse_year(year).ok_or_else(malformed)?;
                if month.len() != 2 || !month.bytes().all(|byte| byte.is_ascii_digit()) {
                    return Err(malformed());
                }
                let month: u32 = month.parse().map_err(|_| malformed())?;
                let (start, end) = month_bounds(year, month).ok_or_else(malformed)?;
                (format!("{year:04}-{month:02}"), start, end)
            }
            Frequency::Quarterly => {
                let (year, quarter) = trimmed.split_once("-Q").ok_or_else(malformed)?;
                let year = parse_year(year).ok_or_else(malformed)?;
                let quarter: u32 = match quarter {
                    "1" => 1,
                    "2" => 2,
                    "3" => 3,
                    "4" => 4,
                    _ => return Err(malformed()),
                };
                let first_month = (quarter - 1) * 3 + 1;
                let (start, _) = month_bounds(year, first_month).ok_or_else(malformed)?;
                let (_, end) = month_bounds(year, first_month + 2).ok_or_else(malformed)?;
                (format!("{year:04}-Q{quarter}"), start, end)
            }
            Frequency::Annually => {
                let year = parse_year(trimmed).ok_or_else(malformed)?;
                let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(malformed)?;
                let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(malformed)?;
                (format!("{year:04}"), start, end)
            }
        };

        Ok(Self {
            frequency,
            key,
            start,
            end,
        })
    }

    /// The period of `frequency` that contains `date`.
    pub fn for_date(frequency: Frequency, date: NaiveDate) -> Self {
        let key = match frequency {
            Frequency::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
            Frequency::Quarterly => format!("{:04}-Q{}", date.year(), (date.month() - 1) / 3 + 1),
            Frequency::Annually => format!("{:04}", date.year()),
        };
        // the key is built from a real date, so it always parses
        Self::parse(frequency, &key).unwrap_or_else(|_| Self {
            frequency,
            key,
            start: date,
            end: date,
        })
    }

    /// Whether a record window lies entirely inside this period.
    pub fn contains(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start >= self.start && end <= self.end && start <= end
    }
}

fn expected_format(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Monthly => "YYYY-MM",
        Frequency::Quarterly => "YYYY-Qn",
        Frequency::Annually => "YYYY",
    }
}

fn parse_year(raw: &str) -> Option<i32> {
    if raw.len() != 4 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}
