use crate::error::ScrapeError;
use crate::record::CompanyRecord;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Success,
    NotFound,
    Error,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Success => "success",
            ScrapeStatus::NotFound => "not_found",
            ScrapeStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub name: String,
    pub date: Date,
    pub metric_value: Option<String>,
    pub status: ScrapeStatus,
}

impl ScrapeResult {
    pub fn success(record: &CompanyRecord, value: String) -> Self {
        Self {
            name: record.name.clone(),
            date: record.report_date,
            metric_value: Some(value),
            status: ScrapeStatus::Success,
        }
    }

    pub fn failed(record: &CompanyRecord, error: &ScrapeError) -> Self {
        Self {
            name: record.name.clone(),
            date: record.report_date,
            metric_value: None,
            status: error.status(),
        }
    }

    pub fn from_outcome(record: &CompanyRecord, outcome: &Result<String, ScrapeError>) -> Self {
        match outcome {
            Ok(value) => Self::success(record, value.clone()),
            Err(e) => Self::failed(record, e),
        }
    }
}
