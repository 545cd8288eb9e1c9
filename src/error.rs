use crate::result::ScrapeStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timed out after {waited_ms}ms waiting for {selector}")]
    Timeout { selector: String, waited_ms: u128 },

    /// The cached element no longer belongs to the live document.
    #[error("stale element reference")]
    StaleReference,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Per-record failure taxonomy. Every variant is converted into a null-valued
/// result by the worker; none of them stop a chunk.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("navigation failed during {step}: {source}")]
    NavigationFailure {
        step: String,
        #[source]
        source: DriverError,
    },

    #[error("column '{label}' not present in table header {available:?}")]
    ColumnNotFound {
        label: String,
        available: Vec<String>,
    },

    #[error("row '{label}' not present in ratios table")]
    MetricRowNotFound { label: String },

    #[error("browser session unavailable: {0:#}")]
    SessionUnavailable(anyhow::Error),

    #[error("batch cancelled before the record was processed")]
    Cancelled,
}

impl ScrapeError {
    pub fn status(&self) -> ScrapeStatus {
        match self {
            ScrapeError::ColumnNotFound { .. } | ScrapeError::MetricRowNotFound { .. } => {
                ScrapeStatus::NotFound
            }
            _ => ScrapeStatus::Error,
        }
    }
}
