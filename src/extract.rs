use crate::config::ColumnLabels;
use crate::error::ScrapeError;
use serde::Deserialize;

/// Typed view of the ratios table. `metric_values` is aligned index-for-index
/// with `header_labels`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    pub header_labels: Vec<String>,
    /// Second table row (period end dates); kept for diagnostics only.
    #[serde(default)]
    pub period_ending: Vec<String>,
    pub metric_values: Option<Vec<String>>,
}

impl TablePayload {
    pub fn new(header_labels: Vec<String>, metric_values: Option<Vec<String>>) -> Self {
        Self {
            header_labels,
            period_ending: Vec::new(),
            metric_values,
        }
    }
}

/// Value under the column for `target_year`, if the column and a non-blank
/// aligned cell exist.
pub fn metric_for_year(
    header_labels: &[String],
    metric_values: &[String],
    target_year: i32,
    labels: &ColumnLabels,
) -> Option<String> {
    let label = labels.label_for(target_year);
    let index = header_labels.iter().position(|h| h.trim() == label)?;
    metric_values
        .get(index)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn select_metric(
    payload: &TablePayload,
    target_year: i32,
    metric_label: &str,
    labels: &ColumnLabels,
) -> Result<String, ScrapeError> {
    let values = payload
        .metric_values
        .as_deref()
        .ok_or_else(|| ScrapeError::MetricRowNotFound {
            label: metric_label.to_string(),
        })?;

    metric_for_year(&payload.header_labels, values, target_year, labels).ok_or_else(|| {
        ScrapeError::ColumnNotFound {
            label: labels.label_for(target_year),
            available: payload.header_labels.clone(),
        }
    })
}
