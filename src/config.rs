use crate::browser::Selector;
use std::time::Duration;

pub const DEFAULT_SITE_URL: &str = "https://stockanalysis.com/";
pub const DEFAULT_METRIC_LABEL: &str = "Return on Equity";
pub const DEFAULT_CURRENT_LABEL: &str = "Current";
pub const DEFAULT_FISCAL_PREFIX: &str = "FY ";
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct SiteContract {
    pub base_url: String,
    pub search_input: Selector,
    pub first_suggestion: Selector,
    pub financials_link: Selector,
    pub ratios_link: Selector,
    pub ratios_table: Selector,
    pub metric_label: String,
}

impl Default for SiteContract {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SITE_URL.to_string(),
            search_input: Selector::css("input[aria-label='Search']"),
            first_suggestion: Selector::css("[data-test='search-result']"),
            financials_link: Selector::link_text("Financials"),
            ratios_link: Selector::link_text("Ratios"),
            ratios_table: Selector::css("table[data-test='financials']"),
            metric_label: DEFAULT_METRIC_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Timeouts {
    pub element: Duration,
    /// How long to wait for the first search suggestion before submitting directly.
    pub suggestion: Duration,
    /// Pause after each page transition so the next page can replace the old DOM.
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(10),
            suggestion: Duration::from_secs(10),
            settle: Duration::from_millis(2000),
        }
    }
}

/// Maps a fiscal year to the header label the site uses for it. The most
/// recent period is labelled `current_label` instead of `FY <year>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLabels {
    pub current_label: String,
    pub fiscal_prefix: String,
    pub current_year: i32,
}

impl ColumnLabels {
    pub fn for_year(current_year: i32) -> Self {
        Self {
            current_label: DEFAULT_CURRENT_LABEL.to_string(),
            fiscal_prefix: DEFAULT_FISCAL_PREFIX.to_string(),
            current_year,
        }
    }

    pub fn label_for(&self, year: i32) -> String {
        if year == self.current_year {
            self.current_label.clone()
        } else {
            format!("{}{}", self.fiscal_prefix, year)
        }
    }
}

impl Default for ColumnLabels {
    fn default() -> Self {
        Self::for_year(time::OffsetDateTime::now_utc().year())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeConfig {
    pub site: SiteContract,
    pub timeouts: Timeouts,
    pub labels: ColumnLabels,
}
