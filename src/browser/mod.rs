//! Browser seam. `Session` exposes raw driver primitives; the self-healing
//! behaviour lives in [`crate::locator::Locator`], which sits on top of it.

mod chrome;

pub use chrome::{ChromeOptions, ChromeSession, ChromeSessionFactory};

use crate::error::DriverError;
use crate::extract::TablePayload;
use std::fmt;
use std::time::Duration;

/// Selector descriptor stored by a locator and replayed on every relocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    LinkText(String),
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Selector::Css(selector.into())
    }

    pub fn link_text(text: impl Into<String>) -> Self {
        Selector::LinkText(text.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(css) => write!(f, "css `{}`", css),
            Selector::LinkText(text) => write!(f, "link text `{}`", text),
        }
    }
}

/// One exclusively owned browser page. Implementations are driven from a
/// single worker thread and are released when dropped.
pub trait Session {
    type Element: Clone + fmt::Debug;

    fn navigate(&self, url: &str) -> Result<(), DriverError>;

    fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<Self::Element, DriverError>;

    /// Cheap liveness check; `StaleReference` when the element left the document.
    fn probe(&self, element: &Self::Element) -> Result<(), DriverError>;

    fn click(&self, element: &Self::Element) -> Result<(), DriverError>;

    fn clear(&self, element: &Self::Element) -> Result<(), DriverError>;

    fn type_text(&self, element: &Self::Element, text: &str) -> Result<(), DriverError>;

    fn submit(&self, element: &Self::Element) -> Result<(), DriverError>;

    fn read_text(&self, element: &Self::Element) -> Result<String, DriverError>;

    fn find_children(
        &self,
        element: &Self::Element,
        selector: &Selector,
    ) -> Result<Vec<Self::Element>, DriverError>;

    /// Header labels plus the row whose first cell carries `metric_label`.
    fn table_payload(
        &self,
        table: &Self::Element,
        metric_label: &str,
    ) -> Result<TablePayload, DriverError> {
        walk_table(self, table, metric_label)
    }
}

pub trait SessionFactory {
    type Session: Session;

    fn acquire(&self) -> anyhow::Result<Self::Session>;
}

/// Reads a table cell by cell through `find_children` and `read_text`.
pub fn walk_table<S: Session + ?Sized>(
    session: &S,
    table: &S::Element,
    metric_label: &str,
) -> Result<TablePayload, DriverError> {
    let row_selector = Selector::css("tr");
    let cell_selector = Selector::css("th, td");

    let mut payload = TablePayload::default();
    for (i, row) in session.find_children(table, &row_selector)?.iter().enumerate() {
        let texts = session
            .find_children(row, &cell_selector)?
            .iter()
            .map(|cell| session.read_text(cell).map(|text| text.trim().to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        match i {
            0 => payload.header_labels = texts,
            _ => {
                if i == 1 {
                    payload.period_ending = texts.clone();
                }
                let is_metric_row = texts.first().is_some_and(|first| first.contains(metric_label));
                if is_metric_row {
                    payload.metric_values = Some(texts);
                    break;
                }
            }
        }
    }
    Ok(payload)
}
