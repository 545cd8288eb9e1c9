#![allow(dead_code)]

use anyhow::anyhow;
use roe_ratio_scrape::browser::walk_table;
use roe_ratio_scrape::{
    ColumnLabels, DriverError, ScrapeConfig, Selector, Session, SessionFactory, SiteContract, TablePayload,
    Timeouts,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const CURRENT_YEAR: i32 = 2025;

pub fn test_config() -> ScrapeConfig {
    ScrapeConfig {
        site: SiteContract::default(),
        timeouts: Timeouts {
            element: Duration::from_millis(50),
            suggestion: Duration::from_millis(10),
            settle: Duration::ZERO,
        },
        labels: ColumnLabels::for_year(CURRENT_YEAR),
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// What the ratios page looks like for one company.
#[derive(Debug, Clone)]
pub enum Listing {
    /// Served through the script-style `table_payload` override.
    Payload(TablePayload),
    /// Served cell by cell through `find_children` / `read_text`.
    Grid(Vec<Vec<String>>),
    /// Search works but clicking "Financials" fails.
    BrokenFinancials,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    site: SiteContract,
    listings: HashMap<String, Listing>,
    suggestions: bool,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            site: SiteContract::default(),
            listings: HashMap::new(),
            suggestions: true,
        }
    }
}

impl Catalog {
    pub fn with_payload(mut self, name: &str, headers: &[&str], values: &[&str]) -> Self {
        let payload = TablePayload::new(strings(headers), Some(strings(values)));
        self.listings.insert(name.to_string(), Listing::Payload(payload));
        self
    }

    pub fn with_listing(mut self, name: &str, listing: Listing) -> Self {
        self.listings.insert(name.to_string(), listing);
        self
    }

    pub fn with_grid(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let grid = rows.iter().map(|row| strings(row)).collect();
        self.listings.insert(name.to_string(), Listing::Grid(grid));
        self
    }

    pub fn with_broken_financials(mut self, name: &str) -> Self {
        self.listings.insert(name.to_string(), Listing::BrokenFinancials);
        self
    }

    pub fn without_suggestions(mut self) -> Self {
        self.suggestions = false;
        self
    }
}

pub struct StubSite {
    catalog: Arc<Catalog>,
    failing_sessions: AtomicUsize,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl StubSite {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            failing_sessions: AtomicUsize::new(0),
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The next `n` acquisitions fail.
    pub fn failing_sessions(self, n: usize) -> Self {
        self.failing_sessions.store(n, Ordering::SeqCst);
        self
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl SessionFactory for StubSite {
    type Session = StubSession;

    fn acquire(&self) -> anyhow::Result<StubSession> {
        let should_fail = self
            .failing_sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(anyhow!("chrome failed to start"));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(StubSession {
            catalog: Arc::clone(&self.catalog),
            page: RefCell::new(Page::Blank),
            generation: Cell::new(0),
            stale_clicks: Cell::new(0),
            appear_delay: Cell::new(Duration::ZERO),
            released: Arc::clone(&self.released),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Page {
    Blank,
    Home { query: String },
    NoResults,
    Quote(String),
    Financials(String),
    Ratios(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    SearchInput,
    Suggestion,
    FinancialsLink,
    RatiosLink,
    Table,
    Row(usize),
    Cell(usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubElement {
    generation: u64,
    node: Node,
}

pub struct StubSession {
    catalog: Arc<Catalog>,
    page: RefCell<Page>,
    generation: Cell<u64>,
    stale_clicks: Cell<u32>,
    appear_delay: Cell<Duration>,
    released: Arc<AtomicUsize>,
}

impl StubSession {
    /// Re-renders the page: same content, every previously handed-out element goes stale.
    pub fn rerender(&self) {
        self.generation.set(self.generation.get() + 1);
    }

    /// The next `n` clicks re-render the page underneath the click.
    pub fn make_next_clicks_stale(&self, n: u32) {
        self.stale_clicks.set(n);
    }

    /// Elements only show up `delay` after a lookup starts.
    pub fn delay_elements(&self, delay: Duration) {
        self.appear_delay.set(delay);
    }

    pub fn on_ratios_page(&self) -> bool {
        matches!(*self.page.borrow(), Page::Ratios(_))
    }

    fn go(&self, page: Page) {
        *self.page.borrow_mut() = page;
        self.rerender();
    }

    fn element(&self, node: Node) -> StubElement {
        StubElement {
            generation: self.generation.get(),
            node,
        }
    }

    fn live(&self, element: &StubElement) -> Result<Node, DriverError> {
        if element.generation == self.generation.get() {
            Ok(element.node)
        } else {
            Err(DriverError::StaleReference)
        }
    }

    fn listing(&self, name: &str) -> Option<&Listing> {
        self.catalog.listings.get(name)
    }

    fn grid(&self) -> Option<Vec<Vec<String>>> {
        match &*self.page.borrow() {
            Page::Ratios(name) => match self.listing(name) {
                Some(Listing::Grid(rows)) => Some(rows.clone()),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Drop for StubSession {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Session for StubSession {
    type Element = StubElement;

    fn navigate(&self, _url: &str) -> Result<(), DriverError> {
        self.go(Page::Home { query: String::new() });
        Ok(())
    }

    fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<StubElement, DriverError> {
        let site = &self.catalog.site;
        let page = self.page.borrow().clone();
        let node = match page {
            Page::Home { .. } if *selector == site.search_input => Some(Node::SearchInput),
            Page::Home { ref query } if *selector == site.first_suggestion => {
                (self.catalog.suggestions && self.listing(query).is_some()).then_some(Node::Suggestion)
            }
            Page::Quote(_) if *selector == site.financials_link => Some(Node::FinancialsLink),
            Page::Financials(_) if *selector == site.ratios_link => Some(Node::RatiosLink),
            Page::Ratios(_) if *selector == site.ratios_table => Some(Node::Table),
            _ => None,
        };
        let timed_out = || DriverError::Timeout {
            selector: selector.to_string(),
            waited_ms: timeout.as_millis(),
        };
        let node = node.ok_or_else(timed_out)?;

        let delay = self.appear_delay.get();
        if delay > timeout {
            thread::sleep(timeout);
            return Err(timed_out());
        }
        thread::sleep(delay);
        Ok(self.element(node))
    }

    fn probe(&self, element: &StubElement) -> Result<(), DriverError> {
        self.live(element).map(|_| ())
    }

    fn click(&self, element: &StubElement) -> Result<(), DriverError> {
        let node = self.live(element)?;
        if self.stale_clicks.get() > 0 {
            self.stale_clicks.set(self.stale_clicks.get() - 1);
            self.rerender();
            return Err(DriverError::StaleReference);
        }

        let page = self.page.borrow().clone();
        match (node, page) {
            (Node::Suggestion, Page::Home { query }) => self.go(Page::Quote(query)),
            (Node::FinancialsLink, Page::Quote(name)) => match self.listing(&name) {
                Some(Listing::BrokenFinancials) => {
                    return Err(DriverError::Other(anyhow!("net::ERR_ABORTED loading financials")))
                }
                _ => self.go(Page::Financials(name)),
            },
            (Node::RatiosLink, Page::Financials(name)) => self.go(Page::Ratios(name)),
            _ => {}
        }
        Ok(())
    }

    fn clear(&self, element: &StubElement) -> Result<(), DriverError> {
        self.live(element)?;
        if let Page::Home { query } = &mut *self.page.borrow_mut() {
            query.clear();
        }
        Ok(())
    }

    fn type_text(&self, element: &StubElement, text: &str) -> Result<(), DriverError> {
        self.live(element)?;
        if let Page::Home { query } = &mut *self.page.borrow_mut() {
            query.push_str(text);
        }
        Ok(())
    }

    fn submit(&self, element: &StubElement) -> Result<(), DriverError> {
        self.live(element)?;
        let page = self.page.borrow().clone();
        if let Page::Home { query } = page {
            if self.listing(&query).is_some() {
                self.go(Page::Quote(query));
            } else {
                self.go(Page::NoResults);
            }
        }
        Ok(())
    }

    fn read_text(&self, element: &StubElement) -> Result<String, DriverError> {
        let text = match self.live(element)? {
            Node::Cell(r, c) => self
                .grid()
                .and_then(|grid| grid.get(r).and_then(|row| row.get(c)).cloned())
                .unwrap_or_default(),
            _ => String::new(),
        };
        Ok(text)
    }

    fn find_children(&self, element: &StubElement, selector: &Selector) -> Result<Vec<StubElement>, DriverError> {
        let node = self.live(element)?;
        let Some(grid) = self.grid() else {
            return Ok(Vec::new());
        };
        let children = match (node, selector) {
            (Node::Table, Selector::Css(css)) if css == "tr" => {
                (0..grid.len()).map(|r| self.element(Node::Row(r))).collect()
            }
            (Node::Row(r), Selector::Css(css)) if css == "th, td" => {
                let width = grid.get(r).map(Vec::len).unwrap_or(0);
                (0..width).map(|c| self.element(Node::Cell(r, c))).collect()
            }
            _ => Vec::new(),
        };
        Ok(children)
    }

    fn table_payload(&self, table: &StubElement, metric_label: &str) -> Result<TablePayload, DriverError> {
        self.live(table)?;
        let page = self.page.borrow().clone();
        match page {
            Page::Ratios(name) => match self.listing(&name) {
                Some(Listing::Payload(payload)) => Ok(payload.clone()),
                _ => walk_table(self, table, metric_label),
            },
            _ => Err(DriverError::StaleReference),
        }
    }
}

/// Reads the output CSV back as `(name, date, metricValue)` triples.
pub fn read_rows(path: &Path) -> Vec<(String, String, String)> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers, vec!["name", "date", "metricValue"]);
    reader
        .records()
        .map(|row| {
            let row = row.unwrap();
            (row[0].to_string(), row[1].to_string(), row[2].to_string())
        })
        .collect()
}
