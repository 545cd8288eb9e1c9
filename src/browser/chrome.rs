use super::{Selector, Session, SessionFactory};
use crate::error::DriverError;
use crate::extract::TablePayload;
use anyhow::{anyhow, Context};
use headless_chrome::protocol::cdp::DOM::NodeId;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use log::{debug, info};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const IS_CONNECTED_JS: &str = "function() { return this.isConnected; }";
const CLICK_JS: &str = "function() { this.click(); }";
const CLEAR_JS: &str = "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }";
const TEXT_JS: &str = "function() { return (this.innerText || this.textContent || '').trim(); }";

// Runs against the table element; returns a JSON string so the result comes
// back by value regardless of how the CDP call serialises objects.
const TABLE_JS: &str = r#"function(label) {
    const rows = Array.from(this.getElementsByTagName('tr'));
    const cellsOf = (row) => Array.from(row.cells).map(cell => cell.textContent.trim());
    const result = { headerLabels: [], periodEnding: [], metricValues: null };
    if (rows.length >= 1) {
        result.headerLabels = cellsOf(rows[0]);
    }
    if (rows.length >= 2) {
        result.periodEnding = cellsOf(rows[1]);
    }
    for (const row of rows.slice(1)) {
        const first = row.cells[0];
        if (first && first.textContent.includes(label)) {
            result.metricValues = cellsOf(row);
            break;
        }
    }
    return JSON.stringify(result);
}"#;

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    /// Chrome is killed by the driver after this long without CDP traffic.
    pub idle_timeout: Duration,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChromeSessionFactory {
    options: ChromeOptions,
}

impl ChromeSessionFactory {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }
}

impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    fn acquire(&self) -> anyhow::Result<ChromeSession> {
        let launch_options = LaunchOptions::default_builder()
            .headless(self.options.headless)
            .sandbox(false)
            .window_size(Some(self.options.window_size))
            .idle_browser_timeout(self.options.idle_timeout)
            .build()
            .map_err(|e| anyhow!("Invalid Chrome launch options: {}", e))?;

        let browser = Browser::new(launch_options).context("Failed to launch Chrome")?;
        let tab = browser.new_tab().context("Failed to open a browser tab")?;
        info!("Chrome session acquired (headless: {})", self.options.headless);
        Ok(ChromeSession { browser, tab })
    }
}

pub struct ChromeSession {
    // Owns the process; dropping it kills Chrome.
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn element(&self, node_id: NodeId) -> Result<Element<'_>, DriverError> {
        Element::new(&self.tab, node_id).map_err(|_| DriverError::StaleReference)
    }

    fn call(&self, node_id: NodeId, function: &str, args: Vec<Value>) -> Result<Option<Value>, DriverError> {
        let element = self.element(node_id)?;
        let object = element.call_js_fn(function, args, false)?;
        Ok(object.value)
    }
}

fn link_text_xpath(text: &str, relative: bool) -> String {
    let literal = if text.contains('\'') {
        format!("\"{}\"", text)
    } else {
        format!("'{}'", text)
    };
    let prefix = if relative { ".//" } else { "//" };
    format!("{}a[normalize-space(.)={}]", prefix, literal)
}

impl Session for ChromeSession {
    type Element = NodeId;

    fn navigate(&self, url: &str) -> Result<(), DriverError> {
        debug!("Navigating to {}", url);
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    fn wait_for(&self, selector: &Selector, timeout: Duration) -> Result<NodeId, DriverError> {
        let found = match selector {
            Selector::Css(css) => self.tab.wait_for_element_with_custom_timeout(css, timeout),
            Selector::LinkText(text) => self
                .tab
                .wait_for_xpath_with_custom_timeout(&link_text_xpath(text, false), timeout),
        };
        found.map(|element| element.node_id).map_err(|e| {
            debug!("Wait for {} ended without a match: {}", selector, e);
            DriverError::Timeout {
                selector: selector.to_string(),
                waited_ms: timeout.as_millis(),
            }
        })
    }

    fn probe(&self, element: &NodeId) -> Result<(), DriverError> {
        match self.call(*element, IS_CONNECTED_JS, Vec::new()) {
            Ok(Some(Value::Bool(true))) => Ok(()),
            _ => Err(DriverError::StaleReference),
        }
    }

    fn click(&self, element: &NodeId) -> Result<(), DriverError> {
        self.call(*element, CLICK_JS, Vec::new())?;
        Ok(())
    }

    fn clear(&self, element: &NodeId) -> Result<(), DriverError> {
        self.call(*element, CLEAR_JS, Vec::new())?;
        Ok(())
    }

    fn type_text(&self, element: &NodeId, text: &str) -> Result<(), DriverError> {
        self.element(*element)?.type_into(text)?;
        Ok(())
    }

    fn submit(&self, element: &NodeId) -> Result<(), DriverError> {
        self.element(*element)?.focus()?;
        self.tab.press_key("Enter")?;
        Ok(())
    }

    fn read_text(&self, element: &NodeId) -> Result<String, DriverError> {
        match self.call(*element, TEXT_JS, Vec::new())? {
            Some(Value::String(text)) => Ok(text),
            _ => Ok(String::new()),
        }
    }

    fn find_children(&self, element: &NodeId, selector: &Selector) -> Result<Vec<NodeId>, DriverError> {
        let parent = self.element(*element)?;
        let children = match selector {
            Selector::Css(css) => parent.find_elements(css),
            Selector::LinkText(text) => parent.find_elements_by_xpath(&link_text_xpath(text, true)),
        };
        // headless_chrome reports "no match" as an error; an empty list is the useful answer here
        Ok(children
            .map(|found| found.iter().map(|child| child.node_id).collect())
            .unwrap_or_default())
    }

    fn table_payload(&self, table: &NodeId, metric_label: &str) -> Result<TablePayload, DriverError> {
        let raw = match self.call(*table, TABLE_JS, vec![Value::String(metric_label.to_string())])? {
            Some(Value::String(raw)) => raw,
            other => {
                return Err(DriverError::Other(anyhow!(
                    "Table extraction returned an unexpected value: {:?}",
                    other
                )))
            }
        };
        let payload = serde_json::from_str(&raw).context("Failed to decode table payload")?;
        Ok(payload)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        debug!("Releasing Chrome session.");
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close during release failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_text_becomes_xpath() {
        assert_eq!(link_text_xpath("Ratios", false), "//a[normalize-space(.)='Ratios']");
        assert_eq!(link_text_xpath("Ratios", true), ".//a[normalize-space(.)='Ratios']");
        assert_eq!(link_text_xpath("Moody's", false), "//a[normalize-space(.)=\"Moody's\"]");
    }
}
