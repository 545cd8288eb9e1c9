//! Self-healing element handle.
//!
//! A `Locator` remembers the selector it was built from and the last element
//! it resolved. Every interaction first calls [`Locator::get`], which probes
//! the cached element and transparently relocates it when the page has
//! replaced it. A missing element is reported as `None` /
//! [`ScrapeError::ElementNotFound`], never as a panic.

use crate::browser::{Selector, Session};
use crate::error::{DriverError, ScrapeError};
use crate::extract::TablePayload;
use log::debug;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorState {
    Unbound,
    Fresh,
    Stale,
}

#[derive(Debug)]
enum Binding<E> {
    Unbound,
    Fresh(E),
    Stale,
}

pub struct Locator<'s, S: Session> {
    session: &'s S,
    selector: Selector,
    timeout: Duration,
    binding: Binding<S::Element>,
}

impl<'s, S: Session> Locator<'s, S> {
    pub fn new(session: &'s S, selector: Selector, timeout: Duration) -> Self {
        Self {
            session,
            selector,
            timeout,
            binding: Binding::Unbound,
        }
    }

    pub fn state(&self) -> LocatorState {
        match self.binding {
            Binding::Unbound => LocatorState::Unbound,
            Binding::Fresh(_) => LocatorState::Fresh,
            Binding::Stale => LocatorState::Stale,
        }
    }

    pub fn get(&mut self) -> Option<S::Element> {
        if let Binding::Fresh(element) = &self.binding {
            match self.session.probe(element) {
                Ok(()) => return Some(element.clone()),
                Err(e) => {
                    debug!("Cached element for {} failed liveness probe ({}); relocating", self.selector, e);
                    self.binding = Binding::Stale;
                }
            }
        }
        self.relocate()
    }

    pub fn invalidate(&mut self) {
        if matches!(self.binding, Binding::Fresh(_)) {
            self.binding = Binding::Stale;
        }
    }

    fn relocate(&mut self) -> Option<S::Element> {
        match self.session.wait_for(&self.selector, self.timeout) {
            Ok(element) => {
                debug!("Located {}", self.selector);
                self.binding = Binding::Fresh(element.clone());
                Some(element)
            }
            Err(e) => {
                debug!("Could not locate {}: {}", self.selector, e);
                self.binding = Binding::Unbound;
                None
            }
        }
    }

    fn require(&mut self) -> Result<S::Element, ScrapeError> {
        self.get().ok_or_else(|| ScrapeError::ElementNotFound {
            selector: self.selector.to_string(),
        })
    }

    /// Runs `op` on the current element. A stale reference raised by `op`
    /// itself triggers one relocation and a single retry.
    fn with_element<T>(
        &mut self,
        action: &str,
        op: impl Fn(&S, &S::Element) -> Result<T, DriverError>,
    ) -> Result<T, ScrapeError> {
        let element = self.require()?;
        let outcome = match op(self.session, &element) {
            Err(DriverError::StaleReference) => {
                debug!("{} on {} hit a stale reference; retrying once", action, self.selector);
                self.binding = Binding::Stale;
                let element = self.require()?;
                op(self.session, &element)
            }
            other => other,
        };
        outcome.map_err(|source| ScrapeError::NavigationFailure {
            step: format!("{} {}", action, self.selector),
            source,
        })
    }

    pub fn click(&mut self) -> Result<(), ScrapeError> {
        self.with_element("click", |session, element| session.click(element))
    }

    pub fn clear(&mut self) -> Result<(), ScrapeError> {
        self.with_element("clear", |session, element| session.clear(element))
    }

    pub fn send_text(&mut self, text: &str) -> Result<(), ScrapeError> {
        self.with_element("type into", |session, element| session.type_text(element, text))
    }

    pub fn submit(&mut self) -> Result<(), ScrapeError> {
        self.with_element("submit", |session, element| session.submit(element))
    }

    pub fn read_text(&mut self) -> Result<String, ScrapeError> {
        self.with_element("read text of", |session, element| session.read_text(element))
    }

    pub fn find_children(&mut self, selector: &Selector) -> Result<Vec<S::Element>, ScrapeError> {
        self.with_element("find children of", |session, element| {
            session.find_children(element, selector)
        })
    }

    pub fn table_payload(&mut self, metric_label: &str) -> Result<TablePayload, ScrapeError> {
        self.with_element("extract table", |session, element| {
            session.table_payload(element, metric_label)
        })
    }
}
