use crate::browser::{Session, SessionFactory};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::extract::select_metric;
use crate::locator::Locator;
use crate::queue::ResultSender;
use crate::record::CompanyRecord;
use crate::result::{ScrapeResult, ScrapeStatus};
use crate::signal::Signal;
use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub assigned: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Results the queue refused because the writer was already gone.
    pub undelivered: usize,
    /// Set when no browser session could be acquired; the whole chunk was
    /// emitted as null results.
    pub session_error: Option<String>,
}

impl WorkerReport {
    fn record(&mut self, status: ScrapeStatus) {
        match status {
            ScrapeStatus::Success => self.succeeded += 1,
            ScrapeStatus::NotFound => self.not_found += 1,
            ScrapeStatus::Error => self.failed += 1,
        }
    }
}

pub struct ScrapeWorker<'a> {
    id: usize,
    config: &'a ScrapeConfig,
    sender: ResultSender,
    cancel: Signal,
    progress: ProgressBar,
}

impl<'a> ScrapeWorker<'a> {
    pub fn new(
        id: usize,
        config: &'a ScrapeConfig,
        sender: ResultSender,
        cancel: Signal,
        progress: ProgressBar,
    ) -> Self {
        Self {
            id,
            config,
            sender,
            cancel,
            progress,
        }
    }

    pub fn run<F: SessionFactory>(&self, factory: &F, chunk: Vec<CompanyRecord>) -> WorkerReport {
        let mut report = WorkerReport {
            worker_id: self.id,
            assigned: chunk.len(),
            ..Default::default()
        };
        if chunk.is_empty() {
            debug!("Worker {} has an empty chunk; not opening a session.", self.id);
            return report;
        }
        if self.cancel.is_raised() {
            warn!("Worker {}: batch cancelled before start; skipping {} companies.", self.id, chunk.len());
            for record in &chunk {
                self.deliver(ScrapeResult::failed(record, &ScrapeError::Cancelled), &mut report);
            }
            return report;
        }

        // Released on every exit path when it goes out of scope.
        let session = match factory.acquire() {
            Ok(session) => session,
            Err(e) => {
                let err = ScrapeError::SessionUnavailable(e);
                error!(
                    "Worker {}: {}. Its {} companies are recorded as failed.",
                    self.id,
                    err,
                    chunk.len()
                );
                for record in &chunk {
                    self.deliver(ScrapeResult::failed(record, &err), &mut report);
                }
                report.session_error = Some(err.to_string());
                return report;
            }
        };

        info!("Worker {} starts processing {} companies...", self.id, chunk.len());
        for record in &chunk {
            if self.cancel.is_raised() {
                self.deliver(ScrapeResult::failed(record, &ScrapeError::Cancelled), &mut report);
                continue;
            }

            let outcome = scrape_record(&session, self.config, record);
            match &outcome {
                Ok(value) => info!(
                    "Worker {}: {} ({}) -> {}",
                    self.id,
                    record.name,
                    record.resolved_year(),
                    value
                ),
                Err(e) => warn!(
                    "Worker {}: no value for {} ({}): {}",
                    self.id,
                    record.name,
                    record.resolved_year(),
                    e
                ),
            }
            self.deliver(ScrapeResult::from_outcome(record, &outcome), &mut report);
        }

        if self.cancel.is_raised() {
            warn!("Worker {} stopped early: batch was cancelled.", self.id);
        }
        info!(
            "Worker {} finished: {} ok, {} not found, {} failed.",
            self.id, report.succeeded, report.not_found, report.failed
        );
        report
    }

    // Only results the writer will see count toward the status totals.
    fn deliver(&self, result: ScrapeResult, report: &mut WorkerReport) {
        let status = result.status;
        match self.sender.enqueue(result) {
            Ok(()) => report.record(status),
            Err(e) => {
                error!("Worker {}: {}", self.id, e);
                report.undelivered += 1;
            }
        }
        self.progress.inc(1);
    }
}

fn settle(pause: Duration) {
    if !pause.is_zero() {
        thread::sleep(pause);
    }
}

/// Drives one lookup: search, open Financials then Ratios, read the table and
/// pick the column for the record's fiscal year.
pub fn scrape_record<S: Session>(
    session: &S,
    config: &ScrapeConfig,
    record: &CompanyRecord,
) -> Result<String, ScrapeError> {
    let site = &config.site;
    let timeouts = &config.timeouts;

    session
        .navigate(&site.base_url)
        .map_err(|source| ScrapeError::NavigationFailure {
            step: format!("open {}", site.base_url),
            source,
        })?;

    let mut search = Locator::new(session, site.search_input.clone(), timeouts.element);
    search.clear()?;
    search.send_text(&record.name)?;

    let mut suggestion = Locator::new(session, site.first_suggestion.clone(), timeouts.suggestion);
    let submitted_via_suggestion = match suggestion.get() {
        Some(_) => match suggestion.click() {
            Ok(()) => true,
            Err(e) => {
                debug!("Suggestion click for {} failed ({}); submitting directly", record.name, e);
                false
            }
        },
        None => false,
    };
    if !submitted_via_suggestion {
        debug!("Submitting search for {} without a suggestion", record.name);
        search.submit()?;
    }
    settle(timeouts.settle);

    Locator::new(session, site.financials_link.clone(), timeouts.element).click()?;
    settle(timeouts.settle);

    Locator::new(session, site.ratios_link.clone(), timeouts.element).click()?;
    settle(timeouts.settle);

    let mut table = Locator::new(session, site.ratios_table.clone(), timeouts.element);
    let payload = table.table_payload(&site.metric_label)?;
    debug!(
        "{}: header {:?}, period ending {:?}, metric row {:?}",
        record.name, payload.header_labels, payload.period_ending, payload.metric_values
    );

    select_metric(&payload, record.resolved_year(), &site.metric_label, &config.labels)
}
