use crate::browser::SessionFactory;
use crate::config::{ScrapeConfig, DEFAULT_WORKERS};
use crate::partition::partition;
use crate::queue::result_queue;
use crate::record::CompanyRecord;
use crate::signal::Signal;
use crate::worker::{ScrapeWorker, WorkerReport};
use crate::writer::{OutputStore, ResultWriter, WriterReport};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use rayon::prelude::*;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Partitioning,
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub workers: usize,
    pub queue_capacity: Option<usize>,
    /// Writer dequeue timeout between stop-signal checks.
    pub poll_interval: Duration,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            poll_interval: Duration::from_secs(1),
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub input_records: usize,
    pub workers: Vec<WorkerReport>,
    pub writer: Option<WriterReport>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.workers.iter().map(|w| w.succeeded).sum()
    }

    pub fn not_found(&self) -> usize {
        self.workers.iter().map(|w| w.not_found).sum()
    }

    pub fn failed(&self) -> usize {
        self.workers.iter().map(|w| w.failed).sum()
    }

    pub fn undelivered(&self) -> usize {
        self.workers.iter().map(|w| w.undelivered).sum()
    }

    pub fn lost_sessions(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| w.session_error.is_some())
    }

    pub fn success_rate(&self) -> f64 {
        if self.input_records == 0 {
            return 0.0;
        }
        self.succeeded() as f64 / self.input_records as f64 * 100.0
    }
}

/// Supervises one batch: writer first, then workers, then the stop signal,
/// then the writer join. It never touches the results themselves.
pub struct Coordinator<'a, F> {
    factory: &'a F,
    config: &'a ScrapeConfig,
    options: BatchOptions,
    cancel: Signal,
    state: BatchState,
}

impl<'a, F> Coordinator<'a, F>
where
    F: SessionFactory + Sync,
{
    pub fn new(factory: &'a F, config: &'a ScrapeConfig, options: BatchOptions) -> Self {
        Self {
            factory,
            config,
            options,
            cancel: Signal::new(),
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Raising the returned signal makes workers skip the rest of their chunk;
    /// skipped records are still written, with a null value.
    pub fn cancel_token(&self) -> Signal {
        self.cancel.clone()
    }

    fn transition(&mut self, next: BatchState) {
        info!("Batch state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn run(&mut self, records: Vec<CompanyRecord>, store: Box<dyn OutputStore>) -> Result<BatchReport> {
        let start_time = Instant::now();
        let input_records = records.len();

        self.transition(BatchState::Partitioning);
        let chunks = partition(records, self.options.workers);
        for (i, chunk) in chunks.iter().enumerate() {
            debug!("Chunk {}: {} companies", i, chunk.len());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(chunks.len())
            .thread_name(|i| format!("scrape-worker-{}", i))
            .build()
            .context("Failed to build worker thread pool")?;
        let progress_bar = progress_bar(input_records, self.options.show_progress)?;

        let (sender, receiver) = result_queue(self.options.queue_capacity);
        match self.options.queue_capacity {
            Some(capacity) => info!("Using bounded result queue with capacity: {}", capacity),
            None => info!("Using unbounded result queue."),
        }
        let stop = Signal::new();
        let writer_thread =
            ResultWriter::new(receiver, stop.clone(), store, self.options.poll_interval).spawn()?;

        self.transition(BatchState::Running);
        info!("Starting {} workers for {} companies...", chunks.len(), input_records);
        let factory = self.factory;
        let config = self.config;
        let cancel = &self.cancel;
        let worker_reports: Vec<WorkerReport> = pool.install(|| {
            chunks
                .into_par_iter()
                .enumerate()
                .map(|(id, chunk)| {
                    ScrapeWorker::new(id, config, sender.clone(), cancel.clone(), progress_bar.clone())
                        .run(factory, chunk)
                })
                .collect()
        });
        drop(sender);

        let succeeded: usize = worker_reports.iter().map(|w| w.succeeded).sum();
        progress_bar.finish_with_message(format!(
            "Scraping finished. {} of {} companies with a value.",
            succeeded, input_records
        ));

        // Every producer has returned; only now may the writer stop.
        self.transition(BatchState::Draining);
        stop.raise();
        info!("Waiting for writer thread to finish writing remaining rows...");
        let writer = match writer_thread.join() {
            Ok(Ok(report)) => {
                info!("Writer thread finished successfully.");
                Some(report)
            }
            Ok(Err(e)) => {
                error!("Writer thread returned an error: {:#}", e);
                None
            }
            Err(e) => {
                error!("Writer thread panicked: {:?}", e);
                None
            }
        };
        self.transition(BatchState::Terminated);

        Ok(BatchReport {
            input_records,
            workers: worker_reports,
            writer,
            elapsed: start_time.elapsed(),
        })
    }
}

fn progress_bar(total: usize, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let progress_bar = ProgressBar::new(total as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec}) {msg}")
            .context("Failed to create progress bar template")?
            .progress_chars("=> "),
    );
    progress_bar.set_message("Starting scrape...");
    Ok(progress_bar)
}
