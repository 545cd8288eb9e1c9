//! Concurrent Return-on-Equity scraper.
//!
//! Records are split into contiguous chunks, one per worker. Each worker owns
//! a browser session and pushes exactly one result per record into a queue;
//! a single writer thread appends every result to the output file as soon as
//! it arrives. The coordinator only stops the writer after every worker has
//! returned, so no result is lost.

pub mod browser;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod locator;
pub mod partition;
pub mod queue;
pub mod record;
pub mod result;
pub mod signal;
pub mod summary;
pub mod worker;
pub mod writer;

pub use browser::{ChromeOptions, ChromeSessionFactory, Selector, Session, SessionFactory};
pub use config::{ColumnLabels, ScrapeConfig, SiteContract, Timeouts};
pub use coordinator::{BatchOptions, BatchReport, BatchState, Coordinator};
pub use error::{DriverError, ScrapeError};
pub use extract::{metric_for_year, select_metric, TablePayload};
pub use locator::{Locator, LocatorState};
pub use partition::partition;
pub use record::{load_records, CompanyRecord, LoadedRecords};
pub use result::{ScrapeResult, ScrapeStatus};
pub use signal::Signal;
pub use summary::OutputSummary;
pub use worker::{scrape_record, ScrapeWorker, WorkerReport};
pub use writer::{CsvAppendOutput, OutputStore, ResultWriter, WriterReport};
