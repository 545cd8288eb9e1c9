use crate::queue::{Dequeue, ResultReceiver};
use crate::result::ScrapeResult;
use crate::signal::Signal;
use anyhow::{bail, Context, Result};
use csv::{Reader, Writer};
use log::{debug, error, info};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use time::macros::format_description;

pub const OUTPUT_HEADERS: [&str; 3] = ["name", "date", "metricValue"];

/// Durable sink for results. Each `append` must be persisted before it returns.
pub trait OutputStore: Send {
    fn append(&mut self, result: &ScrapeResult) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Append-only CSV file; the header is written once, when the file is new.
pub struct CsvAppendOutput {
    writer: Writer<File>,
    file_path: PathBuf,
}

impl CsvAppendOutput {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory structure for: {}", file_path.display()))?;
        }

        let needs_header = fs::metadata(&file_path).map(|m| m.len() == 0).unwrap_or(true);
        if !needs_header {
            check_existing_header(&file_path)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .with_context(|| format!("Failed to open output file: {}", file_path.display()))?;

        let mut writer = Writer::from_writer(file);
        if needs_header {
            writer
                .write_record(OUTPUT_HEADERS)
                .with_context(|| format!("Failed to write header to: {}", file_path.display()))?;
            writer
                .flush()
                .with_context(|| format!("Failed to flush header to: {}", file_path.display()))?;
            debug!("Created output file with header: {}", file_path.display());
        } else {
            info!("Appending to existing output file: {}", file_path.display());
        }

        Ok(Self { writer, file_path })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

// Rows are appended positionally, so an existing file must already carry our columns.
fn check_existing_header(path: &Path) -> Result<()> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open existing output file: {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of existing output file: {}", path.display()))?;
    if !headers.iter().eq(OUTPUT_HEADERS) {
        bail!(
            "Existing output file {} has header '{}', expected '{}'. Choose another --output path.",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(","),
            OUTPUT_HEADERS.join(",")
        );
    }
    Ok(())
}

impl OutputStore for CsvAppendOutput {
    fn append(&mut self, result: &ScrapeResult) -> Result<()> {
        let date = result
            .date
            .format(format_description!("[year]-[month]-[day]"))
            .context("Failed to format report date")?;
        self.writer.write_record([
            result.name.as_str(),
            date.as_str(),
            result.metric_value.as_deref().unwrap_or(""),
        ])?;
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush row to: {}", self.file_path.display()))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", self.file_path.display()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub rows_written: usize,
    pub rows_with_value: usize,
    pub rows_failed: usize,
}

pub struct ResultWriter {
    receiver: ResultReceiver,
    stop: Signal,
    store: Box<dyn OutputStore>,
    poll_interval: Duration,
}

impl ResultWriter {
    pub fn new(
        receiver: ResultReceiver,
        stop: Signal,
        store: Box<dyn OutputStore>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            receiver,
            stop,
            store,
            poll_interval,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<Result<WriterReport>>> {
        thread::Builder::new()
            .name("result-writer".to_string())
            .spawn(move || self.run())
            .context("Failed to spawn writer thread")
    }

    /// Exits only once the stop signal is raised and the queue is empty, or
    /// when every producer has hung up and the queue is drained.
    pub fn run(mut self) -> Result<WriterReport> {
        info!("Writer thread started.");
        let mut report = WriterReport::default();

        while !self.stop.is_raised() || !self.receiver.is_empty() {
            match self.receiver.dequeue_timeout(self.poll_interval) {
                Dequeue::Item(result) => match self.store.append(&result) {
                    Ok(()) => {
                        report.rows_written += 1;
                        if result.metric_value.is_some() {
                            report.rows_with_value += 1;
                        }
                        debug!("Writer persisted row for '{}' ({})", result.name, result.status.as_str());
                    }
                    Err(e) => {
                        report.rows_failed += 1;
                        error!("Writer failed to persist row for '{}': {:#}", result.name, e);
                    }
                },
                Dequeue::TimedOut => continue,
                Dequeue::Closed => {
                    debug!("All producers disconnected; writer has nothing left to drain.");
                    break;
                }
            }
        }

        self.store.flush()?;
        info!(
            "Writer thread finished. Wrote {} rows ({} with a value, {} failed).",
            report.rows_written, report.rows_with_value, report.rows_failed
        );
        Ok(report)
    }
}
