use anyhow::Result;
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use roe_ratio_scrape::config::{DEFAULT_CURRENT_LABEL, DEFAULT_FISCAL_PREFIX, DEFAULT_METRIC_LABEL, DEFAULT_SITE_URL};
use roe_ratio_scrape::summary::format_elapsed;
use roe_ratio_scrape::{
    load_records, BatchOptions, BatchReport, ChromeOptions, ChromeSessionFactory, ColumnLabels, Coordinator,
    CsvAppendOutput, OutputSummary, ScrapeConfig, SiteContract, Timeouts,
};
use simple_logger::SimpleLogger;
use std::time::{Duration, Instant};
use time::macros::format_description;

#[derive(Parser)]
#[command(name = "ROE Ratio Scraper")]
#[command(about = "Look up Return on Equity for a list of companies with parallel browser sessions")]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "Tab-separated input file with 'name' and 'date' columns", required = true)]
    input: String,

    #[arg(short, long, default_value = "roe_results.csv", help = "Output CSV file (appended to)")]
    output: String,

    #[arg(short, long, default_value = "4", help = "Number of parallel browser sessions (0 for one per CPU core)")]
    workers: usize,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,

    #[arg(long, help = "Only process the first N valid records")]
    limit: Option<usize>,

    #[arg(long, default_value = DEFAULT_SITE_URL, help = "Site root to start every lookup from")]
    site_url: String,

    #[arg(long, default_value = DEFAULT_METRIC_LABEL, help = "First-cell label of the metric row")]
    metric_label: String,

    #[arg(long, default_value = "10", help = "Seconds to wait for an element before giving up")]
    element_timeout: u64,

    #[arg(long, default_value = "10", help = "Seconds to wait for a search suggestion before submitting directly")]
    suggestion_timeout: u64,

    #[arg(long, default_value = "2000", help = "Milliseconds to pause after each page transition")]
    settle_ms: u64,

    #[arg(long, default_value = "1000", help = "Writer dequeue timeout in milliseconds")]
    poll_ms: u64,

    #[arg(long, help = "Bound the result queue; workers block when it is full")]
    queue_capacity: Option<usize>,

    #[arg(long, default_value = DEFAULT_CURRENT_LABEL, help = "Header label used for the current fiscal year")]
    current_label: String,

    #[arg(long, default_value = DEFAULT_FISCAL_PREFIX, help = "Prefix of past fiscal-year header labels")]
    fiscal_prefix: String,

    #[arg(long, help = "Year treated as current (defaults to this calendar year)")]
    current_year: Option<i32>,

    #[arg(long, help = "Show the browser window")]
    headful: bool,

    #[arg(long, help = "Hide the progress bar")]
    no_progress: bool,
}

impl Cli {
    fn scrape_config(&self) -> ScrapeConfig {
        let default_labels = ColumnLabels::default();
        ScrapeConfig {
            site: SiteContract {
                base_url: self.site_url.clone(),
                metric_label: self.metric_label.clone(),
                ..SiteContract::default()
            },
            timeouts: Timeouts {
                element: Duration::from_secs(self.element_timeout),
                suggestion: Duration::from_secs(self.suggestion_timeout),
                settle: Duration::from_millis(self.settle_ms),
            },
            labels: ColumnLabels {
                current_label: self.current_label.clone(),
                fiscal_prefix: self.fiscal_prefix.clone(),
                current_year: self.current_year.unwrap_or(default_labels.current_year),
            },
        }
    }
}

fn setup_logging(log_level_str: &str) -> Result<()> {
    let log_level = match log_level_str.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        other => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", other);
            LevelFilter::Info
        }
    };

    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;
    Ok(())
}

fn resolve_worker_count(requested: usize) -> usize {
    if requested == 0 {
        let cores = num_cpus::get();
        info!("Auto-detected {} CPU cores. Using {} workers.", cores, cores);
        cores
    } else {
        info!("Using {} workers.", requested);
        requested
    }
}

fn print_final_summary(start_time: Instant, report: &BatchReport, cli: &Cli) -> Result<()> {
    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Batch time: {}", format_elapsed(report.elapsed));
    info!("Companies in this run: {}", report.input_records);
    info!("  - with a value: {}", report.succeeded());
    info!("  - column or row not found: {}", report.not_found());
    info!("  - failed: {}", report.failed());
    info!("Success rate for this run: {:.2}%", report.success_rate());

    for worker in report.lost_sessions() {
        warn!(
            "Worker {} could not open a browser session; its {} companies have no value: {}",
            worker.worker_id,
            worker.assigned,
            worker.session_error.as_deref().unwrap_or("unknown error")
        );
    }
    if report.undelivered() > 0 {
        error!("{} results never reached the writer.", report.undelivered());
    }

    match &report.writer {
        Some(writer) => {
            info!("Rows written this run: {}", writer.rows_written);
            if writer.rows_failed > 0 {
                error!("Rows that could not be written: {}", writer.rows_failed);
            }
        }
        None => error!("Could not determine rows written by writer thread."),
    }

    // The file is append-only, so this covers earlier runs as well.
    let totals = OutputSummary::read(&cli.output)?;
    info!("Output file: {}", cli.output);
    info!("Total companies in output: {}", totals.total);
    info!("Successful lookups: {}", totals.populated);
    info!("Failed lookups: {}", totals.empty);
    info!("Success rate: {:.2}%", totals.success_rate());
    Ok(())
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    setup_logging(&cli.log_level)?;
    info!("Starting ROE scraper");

    let workers = resolve_worker_count(cli.workers);
    let loaded = load_records(&cli.input)?;
    if loaded.skipped > 0 {
        warn!("Skipped {} malformed input rows.", loaded.skipped);
    }

    let mut records = loaded.records;
    if let Some(limit) = cli.limit {
        if records.len() > limit {
            info!("Limiting run to the first {} of {} records.", limit, records.len());
            records.truncate(limit);
        }
    }
    if records.is_empty() {
        warn!("No usable records found in {}. Exiting.", cli.input);
        return Ok(());
    }

    let config = cli.scrape_config();
    info!(
        "Year {} maps to column '{}'; earlier years use '{}<year>'.",
        config.labels.current_year, config.labels.current_label, config.labels.fiscal_prefix
    );

    // Fails on a foreign header before any browser is launched.
    let output = CsvAppendOutput::open(&cli.output)?;
    info!("Output will be appended to: {}", output.path().display());
    let factory = ChromeSessionFactory::new(ChromeOptions {
        headless: !cli.headful,
        ..ChromeOptions::default()
    });

    let options = BatchOptions {
        workers,
        queue_capacity: cli.queue_capacity,
        poll_interval: Duration::from_millis(cli.poll_ms),
        show_progress: !cli.no_progress,
    };
    let report = Coordinator::new(&factory, &config, options).run(records, Box::new(output))?;

    print_final_summary(start_time, &report, &cli)?;
    info!("Scrape finished.");
    info!("-------------------------------------------------------");
    Ok(())
}
