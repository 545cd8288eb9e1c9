use anyhow::{Context, Result};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use time::macros::format_description;
use time::Date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    pub name: String,
    pub report_date: Date,
}

impl CompanyRecord {
    pub fn new(name: impl Into<String>, report_date: Date) -> Self {
        Self {
            name: name.into(),
            report_date,
        }
    }

    pub fn parse(name: &str, date: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        parse_report_date(date).map(|report_date| Self::new(name, report_date))
    }

    pub fn resolved_year(&self) -> i32 {
        self.report_date.year()
    }
}

#[derive(Debug, Deserialize)]
struct InputRow {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<CompanyRecord>,
    pub skipped: usize,
}

/// Accepts ISO and slash dates with or without zero padding, US-style
/// `M/D/YYYY`, compact `YYYYMMDD`, or a datetime starting with any of those.
pub fn parse_report_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    let date_part = raw.split([' ', 'T']).next().unwrap_or(raw);

    let formats = [
        format_description!("[year]-[month padding:none]-[day padding:none]"),
        format_description!("[year]/[month padding:none]/[day padding:none]"),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
        format_description!("[year][month][day]"),
    ];
    formats
        .iter()
        .find_map(|format| Date::parse(date_part, *format).ok())
}

/// Reads the tab-separated record source. Malformed rows are skipped, never fatal.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<LoadedRecords> {
    let path = path.as_ref();
    info!("Reading company records from: {}", path.display());

    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(file);

    let mut loaded = LoadedRecords::default();
    for (i, row) in reader.deserialize::<InputRow>().enumerate() {
        // +2: header line and 1-based numbering
        let line = i + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping malformed row at line {}: {}", line, e);
                loaded.skipped += 1;
                continue;
            }
        };

        let (Some(name), Some(date)) = (row.name.as_deref(), row.date.as_deref()) else {
            warn!("Skipping row at line {}: missing name or date", line);
            loaded.skipped += 1;
            continue;
        };

        match CompanyRecord::parse(name, date) {
            Some(record) => loaded.records.push(record),
            None => {
                warn!("Skipping row at line {}: unusable name '{}' or date '{}'", line, name, date);
                loaded.skipped += 1;
            }
        }
    }

    debug!(
        "Finished reading {}: {} records kept, {} skipped",
        path.display(),
        loaded.records.len(),
        loaded.skipped
    );
    Ok(loaded)
}
