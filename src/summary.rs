use crate::writer::OUTPUT_HEADERS;
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputSummary {
    pub total: usize,
    pub populated: usize,
    pub empty: usize,
}

impl OutputSummary {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open output file for summary: {}", path.display()))?;

        let metric_column = OUTPUT_HEADERS[2];
        let value_index = reader
            .headers()
            .with_context(|| format!("Failed to read header of: {}", path.display()))?
            .iter()
            .position(|h| h == metric_column)
            .ok_or_else(|| anyhow!("Column '{}' missing from {}", metric_column, path.display()))?;

        let mut summary = Self::default();
        for row in reader.records() {
            let row = row.with_context(|| format!("Failed to read row from: {}", path.display()))?;
            summary.total += 1;
            match row.get(value_index).map(str::trim) {
                Some(value) if !value.is_empty() => summary.populated += 1,
                _ => summary.empty += 1,
            }
        }
        Ok(summary)
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.populated as f64 / self.total as f64 * 100.0
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn counts_populated_and_empty_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roe.csv");
        fs::write(
            &path,
            "name,date,metricValue\nApple Inc,2023-06-01,28.5%\nMissing Co,2023-06-01,\nAcme,2022-01-01,4.1%\n",
        )
        .unwrap();

        let summary = OutputSummary::read(&path).unwrap();
        assert_eq!(summary, OutputSummary { total: 3, populated: 2, empty: 1 });
        assert!((summary.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(OutputSummary::read(&path).is_err());
    }

    #[test]
    fn formats_elapsed_time() {
        assert_eq!(format_elapsed(Duration::from_millis(4_250)), "4.250s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "1h 2m 5s");
    }
}
