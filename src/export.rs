//! CSV export of flushed price history and holdings records.
//!
//! Each flush writes up to two files into the export directory:
//!
//! - `Historical_Price_{strategy}_{session}_{step}.csv`: one row per quote,
//!   in the same column layout [`ReplaySource::from_csv`] reads back.
//! - `Trade_Record_{strategy}_{session}_{step}.csv`: one row per holdings
//!   snapshot, one volume column per instrument plus cash and value.
//!
//! [`ReplaySource::from_csv`]: crate::source::ReplaySource::from_csv

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;

use crate::error::SinkError;
use crate::sink::{ExportBatch, Exporter};

/// Writes export batches as CSV files into a directory.
#[derive(Clone, Debug)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    /// Export into `dir`. The directory is created on first export.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(kind: &str, batch: &ExportBatch<'_>) -> String {
        // strategy and session are user supplied
        let clean = |s: &str| s.replace(['/', '\\', ' '], "-");
        format!(
            "{kind}_{}_{}_{}.csv",
            clean(batch.strategy),
            clean(batch.session.as_str()),
            batch.step
        )
    }

    fn write_prices(&self, path: &Path, batch: &ExportBatch<'_>) -> Result<(), SinkError> {
        let mut writer = create_new(path)?;
        writer
            .write_record(["time", "venue", "ticker", "bid", "ask", "bid_size", "ask_size"])
            .map_err(csv_error)?;
        for q in batch.prices {
            writer
                .write_record([
                    q.time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    q.venue.to_string(),
                    q.ticker.to_string(),
                    q.bid.to_string(),
                    q.ask.to_string(),
                    q.bid_size.to_string(),
                    q.ask_size.to_string(),
                ])
                .map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_holdings(&self, path: &Path, batch: &ExportBatch<'_>) -> Result<(), SinkError> {
        let mut writer = create_new(path)?;

        let mut header = vec!["time".to_string(), "step".to_string()];
        header.extend(batch.universe.iter().map(|k| k.to_string()));
        header.push("cash".to_string());
        header.push("portfolio_value".to_string());
        writer.write_record(&header).map_err(csv_error)?;

        for snap in batch.holdings {
            let mut row = vec![
                snap.time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                snap.step.to_string(),
            ];
            row.extend(
                batch
                    .universe
                    .iter()
                    .map(|k| snap.holdings.get(k).copied().unwrap_or(0).to_string()),
            );
            row.push(snap.cash.to_string());
            row.push(snap.portfolio_value.to_string());
            writer.write_record(&row).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Existing files are never truncated; a name clash is an I/O error.
fn create_new(path: &Path) -> Result<csv::Writer<File>, SinkError> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    Ok(csv::Writer::from_writer(file))
}

fn csv_error(e: csv::Error) -> SinkError {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => SinkError::Io(io),
            other => SinkError::Encode(format!("{other:?}")),
        }
    } else {
        SinkError::Encode(e.to_string())
    }
}

impl Exporter for CsvExporter {
    fn export(&mut self, batch: &ExportBatch<'_>) -> Result<Vec<PathBuf>, SinkError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut written = Vec::new();
        if !batch.prices.is_empty() {
            let path = self.dir.join(Self::file_name("Historical_Price", batch));
            self.write_prices(&path, batch)?;
            written.push(path);
        }
        if !batch.holdings.is_empty() {
            let path = self.dir.join(Self::file_name("Trade_Record", batch));
            self.write_holdings(&path, batch)?;
            written.push(path);
        }

        log::debug!(
            "exported {} quotes and {} snapshots to {}",
            batch.prices.len(),
            batch.holdings.len(),
            self.dir.display()
        );
        Ok(written)
    }
}
