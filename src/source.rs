//! Quote sources and the deterministic replay source used for backtests.

use std::collections::VecDeque;

use crate::error::SourceError;
use crate::types::{InstrumentKey, Quote};

/// Produces one quote snapshot per call.
///
/// Network implementations must bound every call with a timeout.
pub trait QuoteSource {
    /// Fetch the latest quotes for `universe`.
    ///
    /// Instruments the venue does not quote are simply absent from the result.
    fn fetch(&mut self, universe: &[InstrumentKey]) -> Result<Vec<Quote>, SourceError>;

    /// Venue name for logs.
    fn venue(&self) -> &str;
}

impl QuoteSource for Box<dyn QuoteSource> {
    fn fetch(&mut self, universe: &[InstrumentKey]) -> Result<Vec<Quote>, SourceError> {
        (**self).fetch(universe)
    }

    fn venue(&self) -> &str {
        (**self).venue()
    }
}

/// Replays pre-recorded snapshots in order, then reports
/// [`SourceError::Exhausted`].
#[derive(Clone, Debug, Default)]
pub struct ReplaySource {
    ticks: VecDeque<Vec<Quote>>,
    served: usize,
}

impl ReplaySource {
    pub fn from_snapshots(ticks: Vec<Vec<Quote>>) -> Self {
        Self {
            ticks: ticks.into(),
            served: 0,
        }
    }

    /// Group a flat quote list into ticks by timestamp, oldest first.
    pub fn from_quotes(mut quotes: Vec<Quote>) -> Self {
        quotes.sort_by_key(|q| q.time);
        let mut ticks: Vec<Vec<Quote>> = Vec::new();
        for quote in quotes {
            match ticks.last_mut() {
                Some(tick) if tick[0].time == quote.time => tick.push(quote),
                _ => ticks.push(vec![quote]),
            }
        }
        Self::from_snapshots(ticks)
    }

    /// Load a replay file with columns
    /// `time,venue,ticker,bid,ask[,bid_size,ask_size]` (RFC 3339 times).
    #[cfg(feature = "persistence")]
    pub fn from_csv(path: &std::path::Path) -> Result<Self, SourceError> {
        #[derive(serde::Deserialize)]
        struct Record {
            time: crate::types::Timestamp,
            venue: String,
            ticker: String,
            bid: f64,
            ask: f64,
            #[serde(default)]
            bid_size: f64,
            #[serde(default)]
            ask_size: f64,
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;

        let mut quotes = Vec::new();
        for (row, result) in reader.deserialize().enumerate() {
            let r: Record = result
                .map_err(|e| SourceError::Malformed(format!("{} row {}: {e}", path.display(), row + 1)))?;
            let key = InstrumentKey::new(&r.venue, &r.ticker);
            quotes.push(Quote::new(r.time, &key, r.bid, r.ask).with_sizes(r.bid_size, r.ask_size));
        }

        log::info!("loaded {} replay quotes from {}", quotes.len(), path.display());
        Ok(Self::from_quotes(quotes))
    }

    /// Ticks not yet served.
    pub fn remaining(&self) -> usize {
        self.ticks.len()
    }

    /// Ticks served so far.
    pub fn served(&self) -> usize {
        self.served
    }
}

impl QuoteSource for ReplaySource {
    fn fetch(&mut self, universe: &[InstrumentKey]) -> Result<Vec<Quote>, SourceError> {
        let tick = self.ticks.pop_front().ok_or(SourceError::Exhausted)?;
        self.served += 1;
        Ok(tick
            .into_iter()
            .filter(|q| universe.iter().any(|k| q.is_for(k)))
            .collect())
    }

    fn venue(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use chrono::{TimeZone, Utc};

    fn t(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }
    fn spy() -> InstrumentKey {
        InstrumentKey::new("IEX", "SPY")
    }
    fn qqq() -> InstrumentKey {
        InstrumentKey::new("IEX", "QQQ")
    }

    #[test]
    fn replays_then_exhausts() {
        let mut src = ReplaySource::from_snapshots(vec![
            vec![Quote::new(t(0), &spy(), 1.0, 2.0)],
            vec![Quote::new(t(1), &spy(), 1.0, 2.0)],
        ]);
        assert_eq!(src.fetch(&[spy()]).unwrap().len(), 1);
        assert_eq!(src.fetch(&[spy()]).unwrap()[0].time, t(1));
        assert_eq!(src.fetch(&[spy()]).unwrap_err(), SourceError::Exhausted);
        assert_eq!(src.served(), 2);
    }

    #[test]
    fn filters_to_universe() {
        let mut src = ReplaySource::from_snapshots(vec![vec![
            Quote::new(t(0), &spy(), 1.0, 2.0),
            Quote::new(t(0), &qqq(), 1.0, 2.0),
        ]]);
        let quotes = src.fetch(&[qqq()]).unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(quotes[0].is_for(&qqq()));
    }

    #[test]
    fn groups_quotes_by_time() {
        let src = ReplaySource::from_quotes(vec![
            Quote::new(t(1), &spy(), 1.0, 2.0),
            Quote::new(t(0), &spy(), 1.0, 2.0),
            Quote::new(t(1), &qqq(), 1.0, 2.0),
        ]);
        assert_eq!(src.remaining(), 2);
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn loads_csv() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,venue,ticker,bid,ask,bid_size,ask_size").unwrap();
        writeln!(file, "2023-11-14T22:13:20Z,IEX,SPY,99.0,101.0,100,200").unwrap();
        writeln!(file, "2023-11-14T22:13:20Z,IEX,QQQ,49.0,51.0,10,10").unwrap();
        writeln!(file, "2023-11-14T22:13:21Z,IEX,SPY,99.5,101.5,100,200").unwrap();
        file.flush().unwrap();

        let mut src = ReplaySource::from_csv(file.path()).unwrap();
        assert_eq!(src.remaining(), 2);

        let first = src.fetch(&[spy(), qqq()]).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].time, t(0));
        assert_eq!(first[0].ask_size, 200.0);
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn malformed_csv_row() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "time,venue,ticker,bid,ask").unwrap();
        writeln!(file, "not-a-time,IEX,SPY,99.0,101.0").unwrap();
        file.flush().unwrap();

        let err = ReplaySource::from_csv(file.path()).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
