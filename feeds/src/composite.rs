//! Multi-venue feed: one snapshot assembled from several venue feeds.

use log::{debug, warn};

use pedlar::{InstrumentKey, Quote, QuoteSource, SourceError};

/// Fans a fetch out to one feed per venue and merges the results.
///
/// Each feed only sees the instruments of its own venue. A failing venue is
/// logged and skipped; the fetch fails only if every queried venue fails.
#[derive(Default)]
pub struct CompositeFeed {
    feeds: Vec<Box<dyn QuoteSource>>,
}

impl CompositeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, feed: impl QuoteSource + 'static) -> Self {
        self.feeds.push(Box::new(feed));
        self
    }

    pub fn push(&mut self, feed: Box<dyn QuoteSource>) {
        self.feeds.push(feed);
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Venue names, in query order.
    pub fn venues(&self) -> Vec<&str> {
        self.feeds.iter().map(|f| f.venue()).collect()
    }
}

impl QuoteSource for CompositeFeed {
    fn fetch(&mut self, universe: &[InstrumentKey]) -> Result<Vec<Quote>, SourceError> {
        let mut quotes = Vec::new();
        let mut queried = 0;
        let mut errors: Vec<SourceError> = Vec::new();

        for feed in &mut self.feeds {
            let venue = feed.venue().to_string();
            let share: Vec<InstrumentKey> = universe
                .iter()
                .filter(|k| k.venue.as_str() == venue)
                .cloned()
                .collect();
            if share.is_empty() {
                continue;
            }
            queried += 1;

            match feed.fetch(&share) {
                Ok(mut q) => quotes.append(&mut q),
                Err(e) => {
                    warn!("{venue}: {e} ({} instruments skipped this tick)", share.len());
                    errors.push(e);
                }
            }
        }

        if queried > 0 && errors.len() == queried {
            if errors.iter().all(|e| *e == SourceError::Exhausted) {
                return Err(SourceError::Exhausted);
            }
            let msg = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SourceError::Unavailable(msg));
        }

        let unrouted = universe
            .iter()
            .filter(|k| !self.feeds.iter().any(|f| f.venue() == k.venue.as_str()))
            .count();
        if unrouted > 0 {
            debug!("{unrouted} instruments have no feed for their venue");
        }

        Ok(quotes)
    }

    fn venue(&self) -> &str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockFeed;
    use chrono::{TimeZone, Utc};

    fn spy() -> InstrumentKey {
        InstrumentKey::new("IEX", "SPY")
    }
    fn eurusd() -> InstrumentKey {
        InstrumentKey::new("TrueFX", "EUR/USD")
    }
    fn quote(key: &InstrumentKey) -> Quote {
        Quote::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), key, 1.0, 2.0)
    }

    #[test]
    fn merges_venues() {
        let mut feed = CompositeFeed::new()
            .with_feed(MockFeed::builder().venue("IEX").with_snapshot(vec![quote(&spy())]).build())
            .with_feed(
                MockFeed::builder()
                    .venue("TrueFX")
                    .with_snapshot(vec![quote(&eurusd())])
                    .build(),
            );
        assert_eq!(feed.venues(), vec!["IEX", "TrueFX"]);

        let quotes = feed.fetch(&[spy(), eurusd()]).unwrap();
        assert_eq!(quotes.len(), 2);
    }

    #[test]
    fn one_failing_venue_is_skipped() {
        let mut feed = CompositeFeed::new()
            .with_feed(
                MockFeed::builder()
                    .venue("IEX")
                    .with_failure(SourceError::Timeout("tops".into()))
                    .build(),
            )
            .with_feed(
                MockFeed::builder()
                    .venue("TrueFX")
                    .with_snapshot(vec![quote(&eurusd())])
                    .build(),
            );

        let quotes = feed.fetch(&[spy(), eurusd()]).unwrap();
        assert_eq!(quotes.len(), 1);
        assert!(quotes[0].is_for(&eurusd()));
    }

    #[test]
    fn all_failing_is_unavailable() {
        let mut feed = CompositeFeed::new()
            .with_feed(
                MockFeed::builder()
                    .venue("IEX")
                    .with_failure(SourceError::Timeout("tops".into()))
                    .build(),
            )
            .with_feed(
                MockFeed::builder()
                    .venue("TrueFX")
                    .with_failure(SourceError::Unavailable("down".into()))
                    .build(),
            );

        let err = feed.fetch(&[spy(), eurusd()]).unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(ref m) if m.contains("tops") && m.contains("down")));
    }

    #[test]
    fn all_exhausted_is_exhausted() {
        let mut feed = CompositeFeed::new().with_feed(MockFeed::builder().venue("IEX").build());
        assert_eq!(feed.fetch(&[spy()]).unwrap_err(), SourceError::Exhausted);
    }

    #[test]
    fn venue_without_instruments_not_queried() {
        let mut feed = CompositeFeed::new()
            .with_feed(MockFeed::builder().venue("IEX").build())
            .with_feed(
                MockFeed::builder()
                    .venue("TrueFX")
                    .with_snapshot(vec![quote(&eurusd())])
                    .build(),
            );
        assert_eq!(feed.fetch(&[eurusd()]).unwrap().len(), 1);
    }
}
