//! Mock feed for testing: serves scripted snapshots and failures.
//!
//! ```
//! use chrono::Utc;
//! use pedlar::{InstrumentKey, Quote, QuoteSource, SourceError};
//! use pedlar_feeds::MockFeed;
//!
//! let spy = InstrumentKey::new("IEX", "SPY");
//! let mut feed = MockFeed::builder()
//!     .venue("IEX")
//!     .with_snapshot(vec![Quote::new(Utc::now(), &spy, 99.0, 101.0)])
//!     .with_failure(SourceError::Timeout("slow".into()))
//!     .build();
//!
//! assert_eq!(feed.fetch(&[spy.clone()]).unwrap().len(), 1);
//! assert!(feed.fetch(&[spy.clone()]).is_err());
//! assert_eq!(feed.fetch(&[spy]).unwrap_err(), SourceError::Exhausted);
//! ```

use std::collections::VecDeque;

use pedlar::{InstrumentKey, Quote, QuoteSource, SourceError};

/// One scripted fetch result.
#[derive(Clone, Debug)]
enum Scripted {
    Snapshot(Vec<Quote>),
    Failure(SourceError),
}

/// What happens once the script runs out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WhenDone {
    /// Report [`SourceError::Exhausted`].
    #[default]
    Exhaust,
    /// Keep serving the last snapshot.
    RepeatLast,
    /// Report [`SourceError::Unavailable`].
    Unavailable,
}

/// Builder for `MockFeed`.
pub struct MockFeedBuilder {
    venue: String,
    script: VecDeque<Scripted>,
    when_done: WhenDone,
}

impl MockFeedBuilder {
    pub fn venue(mut self, venue: &str) -> Self {
        self.venue = venue.to_string();
        self
    }

    pub fn with_snapshot(mut self, quotes: Vec<Quote>) -> Self {
        self.script.push_back(Scripted::Snapshot(quotes));
        self
    }

    pub fn with_failure(mut self, error: SourceError) -> Self {
        self.script.push_back(Scripted::Failure(error));
        self
    }

    pub fn when_done(mut self, when_done: WhenDone) -> Self {
        self.when_done = when_done;
        self
    }

    pub fn build(self) -> MockFeed {
        MockFeed {
            venue: self.venue,
            script: self.script,
            when_done: self.when_done,
            last: None,
            requests: Vec::new(),
        }
    }
}

/// A scripted quote source that records every request.
pub struct MockFeed {
    venue: String,
    script: VecDeque<Scripted>,
    when_done: WhenDone,
    last: Option<Vec<Quote>>,
    requests: Vec<Vec<InstrumentKey>>,
}

impl MockFeed {
    pub fn builder() -> MockFeedBuilder {
        MockFeedBuilder {
            venue: "mock".to_string(),
            script: VecDeque::new(),
            when_done: WhenDone::default(),
        }
    }

    /// Universes passed to each `fetch` call (for assertion in tests).
    pub fn requests(&self) -> &[Vec<InstrumentKey>] {
        &self.requests
    }

    /// Scripted results not yet served.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl QuoteSource for MockFeed {
    fn fetch(&mut self, universe: &[InstrumentKey]) -> Result<Vec<Quote>, SourceError> {
        self.requests.push(universe.to_vec());

        let quotes = match self.script.pop_front() {
            Some(Scripted::Snapshot(quotes)) => {
                self.last = Some(quotes.clone());
                quotes
            }
            Some(Scripted::Failure(e)) => return Err(e),
            None => match (self.when_done, &self.last) {
                (WhenDone::RepeatLast, Some(last)) => last.clone(),
                (WhenDone::Unavailable, _) => {
                    return Err(SourceError::Unavailable(format!("{}: script finished", self.venue)));
                }
                _ => return Err(SourceError::Exhausted),
            },
        };

        Ok(quotes
            .into_iter()
            .filter(|q| universe.iter().any(|k| q.is_for(k)))
            .collect())
    }

    fn venue(&self) -> &str {
        &self.venue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn spy() -> InstrumentKey {
        InstrumentKey::new("IEX", "SPY")
    }
    fn qqq() -> InstrumentKey {
        InstrumentKey::new("IEX", "QQQ")
    }
    fn quote(key: &InstrumentKey) -> Quote {
        Quote::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), key, 1.0, 2.0)
    }

    #[test]
    fn records_requests_and_filters() {
        let mut feed = MockFeed::builder()
            .venue("IEX")
            .with_snapshot(vec![quote(&spy()), quote(&qqq())])
            .build();

        let quotes = feed.fetch(&[spy()]).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(feed.requests(), &[vec![spy()]]);
        assert_eq!(feed.venue(), "IEX");
    }

    #[test]
    fn repeat_last() {
        let mut feed = MockFeed::builder()
            .with_snapshot(vec![quote(&spy())])
            .when_done(WhenDone::RepeatLast)
            .build();
        for _ in 0..3 {
            assert_eq!(feed.fetch(&[spy()]).unwrap().len(), 1);
        }
        assert_eq!(feed.remaining(), 0);
    }

    #[test]
    fn unavailable_when_done() {
        let mut feed = MockFeed::builder().when_done(WhenDone::Unavailable).build();
        assert!(matches!(feed.fetch(&[spy()]), Err(SourceError::Unavailable(_))));
    }
}
