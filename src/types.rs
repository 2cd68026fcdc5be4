//! Core types: Venue, Ticker, InstrumentKey, Quote, Volume

use std::fmt;

use chrono::{DateTime, Utc};

/// Signed position size. Positive = long, negative = short.
pub type Volume = i64;

/// Quote and snapshot time.
pub type Timestamp = DateTime<Utc>;

/// Market or quote-feed identifier (e.g. `TrueFX`, `IEX`).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Venue(pub String);

impl Venue {
    pub fn new(name: &str) -> Self {
        Venue(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Instrument symbol as quoted by its venue (e.g. `EUR/USD`, `SPY`).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Ticker(pub String);

impl Ticker {
    pub fn new(symbol: &str) -> Self {
        Ticker(symbol.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a tradable instrument: the (venue, ticker) pair.
///
/// Holdings, order-book rows and history rows are all keyed by it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstrumentKey {
    pub venue: Venue,
    pub ticker: Ticker,
}

impl InstrumentKey {
    pub fn new(venue: &str, ticker: &str) -> Self {
        Self {
            venue: Venue::new(venue),
            ticker: Ticker::new(ticker),
        }
    }

    /// Parse the `VENUE:TICKER` form used in config files.
    ///
    /// The split happens on the first `:` so tickers may contain colons.
    pub fn parse(s: &str) -> Option<Self> {
        let (venue, ticker) = s.split_once(':')?;
        let venue = venue.trim();
        let ticker = ticker.trim();
        if venue.is_empty() || ticker.is_empty() {
            return None;
        }
        Some(Self::new(venue, ticker))
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.venue, self.ticker)
    }
}

/// A top-of-book quote from one venue at one instant.
///
/// Immutable once recorded into history.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quote {
    pub time: Timestamp,
    pub venue: Venue,
    pub ticker: Ticker,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
}

impl Quote {
    pub fn new(time: Timestamp, key: &InstrumentKey, bid: f64, ask: f64) -> Self {
        Self {
            time,
            venue: key.venue.clone(),
            ticker: key.ticker.clone(),
            bid,
            ask,
            bid_size: 0.0,
            ask_size: 0.0,
        }
    }

    /// Set bid and ask sizes.
    pub fn with_sizes(mut self, bid_size: f64, ask_size: f64) -> Self {
        self.bid_size = bid_size;
        self.ask_size = ask_size;
        self
    }

    pub fn key(&self) -> InstrumentKey {
        InstrumentKey {
            venue: self.venue.clone(),
            ticker: self.ticker.clone(),
        }
    }

    /// `(bid + ask) / 2`.
    #[inline]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    #[inline]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Both sides finite and positive, and not crossed.
    pub fn is_valid(&self) -> bool {
        self.bid.is_finite()
            && self.ask.is_finite()
            && self.bid > 0.0
            && self.ask > 0.0
            && self.ask >= self.bid
    }

    /// True if this quote belongs to `key`.
    pub fn is_for(&self, key: &InstrumentKey) -> bool {
        self.venue == key.venue && self.ticker == key.ticker
    }
}
