//! TrueFX CSV snapshot parsing.
//!
//! One line per pair:
//!
//! ```text
//! EUR/USD,1700000000000,1.10,123,1.10,135,1.10115,1.10411,1.10287
//! ticker, millis,       bid big figure, bid points, ask big figure, ask points, high, low, open
//! ```
//!
//! The price is the big figure padded or cut to four characters followed by
//! the points zero-padded to three digits: `1.1` + `23` reads as `1.10023`.

use chrono::{TimeZone, Utc};

use pedlar::{InstrumentKey, Quote};

use crate::error::FeedError;

/// Venue name for TrueFX quotes.
pub const VENUE: &str = "TrueFX";

/// Size attached to every TrueFX quote; the feed publishes prices only.
pub const QUOTE_SIZE: f64 = 100.0;

/// Pairs served without a TrueFX account.
pub const UNAUTHENTICATED_PAIRS: [&str; 10] = [
    "EUR/USD", "USD/JPY", "GBP/USD", "EUR/GBP", "USD/CHF", "EUR/JPY", "EUR/CHF", "USD/CAD",
    "AUD/USD", "GBP/JPY",
];

/// Pairs served to registered users.
pub const ALL_PAIRS: [&str; 26] = [
    "EUR/USD", "USD/JPY", "GBP/USD", "EUR/GBP", "USD/CHF", "AUD/NZD", "CAD/CHF", "CHF/JPY",
    "EUR/AUD", "EUR/CAD", "EUR/JPY", "EUR/CHF", "USD/CAD", "AUD/USD", "GBP/JPY", "AUD/CAD",
    "AUD/CHF", "AUD/JPY", "EUR/NOK", "EUR/NZD", "GBP/CAD", "GBP/CHF", "NZD/JPY", "NZD/USD",
    "USD/NOK", "USD/SEK",
];

/// Join a big figure and its points into a price.
pub fn join_price(big: &str, points: &str) -> Result<f64, FeedError> {
    let big = big.trim();
    let points: u32 = points
        .trim()
        .parse()
        .map_err(|_| FeedError::Parse(format!("bad points field {points:?}")))?;

    if big.is_empty() || !big.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(FeedError::Parse(format!("bad big figure {big:?}")));
    }

    let mut figure = big.to_string();
    if !figure.contains('.') {
        figure.push('.');
    }
    while figure.len() < 4 {
        figure.push('0');
    }
    figure.truncate(4);

    let joined = format!("{figure}{points:03}");
    joined
        .parse()
        .map_err(|_| FeedError::Parse(format!("bad price {big:?} + {points:03}")))
}

/// Parse one CSV line into a quote.
pub fn parse_line(line: &str) -> Result<Quote, FeedError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(FeedError::Parse(format!(
            "expected at least 6 fields, got {}: {line:?}",
            fields.len()
        )));
    }

    let millis: i64 = fields[1]
        .parse()
        .map_err(|_| FeedError::Parse(format!("bad timestamp {:?}", fields[1])))?;
    let time = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| FeedError::Parse(format!("timestamp out of range: {millis}")))?;

    let key = InstrumentKey::new(VENUE, fields[0]);
    let bid = join_price(fields[2], fields[3])?;
    let ask = join_price(fields[4], fields[5])?;

    Ok(Quote::new(time, &key, bid, ask).with_sizes(QUOTE_SIZE, QUOTE_SIZE))
}

/// Parse a full snapshot body. Blank lines are skipped.
pub fn parse_snapshot(body: &str) -> Result<Vec<Quote>, FeedError> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_line)
        .collect()
}
