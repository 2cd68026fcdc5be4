//! IEX TOPS response types.

use chrono::{TimeZone, Utc};
use serde::Deserialize;

use pedlar::{InstrumentKey, Quote};

use crate::error::FeedError;

/// Venue name for IEX quotes.
pub const VENUE: &str = "IEX";

/// One row of `GET /tops`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tops {
    pub symbol: String,
    #[serde(default)]
    pub bid_price: f64,
    #[serde(default)]
    pub ask_price: f64,
    #[serde(default)]
    pub bid_size: f64,
    #[serde(default)]
    pub ask_size: f64,
    /// Epoch milliseconds.
    pub last_updated: i64,
}

impl Tops {
    /// Zero prices (no resting interest) are passed through unchanged.
    pub fn to_quote(&self) -> Result<Quote, FeedError> {
        let time = Utc
            .timestamp_millis_opt(self.last_updated)
            .single()
            .ok_or_else(|| {
                FeedError::Parse(format!(
                    "{}: lastUpdated out of range: {}",
                    self.symbol, self.last_updated
                ))
            })?;
        let key = InstrumentKey::new(VENUE, &self.symbol);
        Ok(Quote::new(time, &key, self.bid_price, self.ask_price)
            .with_sizes(self.bid_size, self.ask_size))
    }
}

/// Parse a TOPS body into quotes.
pub fn parse_tops(body: &str) -> Result<Vec<Quote>, FeedError> {
    let rows: Vec<Tops> =
        serde_json::from_str(body).map_err(|e| FeedError::Parse(format!("tops: {e}")))?;
    rows.iter().map(Tops::to_quote).collect()
}
