//! IEX equity quote feed.

pub mod client;
pub mod types;

use std::time::Duration;

use log::debug;

use pedlar::{InstrumentKey, Quote, QuoteSource, SourceError};

use crate::error::FeedError;
use crate::tickers_for;
use client::IexClient;
pub use types::{Tops, VENUE, parse_tops};

/// IEX TOPS feed implementing [`QuoteSource`].
pub struct IexFeed {
    client: IexClient,
}

impl IexFeed {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        Self::with_base_url(client::DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        Ok(Self {
            client: IexClient::new(base_url, timeout)?,
        })
    }
}

impl QuoteSource for IexFeed {
    fn fetch(&mut self, universe: &[InstrumentKey]) -> Result<Vec<Quote>, SourceError> {
        let symbols = tickers_for(universe, VENUE);
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.client.tops(&symbols)?;
        debug!("IEX returned {} of {} symbols", rows.len(), symbols.len());

        let mut quotes = Vec::with_capacity(rows.len());
        for row in &rows {
            let quote = row.to_quote()?;
            if universe.iter().any(|k| quote.is_for(k)) {
                quotes.push(quote);
            }
        }
        Ok(quotes)
    }

    fn venue(&self) -> &str {
        VENUE
    }
}
