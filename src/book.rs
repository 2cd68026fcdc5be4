//! Multi-venue order book: the latest quote per instrument.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::error::LedgerError;
use crate::types::{InstrumentKey, Quote, Timestamp};

/// Latest-known quote per (venue, ticker), rebuilt from each snapshot.
///
/// ```
/// use chrono::Utc;
/// use pedlar::{InstrumentKey, OrderBook, Quote};
///
/// let spy = InstrumentKey::new("IEX", "SPY");
/// let mut book = OrderBook::new();
/// book.refresh(&[Quote::new(Utc::now(), &spy, 99.0, 101.0)]);
///
/// assert_eq!(book.mid(&spy), Some(100.0));
/// ```
#[derive(Clone, Debug, Default)]
pub struct OrderBook {
    quotes: FxHashMap<InstrumentKey, Quote>,
    as_of: Option<Timestamp>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the book with the latest quote per instrument in `quotes`.
    ///
    /// Instruments missing from the snapshot are dropped. Within a snapshot a
    /// later timestamp wins; equal timestamps keep the first quote seen.
    pub fn refresh(&mut self, quotes: &[Quote]) {
        self.quotes.clear();
        self.as_of = None;

        for quote in quotes {
            let key = quote.key();
            match self.quotes.get(&key) {
                Some(existing) if existing.time >= quote.time => {}
                _ => {
                    self.quotes.insert(key, quote.clone());
                }
            }
            if self.as_of.is_none_or(|t| quote.time > t) {
                self.as_of = Some(quote.time);
            }
        }
    }

    /// Newest quote time in the current snapshot.
    pub fn as_of(&self) -> Option<Timestamp> {
        self.as_of
    }

    pub fn quote(&self, key: &InstrumentKey) -> Option<&Quote> {
        self.quotes.get(key)
    }

    /// Mid price, derived from the current quote.
    pub fn mid(&self, key: &InstrumentKey) -> Option<f64> {
        self.quotes.get(key).map(Quote::mid)
    }

    /// Mid prices for every instrument in the book.
    pub fn mids(&self) -> Vec<(InstrumentKey, f64)> {
        let mut mids: Vec<_> = self
            .quotes
            .iter()
            .map(|(key, q)| (key.clone(), q.mid()))
            .collect();
        mids.sort_by(|a, b| a.0.cmp(&b.0));
        mids
    }

    /// The quote for `key`, provided it is no older than `max_age` relative
    /// to [`as_of`](Self::as_of). `None` disables the age check.
    pub fn fresh_quote(
        &self,
        key: &InstrumentKey,
        max_age: Option<Duration>,
    ) -> Result<&Quote, LedgerError> {
        let quote = self
            .quotes
            .get(key)
            .ok_or_else(|| LedgerError::MissingQuote(key.clone()))?;

        if let (Some(max_age), Some(as_of)) = (max_age, self.as_of) {
            let age = (as_of - quote.time).to_std().unwrap_or(Duration::ZERO);
            if age > max_age {
                return Err(LedgerError::StaleQuote {
                    key: key.clone(),
                    age,
                    max_age,
                });
            }
        }
        Ok(quote)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstrumentKey, &Quote)> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
