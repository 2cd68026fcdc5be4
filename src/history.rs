//! Bounded, deduplicated price history.

use std::collections::BTreeMap;

use crate::types::{InstrumentKey, Quote, Ticker, Timestamp, Venue};

/// Composite history key. Orders by time first, so the map's first entry
/// is always the oldest.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HistoryKey {
    pub time: Timestamp,
    pub venue: Venue,
    pub ticker: Ticker,
}

impl HistoryKey {
    pub fn of(quote: &Quote) -> Self {
        Self {
            time: quote.time,
            venue: quote.venue.clone(),
            ticker: quote.ticker.clone(),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    quote: Quote,
    exported: bool,
}

/// Append-only quote log keyed by `(time, venue, ticker)`.
///
/// Holds at most one entry per key (the first one seen) and at most
/// `maxlookup × quotes_per_tick` entries, where `quotes_per_tick` is the size
/// of the most recent non-empty snapshot. Oldest entries are evicted first.
#[derive(Clone, Debug)]
pub struct PriceHistory {
    entries: BTreeMap<HistoryKey, Entry>,
    maxlookup: usize,
    capacity: usize,
}

impl PriceHistory {
    /// Create an empty history retaining `maxlookup` ticks worth of quotes.
    pub fn new(maxlookup: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            maxlookup,
            capacity: usize::MAX,
        }
    }

    /// Append a snapshot, dropping duplicates and trimming to the bound.
    ///
    /// Returns the number of quotes actually inserted.
    pub fn record(&mut self, quotes: &[Quote]) -> usize {
        let mut inserted = 0;
        for quote in quotes {
            let key = HistoryKey::of(quote);
            if self.entries.contains_key(&key) {
                continue;
            }
            self.entries.insert(
                key,
                Entry {
                    quote: quote.clone(),
                    exported: false,
                },
            );
            inserted += 1;
        }

        // An empty snapshot leaves the previous bound in place.
        if !quotes.is_empty() {
            self.capacity = self.maxlookup.saturating_mul(quotes.len());
        }
        self.trim();
        inserted
    }

    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            if self.entries.pop_first().is_none() {
                break;
            }
        }
    }

    /// Current retention bound (`usize::MAX` until the first snapshot).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn maxlookup(&self) -> usize {
        self.maxlookup
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &HistoryKey) -> Option<&Quote> {
        self.entries.get(key).map(|e| &e.quote)
    }

    pub fn contains(&self, key: &HistoryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// All quotes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Quote> {
        self.entries.values().map(|e| &e.quote)
    }

    /// Oldest retained quote.
    pub fn oldest(&self) -> Option<&Quote> {
        self.entries.first_key_value().map(|(_, e)| &e.quote)
    }

    /// The most recent `n` quotes for one instrument, oldest first.
    pub fn latest(&self, key: &InstrumentKey, n: usize) -> Vec<&Quote> {
        let mut out: Vec<&Quote> = self
            .entries
            .values()
            .rev()
            .map(|e| &e.quote)
            .filter(|q| q.is_for(key))
            .take(n)
            .collect();
        out.reverse();
        out
    }

    /// Mid prices for one instrument, oldest first.
    pub fn mids(&self, key: &InstrumentKey) -> Vec<f64> {
        self.iter().filter(|q| q.is_for(key)).map(Quote::mid).collect()
    }

    /// Quotes not yet handed to an exporter, oldest first.
    pub fn unexported(&self) -> Vec<Quote> {
        self.entries
            .values()
            .filter(|e| !e.exported)
            .map(|e| e.quote.clone())
            .collect()
    }

    /// Mark every retained quote as exported.
    pub fn mark_exported(&mut self) {
        for entry in self.entries.values_mut() {
            entry.exported = true;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
