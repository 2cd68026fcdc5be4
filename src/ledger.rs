//! Portfolio ledger: holdings, cash, capital limit and transactional rebalancing.
//!
//! The ledger is the only place holdings and cash change. A rebalance either
//! applies the whole target vector or nothing: every check runs against the
//! current book before the commit.

use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;
use rustc_hash::FxHashMap;

use crate::book::OrderBook;
use crate::error::{LedgerError, TargetError};
use crate::types::{InstrumentKey, Timestamp, Volume};

/// Current holdings: one row per tracked instrument.
pub type Holdings = BTreeMap<InstrumentKey, Volume>;

/// Typed target allocation produced by a policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetHoldings {
    volumes: BTreeMap<InstrumentKey, Volume>,
}

impl TargetHoldings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the current holdings (a "do nothing" target).
    pub fn from_holdings(holdings: &Holdings) -> Self {
        Self {
            volumes: holdings.clone(),
        }
    }

    /// Same volume for every instrument in `universe`.
    pub fn uniform(universe: &[InstrumentKey], volume: Volume) -> Self {
        Self {
            volumes: universe.iter().map(|k| (k.clone(), volume)).collect(),
        }
    }

    pub fn set(&mut self, key: InstrumentKey, volume: Volume) -> &mut Self {
        self.volumes.insert(key, volume);
        self
    }

    pub fn with(mut self, key: InstrumentKey, volume: Volume) -> Self {
        self.volumes.insert(key, volume);
        self
    }

    pub fn get(&self, key: &InstrumentKey) -> Option<Volume> {
        self.volumes.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InstrumentKey, &Volume)> {
        self.volumes.iter()
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Check that the target names exactly the tracked universe.
    pub fn validate(&self, universe: &[InstrumentKey]) -> Result<(), TargetError> {
        for key in self.volumes.keys() {
            if !universe.contains(key) {
                return Err(TargetError::UnknownInstrument(key.clone()));
            }
        }
        for key in universe {
            if !self.volumes.contains_key(key) {
                return Err(TargetError::MissingInstrument(key.clone()));
            }
        }
        Ok(())
    }

    pub fn into_holdings(self) -> Holdings {
        self.volumes
    }
}

impl FromIterator<(InstrumentKey, Volume)> for TargetHoldings {
    fn from_iter<I: IntoIterator<Item = (InstrumentKey, Volume)>>(iter: I) -> Self {
        Self {
            volumes: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for TargetHoldings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (key, volume) in &self.volumes {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{key}={volume}")?;
            first = false;
        }
        Ok(())
    }
}

/// Immutable record of the portfolio at one rebalance attempt.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HoldingsSnapshot {
    pub time: Timestamp,
    /// Rebalance attempt number within the session (0-based).
    pub step: u64,
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_holdings"))]
    pub holdings: Holdings,
    pub cash: f64,
    pub portfolio_value: f64,
}

/// Holdings keyed by `VENUE:TICKER` strings, so they encode as a JSON object.
#[cfg(feature = "serde")]
fn serialize_holdings<S>(holdings: &Holdings, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_map(holdings.iter().map(|(key, volume)| (key.to_string(), volume)))
}

/// One executed volume change.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Transaction {
    pub key: InstrumentKey,
    /// Signed volume change (`target - current`).
    pub delta: Volume,
    /// Execution price: ask for buys, bid for sells.
    pub price: f64,
    /// `delta × price`; positive spends cash, negative raises it.
    pub amount: f64,
}

/// Everything a committed rebalance executed.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TransactionSet {
    pub transactions: Vec<Transaction>,
    /// `Σ amount`: cash consumed by the rebalance.
    pub net_cost: f64,
}

impl TransactionSet {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }
}

/// Holdings, cash and capital limit for a fixed instrument universe.
#[derive(Clone, Debug)]
pub struct PortfolioLedger {
    universe: Vec<InstrumentKey>,
    holdings: Holdings,
    cash: f64,
    leverage: f64,
    capital_limit: f64,
    portfolio_value: f64,
    /// Last mid used to value each instrument.
    marks: FxHashMap<InstrumentKey, f64>,
    max_quote_age: Option<Duration>,
    snapshots: Vec<HoldingsSnapshot>,
    seq: u64,
}

impl PortfolioLedger {
    /// Create a ledger with zero holdings in every `universe` instrument.
    ///
    /// Portfolio value starts at `starting_cash` and the capital limit at
    /// `starting_cash × leverage`.
    pub fn new(universe: Vec<InstrumentKey>, starting_cash: f64, leverage: f64) -> Self {
        debug_assert!(starting_cash >= 0.0, "starting_cash must be non-negative, got {starting_cash}");
        let holdings = universe.iter().map(|k| (k.clone(), 0)).collect();
        Self {
            universe,
            holdings,
            cash: starting_cash,
            leverage,
            capital_limit: starting_cash * leverage,
            portfolio_value: starting_cash,
            marks: FxHashMap::default(),
            max_quote_age: None,
            snapshots: Vec::new(),
            seq: 0,
        }
    }

    /// Reject rebalances priced off quotes older than `max_age`.
    pub fn with_max_quote_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_quote_age = max_age;
        self
    }

    // === Queries ===

    pub fn universe(&self) -> &[InstrumentKey] {
        &self.universe
    }

    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    pub fn volume(&self, key: &InstrumentKey) -> Volume {
        self.holdings.get(key).copied().unwrap_or(0)
    }

    #[inline]
    pub fn cash(&self) -> f64 {
        self.cash
    }

    #[inline]
    pub fn capital_limit(&self) -> f64 {
        self.capital_limit
    }

    #[inline]
    pub fn portfolio_value(&self) -> f64 {
        self.portfolio_value
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    /// Snapshots buffered since the last [`take_snapshots`](Self::take_snapshots).
    pub fn snapshots(&self) -> &[HoldingsSnapshot] {
        &self.snapshots
    }

    /// Drain the snapshot buffer (used by flushes).
    pub fn take_snapshots(&mut self) -> Vec<HoldingsSnapshot> {
        std::mem::take(&mut self.snapshots)
    }

    // === Valuation ===

    /// Recompute `Σ volume × mid + cash` against `book`.
    ///
    /// Instruments without a valid quote in the book keep their last mark.
    pub fn mark_to_market(&mut self, book: &OrderBook) -> f64 {
        for key in &self.universe {
            if let Some(quote) = book.quote(key).filter(|q| q.is_valid()) {
                self.marks.insert(key.clone(), quote.mid());
            }
        }

        let mut value = self.cash;
        for (key, &volume) in &self.holdings {
            if volume == 0 {
                continue;
            }
            match self.marks.get(key) {
                Some(&mark) => value += volume as f64 * mark,
                None => debug!("{key}: no mark yet, valued at 0"),
            }
        }
        self.portfolio_value = value;
        value
    }

    /// `capital_limit = portfolio_value × leverage`.
    pub fn update_capital_limit(&mut self) -> f64 {
        self.capital_limit = self.portfolio_value * self.leverage;
        self.capital_limit
    }

    // === Execution ===

    /// Move holdings to `target`, all or nothing.
    ///
    /// The pre-state snapshot is recorded first, so rejected attempts are
    /// still audited. Buys execute at the ask, sells at the bid.
    pub fn rebalance(
        &mut self,
        target: &TargetHoldings,
        book: &OrderBook,
        now: Timestamp,
    ) -> Result<TransactionSet, LedgerError> {
        self.snapshots.push(HoldingsSnapshot {
            time: now,
            step: self.seq,
            holdings: self.holdings.clone(),
            cash: self.cash,
            portfolio_value: self.portfolio_value,
        });
        self.seq += 1;

        target.validate(&self.universe)?;

        // Price every instrument that is or will be held.
        let mut exposure = self.cash;
        let mut transactions = Vec::new();
        for key in &self.universe {
            let current = self.volume(key);
            let wanted = target.get(key).unwrap_or(0);
            if current == 0 && wanted == 0 {
                continue;
            }
            let delta = wanted
                .checked_sub(current)
                .ok_or_else(|| LedgerError::VolumeOverflow {
                    key: key.clone(),
                    current,
                    wanted,
                })?;

            let quote = book.fresh_quote(key, self.max_quote_age)?;
            if !quote.is_valid() {
                return Err(LedgerError::InvalidQuote(key.clone()));
            }

            exposure += wanted.unsigned_abs() as f64 * quote.mid();

            if delta != 0 {
                let price = if delta > 0 { quote.ask } else { quote.bid };
                transactions.push(Transaction {
                    key: key.clone(),
                    delta,
                    price,
                    amount: delta as f64 * price,
                });
            }
        }

        if exposure > self.capital_limit {
            return Err(LedgerError::AllocationLimitExceeded {
                exposure,
                limit: self.capital_limit,
            });
        }

        let net_cost: f64 = transactions.iter().map(|t| t.amount).sum();
        let new_cash = self.cash - net_cost;
        if new_cash < 0.0 {
            return Err(LedgerError::Insolvency { new_cash });
        }

        // Commit
        for t in &transactions {
            *self.holdings.entry(t.key.clone()).or_insert(0) += t.delta;
        }
        self.cash = new_cash;

        Ok(TransactionSet {
            transactions,
            net_cost,
        })
    }
}
