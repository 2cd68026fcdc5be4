//! Allocation policy interface.
//!
//! A policy sees read-only views of the loop state and returns a target
//! holdings vector. It never touches the ledger directly.

use std::collections::BTreeMap;

use crate::book::OrderBook;
use crate::history::PriceHistory;
use crate::ledger::{Holdings, TargetHoldings};
use crate::types::InstrumentKey;

/// Free-form numeric policy parameters (`name -> value`).
pub type PolicyParams = BTreeMap<String, f64>;

/// Everything a policy may look at when choosing a target.
#[derive(Clone, Copy, Debug)]
pub struct PolicyContext<'a> {
    pub step: u64,
    pub universe: &'a [InstrumentKey],
    pub history: &'a PriceHistory,
    pub book: &'a OrderBook,
    pub holdings: &'a Holdings,
    pub cash: f64,
    pub capital_limit: f64,
    pub params: &'a PolicyParams,
}

impl PolicyContext<'_> {
    /// Numeric parameter, or `default` when unset.
    pub fn param(&self, name: &str, default: f64) -> f64 {
        self.params.get(name).copied().unwrap_or(default)
    }
}

/// Maps the current loop state to target holdings.
pub trait AllocationPolicy {
    fn target(&self, ctx: &PolicyContext<'_>) -> TargetHoldings;

    /// Strategy name used in logs and export file names.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> AllocationPolicy for F
where
    F: Fn(&PolicyContext<'_>) -> TargetHoldings,
{
    fn target(&self, ctx: &PolicyContext<'_>) -> TargetHoldings {
        self(ctx)
    }
}

impl AllocationPolicy for Box<dyn AllocationPolicy> {
    fn target(&self, ctx: &PolicyContext<'_>) -> TargetHoldings {
        (**self).target(ctx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Keeps the current holdings unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct HoldPolicy;

impl AllocationPolicy for HoldPolicy {
    fn target(&self, ctx: &PolicyContext<'_>) -> TargetHoldings {
        TargetHoldings::from_holdings(ctx.holdings)
    }

    fn name(&self) -> &str {
        "hold"
    }
}
