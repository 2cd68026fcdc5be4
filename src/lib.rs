//! # pedlar
//!
//! A periodic rebalancing engine: pull quotes from one or more venues, keep a
//! multi-venue order book and a bounded price history, and move a portfolio
//! toward the targets a pluggable policy asks for without ever breaching the
//! capital limit or driving cash negative.
//!
//! ## Features
//!
//! - **Atomic rebalancing**: a target vector is applied in full or not at all
//! - **Capital limit**: gross exposure stays within `portfolio value × leverage`
//! - **Bounded history**: deduplicated on `(time, venue, ticker)`, oldest evicted first
//! - **Deterministic backtests**: replay recorded snapshots through the same loop
//! - **Pluggable collaborators**: quote sources, policies, bookkeeping and export are traits
//!
//! ## Quick Start
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use pedlar::{
//!     InstrumentKey, LoopConfig, NullBookkeeping, NullExporter, PolicyContext, Quote,
//!     RebalanceLoop, ReplaySource, TargetHoldings,
//! };
//!
//! let spy = InstrumentKey::new("IEX", "SPY");
//! let ticks = (0..10)
//!     .map(|i| {
//!         let t = Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap();
//!         vec![Quote::new(t, &spy, 99.0, 101.0)]
//!     })
//!     .collect();
//!
//! let config = LoopConfig {
//!     universe: vec![spy.clone()],
//!     maxsteps: 10,
//!     ..LoopConfig::default()
//! };
//!
//! // Hold 300 units of every instrument.
//! let policy = |ctx: &PolicyContext<'_>| TargetHoldings::uniform(ctx.universe, 300);
//!
//! let mut engine = RebalanceLoop::new(
//!     config,
//!     ReplaySource::from_snapshots(ticks),
//!     policy,
//!     NullBookkeeping,
//!     NullExporter,
//! )
//! .unwrap();
//!
//! let summary = engine.run().unwrap();
//! assert_eq!(summary.steps_completed, 10);
//! assert_eq!(engine.ledger().volume(&spy), 300);
//! assert_eq!(engine.ledger().cash(), 50_000.0 - 300.0 * 101.0);
//! ```
//!
//! ## Rejections
//!
//! A rebalance that would breach an invariant leaves holdings and cash
//! untouched and reports which one:
//!
//! ```
//! use chrono::Utc;
//! use pedlar::{InstrumentKey, LedgerError, OrderBook, PortfolioLedger, Quote, TargetHoldings};
//!
//! let spy = InstrumentKey::new("IEX", "SPY");
//! let mut book = OrderBook::new();
//! book.refresh(&[Quote::new(Utc::now(), &spy, 99.0, 101.0)]);
//!
//! let mut ledger = PortfolioLedger::new(vec![spy.clone()], 50_000.0, 2.0);
//! let target = TargetHoldings::new().with(spy.clone(), 500);
//!
//! let err = ledger.rebalance(&target, &book, Utc::now()).unwrap_err();
//! assert_eq!(err, LedgerError::Insolvency { new_cash: -500.0 });
//! assert_eq!(err.invariant(), "non_negative_cash");
//! assert_eq!(ledger.volume(&spy), 0);
//! ```

mod book;
pub mod engine;
mod error;
#[cfg(feature = "persistence")]
pub mod export;
pub mod history;
pub mod ledger;
pub mod performance;
pub mod policy;
pub mod sink;
pub mod source;
mod types;

// Re-export public API
pub use book::OrderBook;
pub use engine::{
    LoopConfig, Mode, Phase, RebalanceLoop, SessionSummary, StepOutcome, StepReport,
};
pub use error::{EngineError, LedgerError, SinkError, SourceError, TargetError};
#[cfg(feature = "persistence")]
pub use export::CsvExporter;
pub use history::{HistoryKey, PriceHistory};
pub use ledger::{
    Holdings, HoldingsSnapshot, PortfolioLedger, TargetHoldings, Transaction, TransactionSet,
};
pub use performance::{PerformanceSummary, PerformanceTracker, TRADING_DAYS};
pub use policy::{AllocationPolicy, HoldPolicy, PolicyContext, PolicyParams};
pub use sink::{Bookkeeping, ExportBatch, Exporter, NullBookkeeping, NullExporter, SessionId};
pub use source::{QuoteSource, ReplaySource};
pub use types::{InstrumentKey, Quote, Ticker, Timestamp, Venue, Volume};
