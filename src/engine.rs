//! The rebalance loop: a single-threaded state machine that owns every piece
//! of session state and drives the collaborators.
//!
//! ```text
//! Idle ─start─▶ Initializing ─▶ Stepping ⇄ Flushing
//!                                   │
//!                                finish
//!                                   ▼
//!                               Finished
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};

use crate::book::OrderBook;
use crate::error::{EngineError, LedgerError, SinkError, SourceError};
use crate::history::PriceHistory;
use crate::ledger::{HoldingsSnapshot, PortfolioLedger, TargetHoldings, TransactionSet};
use crate::performance::{PerformanceTracker, TRADING_DAYS};
use crate::policy::{AllocationPolicy, PolicyContext, PolicyParams};
use crate::sink::{Bookkeeping, ExportBatch, Exporter, SessionId};
use crate::source::QuoteSource;
use crate::types::{InstrumentKey, Timestamp};

/// Longest uninterrupted slice of the live pacing sleep.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Lifecycle phase of a [`RebalanceLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Initializing,
    Stepping,
    Flushing,
    Finished,
}

/// How the loop is paced and whether it talks to bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Wall-clock paced; registers a bookkeeping session.
    Live { interval: Duration },
    /// Runs as fast as the source delivers; no session registration.
    Backtest,
}

impl Mode {
    pub fn is_live(&self) -> bool {
        matches!(self, Mode::Live { .. })
    }
}

/// Session parameters, fixed for the lifetime of a loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub user: String,
    pub strategy: String,
    /// Tracked instruments. Fixed at start.
    pub universe: Vec<InstrumentKey>,
    pub starting_cash: f64,
    pub leverage: f64,
    pub maxsteps: u64,
    /// History retention in ticks.
    pub maxlookup: usize,
    /// Flush every N steps (0 disables periodic flushes).
    pub flush_every: u64,
    pub mode: Mode,
    /// Reject rebalances priced off quotes older than this, relative to the
    /// newest quote in the snapshot.
    pub max_quote_age: Option<Duration>,
    pub periods_per_year: f64,
    pub risk_free: f64,
    pub params: PolicyParams,
    /// Failed holdings posts kept for retry; oldest are dropped beyond this.
    pub pending_post_limit: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            user: "anonymous".into(),
            strategy: "custom".into(),
            universe: Vec::new(),
            starting_cash: 50_000.0,
            leverage: 2.0,
            maxsteps: 1_000_000,
            maxlookup: 1_000,
            flush_every: 200,
            mode: Mode::Backtest,
            max_quote_age: None,
            periods_per_year: TRADING_DAYS,
            risk_free: 0.0,
            params: PolicyParams::new(),
            pending_post_limit: 1_000,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.universe.is_empty() {
            return Err(EngineError::Config("universe must not be empty".into()));
        }
        let mut seen = self.universe.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.universe.len() {
            return Err(EngineError::Config("universe contains duplicate instruments".into()));
        }
        if !self.starting_cash.is_finite() || self.starting_cash < 0.0 {
            return Err(EngineError::Config(format!(
                "starting_cash must be a non-negative number, got {}",
                self.starting_cash
            )));
        }
        if !self.leverage.is_finite() || self.leverage <= 0.0 {
            return Err(EngineError::Config(format!(
                "leverage must be positive, got {}",
                self.leverage
            )));
        }
        if self.maxlookup == 0 {
            return Err(EngineError::Config("maxlookup must be at least 1".into()));
        }
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(EngineError::Config("periods_per_year must be positive".into()));
        }
        if let Mode::Live { interval } = self.mode {
            if interval.is_zero() {
                return Err(EngineError::Config("live interval must be non-zero".into()));
            }
        }
        Ok(())
    }
}

/// What happened in one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Rebalanced(TransactionSet),
    /// The policy's target breached an invariant; nothing was applied.
    Rejected {
        target: TargetHoldings,
        error: LedgerError,
    },
    /// Fetch failed; nothing else ran this tick.
    Skipped(SourceError),
    /// The source has no more data; the loop should finish.
    Exhausted,
}

/// Per-step result handed to [`RebalanceLoop::run_with`] callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Step counter after this step.
    pub step: u64,
    pub outcome: StepOutcome,
    pub portfolio_value: f64,
    pub pnl: f64,
    pub sharpe: f64,
    pub flushed: bool,
}

/// End-of-session report.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SessionSummary {
    pub session: SessionId,
    pub strategy: String,
    pub steps_completed: u64,
    pub skipped_ticks: u64,
    pub rejected: u64,
    pub invalid_targets: u64,
    pub final_value: f64,
    pub pnl: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub interrupted: bool,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Session {} ({})", self.session, self.strategy)?;
        writeln!(f, "  Steps:           {:>12}", self.steps_completed)?;
        writeln!(f, "  Skipped ticks:   {:>12}", self.skipped_ticks)?;
        writeln!(f, "  Rejected:        {:>12}", self.rejected)?;
        writeln!(f, "  Invalid targets: {:>12}", self.invalid_targets)?;
        writeln!(f, "  Final value:     {:>12.2}", self.final_value)?;
        writeln!(f, "  P&L:             {:>12.2}", self.pnl)?;
        writeln!(f, "  Sharpe:          {:>12.4}", self.sharpe)?;
        write!(f, "  Max drawdown:    {:>11.2}%", self.max_drawdown * 100.0)?;
        if self.interrupted {
            write!(f, "\n  (interrupted)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    skipped: u64,
    rejected: u64,
    invalid_targets: u64,
}

/// Periodic rebalancing loop over a quote source, a policy and two sinks.
pub struct RebalanceLoop<S, P, B, E> {
    config: LoopConfig,
    source: S,
    policy: P,
    bookkeeping: B,
    exporter: E,

    phase: Phase,
    step: u64,
    session: Option<SessionId>,
    book: OrderBook,
    history: PriceHistory,
    ledger: PortfolioLedger,
    performance: PerformanceTracker,
    pending_posts: VecDeque<HoldingsSnapshot>,
    /// Snapshots whose export failed, retried with the next flush.
    export_backlog: Vec<HoldingsSnapshot>,
    counters: Counters,
    exhausted: bool,
    stop: Arc<AtomicBool>,
    summary: Option<SessionSummary>,
}

impl<S, P, B, E> RebalanceLoop<S, P, B, E>
where
    S: QuoteSource,
    P: AllocationPolicy,
    B: Bookkeeping,
    E: Exporter,
{
    /// Build an idle loop. The configuration is validated here.
    pub fn new(
        config: LoopConfig,
        source: S,
        policy: P,
        bookkeeping: B,
        exporter: E,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let ledger = PortfolioLedger::new(config.universe.clone(), config.starting_cash, config.leverage)
            .with_max_quote_age(config.max_quote_age);
        let performance = PerformanceTracker::new(
            config.starting_cash,
            config.periods_per_year,
            config.risk_free,
        );
        let history = PriceHistory::new(config.maxlookup);

        Ok(Self {
            config,
            source,
            policy,
            bookkeeping,
            exporter,
            phase: Phase::Idle,
            step: 0,
            session: None,
            book: OrderBook::new(),
            history,
            ledger,
            performance,
            pending_posts: VecDeque::new(),
            export_backlog: Vec::new(),
            counters: Counters::default(),
            exhausted: false,
            stop: Arc::new(AtomicBool::new(false)),
            summary: None,
        })
    }

    // === Accessors ===

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn performance(&self) -> &PerformanceTracker {
        &self.performance
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn bookkeeping(&self) -> &B {
        &self.bookkeeping
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    /// Holdings posts waiting for the next flush.
    pub fn pending_posts(&self) -> usize {
        self.pending_posts.len()
    }

    /// Flag that ends the run at the next step boundary or sleep slice.
    ///
    /// Setting it is terminal: the loop flushes and finishes.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn expect_phase(&self, expected: Phase, action: &'static str) -> Result<(), EngineError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidPhase {
                action,
                actual: self.phase,
            })
        }
    }

    // === Lifecycle ===

    /// `Idle → Initializing → Stepping`.
    ///
    /// In live mode the bookkeeping session is registered here. A failed
    /// registration is logged and a local session id is used instead.
    pub fn start(&mut self) -> Result<&SessionId, EngineError> {
        self.expect_phase(Phase::Idle, "start")?;
        self.phase = Phase::Initializing;

        info!(
            "starting {} for {}: {} instruments, cash {:.2}, leverage {}, {:?}",
            self.config.strategy,
            self.config.user,
            self.config.universe.len(),
            self.config.starting_cash,
            self.config.leverage,
            self.config.mode
        );

        let session = if self.config.mode.is_live() {
            match self
                .bookkeeping
                .register_session(&self.config.user, &self.config.strategy)
            {
                Ok(id) => {
                    info!("registered trade session {id}");
                    id
                }
                Err(e) => {
                    let id = SessionId::local(Utc::now());
                    warn!("session registration failed ({e}); continuing as {id}");
                    id
                }
            }
        } else {
            SessionId::local(Utc::now())
        };

        self.phase = Phase::Stepping;
        Ok(&*self.session.insert(session))
    }

    /// Run one tick of the loop body.
    pub fn step(&mut self) -> Result<StepReport, EngineError> {
        self.expect_phase(Phase::Stepping, "step")?;

        let quotes = match self.source.fetch(&self.config.universe) {
            Ok(quotes) => quotes,
            Err(SourceError::Exhausted) => {
                info!("{} exhausted after {} steps", self.source.venue(), self.step);
                self.exhausted = true;
                return Ok(self.report(StepOutcome::Exhausted, false));
            }
            Err(e) => {
                warn!("step {}: skipping tick, {e}", self.step);
                self.counters.skipped += 1;
                self.step += 1;
                let flushed = self.maybe_flush()?;
                return Ok(self.report(StepOutcome::Skipped(e), flushed));
            }
        };

        self.book.refresh(&quotes);
        self.history.record(&quotes);

        self.ledger.mark_to_market(&self.book);
        self.ledger.update_capital_limit();

        let target = {
            let ctx = PolicyContext {
                step: self.step,
                universe: &self.config.universe,
                history: &self.history,
                book: &self.book,
                holdings: self.ledger.holdings(),
                cash: self.ledger.cash(),
                capital_limit: self.ledger.capital_limit(),
                params: &self.config.params,
            };
            self.policy.target(&ctx)
        };

        let now = self.clock();
        let outcome = match self.ledger.rebalance(&target, &self.book, now) {
            Ok(txs) => {
                debug!(
                    "step {}: {} transactions, net cost {:.2}",
                    self.step,
                    txs.len(),
                    txs.net_cost
                );
                StepOutcome::Rebalanced(txs)
            }
            Err(e) => {
                if e.is_programmer_error() {
                    self.counters.invalid_targets += 1;
                } else {
                    self.counters.rejected += 1;
                }
                warn!(
                    "step {}: rejected target [{target}] ({}): {e}",
                    self.step,
                    e.invariant()
                );
                StepOutcome::Rejected { target, error: e }
            }
        };

        let value = self.ledger.mark_to_market(&self.book);
        self.performance.record(value);

        self.step += 1;
        let flushed = self.maybe_flush()?;
        Ok(self.report(outcome, flushed))
    }

    /// Session time: the snapshot time in backtests, wall clock when live.
    fn clock(&self) -> Timestamp {
        match self.config.mode {
            Mode::Live { .. } => Utc::now(),
            Mode::Backtest => self.book.as_of().unwrap_or_else(Utc::now),
        }
    }

    fn report(&self, outcome: StepOutcome, flushed: bool) -> StepReport {
        StepReport {
            step: self.step,
            outcome,
            portfolio_value: self.ledger.portfolio_value(),
            pnl: self.performance.pnl(),
            sharpe: self.performance.sharpe(),
            flushed,
        }
    }

    fn maybe_flush(&mut self) -> Result<bool, EngineError> {
        let every = self.config.flush_every;
        if every > 0 && self.step % every == 0 && self.step < self.config.maxsteps {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// `Stepping → Flushing → Stepping`.
    ///
    /// Exports unexported price history and buffered holdings snapshots,
    /// posts the snapshots to bookkeeping, then clears the snapshot buffer.
    /// Sink failures are logged. Failed posts and failed exports are retried
    /// on the next flush, snapshots together with their price rows.
    pub fn flush(&mut self) -> Result<(), EngineError> {
        self.expect_phase(Phase::Stepping, "flush")?;
        self.phase = Phase::Flushing;
        self.flush_sinks();
        self.phase = Phase::Stepping;
        Ok(())
    }

    fn flush_sinks(&mut self) {
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| SessionId::local(Utc::now()));
        let snapshots = self.ledger.take_snapshots();
        let prices = self.history.unexported();
        self.export_backlog.extend(snapshots.iter().cloned());

        let batch = ExportBatch {
            strategy: &self.config.strategy,
            session: &session,
            step: self.step,
            universe: &self.config.universe,
            prices: &prices,
            holdings: &self.export_backlog,
        };
        match self.exporter.export(&batch) {
            Ok(files) => {
                if !files.is_empty() {
                    info!(
                        "step {}: exported {} quotes, {} snapshots ({} files)",
                        self.step,
                        prices.len(),
                        self.export_backlog.len(),
                        files.len()
                    );
                }
                self.history.mark_exported();
                self.export_backlog.clear();
            }
            Err(e) => {
                // prices stay unexported; keep their snapshots alongside
                let limit = self.config.pending_post_limit;
                if self.export_backlog.len() > limit {
                    let dropped = self.export_backlog.len() - limit;
                    self.export_backlog.drain(..dropped);
                }
                warn!(
                    "step {}: export failed ({e}); {} snapshots held for the next flush",
                    self.step,
                    self.export_backlog.len()
                );
            }
        }

        if self.config.mode.is_live() {
            self.pending_posts.extend(snapshots);
            self.post_pending(&session);
        }
    }

    fn post_pending(&mut self, session: &SessionId) {
        let mut failed: Option<SinkError> = None;
        while let Some(snap) = self.pending_posts.front() {
            match self.bookkeeping.post_holdings(session, snap) {
                Ok(()) => {
                    self.pending_posts.pop_front();
                }
                Err(e) => {
                    failed = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failed {
            warn!(
                "holdings post failed ({e}); {} snapshots pending",
                self.pending_posts.len()
            );
        }

        let limit = self.config.pending_post_limit;
        if self.pending_posts.len() > limit {
            let dropped = self.pending_posts.len() - limit;
            self.pending_posts.drain(..dropped);
            warn!("dropped {dropped} unposted snapshots beyond the retry buffer");
        }
    }

    /// Final flush, summary post and transition to `Finished`.
    ///
    /// Callable once from `Stepping`. A second call returns
    /// [`EngineError::InvalidPhase`].
    pub fn finish(&mut self) -> Result<SessionSummary, EngineError> {
        self.expect_phase(Phase::Stepping, "finish")?;
        self.phase = Phase::Flushing;
        self.flush_sinks();

        let session = self
            .session
            .clone()
            .unwrap_or_else(|| SessionId::local(Utc::now()));
        let perf = self.performance.summary();

        if self.config.mode.is_live() {
            if let Err(e) = self.bookkeeping.post_summary(&session, perf.pnl, perf.sharpe) {
                warn!("session summary post failed: {e}");
            }
        }

        let summary = SessionSummary {
            session,
            strategy: self.config.strategy.clone(),
            steps_completed: self.step,
            skipped_ticks: self.counters.skipped,
            rejected: self.counters.rejected,
            invalid_targets: self.counters.invalid_targets,
            final_value: perf.final_value,
            pnl: perf.pnl,
            sharpe: perf.sharpe,
            max_drawdown: perf.max_drawdown,
            interrupted: self.stop_requested(),
        };

        self.phase = Phase::Finished;
        info!(
            "finished {} after {} steps: P&L {:.2}, Sharpe {:.4}, {} rejected",
            summary.strategy, summary.steps_completed, summary.pnl, summary.sharpe, summary.rejected
        );
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Summary of a finished session.
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    /// Run a whole session: start, step until done, finish.
    pub fn run(&mut self) -> Result<SessionSummary, EngineError> {
        self.run_with(|_| {})
    }

    /// Like [`run`](Self::run), calling `on_step` after every step.
    ///
    /// The session ends at `maxsteps`, when the source is exhausted, or when
    /// the stop flag is set.
    pub fn run_with<F>(&mut self, mut on_step: F) -> Result<SessionSummary, EngineError>
    where
        F: FnMut(&StepReport),
    {
        if self.phase == Phase::Idle {
            self.start()?;
        }

        while self.step < self.config.maxsteps && !self.exhausted && !self.stop_requested() {
            let started = Instant::now();
            let report = self.step()?;
            on_step(&report);

            if let Mode::Live { interval } = self.config.mode {
                if !self.exhausted && self.step < self.config.maxsteps {
                    self.pace(interval.saturating_sub(started.elapsed()));
                }
            }
        }

        if self.stop_requested() {
            info!("stop requested at step {}; flushing", self.step);
        }
        self.finish()
    }

    /// Sleep for `remaining`, waking early if the stop flag is set.
    fn pace(&self, mut remaining: Duration) {
        while !remaining.is_zero() && !self.stop_requested() {
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::HoldPolicy;
    use crate::sink::{NullBookkeeping, NullExporter};
    use crate::source::ReplaySource;
    use crate::types::Quote;
    use chrono::TimeZone;

    fn spy() -> InstrumentKey {
        InstrumentKey::new("IEX", "SPY")
    }

    fn ticks(n: i64) -> ReplaySource {
        ReplaySource::from_snapshots(
            (0..n)
                .map(|i| {
                    let t = Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap();
                    vec![Quote::new(t, &spy(), 99.0, 101.0)]
                })
                .collect(),
        )
    }

    fn config() -> LoopConfig {
        LoopConfig {
            strategy: "test".into(),
            universe: vec![spy()],
            maxsteps: 5,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn config_validation() {
        assert!(config().validate().is_ok());

        let empty = LoopConfig::default();
        assert!(matches!(empty.validate(), Err(EngineError::Config(_))));

        let dup = LoopConfig {
            universe: vec![spy(), spy()],
            ..LoopConfig::default()
        };
        assert!(dup.validate().is_err());

        let bad_leverage = LoopConfig {
            leverage: 0.0,
            ..config()
        };
        assert!(bad_leverage.validate().is_err());

        let zero_interval = LoopConfig {
            mode: Mode::Live {
                interval: Duration::ZERO,
            },
            ..config()
        };
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn phase_transitions() {
        let mut lp = RebalanceLoop::new(config(), ticks(5), HoldPolicy, NullBookkeeping, NullExporter)
            .unwrap();
        assert_eq!(lp.phase(), Phase::Idle);

        assert!(matches!(
            lp.step(),
            Err(EngineError::InvalidPhase { action: "step", actual: Phase::Idle })
        ));

        lp.start().unwrap();
        assert_eq!(lp.phase(), Phase::Stepping);
        assert!(lp.start().is_err());

        lp.step().unwrap();
        lp.flush().unwrap();
        assert_eq!(lp.phase(), Phase::Stepping);

        lp.finish().unwrap();
        assert_eq!(lp.phase(), Phase::Finished);
        assert!(lp.finish().is_err());
        assert!(lp.step().is_err());
    }

    #[test]
    fn runs_to_maxsteps() {
        let mut lp = RebalanceLoop::new(config(), ticks(10), HoldPolicy, NullBookkeeping, NullExporter)
            .unwrap();
        let summary = lp.run().unwrap();
        assert_eq!(summary.steps_completed, 5);
        assert_eq!(summary.pnl, 0.0);
        assert_eq!(lp.performance().len(), 6);
        assert!(!summary.interrupted);
    }

    #[test]
    fn exhaustion_ends_early() {
        let mut lp = RebalanceLoop::new(config(), ticks(3), HoldPolicy, NullBookkeeping, NullExporter)
            .unwrap();
        let summary = lp.run().unwrap();
        assert_eq!(summary.steps_completed, 3);
        assert_eq!(lp.phase(), Phase::Finished);
    }

    #[test]
    fn rejections_are_counted_not_fatal() {
        let greedy = |ctx: &PolicyContext<'_>| TargetHoldings::uniform(ctx.universe, 500);
        let mut lp = RebalanceLoop::new(config(), ticks(5), greedy, NullBookkeeping, NullExporter)
            .unwrap();
        let summary = lp.run().unwrap();
        assert_eq!(summary.steps_completed, 5);
        assert_eq!(summary.rejected, 5);
        assert_eq!(lp.ledger().volume(&spy()), 0);
        assert_eq!(lp.ledger().cash(), 50_000.0);
    }

    #[test]
    fn invalid_targets_counted_separately() {
        let empty = |_: &PolicyContext<'_>| TargetHoldings::new();
        let mut lp = RebalanceLoop::new(config(), ticks(5), empty, NullBookkeeping, NullExporter)
            .unwrap();
        let summary = lp.run().unwrap();
        assert_eq!(summary.invalid_targets, 5);
        assert_eq!(summary.rejected, 0);
    }

    #[test]
    fn stop_flag_ends_run() {
        let mut lp = RebalanceLoop::new(config(), ticks(10), HoldPolicy, NullBookkeeping, NullExporter)
            .unwrap();
        let stop = lp.stop_handle();
        let summary = lp
            .run_with(|report| {
                if report.step == 2 {
                    stop.store(true, Ordering::SeqCst);
                }
            })
            .unwrap();
        assert_eq!(summary.steps_completed, 2);
        assert!(summary.interrupted);
    }
}
