//! Session runner: config → feeds → loop, with audit trail and Ctrl-C.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use pedlar::{
    AllocationPolicy, Bookkeeping, CsvExporter, NullBookkeeping, QuoteSource, RebalanceLoop,
    ReplaySource, SessionSummary, StepOutcome, StepReport,
};
use pedlar_feeds::{CompositeFeed, IexFeed, TrueFxFeed, iex, truefx};

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::policy;
use crate::server::ServerClient;
use crate::universe;

/// The loop as the agent assembles it.
pub type AgentLoop<S> =
    RebalanceLoop<S, Box<dyn AllocationPolicy>, Box<dyn Bookkeeping>, CsvExporter>;

/// Options for a session run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Install a process-wide Ctrl-C handler that stops the loop.
    pub handle_interrupt: bool,
}

/// Run a live session against the configured feeds.
pub fn live(config: &Config, opts: &RunOptions) -> Result<SessionSummary> {
    let source = live_source(config)?;
    run_with_source(config, source, true, opts)
}

/// Replay a recorded price CSV through the loop.
pub fn backtest(config: &Config, replay: &Path, opts: &RunOptions) -> Result<SessionSummary> {
    let source = ReplaySource::from_csv(replay).map_err(Error::Replay)?;
    info!("replaying {} snapshots from {}", source.remaining(), replay.display());
    run_with_source(config, source, false, opts)
}

/// One feed per venue in the universe.
pub fn live_source(config: &Config) -> Result<CompositeFeed> {
    let universe = config.universe()?;
    let timeout = config.feed_timeout();
    let mut feed = CompositeFeed::new();

    for venue in universe::venues(&universe) {
        match venue {
            truefx::VENUE => {
                let (username, password) = config.truefx_credentials();
                let truefx = TrueFxFeed::new(timeout)?.with_credentials(&username, &password);
                if !truefx.is_authenticated() {
                    info!("TrueFX: no credentials, using unauthenticated snapshots");
                }
                feed.push(Box::new(truefx));
            }
            iex::VENUE => {
                feed.push(Box::new(IexFeed::with_base_url(&config.feeds.iex_base_url, timeout)?));
            }
            other => {
                return Err(Error::Config(format!("no feed available for venue {other}")));
            }
        }
    }
    Ok(feed)
}

fn bookkeeping(config: &Config, live: bool) -> Result<Box<dyn Bookkeeping>> {
    if live && config.server.enabled {
        let timeout = std::time::Duration::from_secs(config.server.timeout_secs);
        Ok(Box::new(ServerClient::new(&config.server.url, timeout)?))
    } else {
        Ok(Box::new(NullBookkeeping))
    }
}

/// Build the loop for `source` without starting it.
pub fn build_loop<S: QuoteSource>(config: &Config, source: S, live: bool) -> Result<AgentLoop<S>> {
    let loop_config = config.loop_config(live)?;
    let policy = policy::by_name(&config.policy.name)?;
    let books = bookkeeping(config, live)?;
    let exporter = CsvExporter::new(config.export_dir());
    Ok(RebalanceLoop::new(loop_config, source, policy, books, exporter)?)
}

/// Run a full session over any quote source.
pub fn run_with_source<S: QuoteSource>(
    config: &Config,
    source: S,
    live: bool,
    opts: &RunOptions,
) -> Result<SessionSummary> {
    let mut engine = build_loop(config, source, live)?;
    let mut audit = AuditLog::open(&config.audit_path())?;

    if opts.handle_interrupt {
        install_interrupt_handler(engine.stop_handle());
    }

    let session = engine.start()?.clone();
    if let Err(e) = audit::log_session_started(&mut audit, &session, engine.config()) {
        warn!("audit write failed at session start: {e}");
    }

    let summary = engine.run_with(|report| {
        if let Err(e) = record_step(&mut audit, report) {
            warn!("audit write failed at step {}: {e}", report.step);
        }
    })?;

    if let Err(e) = audit::log_summary(&mut audit, &summary) {
        warn!("audit write failed at session end: {e}");
    }
    Ok(summary)
}

fn record_step(audit: &mut AuditLog, report: &StepReport) -> Result<()> {
    if let StepOutcome::Rejected { target, error } = &report.outcome {
        audit::log_rejection(audit, report.step.saturating_sub(1), target, error)?;
    }
    if report.flushed {
        audit::log_flush(audit, report.step, report.portfolio_value)?;
    }
    Ok(())
}

fn install_interrupt_handler(stop: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("interrupt received, finishing session");
        stop.store(true, Ordering::SeqCst);
    }) {
        warn!("failed to set Ctrl-C handler: {e}; the session stops at maxsteps only");
    }
}
