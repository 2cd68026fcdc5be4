//! Outbound collaborators: remote bookkeeping and file export.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SinkError;
use crate::ledger::HoldingsSnapshot;
use crate::types::{InstrumentKey, Quote};

static LOCAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Trade-session identifier handed out by the bookkeeping service.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    /// Session id used when no bookkeeping service assigned one.
    ///
    /// Millisecond time, process id and a per-process counter keep ids
    /// distinct across sessions started in the same instant.
    pub fn local(now: crate::types::Timestamp) -> Self {
        let seq = LOCAL_SEQ.fetch_add(1, Ordering::Relaxed);
        SessionId(format!(
            "local-{}-{}-{seq}",
            now.format("%Y%m%d%H%M%S%3f"),
            std::process::id()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote record keeping for a trading session.
pub trait Bookkeeping {
    /// Register a new session for `user` running `strategy`.
    fn register_session(&mut self, user: &str, strategy: &str) -> Result<SessionId, SinkError>;

    /// Post one holdings snapshot.
    fn post_holdings(
        &mut self,
        session: &SessionId,
        snapshot: &HoldingsSnapshot,
    ) -> Result<(), SinkError>;

    /// Post the end-of-session summary.
    fn post_summary(&mut self, session: &SessionId, pnl: f64, sharpe: f64) -> Result<(), SinkError>;
}

impl Bookkeeping for Box<dyn Bookkeeping> {
    fn register_session(&mut self, user: &str, strategy: &str) -> Result<SessionId, SinkError> {
        (**self).register_session(user, strategy)
    }

    fn post_holdings(
        &mut self,
        session: &SessionId,
        snapshot: &HoldingsSnapshot,
    ) -> Result<(), SinkError> {
        (**self).post_holdings(session, snapshot)
    }

    fn post_summary(&mut self, session: &SessionId, pnl: f64, sharpe: f64) -> Result<(), SinkError> {
        (**self).post_summary(session, pnl, sharpe)
    }
}

/// Accepts everything and records nothing. Sessions get a local id.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBookkeeping;

impl Bookkeeping for NullBookkeeping {
    fn register_session(&mut self, _user: &str, _strategy: &str) -> Result<SessionId, SinkError> {
        Ok(SessionId::local(chrono::Utc::now()))
    }

    fn post_holdings(&mut self, _: &SessionId, _: &HoldingsSnapshot) -> Result<(), SinkError> {
        Ok(())
    }

    fn post_summary(&mut self, _: &SessionId, _: f64, _: f64) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Everything a flush hands to an exporter.
#[derive(Clone, Copy, Debug)]
pub struct ExportBatch<'a> {
    pub strategy: &'a str,
    pub session: &'a SessionId,
    pub step: u64,
    pub universe: &'a [InstrumentKey],
    /// Price history rows not exported before, oldest first.
    pub prices: &'a [Quote],
    /// Holdings snapshots buffered since the previous flush.
    pub holdings: &'a [HoldingsSnapshot],
}

impl ExportBatch<'_> {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.holdings.is_empty()
    }
}

/// Writes flushed state somewhere durable.
pub trait Exporter {
    /// Export one batch, returning the files written.
    fn export(&mut self, batch: &ExportBatch<'_>) -> Result<Vec<PathBuf>, SinkError>;
}

impl Exporter for Box<dyn Exporter> {
    fn export(&mut self, batch: &ExportBatch<'_>) -> Result<Vec<PathBuf>, SinkError> {
        (**self).export(batch)
    }
}

/// Discards every batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullExporter;

impl Exporter for NullExporter {
    fn export(&mut self, _batch: &ExportBatch<'_>) -> Result<Vec<PathBuf>, SinkError> {
        Ok(Vec::new())
    }
}
