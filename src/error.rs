//! Error types for the rebalancing core.

use std::time::Duration;

use crate::engine::Phase;
use crate::types::InstrumentKey;

/// A target mapping that does not match the tracked universe.
///
/// These are programmer errors in the allocation policy, kept apart from
/// the recoverable ledger rejections.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetError {
    #[error("target names instrument {0} outside the tracked universe")]
    UnknownInstrument(InstrumentKey),

    #[error("target omits tracked instrument {0}")]
    MissingInstrument(InstrumentKey),
}

/// Reasons a rebalance is rejected. State is unchanged in every case.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("allocation limit exceeded: exposure {exposure:.2} > capital limit {limit:.2}")]
    AllocationLimitExceeded { exposure: f64, limit: f64 },

    #[error("insolvent: rebalance would leave cash at {new_cash:.2}")]
    Insolvency { new_cash: f64 },

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("no quote for {0} in the current order book")]
    MissingQuote(InstrumentKey),

    #[error("quote for {0} has a non-positive, non-finite or crossed price")]
    InvalidQuote(InstrumentKey),

    #[error("quote for {key} is stale ({age:?} old, limit {max_age:?})")]
    StaleQuote {
        key: InstrumentKey,
        age: Duration,
        max_age: Duration,
    },

    #[error("volume change for {key} overflows: {current} -> {wanted}")]
    VolumeOverflow {
        key: InstrumentKey,
        current: i64,
        wanted: i64,
    },
}

impl LedgerError {
    /// Short name of the violated invariant, for logs and audit records.
    pub fn invariant(&self) -> &'static str {
        match self {
            LedgerError::AllocationLimitExceeded { .. } => "capital_limit",
            LedgerError::Insolvency { .. } => "non_negative_cash",
            LedgerError::InvalidTarget(_) => "target_universe",
            LedgerError::MissingQuote(_) => "quote_available",
            LedgerError::InvalidQuote(_) => "quote_valid",
            LedgerError::StaleQuote { .. } => "quote_fresh",
            LedgerError::VolumeOverflow { .. } => "volume_range",
        }
    }

    /// True for malformed-target errors, which point at a policy bug rather
    /// than market conditions.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidTarget(_) | LedgerError::VolumeOverflow { .. }
        )
    }
}

/// Failures fetching a quote snapshot.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("quote source unavailable: {0}")]
    Unavailable(String),

    #[error("quote source timed out: {0}")]
    Timeout(String),

    #[error("malformed quote data: {0}")]
    Malformed(String),

    #[error("quote source exhausted")]
    Exhausted,
}

/// Failures reaching bookkeeping or export collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("sink rejected request: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(String),
}

/// Errors from driving the rebalance loop itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid loop configuration: {0}")]
    Config(String),

    #[error("cannot {action} while {actual:?}")]
    InvalidPhase { action: &'static str, actual: Phase },
}
