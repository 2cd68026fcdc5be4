//! JSONL audit trail.
//!
//! Each session appends events to an audit file, one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use pedlar::{LedgerError, LoopConfig, SessionId, SessionSummary, TargetHoldings};

use crate::error::Result;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn log_session_started(audit: &mut AuditLog, session: &SessionId, config: &LoopConfig) -> Result<()> {
    let universe: Vec<String> = config.universe.iter().map(ToString::to_string).collect();
    audit.log(
        "session_started",
        serde_json::json!({
            "session": session.as_str(),
            "user": config.user,
            "strategy": config.strategy,
            "live": config.mode.is_live(),
            "starting_cash": config.starting_cash,
            "leverage": config.leverage,
            "universe": universe,
        }),
    )
}

pub fn log_rejection(
    audit: &mut AuditLog,
    step: u64,
    target: &TargetHoldings,
    error: &LedgerError,
) -> Result<()> {
    let volumes: serde_json::Map<String, serde_json::Value> = target
        .iter()
        .map(|(key, &volume)| (key.to_string(), volume.into()))
        .collect();
    audit.log(
        "rebalance_rejected",
        serde_json::json!({
            "step": step,
            "invariant": error.invariant(),
            "error": error.to_string(),
            "target": volumes,
        }),
    )
}

pub fn log_flush(audit: &mut AuditLog, step: u64, portfolio_value: f64) -> Result<()> {
    audit.log(
        "flushed",
        serde_json::json!({
            "step": step,
            "portfolio_value": portfolio_value,
        }),
    )
}

pub fn log_summary(audit: &mut AuditLog, summary: &SessionSummary) -> Result<()> {
    let data = serde_json::to_value(summary)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    audit.log("session_finished", data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pedlar::InstrumentKey;

    #[test]
    fn audit_log_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.log("test_event", serde_json::json!({})).unwrap();
            let target = TargetHoldings::new().with(InstrumentKey::new("IEX", "SPY"), 500);
            log_rejection(&mut log, 3, &target, &LedgerError::Insolvency { new_cash: -500.0 }).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "test_event");
        assert_eq!(lines[1]["invariant"], "non_negative_cash");
        assert_eq!(lines[1]["target"]["IEX:SPY"], 500);
    }

    #[test]
    fn audit_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdir").join("deep").join("audit.jsonl");

        let mut log = AuditLog::open(&path).unwrap();
        log.log("test", serde_json::json!({})).unwrap();

        assert!(path.exists());
    }
}
