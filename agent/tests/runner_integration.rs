//! End-to-end agent runs over recorded and mock quotes.

use std::path::Path;

use chrono::{TimeZone, Utc};
use pedlar::{InstrumentKey, Quote};
use pedlar_agent::config::Config;
use pedlar_agent::runner::{self, RunOptions};
use pedlar_feeds::MockFeed;

fn config_for(dir: &Path, extra: &str) -> Config {
    let toml = format!(
        r#"
[agent]
user = "tester"
strategy = "integration"
maxsteps = 100
flush_every = 4

[portfolio]
starting_cash = 10000.0
leverage = 2.0
universe = ["IEX:SPY", "TrueFX:EUR/USD"]

[pacing]
interval_ms = 1

[logging]
dir = "{logs}"
export_dir = "{export}"

{extra}
"#,
        logs = dir.join("logs").display(),
        export = dir.join("export").display(),
    );
    Config::parse(&toml).unwrap()
}

fn write_replay(path: &Path, ticks: usize) {
    let mut csv = String::from("time,venue,ticker,bid,ask,bid_size,ask_size\n");
    for i in 0..ticks {
        let t = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap().to_rfc3339();
        csv.push_str(&format!("{t},IEX,SPY,{},{},100,100\n", 99.0 + i as f64, 101.0 + i as f64));
        csv.push_str(&format!("{t},TrueFX,EUR/USD,1.1,1.1002,100,100\n"));
    }
    std::fs::write(path, csv).unwrap();
}

fn audit_events(dir: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(dir.join("logs").join("audit.jsonl"))
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn backtest_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let replay = dir.path().join("prices.csv");
    write_replay(&replay, 10);

    let config = config_for(dir.path(), "[policy]\nname = \"constant\"\nparams = { volume = 10.0 }");
    let summary = runner::backtest(&config, &replay, &RunOptions::default()).unwrap();

    assert_eq!(summary.steps_completed, 10);
    assert_eq!(summary.rejected, 0);
    assert!(summary.pnl > 0.0, "SPY rallies through the replay");
    assert!(summary.session.as_str().starts_with("local-"));

    let events = audit_events(dir.path());
    assert_eq!(events.first().unwrap()["event"], "session_started");
    assert_eq!(events.last().unwrap()["event"], "session_finished");
    assert_eq!(events.last().unwrap()["steps_completed"], 10);
    let flushes = events.iter().filter(|e| e["event"] == "flushed").count();
    assert_eq!(flushes, 2);

    let exported = std::fs::read_dir(dir.path().join("export")).unwrap().count();
    assert_eq!(exported, 6, "two files per flush plus the final flush");
}

#[test]
fn rejections_are_audited() {
    let dir = tempfile::tempdir().unwrap();
    let replay = dir.path().join("prices.csv");
    write_replay(&replay, 3);

    // 1000 SPY at ~101 is far beyond 10k cash.
    let config = config_for(dir.path(), "[policy]\nname = \"constant\"\nparams = { volume = 1000.0 }");
    let summary = runner::backtest(&config, &replay, &RunOptions::default()).unwrap();
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.pnl, 0.0);

    let rejected: Vec<_> = audit_events(dir.path())
        .into_iter()
        .filter(|e| e["event"] == "rebalance_rejected")
        .collect();
    assert_eq!(rejected.len(), 3);
    assert_eq!(rejected[0]["step"], 0);
    assert_eq!(rejected[0]["target"]["IEX:SPY"], 1000);
    assert!(rejected[0]["invariant"].is_string());
}

#[test]
fn missing_replay_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), "");
    let result = runner::backtest(&config, &dir.path().join("nope.csv"), &RunOptions::default());
    assert!(result.is_err());
}

#[test]
fn live_session_over_mock_feed() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), "[policy]\nname = \"hold\"");

    let spy = InstrumentKey::new("IEX", "SPY");
    let eur = InstrumentKey::new("TrueFX", "EUR/USD");
    let mut builder = MockFeed::builder().venue("mock");
    for i in 0..5 {
        let t = Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap();
        builder = builder.with_snapshot(vec![
            Quote::new(t, &spy, 99.0, 101.0),
            Quote::new(t, &eur, 1.1, 1.1002),
        ]);
    }

    let summary = runner::run_with_source(&config, builder.build(), true, &RunOptions::default()).unwrap();
    assert_eq!(summary.steps_completed, 5);
    assert_eq!(summary.pnl, 0.0);
    // server disabled: no registration, local session id
    assert!(summary.session.as_str().starts_with("local-"));
}

#[test]
fn unknown_venue_has_no_live_feed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path(), "");
    config.portfolio.universe.push("LSE:VOD".into());
    assert!(runner::live_source(&config).is_err());
}

#[cfg(target_os = "linux")]
#[test]
fn audit_write_failures_do_not_end_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let replay = dir.path().join("prices.csv");
    write_replay(&replay, 5);

    // /dev/full opens fine but every write fails with ENOSPC
    let mut config = config_for(dir.path(), "[policy]\nname = \"constant\"\nparams = { volume = 10.0 }");
    config.logging.dir = "/dev".into();
    config.logging.audit_file = "full".into();

    let summary = runner::backtest(&config, &replay, &RunOptions::default()).unwrap();
    assert_eq!(summary.steps_completed, 5);
    let exported = std::fs::read_dir(dir.path().join("export")).unwrap().count();
    assert_eq!(exported, 4);
}
