//! TOML configuration loading and validation.
//!
//! Every section and field is optional; an empty file runs the default
//! agent (constant volume over the default universe, no server).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use pedlar::{LoopConfig, Mode};

use crate::error::{Error, Result};
use crate::universe;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub portfolio: PortfolioConfig,
    pub pacing: PacingConfig,
    pub server: ServerConfig,
    pub feeds: FeedsConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub user: String,
    pub strategy: String,
    pub maxsteps: u64,
    pub flush_every: u64,
    pub maxlookup: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            user: "nobody".into(),
            strategy: "pedlar-agent".into(),
            maxsteps: 1_000_000,
            flush_every: 200,
            maxlookup: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub starting_cash: f64,
    pub leverage: f64,
    /// `VENUE:TICKER` entries.
    pub universe: Vec<String>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            starting_cash: 50_000.0,
            leverage: 2.0,
            universe: universe::default_universe(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub interval_ms: u64,
    /// 0 disables the staleness check.
    pub max_quote_age_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_quote_age_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://127.0.0.1:5000".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub timeout_secs: u64,
    pub truefx_username: String,
    pub truefx_password: String,
    pub iex_base_url: String,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            truefx_username: String::new(),
            truefx_password: String::new(),
            iex_base_url: "https://api.iextrading.com/1.0".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub name: String,
    pub params: BTreeMap<String, f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            name: "constant".into(),
            params: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: String,
    pub audit_file: String,
    pub export_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "./logs".into(),
            audit_file: "audit.jsonl".into(),
            export_dir: "./export".into(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    pub fn validate(&self) -> Result<()> {
        if self.agent.user.trim().is_empty() {
            return Err(Error::Config("agent.user must not be empty".into()));
        }
        if self.agent.strategy.trim().is_empty() {
            return Err(Error::Config("agent.strategy must not be empty".into()));
        }
        if self.agent.maxlookup == 0 {
            return Err(Error::Config("agent.maxlookup must be >= 1".into()));
        }
        if !self.portfolio.starting_cash.is_finite() || self.portfolio.starting_cash < 0.0 {
            return Err(Error::Config("portfolio.starting_cash must be >= 0".into()));
        }
        if !self.portfolio.leverage.is_finite() || self.portfolio.leverage <= 0.0 {
            return Err(Error::Config("portfolio.leverage must be > 0".into()));
        }
        if self.portfolio.universe.is_empty() {
            return Err(Error::Config("portfolio.universe must not be empty".into()));
        }
        universe::parse_universe(&self.portfolio.universe)?;
        if self.pacing.interval_ms == 0 {
            return Err(Error::Config("pacing.interval_ms must be > 0".into()));
        }
        if self.server.enabled && self.server.url.trim().is_empty() {
            return Err(Error::Config("server.url is required when the server is enabled".into()));
        }
        if self.feeds.timeout_secs == 0 || self.server.timeout_secs == 0 {
            return Err(Error::Config("request timeouts must be > 0".into()));
        }
        if !matches!(self.policy.name.as_str(), "hold" | "constant") {
            return Err(Error::UnknownPolicy(self.policy.name.clone()));
        }
        Ok(())
    }

    /// Parsed instrument universe.
    pub fn universe(&self) -> Result<Vec<pedlar::InstrumentKey>> {
        universe::parse_universe(&self.portfolio.universe)
    }

    /// Loop configuration for a live or backtest session.
    pub fn loop_config(&self, live: bool) -> Result<LoopConfig> {
        let mode = if live {
            Mode::Live {
                interval: Duration::from_millis(self.pacing.interval_ms),
            }
        } else {
            Mode::Backtest
        };
        let max_quote_age = match self.pacing.max_quote_age_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(LoopConfig {
            user: self.agent.user.clone(),
            strategy: self.agent.strategy.clone(),
            universe: self.universe()?,
            starting_cash: self.portfolio.starting_cash,
            leverage: self.portfolio.leverage,
            maxsteps: self.agent.maxsteps,
            maxlookup: self.agent.maxlookup,
            flush_every: self.agent.flush_every,
            mode,
            max_quote_age,
            params: self.policy.params.clone(),
            ..LoopConfig::default()
        })
    }

    /// TrueFX credentials, falling back to `TRUEFX_USERNAME` / `TRUEFX_PASSWORD`.
    pub fn truefx_credentials(&self) -> (String, String) {
        let pick = |configured: &str, var: &str| {
            if configured.is_empty() {
                std::env::var(var).unwrap_or_default()
            } else {
                configured.to_string()
            }
        };
        (
            pick(&self.feeds.truefx_username, "TRUEFX_USERNAME"),
            pick(&self.feeds.truefx_password, "TRUEFX_PASSWORD"),
        )
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feeds.timeout_secs)
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }

    pub fn export_dir(&self) -> PathBuf {
        PathBuf::from(&self.logging.export_dir)
    }
}
