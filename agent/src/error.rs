//! Error types for the agent.

use std::path::PathBuf;

/// All errors that can occur while configuring or running the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("unknown policy {0:?} (expected \"hold\" or \"constant\")")]
    UnknownPolicy(String),

    #[error("feed error: {0}")]
    Feed(#[from] pedlar_feeds::FeedError),

    #[error("replay source: {0}")]
    Replay(pedlar::SourceError),

    #[error("bookkeeping: {0}")]
    Sink(#[from] pedlar::SinkError),

    #[error(transparent)]
    Engine(#[from] pedlar::EngineError),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
