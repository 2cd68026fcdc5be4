//! TrueFX FX quote feed.

pub mod client;
pub mod parse;

use std::time::Duration;

use log::{info, warn};

use pedlar::{InstrumentKey, Quote, QuoteSource, SourceError};

use crate::error::FeedError;
use crate::tickers_for;
use client::TrueFxClient;
pub use parse::{ALL_PAIRS, UNAUTHENTICATED_PAIRS, VENUE};

/// TrueFX account credentials.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// TrueFX feed implementing [`QuoteSource`].
///
/// Without credentials every fetch is an unauthenticated snapshot query.
/// With credentials a session is opened on the first fetch and closed on drop.
pub struct TrueFxFeed {
    client: TrueFxClient,
    credentials: Option<Credentials>,
    qualifier: String,
    session: Option<String>,
}

impl TrueFxFeed {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        Self::with_url(client::DEFAULT_URL, timeout)
    }

    pub fn with_url(url: &str, timeout: Duration) -> Result<Self, FeedError> {
        Ok(Self {
            client: TrueFxClient::new(url, timeout)?,
            credentials: None,
            qualifier: "default".to_string(),
            session: None,
        })
    }

    /// Use an account. Empty credentials keep the unauthenticated mode.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = if username.is_empty() && password.is_empty() {
            None
        } else {
            Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
        };
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    fn query(&mut self, pairs: &[&str]) -> Result<String, FeedError> {
        let Some(creds) = &self.credentials else {
            return self.client.query_unauthenticated(pairs);
        };

        let session = match &self.session {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .client
                    .connect(&creds.username, &creds.password, pairs, &self.qualifier)?;
                info!("connected to TrueFX as {}", creds.username);
                self.session.insert(id).clone()
            }
        };

        match self.client.query_session(&session) {
            Ok(body) => Ok(body),
            Err(e) => {
                // reconnect on the next fetch
                self.session = None;
                Err(e)
            }
        }
    }
}

impl QuoteSource for TrueFxFeed {
    fn fetch(&mut self, universe: &[InstrumentKey]) -> Result<Vec<Quote>, SourceError> {
        let pairs = tickers_for(universe, VENUE);
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let body = self.query(&pairs)?;
        let quotes = parse::parse_snapshot(&body)?;
        Ok(quotes
            .into_iter()
            .filter(|q| universe.iter().any(|k| q.is_for(k)))
            .collect())
    }

    fn venue(&self) -> &str {
        VENUE
    }
}

impl Drop for TrueFxFeed {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.client.disconnect(&session) {
                warn!("TrueFX disconnect failed: {e}");
            }
        }
    }
}
