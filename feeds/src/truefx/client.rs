//! TrueFX rates API client.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;

use crate::error::FeedError;

/// Default TrueFX rates endpoint.
pub const DEFAULT_URL: &str = "http://webrates.truefx.com/rates/connect.html";

/// Blocking TrueFX client. Every request is bounded by the client timeout.
pub struct TrueFxClient {
    client: Client,
    url: String,
}

impl TrueFxClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn get(&self, context: &str, params: &[(&str, &str)]) -> Result<String, FeedError> {
        let resp = self
            .client
            .get(&self.url)
            .query(params)
            .send()
            .map_err(|e| FeedError::from_reqwest(context, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FeedError::Http {
                status: status.as_u16(),
                body,
            });
        }

        resp.text().map_err(|e| FeedError::from_reqwest(context, e))
    }

    /// Snapshot without an account (`c`, `f`, `s`).
    pub fn query_unauthenticated(&self, pairs: &[&str]) -> Result<String, FeedError> {
        let pairs = pairs.join(",");
        self.get("unauthenticated query", &[("c", &pairs), ("f", "csv"), ("s", "y")])
    }

    /// Open an authenticated session and return its id.
    pub fn connect(
        &self,
        username: &str,
        password: &str,
        pairs: &[&str],
        qualifier: &str,
    ) -> Result<String, FeedError> {
        let pairs = pairs.join(",");
        let body = self.get(
            "connect",
            &[
                ("u", username),
                ("p", password),
                ("q", qualifier),
                ("c", &pairs),
                ("f", "csv"),
                ("s", "y"),
            ],
        )?;

        let session = body.trim().to_string();
        if session.is_empty() || session.contains("not authorized") {
            return Err(FeedError::Auth(format!("TrueFX refused {username}: {session}")));
        }
        debug!("TrueFX session opened for {username}");
        Ok(session)
    }

    /// Snapshot for an open session.
    pub fn query_session(&self, session: &str) -> Result<String, FeedError> {
        self.get("session query", &[("id", session)])
    }

    pub fn disconnect(&self, session: &str) -> Result<(), FeedError> {
        self.get("disconnect", &[("di", session)]).map(|_| ())
    }
}
