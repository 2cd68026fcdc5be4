//! IEX REST client.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::FeedError;

use super::types::Tops;

/// Default IEX API root.
pub const DEFAULT_BASE_URL: &str = "https://api.iextrading.com/1.0";

pub struct IexClient {
    client: Client,
    base_url: String,
}

impl IexClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /tops?symbols=A,B`
    pub fn tops(&self, symbols: &[&str]) -> Result<Vec<Tops>, FeedError> {
        let url = format!("{}/tops", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .map_err(|e| FeedError::from_reqwest("tops", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FeedError::Http {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Vec<Tops>>()
            .map_err(|e| FeedError::from_reqwest("tops", e))
    }
}
