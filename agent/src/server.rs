//! HTTP client for the bookkeeping server.
//!
//! | Call | Endpoint | Body |
//! |------|----------|------|
//! | register | `POST /user` | `{user, agent}` → `{tradesession}` |
//! | holdings | `POST /trade` | session, step, time, cash, value, per-instrument volumes |
//! | summary | `POST /tradesession` | `{user_id, agent, tradesession, pnl, sharpe}` |

use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use pedlar::{Bookkeeping, HoldingsSnapshot, SessionId, SinkError};

#[derive(Serialize)]
struct RegisterRequest<'a> {
    user: &'a str,
    agent: &'a str,
}

#[derive(Serialize)]
struct HoldingsPayload<'a> {
    user_id: &'a str,
    agent: &'a str,
    tradesession: &'a str,
    step: u64,
    time: String,
    cash: f64,
    portfoliovalue: f64,
    holdings: BTreeMap<String, i64>,
}

#[derive(Serialize)]
struct SummaryPayload<'a> {
    user_id: &'a str,
    agent: &'a str,
    tradesession: &'a str,
    pnl: f64,
    sharpe: f64,
}

/// Blocking bookkeeping client.
pub struct ServerClient {
    client: Client,
    base_url: String,
    user: String,
    agent: String,
}

impl ServerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: String::new(),
            agent: String::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, SinkError> {
        let url = format!("{}{path}", self.base_url);
        debug!("POST {url}");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| SinkError::Unavailable(format!("{path}: {e}")))?;

        let status = resp.status();
        if status.is_server_error() {
            let body = resp.text().unwrap_or_default();
            return Err(SinkError::Unavailable(format!("{path} returned {status}: {body}")));
        }
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SinkError::Rejected(format!("{path} returned {status}: {body}")));
        }
        Ok(resp)
    }
}

/// The server hands out numeric session ids; accept strings too.
fn session_from(body: &Value) -> Result<SessionId, SinkError> {
    match body.get("tradesession") {
        Some(Value::Number(n)) => Ok(SessionId::new(n.to_string())),
        Some(Value::String(s)) if !s.is_empty() => Ok(SessionId::new(s.as_str())),
        _ => Err(SinkError::Encode(format!("no tradesession in response: {body}"))),
    }
}

fn holdings_payload<'a>(
    user: &'a str,
    agent: &'a str,
    session: &'a SessionId,
    snapshot: &HoldingsSnapshot,
) -> HoldingsPayload<'a> {
    HoldingsPayload {
        user_id: user,
        agent,
        tradesession: session.as_str(),
        step: snapshot.step,
        time: snapshot.time.to_rfc3339(),
        cash: snapshot.cash,
        portfoliovalue: snapshot.portfolio_value,
        holdings: snapshot
            .holdings
            .iter()
            .map(|(key, &volume)| (key.to_string(), volume))
            .collect(),
    }
}

impl Bookkeeping for ServerClient {
    fn register_session(&mut self, user: &str, strategy: &str) -> Result<SessionId, SinkError> {
        let resp = self.post("/user", &RegisterRequest { user, agent: strategy })?;
        let body: Value = resp
            .json()
            .map_err(|e| SinkError::Encode(format!("/user response: {e}")))?;
        let session = session_from(&body)?;
        self.user = user.to_string();
        self.agent = strategy.to_string();
        Ok(session)
    }

    fn post_holdings(
        &mut self,
        session: &SessionId,
        snapshot: &HoldingsSnapshot,
    ) -> Result<(), SinkError> {
        let payload = holdings_payload(&self.user, &self.agent, session, snapshot);
        self.post("/trade", &payload).map(|_| ())
    }

    fn post_summary(&mut self, session: &SessionId, pnl: f64, sharpe: f64) -> Result<(), SinkError> {
        let payload = SummaryPayload {
            user_id: &self.user,
            agent: &self.agent,
            tradesession: session.as_str(),
            pnl,
            sharpe,
        };
        self.post("/tradesession", &payload).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pedlar::InstrumentKey;

    #[test]
    fn session_id_number_or_string() {
        let n = serde_json::json!({"tradesession": 42});
        assert_eq!(session_from(&n).unwrap(), SessionId::new("42"));

        let s = serde_json::json!({"tradesession": "abc"});
        assert_eq!(session_from(&s).unwrap(), SessionId::new("abc"));

        let missing = serde_json::json!({"ok": true});
        assert!(matches!(session_from(&missing), Err(SinkError::Encode(_))));
    }

    #[test]
    fn holdings_payload_uses_instrument_strings() {
        let snapshot = HoldingsSnapshot {
            time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            step: 7,
            holdings: [(InstrumentKey::new("IEX", "SPY"), 10)].into_iter().collect(),
            cash: 100.0,
            portfolio_value: 1_100.0,
        };
        let session = SessionId::new("9");
        let json = serde_json::to_value(holdings_payload("u", "a", &session, &snapshot)).unwrap();

        assert_eq!(json["tradesession"], "9");
        assert_eq!(json["step"], 7);
        assert_eq!(json["holdings"]["IEX:SPY"], 10);
        assert_eq!(json["portfoliovalue"], 1_100.0);
    }

    #[test]
    fn unreachable_server_is_unavailable() {
        let mut client = ServerClient::new("http://127.0.0.1:9/", Duration::from_millis(200)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        let err = client.register_session("u", "a").unwrap_err();
        assert!(matches!(err, SinkError::Unavailable(_)));
    }
}
