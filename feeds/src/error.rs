//! Feed error types.

use pedlar::SourceError;

/// Errors that can occur while fetching quotes from a venue.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<FeedError> for SourceError {
    fn from(e: FeedError) -> Self {
        match e {
            FeedError::Timeout(msg) => SourceError::Timeout(msg),
            FeedError::Parse(msg) => SourceError::Malformed(msg),
            other => SourceError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(any(feature = "truefx", feature = "iex"))]
impl FeedError {
    /// Classify a reqwest failure.
    pub(crate) fn from_reqwest(context: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FeedError::Timeout(format!("{context}: {e}"))
        } else if e.is_decode() {
            FeedError::Parse(format!("{context}: {e}"))
        } else {
            FeedError::Connection(format!("{context}: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_source_error() {
        let e: SourceError = FeedError::Timeout("tops".into()).into();
        assert_eq!(e, SourceError::Timeout("tops".into()));

        let e: SourceError = FeedError::Parse("bad row".into()).into();
        assert_eq!(e, SourceError::Malformed("bad row".into()));

        let e: SourceError = FeedError::Http {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert_eq!(e, SourceError::Unavailable("HTTP 503: busy".into()));
    }
}
