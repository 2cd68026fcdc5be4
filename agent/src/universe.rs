//! Instrument universe parsing.

use pedlar::InstrumentKey;
use pedlar_feeds::truefx::UNAUTHENTICATED_PAIRS;

use crate::error::{Error, Result};

/// The ten unauthenticated TrueFX pairs plus SPY and QQQ on IEX.
pub fn default_universe() -> Vec<String> {
    UNAUTHENTICATED_PAIRS
        .iter()
        .map(|pair| format!("TrueFX:{pair}"))
        .chain(["IEX:SPY".to_string(), "IEX:QQQ".to_string()])
        .collect()
}

/// Parse `VENUE:TICKER` entries, rejecting malformed and duplicate ones.
pub fn parse_universe(entries: &[String]) -> Result<Vec<InstrumentKey>> {
    let mut keys: Vec<InstrumentKey> = Vec::with_capacity(entries.len());
    for entry in entries {
        let key = InstrumentKey::parse(entry).ok_or_else(|| {
            Error::Config(format!("universe entry {entry:?} is not VENUE:TICKER"))
        })?;
        if keys.contains(&key) {
            return Err(Error::Config(format!("duplicate universe entry {key}")));
        }
        keys.push(key);
    }
    Ok(keys)
}

/// Distinct venues in universe order.
pub fn venues(universe: &[InstrumentKey]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for key in universe {
        let venue = key.venue.as_str();
        if !out.contains(&venue) {
            out.push(venue);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_twelve_instruments() {
        let keys = parse_universe(&default_universe()).unwrap();
        assert_eq!(keys.len(), 12);
        assert_eq!(keys[0], InstrumentKey::new("TrueFX", "EUR/USD"));
        assert_eq!(keys[11], InstrumentKey::new("IEX", "QQQ"));
        assert_eq!(venues(&keys), vec!["TrueFX", "IEX"]);
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(parse_universe(&["SPY".to_string()]).is_err());
        assert!(parse_universe(&["IEX:SPY".to_string(), "IEX:SPY".to_string()]).is_err());
    }
}
