//! IEX TOPS parsing and composite routing with offline feeds.

use chrono::{TimeZone, Utc};
use pedlar::{InstrumentKey, Quote, QuoteSource, SourceError};
use pedlar_feeds::{CompositeFeed, MockFeed};

#[cfg(feature = "iex")]
mod tops {
    use pedlar_feeds::iex::parse_tops;

    #[test]
    fn parses_multi_symbol_body() {
        let body = r#"[
            {"symbol":"SPY","bidPrice":449.9,"askPrice":450.1,"bidSize":200,"askSize":100,"lastUpdated":1700000000123},
            {"symbol":"QQQ","bidPrice":0,"askPrice":0,"bidSize":0,"askSize":0,"lastUpdated":1700000000456}
        ]"#;
        let quotes = parse_tops(body).unwrap();
        assert_eq!(quotes.len(), 2);
        assert!(quotes[0].is_valid());
        // kept, but unusable for pricing
        assert!(!quotes[1].is_valid());
    }

    #[test]
    fn empty_array_is_empty_snapshot() {
        assert!(parse_tops("[]").unwrap().is_empty());
    }
}

fn spy() -> InstrumentKey {
    InstrumentKey::new("IEX", "SPY")
}
fn eurusd() -> InstrumentKey {
    InstrumentKey::new("TrueFX", "EUR/USD")
}

fn quote(key: &InstrumentKey) -> Quote {
    let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    Quote::new(t, key, 1.0, 1.1)
}

#[test]
fn composite_merges_venues() {
    let fx = MockFeed::builder().venue("TrueFX").with_snapshot(vec![quote(&eurusd())]).build();
    let eq = MockFeed::builder().venue("IEX").with_snapshot(vec![quote(&spy())]).build();
    let mut feed = CompositeFeed::new().with_feed(fx).with_feed(eq);

    let quotes = feed.fetch(&[spy(), eurusd()]).unwrap();
    assert_eq!(quotes.len(), 2);
    assert!(quotes.iter().any(|q| q.is_for(&spy())));
    assert!(quotes.iter().any(|q| q.is_for(&eurusd())));
}

#[test]
fn composite_survives_one_venue_down() {
    let fx = MockFeed::builder()
        .venue("TrueFX")
        .with_failure(SourceError::Timeout("slow".into()))
        .build();
    let eq = MockFeed::builder().venue("IEX").with_snapshot(vec![quote(&spy())]).build();
    let mut feed = CompositeFeed::new().with_feed(fx).with_feed(eq);

    let quotes = feed.fetch(&[spy(), eurusd()]).unwrap();
    assert_eq!(quotes.len(), 1);
    assert!(quotes[0].is_for(&spy()));
}
