//! Quote sources for the pedlar rebalancing loop.
//!
//! Implementations of [`pedlar::QuoteSource`]:
//!
//! - **TrueFX** (feature `truefx`): FX top-of-book over the TrueFX rates API
//! - **IEX** (feature `iex`): equity top-of-book from the IEX TOPS endpoint
//! - [`CompositeFeed`]: one snapshot across several venues
//! - [`MockFeed`]: scripted snapshots and failures for tests

pub mod composite;
pub mod error;
pub mod mock;

#[cfg(feature = "truefx")]
pub mod truefx;

#[cfg(feature = "iex")]
pub mod iex;

pub use composite::CompositeFeed;
pub use error::FeedError;
pub use mock::MockFeed;

#[cfg(feature = "truefx")]
pub use truefx::TrueFxFeed;

#[cfg(feature = "iex")]
pub use iex::IexFeed;

use pedlar::InstrumentKey;

/// Tickers in `universe` quoted on `venue`, in universe order.
pub fn tickers_for<'a>(universe: &'a [InstrumentKey], venue: &str) -> Vec<&'a str> {
    universe
        .iter()
        .filter(|k| k.venue.as_str() == venue)
        .map(|k| k.ticker.as_str())
        .collect()
}
