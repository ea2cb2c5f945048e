pub mod provider;
pub mod series_cache;

pub use provider::MarketDataProvider;
pub use series_cache::{Bar, SeriesCache, SeriesKey};
