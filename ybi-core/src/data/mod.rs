//! Data access — typed read API over the market-data provider and cache.
//!
//! No business logic lives here. HTTP and disk I/O are confined to this
//! layer; the simulator above it only ever sees typed bars.

pub mod fixture;
pub mod http_cache;
pub mod polygon;
pub mod provider;

pub use fixture::FixtureStore;
pub use http_cache::HttpCache;
pub use polygon::PolygonClient;
pub use provider::{DataError, MarketData};
