//! Universe hygiene and the daily watchlist builder.

pub mod hygiene;
pub mod watchlist;

pub use watchlist::build_watchlist;
