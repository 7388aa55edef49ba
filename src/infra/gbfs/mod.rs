//! GBFS live station-status feed.

mod client;
mod overrides;

pub use client::GbfsCapacityFeed;
pub use overrides::StationIdOverrides;
