//! Trait for the live dock-capacity collaborator.

use crate::error::Result;

/// Abstraction over a live station-status provider (e.g. a GBFS system).
#[async_trait::async_trait]
pub trait CapacityFeed: Send + Sync {
    /// Maps a catalog station name to the provider's station identifier.
    /// `Ok(None)` means the provider does not know the station.
    async fn resolve(&self, station_name: &str) -> Result<Option<String>>;

    /// Current number of free docks at the provider station `station_id`.
    async fn live_capacity(&self, station_id: &str) -> Result<u32>;
}
