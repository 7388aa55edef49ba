//! Trait and batching driver for the external distance/time lookup.

use crate::catalog::{RouteEstimate, Station, StationPair, TripRecord};
use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{info, warn};

/// Most pairs a single lookup call may carry.
pub const MAX_PAIRS_PER_CALL: usize = 10;

/// Pause between consecutive lookup calls.
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// A station pair with both endpoints' coordinates, ready for a routing query.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCoordinates {
    pub pair: StationPair,
    pub origin: (f64, f64),
    pub destination: (f64, f64),
}

/// Abstraction over a routing provider (e.g. Google Distance Matrix).
#[async_trait::async_trait]
pub trait RouteLookup: Send + Sync {
    /// Looks up at most [`MAX_PAIRS_PER_CALL`] pairs in one call.
    ///
    /// The result is index-aligned with `pairs`; `None` marks a pair the
    /// provider could not route.
    async fn lookup(&self, pairs: &[PairCoordinates]) -> Result<Vec<Option<RouteEstimate>>>;
}

/// Collects the distinct directed pairs seen in `trips`, with coordinates taken
/// from the catalog. Pairs with an endpoint missing from the catalog are left out.
pub fn trip_pairs(trips: &[TripRecord], stations: &[Station]) -> Vec<PairCoordinates> {
    let coords: HashMap<&str, (f64, f64)> = stations
        .iter()
        .map(|s| (s.name.as_str(), (s.latitude, s.longitude)))
        .collect();

    let distinct: BTreeSet<StationPair> = trips
        .iter()
        .map(|t| StationPair::new(&t.origin, &t.destination))
        .collect();

    distinct
        .into_iter()
        .filter_map(|pair| {
            let origin = *coords.get(pair.origin.as_str())?;
            let destination = *coords.get(pair.destination.as_str())?;
            Some(PairCoordinates {
                pair,
                origin,
                destination,
            })
        })
        .collect()
}

/// Resolves every pair through `lookup`, `batch_size` pairs per call with
/// `pacing` between calls.
///
/// Pairs the provider cannot route are logged and omitted, so they surface
/// later as [`Error::LookupIncomplete`] rather than as NaN distances.
#[tracing::instrument(skip(lookup, pairs), fields(pairs = pairs.len()))]
pub async fn build_route_table<L: RouteLookup + ?Sized>(
    lookup: &L,
    pairs: &[PairCoordinates],
    batch_size: usize,
    pacing: Duration,
) -> Result<Vec<RouteEstimate>> {
    if batch_size == 0 || batch_size > MAX_PAIRS_PER_CALL {
        return Err(Error::BatchTooLarge {
            size: batch_size,
            limit: MAX_PAIRS_PER_CALL,
        });
    }

    let mut routes = Vec::with_capacity(pairs.len());
    let mut unresolved = 0usize;

    for (i, batch) in pairs.chunks(batch_size).enumerate() {
        if i > 0 && !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }

        let results = lookup.lookup(batch).await?;
        if results.len() != batch.len() {
            return Err(Error::FeedUnavailable(format!(
                "route lookup returned {} results for {} pairs",
                results.len(),
                batch.len()
            )));
        }

        for (request, result) in batch.iter().zip(results) {
            match result {
                Some(route) => routes.push(route),
                None => {
                    unresolved += 1;
                    warn!(pair = %request.pair, "No route returned for pair");
                }
            }
        }
    }

    info!(resolved = routes.len(), unresolved, "Route table built");
    Ok(routes)
}
