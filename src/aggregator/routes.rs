use crate::catalog::{RouteEstimate, StationPair};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::warn;

/// Distance/time lookup keyed by directed station pair.
///
/// Holds exactly one estimate per pair. When the input rows repeat a pair,
/// the first row in input order wins and later rows are dropped with a warning.
/// Rows with a non-finite or negative distance or time are dropped before
/// that, so the pair is treated as missing unless a later row is usable.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<StationPair, RouteEstimate>,
}

impl RouteTable {
    pub fn from_rows(rows: impl IntoIterator<Item = RouteEstimate>) -> Self {
        let mut routes = HashMap::new();

        for row in rows {
            if !row.is_usable() {
                warn!(
                    origin = %row.origin,
                    destination = %row.destination,
                    distance = row.distance,
                    time = row.anticipated_time,
                    "Unusable route estimate, dropping"
                );
                continue;
            }

            match routes.entry(row.pair()) {
                Entry::Vacant(slot) => {
                    slot.insert(row);
                }
                Entry::Occupied(kept) => {
                    let kept: &RouteEstimate = kept.get();
                    warn!(
                        origin = %row.origin,
                        destination = %row.destination,
                        kept_distance = kept.distance,
                        ignored_distance = row.distance,
                        "Duplicate route row, keeping the first"
                    );
                }
            }
        }

        Self { routes }
    }

    pub fn get(&self, pair: &StationPair) -> Option<&RouteEstimate> {
        self.routes.get(pair)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
