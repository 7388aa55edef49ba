//! Batch graph build: catalog + trips + route table -> stations and edges in the store.
//!
//! A run recomputes every edge from scratch, upserts it, and removes edges the
//! new aggregation no longer contains. After a run the stored edges are exactly
//! that run's edges, and re-running over the same inputs leaves the store unchanged.

use crate::aggregator::{EdgeAggregation, MissingRoutePolicy, RouteTable, aggregate_edges};
use crate::catalog::{self, Station, StationPair};
use crate::error::Result;
use crate::graph::GraphStore;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Counts reported at the end of a build.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub stations: usize,
    pub trips: usize,
    pub edges: usize,
    /// Edges from an earlier run that this run no longer produced.
    pub removed: usize,
    pub skipped: Vec<StationPair>,
}

/// Writes every catalog station as a node. Returns how many were new.
#[tracing::instrument(skip_all, fields(stations = stations.len()))]
pub fn register_stations(store: &GraphStore, stations: &[Station]) -> Result<usize> {
    let mut created = 0;
    for station in stations {
        if store.create_station(station)? {
            created += 1;
        }
    }
    info!(created, existing = stations.len() - created, "Stations registered");
    Ok(created)
}

/// Upserts every aggregated edge. Returns the number written.
#[tracing::instrument(skip_all, fields(edges = aggregation.edges.len()))]
pub fn write_edges(store: &GraphStore, aggregation: &EdgeAggregation) -> Result<usize> {
    for (pair, edge) in &aggregation.edges {
        store.upsert_trip(&pair.origin, &pair.destination, edge)?;
    }
    info!("Edges written");
    Ok(aggregation.edges.len())
}

/// Removes stored edges that `aggregation` does not contain. Returns how many.
pub fn prune_edges(store: &GraphStore, aggregation: &EdgeAggregation) -> Result<usize> {
    let keep: BTreeSet<StationPair> = aggregation.edges.keys().cloned().collect();
    let removed = store.retain_trips(&keep)?;
    if removed > 0 {
        info!(removed, "Stale edges removed");
    }
    Ok(removed)
}

/// Loads the three CSV inputs and rebuilds the graph in `store`.
#[tracing::instrument(skip(store))]
pub fn build_graph(
    store: &GraphStore,
    stations_csv: &Path,
    trips_csv: &Path,
    routes_csv: &Path,
    policy: MissingRoutePolicy,
) -> Result<BuildSummary> {
    let stations = catalog::load_stations(stations_csv)?;
    register_stations(store, &stations)?;

    let trips = catalog::retain_catalog_trips(catalog::load_trips(trips_csv)?, &stations);
    let routes = RouteTable::from_rows(catalog::load_routes(routes_csv)?);

    let aggregation = aggregate_edges(&trips, &routes, policy)?;
    let edges = write_edges(store, &aggregation)?;
    let removed = prune_edges(store, &aggregation)?;

    Ok(BuildSummary {
        stations: stations.len(),
        trips: trips.len(),
        edges,
        removed,
        skipped: aggregation.skipped,
    })
}
