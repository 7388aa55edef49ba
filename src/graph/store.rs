//! redb-backed station/trip graph.
//!
//! Stations are nodes keyed by name. Trips are directed edges keyed by
//! `(origin, destination)`; an inbound index keyed by `(destination, origin)`
//! makes "edges entering a station" a range scan instead of a full scan.
//!
//! Every public operation runs in exactly one redb transaction. A write
//! transaction that is dropped without `commit` is aborted, so an early
//! return through `?` never leaves a half-written edge behind.

use crate::aggregator::TripEdge;
use crate::catalog::{Station, StationPair};
use crate::error::{Error, Result, store_err};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Station nodes: name -> JSON-encoded [`Station`].
const STATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("stations");

/// Trip edges: (origin, destination) -> JSON-encoded [`TripEdge`].
const TRIPS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("trips");

/// Inbound index: (destination, origin) -> ().
const INBOUND: TableDefinition<(&str, &str), ()> = TableDefinition::new("trips_inbound");

/// Inbound and outbound trip totals for one station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TripCounts {
    pub inbound: u64,
    pub outbound: u64,
}

impl TripCounts {
    pub fn total(&self) -> u64 {
        self.inbound + self.outbound
    }
}

/// A stored edge together with the pair it connects.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrip {
    pub origin: String,
    pub destination: String,
    pub edge: TripEdge,
}

/// Handle to an open graph database.
///
/// Constructed explicitly with [`GraphStore::open`] and released with
/// [`GraphStore::close`] (or on drop). redb holds an exclusive file lock, so
/// a second process opening the same file gets [`Error::StoreUnavailable`].
pub struct GraphStore {
    db: Database,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore").finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(key: impl std::fmt::Display, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| Error::Corrupt {
        key: key.to_string(),
        source,
    })
}

fn encode(key: impl std::fmt::Display, value: &impl serde::Serialize) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| Error::Encode {
        key: key.to_string(),
        source,
    })
}

impl GraphStore {
    /// Opens or creates the graph database at `path`.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path.as_ref()).map_err(store_err)?;

        let write_txn = db.begin_write().map_err(store_err)?;
        {
            write_txn.open_table(STATIONS).map_err(store_err)?;
            write_txn.open_table(TRIPS).map_err(store_err)?;
            write_txn.open_table(INBOUND).map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;

        info!("Graph store opened");
        Ok(Self { db })
    }

    /// Releases the database file lock.
    pub fn close(self) {
        drop(self.db);
        info!("Graph store closed");
    }

    /// Inserts a station node, replacing any existing node with the same name.
    ///
    /// Returns `true` when the station did not exist before.
    pub fn create_station(&self, station: &Station) -> Result<bool> {
        let bytes = encode(&station.name, station)?;

        let write_txn = self.db.begin_write().map_err(store_err)?;
        let created = {
            let mut table = write_txn.open_table(STATIONS).map_err(store_err)?;
            let previous = table
                .insert(station.name.as_str(), bytes.as_slice())
                .map_err(store_err)?;
            previous.is_none()
        };
        write_txn.commit().map_err(store_err)?;

        debug!(station = %station.name, created, "Station upserted");
        Ok(created)
    }

    /// Creates or fully replaces the directed edge `origin -> destination`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingEndpoint`] if either station is not in the store;
    /// [`Error::InvalidTrip`] if a duration, distance or time is not a finite,
    /// non-negative number.
    pub fn upsert_trip(&self, origin: &str, destination: &str, edge: &TripEdge) -> Result<()> {
        let figures = [
            ("avg_duration", edge.avg_duration),
            ("distance", edge.distance),
            ("anticipated_time", edge.anticipated_time),
        ];
        if let Some((field, value)) = figures
            .into_iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(Error::InvalidTrip {
                origin: origin.to_string(),
                destination: destination.to_string(),
                reason: format!("{field} {value} cannot be stored"),
            });
        }

        let bytes = encode(format_args!("{origin} -> {destination}"), edge)?;

        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let stations = write_txn.open_table(STATIONS).map_err(store_err)?;
            for name in [origin, destination] {
                if stations.get(name).map_err(store_err)?.is_none() {
                    return Err(Error::MissingEndpoint {
                        origin: origin.to_string(),
                        destination: destination.to_string(),
                        missing: name.to_string(),
                    });
                }
            }

            let mut trips = write_txn.open_table(TRIPS).map_err(store_err)?;
            trips
                .insert((origin, destination), bytes.as_slice())
                .map_err(store_err)?;

            let mut inbound = write_txn.open_table(INBOUND).map_err(store_err)?;
            inbound
                .insert((destination, origin), ())
                .map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;

        debug!(origin, destination, total = edge.total, "Trip upserted");
        Ok(())
    }

    pub fn get_station(&self, name: &str) -> Result<Station> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(STATIONS).map_err(store_err)?;

        match table.get(name).map_err(store_err)? {
            Some(bytes) => decode(name, bytes.value()),
            None => Err(Error::NotFound(format!("station '{name}'"))),
        }
    }

    /// Returns every station name.
    pub fn get_all_stations(&self) -> Result<BTreeSet<String>> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(STATIONS).map_err(store_err)?;

        let mut names = BTreeSet::new();
        for entry in table.iter().map_err(store_err)? {
            let (key, _) = entry.map_err(store_err)?;
            names.insert(key.value().to_string());
        }
        Ok(names)
    }

    /// Returns the edge `origin -> destination`. Direction-sensitive: the
    /// reverse edge is never returned in its place.
    pub fn get_trip(&self, origin: &str, destination: &str) -> Result<TripEdge> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(TRIPS).map_err(store_err)?;

        match table.get((origin, destination)).map_err(store_err)? {
            Some(bytes) => decode(format_args!("{origin} -> {destination}"), bytes.value()),
            None => Err(Error::NotFound(format!(
                "trip '{origin}' -> '{destination}'"
            ))),
        }
    }

    /// Sums `total` over the edges entering and leaving `name`.
    pub fn count_trips(&self, name: &str) -> Result<TripCounts> {
        let read_txn = self.db.begin_read().map_err(store_err)?;

        let stations = read_txn.open_table(STATIONS).map_err(store_err)?;
        if stations.get(name).map_err(store_err)?.is_none() {
            return Err(Error::NotFound(format!("station '{name}'")));
        }

        let trips = read_txn.open_table(TRIPS).map_err(store_err)?;
        let inbound_index = read_txn.open_table(INBOUND).map_err(store_err)?;

        let mut counts = TripCounts::default();

        for entry in trips.range((name, "")..).map_err(store_err)? {
            let (key, value) = entry.map_err(store_err)?;
            let (origin, destination) = key.value();
            if origin != name {
                break;
            }
            let edge: TripEdge = decode(format_args!("{origin} -> {destination}"), value.value())?;
            counts.outbound += edge.total;
        }

        for entry in inbound_index.range((name, "")..).map_err(store_err)? {
            let (key, _) = entry.map_err(store_err)?;
            let (destination, origin) = key.value();
            if destination != name {
                break;
            }
            let bytes = trips
                .get((origin, destination))
                .map_err(store_err)?
                .ok_or_else(|| Error::StoreUnavailable(format!(
                    "inbound index points at missing trip '{origin}' -> '{destination}'"
                )))?;
            let edge: TripEdge = decode(format_args!("{origin} -> {destination}"), bytes.value())?;
            counts.inbound += edge.total;
        }

        Ok(counts)
    }

    /// Edges leaving `name`, ordered by destination.
    pub fn outbound_trips(&self, name: &str) -> Result<Vec<StoredTrip>> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let trips = read_txn.open_table(TRIPS).map_err(store_err)?;

        let mut out = Vec::new();
        for entry in trips.range((name, "")..).map_err(store_err)? {
            let (key, value) = entry.map_err(store_err)?;
            let (origin, destination) = key.value();
            if origin != name {
                break;
            }
            out.push(StoredTrip {
                origin: origin.to_string(),
                destination: destination.to_string(),
                edge: decode(format_args!("{origin} -> {destination}"), value.value())?,
            });
        }
        Ok(out)
    }

    /// Edges entering `name`, ordered by origin.
    pub fn inbound_trips(&self, name: &str) -> Result<Vec<StoredTrip>> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let trips = read_txn.open_table(TRIPS).map_err(store_err)?;
        let inbound_index = read_txn.open_table(INBOUND).map_err(store_err)?;

        let mut out = Vec::new();
        for entry in inbound_index.range((name, "")..).map_err(store_err)? {
            let (key, _) = entry.map_err(store_err)?;
            let (destination, origin) = key.value();
            if destination != name {
                break;
            }
            let bytes = trips
                .get((origin, destination))
                .map_err(store_err)?
                .ok_or_else(|| Error::StoreUnavailable(format!(
                    "inbound index points at missing trip '{origin}' -> '{destination}'"
                )))?;
            out.push(StoredTrip {
                origin: origin.to_string(),
                destination: destination.to_string(),
                edge: decode(format_args!("{origin} -> {destination}"), bytes.value())?,
            });
        }
        Ok(out)
    }

    /// Deletes every edge whose pair is not in `keep`, along with its inbound
    /// index entry. Returns the number removed.
    pub fn retain_trips(&self, keep: &BTreeSet<StationPair>) -> Result<usize> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let stale = {
            let mut trips = write_txn.open_table(TRIPS).map_err(store_err)?;
            let mut inbound = write_txn.open_table(INBOUND).map_err(store_err)?;

            let mut stale = Vec::new();
            for entry in trips.iter().map_err(store_err)? {
                let (key, _) = entry.map_err(store_err)?;
                let (origin, destination) = key.value();
                let pair = StationPair::new(origin, destination);
                if !keep.contains(&pair) {
                    stale.push(pair);
                }
            }

            for pair in &stale {
                trips
                    .remove((pair.origin.as_str(), pair.destination.as_str()))
                    .map_err(store_err)?;
                inbound
                    .remove((pair.destination.as_str(), pair.origin.as_str()))
                    .map_err(store_err)?;
            }
            stale
        };
        write_txn.commit().map_err(store_err)?;

        for pair in &stale {
            debug!(%pair, "Stale trip removed");
        }
        Ok(stale.len())
    }

    /// Sums `total` over every edge in the graph.
    pub fn global_trip_total(&self) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let trips = read_txn.open_table(TRIPS).map_err(store_err)?;

        let mut total = 0;
        for entry in trips.iter().map_err(store_err)? {
            let (key, value) = entry.map_err(store_err)?;
            let (origin, destination) = key.value();
            let edge: TripEdge = decode(format_args!("{origin} -> {destination}"), value.value())?;
            total += edge.total;
        }
        Ok(total)
    }

    /// Writes undecodable bytes for an edge and its index entry.
    #[cfg(test)]
    pub(crate) fn put_unreadable_trip(&self, origin: &str, destination: &str) {
        let write_txn = self.db.begin_write().unwrap();
        {
            let mut trips = write_txn.open_table(TRIPS).unwrap();
            trips.insert((origin, destination), b"null".as_slice()).unwrap();
            let mut inbound = write_txn.open_table(INBOUND).unwrap();
            inbound.insert((destination, origin), ()).unwrap();
        }
        write_txn.commit().unwrap();
    }
}
