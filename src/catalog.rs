//! Input records: the station catalog, cleaned trip rows and the route table.
//!
//! All three arrive as CSV files produced by upstream cleaning steps. Column
//! names follow the public Bluebikes exports.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

/// A dock location. Persisted as a graph node with the fields `name`, `lat`,
/// `long` and `docks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "long")]
    pub longitude: f64,
    pub docks: u32,
}

/// One row of the station catalog CSV.
#[derive(Debug, Deserialize)]
struct StationRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Total docks")]
    docks: u32,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station {
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            docks: row.docks,
        }
    }
}

/// A single historical trip, already bucketed by the weekday (Monday = 0) and
/// hour it started in. `duration` is in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "start station name")]
    pub origin: String,
    #[serde(rename = "end station name")]
    pub destination: String,
    pub weekday: u8,
    pub hour: u8,
    #[serde(rename = "tripduration")]
    pub duration: f64,
}

/// An ordered (origin, destination) pair. `(A, B)` and `(B, A)` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationPair {
    pub origin: String,
    pub destination: String,
}

impl StationPair {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }
}

impl std::fmt::Display for StationPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}

/// Externally sourced route distance (meters) and travel time (seconds) for a pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEstimate {
    #[serde(rename = "start station name")]
    pub origin: String,
    #[serde(rename = "end station name")]
    pub destination: String,
    pub distance: f64,
    #[serde(rename = "time")]
    pub anticipated_time: f64,
}

impl RouteEstimate {
    pub fn pair(&self) -> StationPair {
        StationPair::new(&self.origin, &self.destination)
    }

    /// Both figures are finite and non-negative.
    pub fn is_usable(&self) -> bool {
        [self.distance, self.anticipated_time]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// One row of the route table CSV. Unroutable pairs are written with empty cells.
#[derive(Debug, Deserialize)]
struct RouteRow {
    #[serde(rename = "start station name")]
    origin: String,
    #[serde(rename = "end station name")]
    destination: String,
    distance: Option<f64>,
    time: Option<f64>,
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }

    debug!(path = %path.display(), rows = rows.len(), "CSV loaded");
    Ok(rows)
}

/// Reads the station catalog CSV (`Name`, `Latitude`, `Longitude`, `Total docks`).
pub fn load_stations(path: impl AsRef<Path>) -> Result<Vec<Station>> {
    let rows: Vec<StationRow> = read_rows(path.as_ref())?;
    Ok(rows.into_iter().map(Station::from).collect())
}

/// Reads cleaned trip rows.
pub fn load_trips(path: impl AsRef<Path>) -> Result<Vec<TripRecord>> {
    read_rows(path.as_ref())
}

/// Reads the route table (`start station name`, `end station name`, `distance`, `time`).
///
/// Rows with an empty `distance` or `time` are dropped with a warning, so their
/// pair counts as missing from the table.
pub fn load_routes(path: impl AsRef<Path>) -> Result<Vec<RouteEstimate>> {
    let rows: Vec<RouteRow> = read_rows(path.as_ref())?;

    let routes = rows
        .into_iter()
        .filter_map(|row| match (row.distance, row.time) {
            (Some(distance), Some(anticipated_time)) => Some(RouteEstimate {
                origin: row.origin,
                destination: row.destination,
                distance,
                anticipated_time,
            }),
            _ => {
                warn!(
                    origin = %row.origin,
                    destination = %row.destination,
                    "Route row has no distance or time, dropping"
                );
                None
            }
        })
        .collect();
    Ok(routes)
}

/// Keeps only trips whose origin and destination both appear in the catalog.
pub fn retain_catalog_trips(trips: Vec<TripRecord>, stations: &[Station]) -> Vec<TripRecord> {
    let names: HashSet<&str> = stations.iter().map(|s| s.name.as_str()).collect();
    let before = trips.len();

    let kept: Vec<TripRecord> = trips
        .into_iter()
        .filter(|t| names.contains(t.origin.as_str()) && names.contains(t.destination.as_str()))
        .collect();

    info!(
        kept = kept.len(),
        dropped = before - kept.len(),
        "Filtered trips to catalog stations"
    );
    kept
}
