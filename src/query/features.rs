use chrono::{NaiveTime, TimeDelta, Timelike, Weekday};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::GraphStore;
use crate::services::capacity_feed::CapacityFeed;

/// Travel time assumed when no edge connects the requested origin and destination.
pub const DEFAULT_TRAVEL_SECS: i64 = 900;

/// Classifier input for one destination at one point in the week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub popularity: f64,
    pub docks: u32,
    pub hour: u32,
    /// Days from Monday (0) to Sunday (6).
    pub day: u32,
    pub live_capacity: u32,
}

impl FeatureVector {
    /// `[popularity, docks, hour, day, live_capacity]`
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.popularity,
            self.docks as f64,
            self.hour as f64,
            self.day as f64,
            self.live_capacity as f64,
        ]
    }
}

/// Expected travel between a directed pair, read from its edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripEstimate {
    pub trips: u64,
    pub avg_duration: f64,
    pub anticipated_time: f64,
    pub distance: f64,
}

/// Undecodable records surface as an unavailable store.
fn store_outcome(err: Error) -> Error {
    match err {
        Error::Corrupt { key, source } => {
            Error::StoreUnavailable(format!("unreadable record {key}: {source}"))
        }
        other => other,
    }
}

/// Collapses store failures about a named station into the query layer's outcomes.
fn station_outcome(name: &str, err: Error) -> Error {
    match err {
        Error::NotFound(_) => Error::StationUnavailable(name.to_string()),
        other => store_outcome(other),
    }
}

/// Share of the network's trip volume touching `name`:
/// `(inbound + outbound) / Σ edge totals`.
///
/// Every trip counts once as outbound and once as inbound, so the values sum
/// to 2 across all stations. An empty network yields `0.0`.
#[tracing::instrument(skip(store))]
pub fn popularity(store: &GraphStore, name: &str) -> Result<f64> {
    let counts = store
        .count_trips(name)
        .map_err(|e| station_outcome(name, e))?;
    let global = store.global_trip_total().map_err(store_outcome)?;

    if global == 0 {
        return Ok(0.0);
    }
    Ok(counts.total() as f64 / global as f64)
}

/// Expected duration and route figures for the directed pair.
///
/// # Errors
///
/// [`Error::NotFound`] when no trip was ever observed from `origin` to
/// `destination`; the reverse direction is not consulted.
pub fn trip_estimate(store: &GraphStore, origin: &str, destination: &str) -> Result<TripEstimate> {
    let edge = store
        .get_trip(origin, destination)
        .map_err(store_outcome)?;

    Ok(TripEstimate {
        trips: edge.total,
        avg_duration: edge.avg_duration,
        anticipated_time: edge.anticipated_time,
        distance: edge.distance,
    })
}

fn travel_time(store: &GraphStore, origin: &str, destination: &str) -> Result<TimeDelta> {
    let fallback = TimeDelta::seconds(DEFAULT_TRAVEL_SECS);

    let secs = match store.get_trip(origin, destination) {
        Ok(edge) => edge.anticipated_time,
        Err(Error::NotFound(_)) => {
            debug!(origin, destination, "No edge, using default travel time");
            return Ok(fallback);
        }
        Err(e) => return Err(store_outcome(e)),
    };

    if !secs.is_finite() || secs < 0.0 {
        warn!(origin, destination, secs, "Unusable anticipated time, using default");
        return Ok(fallback);
    }
    Ok(TimeDelta::try_seconds(secs.round() as i64).unwrap_or(fallback))
}

/// Builds `[popularity, docks, hour, day, live_capacity]` for `destination`.
///
/// Without an origin the hour is taken from `time` as given. With an origin,
/// `time` is the departure and the hour is that of the arrival,
/// `time + anticipated_time(origin, destination)`, or `time + 900 s` when the
/// pair has no edge. An arrival past midnight moves to the next day.
///
/// # Errors
///
/// [`Error::StationUnavailable`] when the destination is unknown to the store
/// or cannot be resolved in the live feed.
#[tracing::instrument(skip(store, feed))]
pub async fn assemble_feature_vector<F: CapacityFeed + ?Sized>(
    store: &GraphStore,
    feed: &F,
    origin: Option<&str>,
    destination: &str,
    day: Weekday,
    time: NaiveTime,
) -> Result<FeatureVector> {
    let station = store
        .get_station(destination)
        .map_err(|e| station_outcome(destination, e))?;
    let popularity = popularity(store, destination)?;

    let (arrival, arrival_day) = match origin {
        None => (time, day),
        Some(origin) => {
            let travel = travel_time(store, origin, destination)?;
            let (arrival, overflow_secs) = time.overflowing_add_signed(travel);
            let mut arrival_day = day;
            for _ in 0..overflow_secs / 86_400 {
                arrival_day = arrival_day.succ();
            }
            (arrival, arrival_day)
        }
    };

    let station_id = feed
        .resolve(destination)
        .await?
        .ok_or_else(|| Error::StationUnavailable(destination.to_string()))?;
    let live_capacity = feed.live_capacity(&station_id).await?;

    Ok(FeatureVector {
        popularity,
        docks: station.docks,
        hour: arrival.hour(),
        day: arrival_day.num_days_from_monday(),
        live_capacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{BucketKey, TripEdge};
    use crate::catalog::Station;
    use approx::assert_relative_eq;
    use std::collections::{BTreeMap, HashMap};

    struct FakeFeed {
        ids: HashMap<String, String>,
        capacity: HashMap<String, u32>,
    }

    impl FakeFeed {
        fn with(name: &str, id: &str, free: u32) -> Self {
            Self {
                ids: HashMap::from([(name.to_string(), id.to_string())]),
                capacity: HashMap::from([(id.to_string(), free)]),
            }
        }
    }

    #[async_trait::async_trait]
    impl CapacityFeed for FakeFeed {
        async fn resolve(&self, station_name: &str) -> Result<Option<String>> {
            Ok(self.ids.get(station_name).cloned())
        }

        async fn live_capacity(&self, station_id: &str) -> Result<u32> {
            self.capacity
                .get(station_id)
                .copied()
                .ok_or_else(|| Error::StationUnavailable(station_id.to_string()))
        }
    }

    fn station(name: &str, docks: u32) -> Station {
        Station {
            name: name.to_string(),
            latitude: 42.36,
            longitude: -71.06,
            docks,
        }
    }

    fn edge(total: u64, anticipated_time: f64) -> TripEdge {
        TripEdge {
            total,
            avg_duration: 650.0,
            distance: 1200.0,
            anticipated_time,
            bucket_counts: BTreeMap::from([(BucketKey::new(2, 14).unwrap(), total)]),
        }
    }

    /// Main St sees 1 trip in and 1 out of a 100-trip network.
    fn network() -> (tempfile::TempDir, GraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(dir.path().join("graph.redb")).unwrap();
        store.create_station(&station("Main St", 15)).unwrap();
        store.create_station(&station("Park Sq", 19)).unwrap();
        store.create_station(&station("Kendall", 23)).unwrap();
        store.create_station(&station("Quiet Corner", 7)).unwrap();

        store.upsert_trip("Park Sq", "Main St", &edge(1, 1800.0)).unwrap();
        store.upsert_trip("Main St", "Kendall", &edge(1, 600.0)).unwrap();
        store.upsert_trip("Park Sq", "Kendall", &edge(98, 900.0)).unwrap();
        (dir, store)
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_popularity_share() {
        let (_dir, store) = network();

        assert_relative_eq!(popularity(&store, "Main St").unwrap(), 0.02);
        assert_relative_eq!(popularity(&store, "Park Sq").unwrap(), 0.99);
        assert_eq!(popularity(&store, "Quiet Corner").unwrap(), 0.0);
    }

    #[test]
    fn test_popularity_sums_to_two() {
        let (_dir, store) = network();

        let sum: f64 = store
            .get_all_stations()
            .unwrap()
            .iter()
            .map(|name| popularity(&store, name).unwrap())
            .sum();

        assert_relative_eq!(sum, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_popularity_empty_network_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = GraphStore::open(dir.path().join("graph.redb")).unwrap();
        store.create_station(&station("Main St", 15)).unwrap();

        assert_eq!(popularity(&store, "Main St").unwrap(), 0.0);
    }

    #[test]
    fn test_popularity_unknown_station() {
        let (_dir, store) = network();
        let err = popularity(&store, "Atlantis").unwrap_err();
        assert!(matches!(err, Error::StationUnavailable(name) if name == "Atlantis"));
    }

    #[test]
    fn test_unreadable_edge_elsewhere_makes_store_unavailable() {
        let (_dir, store) = network();
        store.put_unreadable_trip("Kendall", "Quiet Corner");

        // Main St's own edges are fine, the network total is not
        let err = popularity(&store, "Main St").unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)), "{err:?}");

        let err = trip_estimate(&store, "Kendall", "Quiet Corner").unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)), "{err:?}");
    }

    #[test]
    fn test_trip_estimate_is_directional() {
        let (_dir, store) = network();

        let estimate = trip_estimate(&store, "Park Sq", "Main St").unwrap();
        assert_eq!(estimate.trips, 1);
        assert_eq!(estimate.anticipated_time, 1800.0);

        assert!(matches!(
            trip_estimate(&store, "Main St", "Park Sq"),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_feature_vector_without_origin() {
        let (_dir, store) = network();
        let feed = FakeFeed::with("Main St", "67", 20);

        let features =
            assemble_feature_vector(&store, &feed, None, "Main St", Weekday::Wed, at(14, 0))
                .await
                .unwrap();

        assert_eq!(features.to_array(), [0.02, 15.0, 14.0, 2.0, 20.0]);
    }

    #[tokio::test]
    async fn test_feature_vector_uses_edge_travel_time() {
        let (_dir, store) = network();
        let feed = FakeFeed::with("Main St", "67", 20);

        // 13:40 + 1800 s
        let features = assemble_feature_vector(
            &store,
            &feed,
            Some("Park Sq"),
            "Main St",
            Weekday::Wed,
            at(13, 40),
        )
        .await
        .unwrap();

        assert_eq!(features.hour, 14);
        assert_eq!(features.day, 2);
    }

    #[tokio::test]
    async fn test_feature_vector_missing_edge_falls_back() {
        let (_dir, store) = network();
        let feed = FakeFeed::with("Main St", "67", 20);

        // Kendall -> Main St has no edge: 13:50 + 900 s
        let features = assemble_feature_vector(
            &store,
            &feed,
            Some("Kendall"),
            "Main St",
            Weekday::Wed,
            at(13, 50),
        )
        .await
        .unwrap();

        assert_eq!(features.hour, 14);

        // and 13:40 + 900 s stays in the 13:00 hour
        let features = assemble_feature_vector(
            &store,
            &feed,
            Some("Kendall"),
            "Main St",
            Weekday::Wed,
            at(13, 40),
        )
        .await
        .unwrap();

        assert_eq!(features.hour, 13);
    }

    #[tokio::test]
    async fn test_feature_vector_rolls_over_midnight() {
        let (_dir, store) = network();
        let feed = FakeFeed::with("Main St", "67", 20);

        let features = assemble_feature_vector(
            &store,
            &feed,
            Some("Kendall"),
            "Main St",
            Weekday::Sun,
            at(23, 55),
        )
        .await
        .unwrap();

        assert_eq!(features.hour, 0);
        assert_eq!(features.day, 0);
    }

    #[tokio::test]
    async fn test_feature_vector_unresolvable_destination() {
        let (_dir, store) = network();
        let feed = FakeFeed::with("Park Sq", "12", 3);

        let err = assemble_feature_vector(&store, &feed, None, "Main St", Weekday::Mon, at(9, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StationUnavailable(name) if name == "Main St"));
    }

    #[tokio::test]
    async fn test_feature_vector_unknown_destination() {
        let (_dir, store) = network();
        let feed = FakeFeed::with("Atlantis", "1", 3);

        let err = assemble_feature_vector(&store, &feed, None, "Atlantis", Weekday::Mon, at(9, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::StationUnavailable(_)));
    }
}
