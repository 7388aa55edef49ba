use crate::aggregator::routes::RouteTable;
use crate::aggregator::types::{BucketKey, TripEdge};
use crate::aggregator::utility::{mean, weighted_mean};
use crate::catalog::{StationPair, TripRecord};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What to do with a trip pair that has no row in the route table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingRoutePolicy {
    /// Fail the whole run with [`Error::LookupIncomplete`].
    #[default]
    Reject,
    /// Leave the pair out and report it in [`EdgeAggregation::skipped`].
    Skip,
}

/// Result of one aggregation run.
#[derive(Debug, Default)]
pub struct EdgeAggregation {
    pub edges: BTreeMap<StationPair, TripEdge>,
    pub skipped: Vec<StationPair>,
}

/// Aggregates trip records into one [`TripEdge`] per observed directed pair.
///
/// Trips are partitioned by pair and (weekday, hour) bucket. Each bucket's
/// count and mean duration are combined into the pair's `total` and
/// count-weighted `avg_duration`. Route distance and anticipated time are
/// attached once per pair from `routes`.
///
/// # Errors
///
/// - [`Error::InvalidTrip`] for an out-of-range bucket or a negative or
///   non-finite duration.
/// - [`Error::LookupIncomplete`] for a pair missing from `routes` under
///   [`MissingRoutePolicy::Reject`].
#[tracing::instrument(skip_all, fields(trips = trips.len(), routes = routes.len(), policy = ?policy))]
pub fn aggregate_edges(
    trips: &[TripRecord],
    routes: &RouteTable,
    policy: MissingRoutePolicy,
) -> Result<EdgeAggregation> {
    let mut series: BTreeMap<StationPair, BTreeMap<BucketKey, Vec<f64>>> = BTreeMap::new();

    for trip in trips {
        let bucket = BucketKey::new(trip.weekday, trip.hour).ok_or_else(|| Error::InvalidTrip {
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            reason: format!("bucket w{}_h{} out of range", trip.weekday, trip.hour),
        })?;

        if !trip.duration.is_finite() || trip.duration < 0.0 {
            return Err(Error::InvalidTrip {
                origin: trip.origin.clone(),
                destination: trip.destination.clone(),
                reason: format!("duration {} is not a valid number of seconds", trip.duration),
            });
        }

        series
            .entry(StationPair::new(&trip.origin, &trip.destination))
            .or_default()
            .entry(bucket)
            .or_default()
            .push(trip.duration);
    }

    let mut aggregation = EdgeAggregation::default();

    for (pair, buckets) in series {
        let Some(route) = routes.get(&pair) else {
            match policy {
                MissingRoutePolicy::Reject => {
                    return Err(Error::LookupIncomplete {
                        origin: pair.origin,
                        destination: pair.destination,
                    });
                }
                MissingRoutePolicy::Skip => {
                    warn!(%pair, "No route estimate, skipping pair");
                    aggregation.skipped.push(pair);
                    continue;
                }
            }
        };

        let parts: Vec<(f64, u64)> = buckets
            .values()
            .map(|durations| (mean(durations), durations.len() as u64))
            .collect();

        let bucket_counts: BTreeMap<BucketKey, u64> = buckets
            .iter()
            .map(|(key, durations)| (*key, durations.len() as u64))
            .collect();

        let edge = TripEdge {
            total: bucket_counts.values().sum(),
            avg_duration: weighted_mean(&parts),
            distance: route.distance,
            anticipated_time: route.anticipated_time,
            bucket_counts,
        };

        aggregation.edges.insert(pair, edge);
    }

    info!(
        edges = aggregation.edges.len(),
        skipped = aggregation.skipped.len(),
        "Edge aggregation complete"
    );
    Ok(aggregation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RouteEstimate;
    use approx::assert_relative_eq;

    fn trip(origin: &str, destination: &str, weekday: u8, hour: u8, duration: f64) -> TripRecord {
        TripRecord {
            origin: origin.to_string(),
            destination: destination.to_string(),
            weekday,
            hour,
            duration,
        }
    }

    fn route(origin: &str, destination: &str, distance: f64, time: f64) -> RouteEstimate {
        RouteEstimate {
            origin: origin.to_string(),
            destination: destination.to_string(),
            distance,
            anticipated_time: time,
        }
    }

    #[test]
    fn test_two_trips_single_bucket() {
        let trips = vec![trip("A", "B", 0, 8, 600.0), trip("A", "B", 0, 8, 800.0)];
        let routes = RouteTable::from_rows(vec![route("A", "B", 1000.0, 700.0)]);

        let result = aggregate_edges(&trips, &routes, MissingRoutePolicy::Reject).unwrap();

        assert_eq!(result.edges.len(), 1);
        let edge = &result.edges[&StationPair::new("A", "B")];
        assert_eq!(
            *edge,
            TripEdge {
                total: 2,
                avg_duration: 700.0,
                distance: 1000.0,
                anticipated_time: 700.0,
                bucket_counts: BTreeMap::from([(BucketKey::new(0, 8).unwrap(), 2)]),
            }
        );
    }

    #[test]
    fn test_weighted_mean_across_buckets() {
        let trips = vec![
            trip("A", "B", 0, 8, 600.0),
            trip("A", "B", 0, 8, 800.0),
            trip("A", "B", 0, 8, 700.0),
            trip("A", "B", 4, 18, 1500.0),
        ];
        let routes = RouteTable::from_rows(vec![route("A", "B", 1000.0, 700.0)]);

        let result = aggregate_edges(&trips, &routes, MissingRoutePolicy::Reject).unwrap();
        let edge = &result.edges[&StationPair::new("A", "B")];

        // per-trip mean, not the mean of bucket means (1100)
        assert_relative_eq!(edge.avg_duration, 900.0);
        assert_eq!(edge.total, 4);
        assert_eq!(edge.total, edge.bucket_counts.values().sum::<u64>());
        assert_eq!(edge.bucket_counts[&BucketKey::new(4, 18).unwrap()], 1);
    }

    #[test]
    fn test_direction_produces_distinct_edges() {
        let trips = vec![trip("A", "B", 1, 9, 600.0), trip("B", "A", 1, 9, 900.0)];
        let routes = RouteTable::from_rows(vec![
            route("A", "B", 1000.0, 650.0),
            route("B", "A", 1100.0, 720.0),
        ]);

        let result = aggregate_edges(&trips, &routes, MissingRoutePolicy::Reject).unwrap();

        assert_eq!(result.edges.len(), 2);
        assert_eq!(result.edges[&StationPair::new("A", "B")].distance, 1000.0);
        assert_eq!(result.edges[&StationPair::new("B", "A")].distance, 1100.0);
        assert_eq!(result.edges[&StationPair::new("B", "A")].avg_duration, 900.0);
    }

    #[test]
    fn test_duplicate_route_rows_use_first() {
        let trips = vec![trip("A", "B", 0, 8, 600.0)];
        let routes = RouteTable::from_rows(vec![
            route("A", "B", 1000.0, 700.0),
            route("A", "B", 9999.0, 9999.0),
        ]);

        let result = aggregate_edges(&trips, &routes, MissingRoutePolicy::Reject).unwrap();
        let edge = &result.edges[&StationPair::new("A", "B")];

        assert_eq!(edge.distance, 1000.0);
        assert_eq!(edge.anticipated_time, 700.0);
    }

    #[test]
    fn test_missing_route_rejected() {
        let trips = vec![trip("A", "B", 0, 8, 600.0), trip("A", "C", 0, 8, 600.0)];
        let routes = RouteTable::from_rows(vec![route("A", "B", 1000.0, 700.0)]);

        let err = aggregate_edges(&trips, &routes, MissingRoutePolicy::Reject).unwrap_err();

        match err {
            Error::LookupIncomplete {
                origin,
                destination,
            } => {
                assert_eq!(origin, "A");
                assert_eq!(destination, "C");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_route_skipped() {
        let trips = vec![trip("A", "B", 0, 8, 600.0), trip("A", "C", 0, 8, 600.0)];
        let routes = RouteTable::from_rows(vec![route("A", "B", 1000.0, 700.0)]);

        let result = aggregate_edges(&trips, &routes, MissingRoutePolicy::Skip).unwrap();

        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.skipped, vec![StationPair::new("A", "C")]);
        assert!(result.edges.values().all(|e| e.distance.is_finite()));
    }

    #[test]
    fn test_non_finite_route_counts_as_missing() {
        let trips = vec![trip("A", "B", 0, 8, 600.0), trip("A", "C", 0, 8, 600.0)];
        let routes = RouteTable::from_rows(vec![
            route("A", "B", 1000.0, 700.0),
            route("A", "C", f64::NAN, 700.0),
        ]);

        let err = aggregate_edges(&trips, &routes, MissingRoutePolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            Error::LookupIncomplete { ref destination, .. } if destination == "C"
        ));

        let result = aggregate_edges(&trips, &routes, MissingRoutePolicy::Skip).unwrap();
        assert_eq!(result.skipped, vec![StationPair::new("A", "C")]);
        assert_eq!(result.edges.len(), 1);
    }

    #[test]
    fn test_invalid_bucket_rejected() {
        let trips = vec![trip("A", "B", 7, 8, 600.0)];
        let routes = RouteTable::from_rows(vec![route("A", "B", 1000.0, 700.0)]);

        let err = aggregate_edges(&trips, &routes, MissingRoutePolicy::Skip).unwrap_err();
        assert!(matches!(err, Error::InvalidTrip { .. }));
    }

    #[test]
    fn test_nan_duration_rejected() {
        let trips = vec![trip("A", "B", 0, 8, f64::NAN)];
        let routes = RouteTable::from_rows(vec![route("A", "B", 1000.0, 700.0)]);

        let err = aggregate_edges(&trips, &routes, MissingRoutePolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::InvalidTrip { .. }));
    }

    #[test]
    fn test_no_trips_no_edges() {
        let routes = RouteTable::from_rows(vec![route("A", "B", 1000.0, 700.0)]);

        let result = aggregate_edges(&[], &routes, MissingRoutePolicy::Reject).unwrap();

        assert!(result.edges.is_empty());
        assert!(result.skipped.is_empty());
    }
}
