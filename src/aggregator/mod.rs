//! Edge aggregation.
//!
//! Turns individual trip records plus a route distance/time table into one
//! [`TripEdge`] per directed station pair, stratified into (weekday, hour)
//! buckets.

pub mod aggregate;
pub mod routes;
pub mod types;
pub mod utility;

pub use aggregate::{EdgeAggregation, MissingRoutePolicy, aggregate_edges};
pub use routes::RouteTable;
pub use types::{BucketKey, TripEdge};
