//! Seams for the external collaborators: routing and live capacity.

pub mod capacity_feed;
pub mod route_lookup;

pub use capacity_feed::CapacityFeed;
pub use route_lookup::{
    DEFAULT_PACING, MAX_PAIRS_PER_CALL, PairCoordinates, RouteLookup, build_route_table,
    trip_pairs,
};
