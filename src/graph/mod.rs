//! Persistent station/trip graph.

mod store;

pub use store::{GraphStore, StoredTrip, TripCounts};
