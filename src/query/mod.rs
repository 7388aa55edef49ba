//! Read-side queries over the graph: popularity, pair estimates, and the
//! feature vector handed to the dock-availability classifier.
//!
//! Store failures about a named station surface here as
//! [`Error::StationUnavailable`](crate::error::Error::StationUnavailable);
//! connectivity failures as `StoreUnavailable`.

pub mod availability;
pub mod features;

pub use availability::{DockAvailability, DockClassifier, ThresholdClassifier};
pub use features::{
    DEFAULT_TRAVEL_SECS, FeatureVector, TripEstimate, assemble_feature_vector, popularity,
    trip_estimate,
};
