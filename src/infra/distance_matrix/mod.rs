//! Google Distance Matrix route lookup.

mod client;

pub use client::DistanceMatrixClient;
