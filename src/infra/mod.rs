//! Concrete clients for the external collaborators.

pub mod distance_matrix;
pub mod gbfs;
