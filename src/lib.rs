pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod infra;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod services;

pub use error::{Error, Result};
