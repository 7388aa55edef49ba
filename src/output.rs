//! Output formatting and persistence for route tables and query results.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::RouteEstimate;

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes the route table as CSV with a header row, replacing any existing file.
///
/// The columns match what [`load_routes`](crate::catalog::load_routes) reads back.
pub fn write_route_table(path: impl AsRef<Path>, routes: &[RouteEstimate]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    debug!(path = %path.display(), rows = routes.len(), "Writing route table");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for route in routes {
        writer.serialize(route)?;
    }
    writer.flush()?;

    Ok(())
}
