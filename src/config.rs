//! Runtime settings read from the environment (and `.env` via `dotenvy`).

use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "data/bike_graph.redb";
pub const DEFAULT_GBFS_BASE_URL: &str = "https://gbfs.bluebikes.com/gbfs/en/";

/// Paths and credentials for the store and the external collaborators.
#[derive(Clone, Default)]
pub struct Settings {
    /// Graph database file (`BIKE_GRAPH_DB`).
    pub db_path: PathBuf,
    /// Distance Matrix API key (`MAPS_API`).
    pub maps_api_key: Option<String>,
    /// GBFS system root (`GBFS_BASE_URL`).
    pub gbfs_base_url: String,
    /// JSON file of station name -> GBFS id overrides (`STATION_ID_OVERRIDES`).
    pub station_id_overrides: Option<PathBuf>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("db_path", &self.db_path)
            .field("maps_api_key", &self.maps_api_key.as_ref().map(|_| "<redacted>"))
            .field("gbfs_base_url", &self.gbfs_base_url)
            .field("station_id_overrides", &self.station_id_overrides)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            db_path: var("BIKE_GRAPH_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            maps_api_key: var("MAPS_API"),
            gbfs_base_url: var("GBFS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GBFS_BASE_URL.to_string()),
            station_id_overrides: var("STATION_ID_OVERRIDES").map(PathBuf::from),
        }
    }
}
