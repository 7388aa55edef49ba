use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::overrides::StationIdOverrides;
use crate::error::{Error, Result};
use crate::fetch::{BasicClient, HttpClient, fetch_json};
use crate::services::capacity_feed::CapacityFeed;

#[derive(Debug, Deserialize)]
struct GbfsEnvelope<T> {
    data: GbfsStations<T>,
}

#[derive(Debug, Deserialize)]
struct GbfsStations<T> {
    stations: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StationInformation {
    station_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct StationStatus {
    station_id: String,
    num_docks_available: u32,
}

/// Live capacity read from a GBFS system's `station_information` and
/// `station_status` files.
pub struct GbfsCapacityFeed<C> {
    client: C,
    base_url: reqwest::Url,
    overrides: StationIdOverrides,
}

impl GbfsCapacityFeed<BasicClient> {
    pub fn from_base_url(base_url: &str, overrides: StationIdOverrides) -> Result<Self> {
        Self::new(BasicClient::new()?, base_url, overrides)
    }
}

impl<C: HttpClient> GbfsCapacityFeed<C> {
    pub fn new(client: C, base_url: &str, overrides: StationIdOverrides) -> Result<Self> {
        // Url::join replaces the last path segment unless the base ends in '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = reqwest::Url::parse(&normalized)
            .map_err(|e| Error::FeedUnavailable(format!("bad GBFS url: {e}")))?;

        Ok(Self {
            client,
            base_url,
            overrides,
        })
    }

    async fn stations<T: serde::de::DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let url = self
            .base_url
            .join(file)
            .map_err(|e| Error::FeedUnavailable(format!("bad GBFS url: {e}")))?;
        let envelope: GbfsEnvelope<T> = fetch_json(&self.client, url).await?;
        Ok(envelope.data.stations)
    }
}

#[async_trait]
impl<C: HttpClient> CapacityFeed for GbfsCapacityFeed<C> {
    async fn resolve(&self, station_name: &str) -> Result<Option<String>> {
        if let Some(id) = self.overrides.get(station_name) {
            debug!(station = station_name, station_id = id, "Resolved via override");
            return Ok(Some(id.to_string()));
        }

        let stations: Vec<StationInformation> = self.stations("station_information.json").await?;
        Ok(stations
            .into_iter()
            .find(|s| s.name == station_name)
            .map(|s| s.station_id))
    }

    async fn live_capacity(&self, station_id: &str) -> Result<u32> {
        let statuses: Vec<StationStatus> = self.stations("station_status.json").await?;
        statuses
            .into_iter()
            .find(|s| s.station_id == station_id)
            .map(|s| s.num_docks_available)
            .ok_or_else(|| Error::StationUnavailable(format!("GBFS station id '{station_id}'")))
    }
}
