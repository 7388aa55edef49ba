mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Issues a GET through `client` and returns the raw body.
///
/// Non-success HTTP statuses are surfaced as [`Error::FeedUnavailable`].
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: reqwest::Url) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::FeedUnavailable(format!(
            "GET {} returned {}",
            resp.url(),
            status
        )));
    }

    Ok(resp.bytes().await?.to_vec())
}

/// Issues a GET through `client` and decodes the body as JSON.
pub async fn fetch_json<C: HttpClient, T: DeserializeOwned>(
    client: &C,
    url: reqwest::Url,
) -> Result<T> {
    let bytes = fetch_bytes(client, url).await?;
    serde_json::from_slice(&bytes).map_err(|e| Error::FeedUnavailable(e.to_string()))
}
