use async_trait::async_trait;
use serde::Deserialize;

use crate::catalog::RouteEstimate;
use crate::error::{Error, Result};
use crate::fetch::{BasicClient, HttpClient, auth::UrlParam, fetch_json};
use crate::services::route_lookup::{MAX_PAIRS_PER_CALL, PairCoordinates, RouteLookup};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: f64,
}

/// Bicycling distance/time lookup backed by the Google Distance Matrix API.
///
/// One request carries every origin and every destination of the batch; the
/// answer for pair `i` is the diagonal element `rows[i].elements[i]`.
pub struct DistanceMatrixClient<C> {
    client: C,
    base_url: reqwest::Url,
}

impl DistanceMatrixClient<UrlParam<BasicClient>> {
    /// Client for the public endpoint, authenticating with `api_key`.
    pub fn with_api_key(api_key: &str) -> Result<Self> {
        let client = UrlParam::new(BasicClient::new()?, "key", api_key);
        Self::new(client, DEFAULT_BASE_URL)
    }
}

impl<C: HttpClient> DistanceMatrixClient<C> {
    pub fn new(client: C, base_url: &str) -> Result<Self> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| Error::FeedUnavailable(format!("bad distance matrix url: {e}")))?;
        Ok(Self { client, base_url })
    }

    fn request_url(&self, pairs: &[PairCoordinates]) -> reqwest::Url {
        let join = |points: Vec<(f64, f64)>| {
            points
                .iter()
                .map(|(lat, lon)| format!("{lat},{lon}"))
                .collect::<Vec<_>>()
                .join("|")
        };

        let origins = join(pairs.iter().map(|p| p.origin).collect());
        let destinations = join(pairs.iter().map(|p| p.destination).collect());

        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("origins", &origins)
            .append_pair("destinations", &destinations)
            .append_pair("mode", "bicycling");
        url
    }
}

fn diagonal(response: MatrixResponse, pairs: &[PairCoordinates]) -> Result<Vec<Option<RouteEstimate>>> {
    if response.status != "OK" {
        return Err(Error::FeedUnavailable(format!(
            "distance matrix status {}: {}",
            response.status,
            response.error_message.unwrap_or_default()
        )));
    }

    let estimates = pairs
        .iter()
        .enumerate()
        .map(|(i, request)| {
            let element = response.rows.get(i)?.elements.get(i)?;
            if element.status != "OK" {
                return None;
            }
            Some(RouteEstimate {
                origin: request.pair.origin.clone(),
                destination: request.pair.destination.clone(),
                distance: element.distance.as_ref()?.value,
                anticipated_time: element.duration.as_ref()?.value,
            })
        })
        .collect();

    Ok(estimates)
}

#[async_trait]
impl<C: HttpClient> RouteLookup for DistanceMatrixClient<C> {
    async fn lookup(&self, pairs: &[PairCoordinates]) -> Result<Vec<Option<RouteEstimate>>> {
        if pairs.len() > MAX_PAIRS_PER_CALL {
            return Err(Error::BatchTooLarge {
                size: pairs.len(),
                limit: MAX_PAIRS_PER_CALL,
            });
        }
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let response: MatrixResponse = fetch_json(&self.client, self.request_url(pairs)).await?;
        diagonal(response, pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StationPair;

    struct NoNetwork;

    #[async_trait]
    impl HttpClient for NoNetwork {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            panic!("unexpected request to {}", req.url());
        }
    }

    fn pair(origin: &str, destination: &str, lat: f64) -> PairCoordinates {
        PairCoordinates {
            pair: StationPair::new(origin, destination),
            origin: (42.0, -71.0),
            destination: (lat, -71.1),
        }
    }

    #[test]
    fn test_request_url_lists_every_pair() {
        let client = DistanceMatrixClient::new(NoNetwork, DEFAULT_BASE_URL).unwrap();
        let url = client.request_url(&[pair("A", "B", 42.1), pair("A", "C", 42.2)]);

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("origins".into(), "42,-71|42,-71".into())));
        assert!(query.contains(&("destinations".into(), "42.1,-71.1|42.2,-71.1".into())));
        assert!(query.contains(&("mode".into(), "bicycling".into())));
    }

    #[test]
    fn test_diagonal_reads_matching_elements() {
        let json = r#"{
            "status": "OK",
            "rows": [
                {"elements": [
                    {"status": "OK", "distance": {"value": 1000}, "duration": {"value": 700}},
                    {"status": "OK", "distance": {"value": 9}, "duration": {"value": 9}}
                ]},
                {"elements": [
                    {"status": "OK", "distance": {"value": 9}, "duration": {"value": 9}},
                    {"status": "ZERO_RESULTS"}
                ]}
            ]
        }"#;
        let response: MatrixResponse = serde_json::from_str(json).unwrap();
        let pairs = [pair("A", "B", 42.1), pair("A", "C", 42.2)];

        let routes = diagonal(response, &pairs).unwrap();

        assert_eq!(
            routes[0],
            Some(RouteEstimate {
                origin: "A".into(),
                destination: "B".into(),
                distance: 1000.0,
                anticipated_time: 700.0,
            })
        );
        assert_eq!(routes[1], None);
    }

    #[test]
    fn test_diagonal_short_response_yields_none() {
        let response: MatrixResponse =
            serde_json::from_str(r#"{"status": "OK", "rows": []}"#).unwrap();

        let routes = diagonal(response, &[pair("A", "B", 42.1)]).unwrap();
        assert_eq!(routes, vec![None]);
    }

    #[test]
    fn test_request_denied_is_an_error() {
        let response: MatrixResponse = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "error_message": "bad key", "rows": []}"#,
        )
        .unwrap();

        let err = diagonal(response, &[pair("A", "B", 42.1)]).unwrap_err();
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn test_lookup_rejects_oversized_batch() {
        let client = DistanceMatrixClient::new(NoNetwork, DEFAULT_BASE_URL).unwrap();
        let pairs: Vec<_> = (0..11).map(|i| pair("A", &format!("S{i}"), 42.0)).collect();

        let err = client.lookup(&pairs).await.unwrap_err();
        assert!(matches!(err, Error::BatchTooLarge { size: 11, .. }));
    }
}
