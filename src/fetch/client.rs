use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport seam for every outbound HTTP call (distance matrix, GBFS).
///
/// Wrappers such as [`UrlParam`](crate::fetch::auth::UrlParam) decorate an
/// inner client to attach credentials before the request is sent.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
