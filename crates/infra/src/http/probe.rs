use async_trait::async_trait;
use reqwest::Method;
use tether_core::ReachabilityProbe;
use tracing::debug;

use super::client::HttpClient;

/// Reachability probe issuing a plain `GET`
///
/// Only the status code is inspected. Any 2xx counts as online.
#[derive(Clone, Debug)]
pub struct HttpReachabilityProbe {
    http: HttpClient,
    url: String,
}

impl HttpReachabilityProbe {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[async_trait]
impl ReachabilityProbe for HttpReachabilityProbe {
    async fn probe(&self) -> bool {
        match self.http.send(self.http.request(Method::GET, &self.url)).await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(error = %err, "Reachability probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn probe_with_status(status: u16) -> bool {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate_204"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let probe =
            HttpReachabilityProbe::new(HttpClient::new().unwrap(), format!("{}/generate_204", server.uri()));
        probe.probe().await
    }

    #[tokio::test]
    async fn success_status_is_online() {
        assert!(probe_with_status(204).await);
        assert!(probe_with_status(200).await);
    }

    #[tokio::test]
    async fn error_status_is_offline() {
        assert!(!probe_with_status(500).await);
        assert!(!probe_with_status(404).await);
    }

    #[tokio::test]
    async fn unreachable_is_offline() {
        let http = HttpClient::builder().timeout(Duration::from_secs(1)).build().unwrap();
        let probe = HttpReachabilityProbe::new(http, "http://127.0.0.1:9/");
        assert!(!probe.probe().await);
    }
}
