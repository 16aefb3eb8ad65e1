//! HTTP Geocode Provider
//!
//! Implements GeocodeProvider against a postcodes.io-compatible HTTP API:
//! `GET {base_url}/postcodes/{postcode}`.
//!
//! See: https://postcodes.io/docs

use crate::domain::entities::Coordinate;
use crate::domain::error::GeocodeError;
use crate::domain::ports::GeocodeProvider;
use crate::domain::value_objects::NormalizedKey;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Response from the lookup endpoint.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    result: Option<LookupResult>,
}

/// Location fields of a lookup result. Non-geographic postcodes carry
/// null coordinates.
#[derive(Debug, Deserialize)]
struct LookupResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Configuration for the HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL of the API (e.g., "https://api.postcodes.io")
    pub base_url: String,
    /// Transport-level timeout for one request
    pub timeout: Duration,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.postcodes.io".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Geocode provider backed by a postcodes.io-style HTTP API.
///
/// Status mapping:
/// - `200` with coordinates: resolved
/// - `200` without coordinates, `404`, other `4xx`: `ProviderRejected`
/// - `429`: `RateLimited`
/// - `5xx`, connection errors, unreadable bodies: `Transient`
/// - request timeout: `ProviderTimeout`
pub struct HttpGeocodeProvider {
    config: HttpProviderConfig,
    client: reqwest::Client,
}

impl HttpGeocodeProvider {
    /// Create a new provider with the given configuration.
    pub fn new(config: HttpProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpProviderConfig {
        &self.config
    }

    fn lookup_url(&self, key: &NormalizedKey) -> String {
        format!(
            "{}/postcodes/{}{}",
            self.config.base_url.trim_end_matches('/'),
            key.outward(),
            key.inward()
        )
    }

    fn send_error(&self, err: reqwest::Error) -> GeocodeError {
        if err.is_timeout() {
            GeocodeError::ProviderTimeout(self.config.timeout)
        } else {
            GeocodeError::Transient(err.to_string())
        }
    }

    fn parse_body(key: &NormalizedKey, body: LookupResponse) -> Result<Coordinate, GeocodeError> {
        match body.result {
            Some(LookupResult {
                latitude: Some(latitude),
                longitude: Some(longitude),
            }) => Ok(Coordinate::new(latitude, longitude)),
            _ => Err(GeocodeError::ProviderRejected(key.to_string())),
        }
    }
}

#[async_trait]
impl GeocodeProvider for HttpGeocodeProvider {
    async fn resolve(&self, key: &NormalizedKey) -> Result<Coordinate, GeocodeError> {
        let url = self.lookup_url(key);
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(GeocodeError::RateLimited),
            s if s.is_server_error() => {
                return Err(GeocodeError::Transient(format!("provider returned {}", s)))
            }
            s => {
                tracing::debug!("provider returned {} for {}", s, key);
                return Err(GeocodeError::ProviderRejected(key.to_string()));
            }
        }

        let body: LookupResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GeocodeError::ProviderTimeout(self.config.timeout)
            } else {
                GeocodeError::Transient(format!("unreadable provider response: {}", e))
            }
        })?;

        Self::parse_body(key, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::normalize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, timeout_ms: u64) -> HttpGeocodeProvider {
        HttpGeocodeProvider::new(HttpProviderConfig {
            base_url: base_url.to_string(),
            timeout: Duration::from_millis(timeout_ms),
        })
        .unwrap()
    }

    fn key(raw: &str) -> NormalizedKey {
        normalize(raw).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = HttpProviderConfig::default();
        assert_eq!(config.base_url, "https://api.postcodes.io");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_lookup_url_uses_compact_key() {
        let p = provider("http://localhost:9000/", 1000);
        assert_eq!(
            p.lookup_url(&key("sw1a 1aa")),
            "http://localhost:9000/postcodes/SW1A1AA"
        );
    }

    #[test]
    fn test_parse_body_null_coordinates_rejected() {
        let body: LookupResponse =
            serde_json::from_str(r#"{"status":200,"result":{"latitude":null,"longitude":null}}"#)
                .unwrap();
        assert!(matches!(
            HttpGeocodeProvider::parse_body(&key("GY1 1AA"), body),
            Err(GeocodeError::ProviderRejected(_))
        ));
    }

    // ===== Integration Tests with Mock HTTP Server =====

    #[tokio::test]
    async fn test_resolve_success() {
        let mock_server = MockServer::start().await;

        let response_body = serde_json::json!({
            "status": 200,
            "result": {
                "postcode": "SW1A 1AA",
                "latitude": 51.501009,
                "longitude": -0.141588,
                "country": "England"
            }
        });

        Mock::given(method("GET"))
            .and(path("/postcodes/SW1A1AA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 1000);
        let result = p.resolve(&key("SW1A 1AA")).await;

        assert_eq!(result, Ok(Coordinate::new(51.501009, -0.141588)));
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/postcodes/ZZ99ZZ"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "status": 404,
                "error": "Postcode not found"
            })))
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 1000);
        let result = p.resolve(&key("ZZ9 9ZZ")).await;

        assert_eq!(result, Err(GeocodeError::ProviderRejected("ZZ9 9ZZ".into())));
    }

    #[tokio::test]
    async fn test_resolve_null_result() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/postcodes/M11AE"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": 200, "result": null})),
            )
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 1000);
        assert!(matches!(
            p.resolve(&key("M1 1AE")).await,
            Err(GeocodeError::ProviderRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_throttled() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 1000);
        assert_eq!(p.resolve(&key("M1 1AE")).await, Err(GeocodeError::RateLimited));
    }

    #[tokio::test]
    async fn test_resolve_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 1000);
        let result = p.resolve(&key("M1 1AE")).await;

        match result {
            Err(GeocodeError::Transient(msg)) => assert!(msg.contains("503")),
            other => panic!("expected Transient, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_bad_request_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 1000);
        assert!(matches!(
            p.resolve(&key("M1 1AE")).await,
            Err(GeocodeError::ProviderRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_unreadable_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 1000);
        assert!(matches!(
            p.resolve(&key("M1 1AE")).await,
            Err(GeocodeError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "result": {"latitude": 1.0, "longitude": 2.0}
                    }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let p = provider(&mock_server.uri(), 100);
        assert_eq!(
            p.resolve(&key("M1 1AE")).await,
            Err(GeocodeError::ProviderTimeout(Duration::from_millis(100)))
        );
    }

    #[tokio::test]
    async fn test_resolve_connection_refused() {
        let uri = {
            let mock_server = MockServer::start().await;
            mock_server.uri()
        };

        let p = provider(&uri, 1000);
        assert!(matches!(
            p.resolve(&key("M1 1AE")).await,
            Err(GeocodeError::Transient(_))
        ));
    }
}
