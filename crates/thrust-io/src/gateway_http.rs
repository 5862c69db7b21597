//! HTTP client for the bench control service.

use crate::protocol::{parse_response, request_body, route, Method};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use thrust_core::{DeviceGateway, GatewayError, Outcome, Request};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Extra time allowed for a test run beyond its requested duration.
pub const DEFAULT_TEST_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub test_grace: Duration,
}

impl Default for HttpGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            test_grace: DEFAULT_TEST_GRACE,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpGatewayError {
    #[error("invalid gateway url {url:?}: expected http:// or https://")]
    InvalidUrl { url: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    config: HttpGatewayConfig,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, HttpGatewayError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HttpGatewayError::InvalidUrl {
                url: config.base_url.clone(),
            });
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A test run answers only once it is over.
    fn timeout_for(&self, request: &Request) -> Result<Duration, GatewayError> {
        match request {
            Request::StartTest { duration_s, .. } => Duration::try_from_secs_f64(*duration_s)
                .ok()
                .and_then(|run_for| run_for.checked_add(self.config.test_grace))
                .ok_or_else(|| {
                    GatewayError::Transport(format!("Invalid test duration: {}", duration_s))
                }),
            _ => Ok(self.config.request_timeout),
        }
    }
}

#[async_trait]
impl DeviceGateway for HttpGateway {
    async fn call(&self, request: &Request) -> Outcome {
        let operation = request.operation();
        let route = route(operation);
        let url = format!("{}{}", self.base_url, route.path);

        let mut builder = match route.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(body) = request_body(request) {
            builder = builder.json(&body);
        }
        builder = builder.timeout(self.timeout_for(request)?);

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        debug!(
            operation = operation.as_str(),
            status,
            bytes = body.len(),
            "Gateway response"
        );

        parse_response(status, &body)
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Transport("Request timed out".to_string())
    } else if e.is_connect() {
        GatewayError::Transport("Network Error".to_string())
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_urls_without_scheme() {
        let config = HttpGatewayConfig {
            base_url: "localhost:8000".into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpGateway::new(config),
            Err(HttpGatewayError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_runs_get_duration_plus_grace() {
        let gateway = HttpGateway::new(HttpGatewayConfig {
            base_url: "http://bench.local/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(gateway.base_url(), "http://bench.local");
        let timeout = gateway.timeout_for(&Request::StartTest {
            duration_s: 10.0,
            duty_cycle: 0.6,
        });
        assert_eq!(timeout, Ok(Duration::from_secs(40)));
        assert_eq!(
            gateway.timeout_for(&Request::ReadRpm),
            Ok(DEFAULT_REQUEST_TIMEOUT)
        );
    }

    #[tokio::test]
    async fn unrepresentable_test_duration_fails_without_sending() {
        let gateway = HttpGateway::new(HttpGatewayConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        })
        .unwrap();
        for duration_s in [1e20, f64::NAN, -1.0] {
            let err = gateway
                .call(&Request::StartTest {
                    duration_s,
                    duty_cycle: 0.5,
                })
                .await
                .unwrap_err();
            assert!(err.to_string().starts_with("Invalid test duration"), "{}", err);
        }
    }
}
