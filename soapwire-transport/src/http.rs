use crate::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Total request timeout in milliseconds
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            connect_timeout_ms: 10000,
            user_agent: concat!("soapwire/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
///
/// Dropping the future returned by `send` aborts the request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| TransportError::Protocol(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Wraps an existing client, e.g. one with custom TLS or proxy settings.
    pub fn with_client(client: reqwest::Client, config: TransportConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.config.timeout_ms)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Protocol(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(
            method = %request.method,
            url = %request.url,
            bytes = request.body.len(),
            "sending HTTP request"
        );

        let response = self
            .client
            .request(request.method, request.url.as_str())
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        debug!(%status, bytes = body.len(), "received HTTP response");
        trace!("Response body:\n{}", String::from_utf8_lossy(&body));

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert!(config.user_agent.starts_with("soapwire/"));
    }

    #[test]
    fn test_transport_creation() {
        let transport = ReqwestTransport::new(TransportConfig::default());
        assert!(transport.is_ok());
    }

    #[tokio::test]
    async fn test_relative_url_fails_on_send() {
        let transport = ReqwestTransport::new(TransportConfig::default()).unwrap();
        let err = transport
            .send(HttpRequest::post("nonsense.not.existing", "<x/>"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
