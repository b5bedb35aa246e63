use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use soapwire_core::SoapError;
use thiserror::Error;

/// Longest slice of an error response body kept in [`TransportError::Status`].
const STATUS_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("HTTP error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<TransportError> for SoapError {
    fn from(err: TransportError) -> Self {
        SoapError::transport(err)
    }
}

/// An HTTP request as handed to a transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.body = body.into();
        request
    }

    /// Adds a header, validating name and value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, TransportError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("header '{}': {}", name, e)))?;
        self.headers.append(name, value);
        Ok(self)
    }
}

/// A complete HTTP response with its body already read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        HttpResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Turns a non-2xx response into [`TransportError::Status`].
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.is_success() {
            return Ok(self);
        }
        let text = String::from_utf8_lossy(&self.body);
        let body = match text.char_indices().nth(STATUS_BODY_LIMIT) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.into_owned(),
        };
        Err(TransportError::Status {
            status: self.status,
            body,
        })
    }
}

/// The asynchronous HTTP black box a SOAP client talks through.
///
/// Implementations must report network failures as errors rather than
/// panicking, and must return responses of any status code as `Ok`; status
/// classification is left to the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_request_headers() {
        let request = HttpRequest::post("http://localhost/soap", "<x/>")
            .with_header("Content-Type", "text/xml; charset=utf-8")
            .unwrap()
            .with_header("SOAPAction", "\"\"")
            .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Bytes::from_static(b"<x/>"));
        assert_eq!(request.headers.get("soapaction").unwrap(), "\"\"");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let result = HttpRequest::get("http://localhost").with_header("bad header", "x");
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));

        let result = HttpRequest::get("http://localhost").with_header("X-Ok", "line\nbreak");
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
    }

    #[test]
    fn test_error_for_status() {
        assert!(HttpResponse::ok("fine").error_for_status().is_ok());

        let err = HttpResponse::new(StatusCode::NOT_FOUND, "missing")
            .error_for_status()
            .unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "missing");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_status_body_is_truncated() {
        let long = "x".repeat(2000);
        let err = HttpResponse::new(StatusCode::BAD_GATEWAY, long)
            .error_for_status()
            .unwrap_err();
        assert!(err.to_string().len() < 600);
    }

    #[test]
    fn test_converts_into_soap_error() {
        let err: SoapError = TransportError::Timeout(5).into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("5 ms"));
    }
}
