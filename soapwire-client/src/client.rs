use crate::decoder::ClientDecoder;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use soapwire_core::{
    is_fault_envelope, FunctionSignature, OutboundRequest, ServiceDescription, SoapEngine,
    SoapError, SoapVersion, TypeDefinition,
};
use soapwire_transport::{HttpRequest, HttpResponse, HttpTransport};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Binding to use when the WSDL declares both SOAP 1.1 and 1.2 (default 1.1)
    pub soap_version: Option<SoapVersion>,
    /// Extra HTTP headers sent with every call
    pub headers: Vec<(String, String)>,
}

impl ClientOptions {
    pub fn with_soap_version(mut self, version: SoapVersion) -> Self {
        self.soap_version = Some(version);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn preferred_version(&self) -> SoapVersion {
        self.soap_version.unwrap_or_default()
    }
}

/// Identifies a function by name or by its position in the WSDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for FunctionRef<'a> {
    fn from(name: &'a str) -> Self {
        FunctionRef::Name(name)
    }
}

impl<'a> From<&'a String> for FunctionRef<'a> {
    fn from(name: &'a String) -> Self {
        FunctionRef::Name(name.as_str())
    }
}

impl From<usize> for FunctionRef<'_> {
    fn from(index: usize) -> Self {
        FunctionRef::Index(index)
    }
}

impl From<u32> for FunctionRef<'_> {
    fn from(index: u32) -> Self {
        FunctionRef::Index(usize::try_from(index).unwrap_or(usize::MAX))
    }
}

/// Lets unsuffixed literals such as `client.location(0)` pick an index.
/// Negative values never name a function and resolve to
/// [`SoapError::IndexOutOfRange`].
impl From<i32> for FunctionRef<'_> {
    fn from(index: i32) -> Self {
        FunctionRef::Index(usize::try_from(index).unwrap_or(usize::MAX))
    }
}

/// Asynchronous SOAP client bound to one service description.
///
/// Cloning is cheap: the description, transport and options are shared.
/// [`Client::with_request_target`] returns a new client and never changes the
/// one it was called on.
#[derive(Debug, Clone)]
pub struct Client {
    description: Arc<ServiceDescription>,
    transport: Arc<dyn HttpTransport>,
    options: Arc<ClientOptions>,
    target: Option<Arc<str>>,
}

impl Client {
    pub fn new(description: ServiceDescription, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_options(Arc::new(description), transport, ClientOptions::default())
    }

    pub fn with_options(
        description: Arc<ServiceDescription>,
        transport: Arc<dyn HttpTransport>,
        options: ClientOptions,
    ) -> Self {
        Self {
            description,
            transport,
            options: Arc::new(options),
            target: None,
        }
    }

    pub fn description(&self) -> &ServiceDescription {
        &self.description
    }

    /// Functions declared by the service, in WSDL order.
    pub fn functions(&self) -> Vec<&FunctionSignature> {
        self.description.functions().collect()
    }

    pub fn types(&self) -> &[TypeDefinition] {
        self.description.types()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Endpoint a call to `function` would be sent to.
    ///
    /// Returns the request target when one is set, otherwise the location the
    /// WSDL declares for that function.
    pub fn location<'a>(&self, function: impl Into<FunctionRef<'a>>) -> Result<String, SoapError> {
        let signature = match function.into() {
            FunctionRef::Name(name) => self.description.function(name)?,
            FunctionRef::Index(index) => self.description.function_at(index)?,
        };
        Ok(match &self.target {
            Some(target) => target.to_string(),
            None => signature.location.clone(),
        })
    }

    pub fn request_target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns a client that sends every call to `target`.
    ///
    /// The target is not validated; an unreachable one fails on the next call.
    pub fn with_request_target(&self, target: impl Into<String>) -> Client {
        Client {
            target: Some(Arc::from(target.into())),
            ..self.clone()
        }
    }

    /// Returns a client that uses the WSDL-declared locations again.
    pub fn without_request_target(&self) -> Client {
        Client {
            target: None,
            ..self.clone()
        }
    }

    /// Calls `function` with one argument per declared parameter.
    ///
    /// Dropping the returned future cancels the HTTP request.
    pub fn call(&self, function: &str, args: Vec<Value>) -> BoxFuture<'static, Result<Value, SoapError>> {
        let client = self.clone();
        let function = function.to_string();
        async move { client.execute(function, args).await }.boxed()
    }

    async fn execute(self, function: String, args: Vec<Value>) -> Result<Value, SoapError> {
        let request = self.engine().encode_request(&function, &args)?;
        let http_request = self.http_request(&request)?;

        debug!(
            function = %function,
            target = %request.location,
            version = %request.version,
            "sending SOAP request"
        );
        let response = self.transport.send(http_request).await?;
        let body = accept_response(&function, response)?;

        let decoder = ClientDecoder::new(Arc::clone(&self.description), self.target.clone());
        decoder.decode(body, &function, &args)
    }

    fn engine(&self) -> SoapEngine<'_> {
        SoapEngine::new(&self.description).with_location(self.target.as_deref())
    }

    fn http_request(&self, request: &OutboundRequest) -> Result<HttpRequest, SoapError> {
        let mut http_request = HttpRequest::post(request.location.as_str(), request.envelope.clone())
            .with_header("Content-Type", &request.content_type())?;
        if let Some(action) = request.soap_action_header() {
            http_request = http_request.with_header("SOAPAction", &action)?;
        }
        for (name, value) in &self.options.headers {
            http_request = http_request.with_header(name, value)?;
        }
        Ok(http_request)
    }
}

/// Picks the body to decode out of an HTTP response.
///
/// Faults come back with status 500 (or 400 for SOAP 1.2 sender faults), so
/// those are decoded when the body is a fault envelope.
fn accept_response(function: &str, response: HttpResponse) -> Result<Bytes, SoapError> {
    debug!(
        function,
        status = %response.status,
        bytes = response.body.len(),
        "received SOAP response"
    );
    if response.is_success() {
        return Ok(response.body);
    }
    if matches!(response.status, StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_REQUEST)
        && is_fault_envelope(&response.body)
    {
        return Ok(response.body);
    }

    warn!(function, status = %response.status, "SOAP request failed");
    response
        .error_for_status()
        .map(|response| response.body)
        .map_err(SoapError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_ref_conversions() {
        assert_eq!(FunctionRef::from("getBank"), FunctionRef::Name("getBank"));
        assert_eq!(FunctionRef::from(3usize), FunctionRef::Index(3));
        assert_eq!(FunctionRef::from(3u32), FunctionRef::Index(3));
        assert_eq!(FunctionRef::from(3), FunctionRef::Index(3));
        assert_eq!(FunctionRef::from(-1), FunctionRef::Index(usize::MAX));
        let name = String::from("getBank");
        assert_eq!(FunctionRef::from(&name), FunctionRef::Name("getBank"));
    }

    #[test]
    fn test_options_deserialize() {
        let options: ClientOptions = serde_json::from_value(json!({
            "soap_version": "1.2",
            "headers": [["X-Api-Key", "secret"]]
        }))
        .unwrap();
        assert_eq!(options.preferred_version(), SoapVersion::Soap12);
        assert_eq!(options.headers, vec![("X-Api-Key".to_string(), "secret".to_string())]);

        let defaults: ClientOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(defaults, ClientOptions::default());
        assert_eq!(defaults.preferred_version(), SoapVersion::Soap11);
    }

    #[test]
    fn test_accept_success_and_fault_statuses() {
        let ok = HttpResponse::ok("<body/>");
        assert_eq!(accept_response("f", ok).unwrap(), Bytes::from_static(b"<body/>"));

        let fault = r#"<e:Envelope xmlns:e="http://schemas.xmlsoap.org/soap/envelope/"><e:Body><e:Fault><faultcode>e:Server</faultcode><faultstring>x</faultstring></e:Fault></e:Body></e:Envelope>"#;
        let response = HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, fault);
        assert!(accept_response("f", response).is_ok());
    }

    #[test]
    fn test_accept_rejects_other_errors() {
        let response = HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        let err = accept_response("f", response).unwrap_err();
        assert!(err.is_transport());

        let response = HttpResponse::new(StatusCode::NOT_FOUND, "");
        assert!(accept_response("f", response).unwrap_err().is_transport());
    }
}
