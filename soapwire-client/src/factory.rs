use crate::{Client, ClientOptions};
use soapwire_core::{parse_wsdl, ServiceDescription, SoapError};
use soapwire_transport::{HttpRequest, HttpTransport};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds [`Client`]s from WSDL documents.
///
/// Remote documents are fetched through the same transport the clients will
/// use for their calls.
#[derive(Debug, Clone)]
pub struct Factory {
    transport: Arc<dyn HttpTransport>,
    options: ClientOptions,
}

impl Factory {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_options(transport, ClientOptions::default())
    }

    pub fn with_options(transport: Arc<dyn HttpTransport>, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    /// Factory over a [`ReqwestTransport`](soapwire_transport::ReqwestTransport) with default settings.
    pub fn with_default_transport() -> Result<Self, SoapError> {
        let transport =
            soapwire_transport::ReqwestTransport::new(soapwire_transport::TransportConfig::default())?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Loads the WSDL at `wsdl_location` and returns a client for it.
    ///
    /// `http://` and `https://` locations are fetched with a GET request;
    /// anything else is read from the local file system. Every failure is
    /// reported as [`SoapError::WsdlLoad`].
    pub async fn create_client(&self, wsdl_location: &str) -> Result<Client, SoapError> {
        let load_error = |reason: String| SoapError::WsdlLoad {
            location: wsdl_location.to_string(),
            reason,
        };

        debug!(location = wsdl_location, "loading WSDL");
        let document = self.fetch(wsdl_location).await.map_err(|e| {
            warn!(location = wsdl_location, error = %e, "failed to load WSDL");
            load_error(e.to_string())
        })?;

        let description = self.parse(&document).map_err(|e| load_error(e.to_string()))?;
        Ok(self.client(description))
    }

    /// Builds a client from an in-memory WSDL document.
    pub fn create_client_from_wsdl(&self, contents: impl AsRef<[u8]>) -> Result<Client, SoapError> {
        let description = self.parse(contents.as_ref())?;
        Ok(self.client(description))
    }

    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SoapError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let response = self
                .transport
                .send(HttpRequest::get(location))
                .await?
                .error_for_status()?;
            return Ok(response.body.to_vec());
        }

        let path = location.strip_prefix("file://").unwrap_or(location);
        tokio::fs::read(path).await.map_err(SoapError::transport)
    }

    fn parse(&self, document: &[u8]) -> Result<ServiceDescription, SoapError> {
        let description = parse_wsdl(document, self.options.preferred_version())?;
        debug!(
            service = description.service_name.as_deref().unwrap_or("<unnamed>"),
            functions = description.function_count(),
            types = description.types().len(),
            "parsed WSDL"
        );
        Ok(description)
    }

    fn client(&self, description: ServiceDescription) -> Client {
        Client::with_options(
            Arc::new(description),
            Arc::clone(&self.transport),
            self.options.clone(),
        )
    }
}
