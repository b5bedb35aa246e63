use crate::Client;
use serde_json::Value;
use soapwire_core::SoapError;

/// Name-based dispatch over a [`Client`].
///
/// `proxy.call("getBank", args)` is exactly `client.call("getBank", args)`.
/// Use [`soap_interface!`](crate::soap_interface) to get one typed method
/// per WSDL function instead.
#[derive(Debug, Clone)]
pub struct Proxy {
    client: Client,
}

impl Proxy {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn call(&self, function: &str, args: Vec<Value>) -> Result<Value, SoapError> {
        self.client.call(function, args).await
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_client(self) -> Client {
        self.client
    }
}

impl From<Client> for Proxy {
    fn from(client: Client) -> Self {
        Proxy::new(client)
    }
}
