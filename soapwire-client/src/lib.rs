//! Asynchronous SOAP RPC client.
//!
//! A [`Factory`] loads a WSDL document and produces a [`Client`]; each
//! [`Client::call`] encodes the request envelope, POSTs it through an
//! [`HttpTransport`] and decodes the response with a fresh
//! [`ClientDecoder`].
//!
//! ```no_run
//! use soapwire_client::{soap_args, Factory};
//!
//! # async fn run() -> Result<(), soapwire_client::SoapError> {
//! let factory = Factory::with_default_transport()?;
//! let client = factory
//!     .create_client("http://www.thomas-bayer.com/axis2/services/BLZService?wsdl")
//!     .await?;
//! let bank = client.call("getBank", soap_args![{"blz": "12070000"}]).await?;
//! println!("{}", bank["details"]["bezeichnung"]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod decoder;
pub mod factory;
pub mod logging;
pub mod macros;
pub mod proxy;

pub use client::{Client, ClientOptions, FunctionRef};
pub use decoder::ClientDecoder;
pub use factory::Factory;
pub use proxy::Proxy;

pub use serde_json::{json, Value};
pub use soapwire_core::{FunctionSignature, ServiceDescription, SoapError, SoapFault, SoapVersion, TypeDefinition};
pub use soapwire_transport::{
    HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportConfig, TransportError,
};
