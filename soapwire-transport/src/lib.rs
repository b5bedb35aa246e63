//! HTTP transport abstraction for soapwire clients.

pub mod transport;

#[cfg(feature = "reqwest-transport")]
pub mod http;

pub use transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

#[cfg(feature = "reqwest-transport")]
pub use http::{ReqwestTransport, TransportConfig};
