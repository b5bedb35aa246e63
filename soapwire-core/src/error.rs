use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A fault reported by the remote service inside a SOAP envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapFault {
    /// Fault code, e.g. `soap:Server` or `env:Sender`
    pub code: String,
    /// Human readable fault string / reason text
    pub message: String,
    /// SOAP 1.1 `faultactor` or SOAP 1.2 `Role`
    pub actor: Option<String>,
    /// Decoded contents of the `detail` element, if any
    pub detail: Option<Value>,
}

impl SoapFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        SoapFault {
            code: code.into(),
            message: message.into(),
            actor: None,
            detail: None,
        }
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Every way a SOAP call can fail. All variants are per call and recoverable.
#[derive(Debug, Error)]
pub enum SoapError {
    #[error("Failed to load WSDL from {location}: {reason}")]
    WsdlLoad { location: String, reason: String },

    #[error("Invalid WSDL: {0}")]
    InvalidWsdl(String),

    #[error("Function '{0}' doesn't exist")]
    UnknownFunction(String),

    #[error("Function index {index} is out of range (service declares {len} functions)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("SOAP fault {0}")]
    RemoteFault(SoapFault),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Decoder is already processing a response")]
    DecoderBusy,
}

impl SoapError {
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SoapError::Transport(Box::new(err))
    }

    pub fn decode(message: impl Into<String>) -> Self {
        SoapError::Decode(message.into())
    }

    pub fn encode(message: impl Into<String>) -> Self {
        SoapError::Encode(message.into())
    }

    /// Whether the server answered with a SOAP fault
    pub fn is_fault(&self) -> bool {
        matches!(self, SoapError::RemoteFault(_))
    }

    /// Whether the request never produced a decodable response
    pub fn is_transport(&self) -> bool {
        matches!(self, SoapError::Transport(_))
    }

    pub fn fault(&self) -> Option<&SoapFault> {
        match self {
            SoapError::RemoteFault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for SoapError {
    fn from(err: quick_xml::Error) -> Self {
        SoapError::Decode(format!("XML error: {}", err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for SoapError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        SoapError::Decode(format!("XML attribute error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let err = SoapError::RemoteFault(SoapFault::new("soap:Server", "Keine Bank gefunden!"));
        let display = err.to_string();
        assert!(display.contains("soap:Server"));
        assert!(display.contains("Keine Bank gefunden!"));
        assert!(err.is_fault());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_fault_accessor() {
        let err = SoapError::RemoteFault(SoapFault::new("env:Sender", "bad"));
        assert_eq!(err.fault().map(|f| f.code.as_str()), Some("env:Sender"));
        assert!(SoapError::DecoderBusy.fault().is_none());
    }

    #[test]
    fn test_transport_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SoapError::transport(io);
        assert!(err.is_transport());
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("refused"));
    }

    #[test]
    fn test_index_out_of_range_message() {
        let err = SoapError::IndexOutOfRange { index: 100, len: 1 };
        assert!(err.to_string().contains("100"));
    }
}
