// Synchronous SOAP call engine
// Encodes a call, hands the envelope to a `Transmit` implementation and
// decodes whatever comes back. The engine itself never touches the network.

use crate::description::{ServiceDescription, SoapVersion};
use crate::envelope::{decode_response, encode_request};
use crate::SoapError;
use bytes::Bytes;
use serde_json::Value;
use tracing::trace;

/// A fully encoded request, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub function: String,
    pub envelope: String,
    pub location: String,
    pub action: String,
    pub version: SoapVersion,
}

impl OutboundRequest {
    pub fn content_type(&self) -> String {
        self.version.content_type(&self.action)
    }

    pub fn soap_action_header(&self) -> Option<String> {
        self.version.soap_action_header(&self.action)
    }
}

/// The I/O seam of the engine: deliver a request, return the raw response body.
pub trait Transmit {
    fn transmit(&self, request: &OutboundRequest) -> Result<Bytes, SoapError>;
}

/// Encode/transmit/decode driver bound to one service description.
#[derive(Debug, Clone, Copy)]
pub struct SoapEngine<'a> {
    description: &'a ServiceDescription,
    location: Option<&'a str>,
}

impl<'a> SoapEngine<'a> {
    pub fn new(description: &'a ServiceDescription) -> Self {
        Self {
            description,
            location: None,
        }
    }

    /// Sends every request to `location` instead of the WSDL-declared endpoint.
    pub fn with_location(mut self, location: Option<&'a str>) -> Self {
        self.location = location;
        self
    }

    pub fn description(&self) -> &'a ServiceDescription {
        self.description
    }

    pub fn encode_request(&self, function: &str, args: &[Value]) -> Result<OutboundRequest, SoapError> {
        let signature = self.description.function(function)?;
        let envelope = encode_request(self.description, signature, args)?;
        let location = self.location.unwrap_or(signature.location.as_str()).to_string();

        trace!(function, %location, "encoded request envelope:\n{}", envelope);

        Ok(OutboundRequest {
            function: signature.name.clone(),
            envelope,
            location,
            action: signature.soap_action.clone(),
            version: signature.version,
        })
    }

    pub fn decode_response(&self, function: &str, body: &[u8]) -> Result<Value, SoapError> {
        let signature = self.description.function(function)?;
        decode_response(self.description, signature, body)
    }

    /// Performs a complete call through `transmitter`.
    pub fn soap_call<T>(&self, transmitter: &T, function: &str, args: &[Value]) -> Result<Value, SoapError>
    where
        T: Transmit + ?Sized,
    {
        let request = self.encode_request(function, args)?;
        let response = transmitter.transmit(&request)?;
        trace!(function, bytes = response.len(), "decoding response");
        self.decode_response(function, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{BindingStyle, FunctionSignature, Parameter};
    use serde_json::json;
    use std::cell::RefCell;

    struct Recording {
        seen: RefCell<Vec<OutboundRequest>>,
        reply: &'static str,
    }

    impl Transmit for Recording {
        fn transmit(&self, request: &OutboundRequest) -> Result<Bytes, SoapError> {
            self.seen.borrow_mut().push(request.clone());
            Ok(Bytes::from_static(self.reply.as_bytes()))
        }
    }

    fn description() -> ServiceDescription {
        let mut description = ServiceDescription::new(Some("urn:echo".to_string()));
        let mut echo = FunctionSignature::new("echo", "http://echo.example/soap");
        echo.style = BindingStyle::Rpc;
        echo.namespace = Some("urn:echo".to_string());
        echo.soap_action = "urn:echo#echo".to_string();
        echo.parameters.push(Parameter::new("text", "string"));
        echo.output.push(Parameter::new("return", "string"));
        description.add_function(echo).unwrap();
        description
    }

    #[test]
    fn test_soap_call_goes_through_transmit() {
        let description = description();
        let transmitter = Recording {
            seen: RefCell::new(Vec::new()),
            reply: r#"<e:Envelope xmlns:e="http://schemas.xmlsoap.org/soap/envelope/"><e:Body><echoResponse><return>hi</return></echoResponse></e:Body></e:Envelope>"#,
        };

        let engine = SoapEngine::new(&description);
        let value = engine.soap_call(&transmitter, "echo", &[json!("hi")]).unwrap();
        assert_eq!(value, json!("hi"));

        let seen = transmitter.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].location, "http://echo.example/soap");
        assert_eq!(seen[0].action, "urn:echo#echo");
        assert!(seen[0].envelope.contains("<text>hi</text>"));
    }

    #[test]
    fn test_location_override() {
        let description = description();
        let engine = SoapEngine::new(&description).with_location(Some("http://other/soap"));
        let request = engine.encode_request("echo", &[json!("x")]).unwrap();
        assert_eq!(request.location, "http://other/soap");
        assert_eq!(request.soap_action_header().as_deref(), Some("\"urn:echo#echo\""));
    }

    #[test]
    fn test_unknown_function_never_transmits() {
        let description = description();
        let transmitter = Recording {
            seen: RefCell::new(Vec::new()),
            reply: "",
        };
        let result = SoapEngine::new(&description).soap_call(&transmitter, "nope", &[]);
        assert!(matches!(result, Err(SoapError::UnknownFunction(_))));
        assert!(transmitter.seen.borrow().is_empty());
    }
}
