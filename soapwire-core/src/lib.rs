//! Service description model, WSDL reader and SOAP envelope codec.
//!
//! Nothing in this crate performs I/O: the [`SoapEngine`] delegates the
//! actual delivery of a request to a [`Transmit`] implementation.

pub mod description;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod wsdl;
pub mod xml;

pub use description::{
    BindingStyle, BodyUse, Field, FunctionSignature, Parameter, ServiceDescription, SoapVersion,
    TypeDefinition, TypeKind,
};
pub use engine::{OutboundRequest, SoapEngine, Transmit};
pub use envelope::{decode_response, encode_request, is_fault_envelope};
pub use error::{SoapError, SoapFault};
pub use wsdl::parse_wsdl;
