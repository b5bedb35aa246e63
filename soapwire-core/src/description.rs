//! Service description model.
//!
//! A [`ServiceDescription`] is produced once from a WSDL document and is
//! read-only afterwards. Function names are unique and looked up with an
//! exact, case-sensitive match; positional lookups follow document order.

use crate::xml::{SOAP11_ENV_NS, SOAP12_ENV_NS};
use crate::SoapError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// SOAP protocol version of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SoapVersion {
    #[default]
    #[serde(rename = "1.1")]
    Soap11,
    #[serde(rename = "1.2")]
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP11_ENV_NS,
            SoapVersion::Soap12 => SOAP12_ENV_NS,
        }
    }

    pub fn from_envelope_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP11_ENV_NS => Some(SoapVersion::Soap11),
            SOAP12_ENV_NS => Some(SoapVersion::Soap12),
            _ => None,
        }
    }

    /// Value of the `Content-Type` header for a request with the given action.
    pub fn content_type(&self, action: &str) -> String {
        match self {
            SoapVersion::Soap11 => "text/xml; charset=utf-8".to_string(),
            SoapVersion::Soap12 if action.is_empty() => {
                "application/soap+xml; charset=utf-8".to_string()
            }
            SoapVersion::Soap12 => format!("application/soap+xml; charset=utf-8; action=\"{}\"", action),
        }
    }

    /// Value of the `SOAPAction` header. SOAP 1.2 carries the action in the
    /// content type instead.
    pub fn soap_action_header(&self, action: &str) -> Option<String> {
        match self {
            SoapVersion::Soap11 => Some(format!("\"{}\"", action)),
            SoapVersion::Soap12 => None,
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::Soap11 => write!(f, "SOAP 1.1"),
            SoapVersion::Soap12 => write!(f, "SOAP 1.2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingStyle {
    #[default]
    Document,
    Rpc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyUse {
    #[default]
    Literal,
    Encoded,
}

/// One message part of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Local name of the part's schema type
    pub type_name: String,
    /// Global element the part refers to (document style)
    pub element: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            type_name: type_name.into(),
            element: None,
        }
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// Name of the XML element this part is serialized as.
    pub fn element_name(&self) -> &str {
        self.element.as_deref().unwrap_or(&self.name)
    }
}

/// A remote function as declared by one WSDL binding operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub output: Vec<Parameter>,
    pub style: BindingStyle,
    pub body_use: BodyUse,
    pub soap_action: String,
    /// Namespace of the body elements (rpc wrapper or schema target namespace)
    pub namespace: Option<String>,
    /// Endpoint declared by the service port
    pub location: String,
    pub version: SoapVersion,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        FunctionSignature {
            name: name.into(),
            parameters: Vec::new(),
            output: Vec::new(),
            style: BindingStyle::default(),
            body_use: BodyUse::default(),
            soap_action: String::new(),
            namespace: None,
            location: location.into(),
            version: SoapVersion::default(),
        }
    }

    pub fn return_type(&self) -> &str {
        match self.output.as_slice() {
            [] => "void",
            [single] => &single.type_name,
            _ => "list",
        }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.output.len() > 1 {
            write!(f, "list({}) ", join_params(&self.output))?;
        } else {
            write!(f, "{} ", self.return_type())?;
        }
        write!(f, "{}({})", self.name, join_params(&self.parameters))
    }
}

fn join_params(params: &[Parameter]) -> String {
    params
        .iter()
        .map(|p| format!("{} ${}", p.type_name, p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_name: String,
    pub min_occurs: u32,
    /// maxOccurs greater than one or unbounded
    pub repeated: bool,
    pub nillable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            type_name: type_name.into(),
            min_occurs: 1,
            repeated: false,
            nillable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Struct(Vec<Field>),
    /// SOAP-encoded array of the given item type
    Array(String),
    Simple { base: String, enumeration: Vec<String> },
}

/// A named schema type declared in the WSDL's `types` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub name: String,
    pub namespace: Option<String>,
    pub kind: TypeKind,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeDefinition {
            name: name.into(),
            namespace: None,
            kind,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        match &self.kind {
            TypeKind::Struct(fields) => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct(_))
    }
}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Struct(fields) => {
                writeln!(f, "struct {} {{", self.name)?;
                for field in fields {
                    let suffix = if field.repeated { "[]" } else { "" };
                    writeln!(f, " {} {}{};", field.type_name, field.name, suffix)?;
                }
                write!(f, "}}")
            }
            TypeKind::Array(item) => write!(f, "{} {}[]", item, self.name),
            TypeKind::Simple { base, .. } => write!(f, "{} {}", base, self.name),
        }
    }
}

/// Everything a client needs to know about a SOAP service.
#[derive(Debug, Clone, Default)]
pub struct ServiceDescription {
    pub service_name: Option<String>,
    pub target_namespace: Option<String>,
    functions: IndexMap<String, FunctionSignature>,
    types: Vec<TypeDefinition>,
    elements: BTreeMap<String, String>,
    qualified_elements: bool,
}

impl ServiceDescription {
    pub fn new(target_namespace: Option<String>) -> Self {
        ServiceDescription {
            target_namespace,
            ..Default::default()
        }
    }

    /// Registers a function. Names must be unique.
    pub fn add_function(&mut self, function: FunctionSignature) -> Result<(), SoapError> {
        if self.functions.contains_key(&function.name) {
            return Err(SoapError::InvalidWsdl(format!(
                "function '{}' declared twice",
                function.name
            )));
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    pub fn add_type(&mut self, definition: TypeDefinition) {
        self.types.push(definition);
    }

    pub fn add_element(&mut self, element: impl Into<String>, type_name: impl Into<String>) {
        self.elements.insert(element.into(), type_name.into());
    }

    pub fn set_qualified_elements(&mut self, qualified: bool) {
        self.qualified_elements = qualified;
    }

    pub fn functions(&self) -> impl ExactSizeIterator<Item = &FunctionSignature> {
        self.functions.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn function(&self, name: &str) -> Result<&FunctionSignature, SoapError> {
        self.functions
            .get(name)
            .ok_or_else(|| SoapError::UnknownFunction(name.to_string()))
    }

    pub fn function_at(&self, index: usize) -> Result<&FunctionSignature, SoapError> {
        self.functions
            .get_index(index)
            .map(|(_, function)| function)
            .ok_or(SoapError::IndexOutOfRange {
                index,
                len: self.functions.len(),
            })
    }

    pub fn contains_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    pub fn type_named(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Type of a global schema element.
    pub fn element_type(&self, element: &str) -> Option<&str> {
        self.elements.get(element).map(String::as_str)
    }

    /// Whether local elements are namespace-qualified (`elementFormDefault="qualified"`).
    pub fn qualified_elements(&self) -> bool {
        self.qualified_elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServiceDescription {
        let mut description = ServiceDescription::new(Some("urn:test".to_string()));
        let mut echo = FunctionSignature::new("echo", "http://localhost/echo");
        echo.parameters.push(Parameter::new("text", "string"));
        echo.output.push(Parameter::new("return", "string"));
        description.add_function(echo).unwrap();
        description
            .add_function(FunctionSignature::new("ping", "http://localhost/ping"))
            .unwrap();
        description
    }

    #[test]
    fn test_lookup_by_name_is_exact() {
        let description = sample();
        assert_eq!(description.function("echo").unwrap().name, "echo");
        assert!(matches!(
            description.function("Echo"),
            Err(SoapError::UnknownFunction(name)) if name == "Echo"
        ));
    }

    #[test]
    fn test_lookup_by_index() {
        let description = sample();
        assert_eq!(description.function_at(1).unwrap().name, "ping");
        assert!(matches!(
            description.function_at(2),
            Err(SoapError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let mut description = sample();
        let result = description.add_function(FunctionSignature::new("echo", "x"));
        assert!(matches!(result, Err(SoapError::InvalidWsdl(_))));
        assert_eq!(description.function_count(), 2);
    }

    #[test]
    fn test_signature_display() {
        let description = sample();
        assert_eq!(
            description.function("echo").unwrap().to_string(),
            "string echo(string $text)"
        );
        assert_eq!(description.function("ping").unwrap().to_string(), "void ping()");
    }

    #[test]
    fn test_type_display() {
        let mut details = Field::new("bic", "string");
        details.min_occurs = 0;
        let ty = TypeDefinition::new("detailsType", TypeKind::Struct(vec![details]));
        assert_eq!(ty.to_string(), "struct detailsType {\n string bic;\n}");

        let array = TypeDefinition::new("ArrayOfString", TypeKind::Array("string".to_string()));
        assert_eq!(array.to_string(), "string ArrayOfString[]");
    }

    #[test]
    fn test_content_type_per_version() {
        assert_eq!(SoapVersion::Soap11.content_type("urn:a"), "text/xml; charset=utf-8");
        assert_eq!(
            SoapVersion::Soap11.soap_action_header("urn:a").as_deref(),
            Some("\"urn:a\"")
        );
        assert_eq!(
            SoapVersion::Soap12.content_type("urn:a"),
            "application/soap+xml; charset=utf-8; action=\"urn:a\""
        );
        assert!(SoapVersion::Soap12.soap_action_header("urn:a").is_none());
    }
}
