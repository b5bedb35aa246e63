//! SOAP envelope codec.
//!
//! Arguments and results are `serde_json::Value`s. Encoding follows the
//! function's binding (document or rpc style, literal or encoded use);
//! decoding is driven by the declared schema types so that XSD numbers and
//! booleans come back as JSON numbers and booleans, repeated elements and
//! SOAP-encoded arrays as JSON arrays, and `xsi:nil` as `null`.

use crate::description::{
    BindingStyle, BodyUse, FunctionSignature, ServiceDescription, SoapVersion, TypeDefinition,
    TypeKind,
};
use crate::xml::{local_name, XmlNode, SOAP_ENC_NS, XSD_NS, XSI_NS};
use crate::{SoapError, SoapFault};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

const ENV_PREFIX: &str = "SOAP-ENV";
const BODY_PREFIX: &str = "ns1";
const TYPES_PREFIX: &str = "tns";

/// Serializes a call to `function` into a request envelope.
pub fn encode_request(
    description: &ServiceDescription,
    function: &FunctionSignature,
    args: &[Value],
) -> Result<String, SoapError> {
    if args.len() != function.parameters.len() {
        return Err(SoapError::encode(format!(
            "{} expects {} argument(s), got {}",
            function.name,
            function.parameters.len(),
            args.len()
        )));
    }

    let encoded = function.body_use == BodyUse::Encoded;
    let mut envelope = BytesStart::new(format!("{ENV_PREFIX}:Envelope"));
    envelope.push_attribute((
        format!("xmlns:{ENV_PREFIX}").as_str(),
        function.version.envelope_namespace(),
    ));
    if let Some(namespace) = &function.namespace {
        envelope.push_attribute((format!("xmlns:{BODY_PREFIX}").as_str(), namespace.as_str()));
    }
    envelope.push_attribute(("xmlns:xsd", XSD_NS));
    envelope.push_attribute(("xmlns:xsi", XSI_NS));
    if encoded {
        if let Some(namespace) = &description.target_namespace {
            envelope.push_attribute((format!("xmlns:{TYPES_PREFIX}").as_str(), namespace.as_str()));
        }
        envelope.push_attribute(("xmlns:SOAP-ENC", SOAP_ENC_NS));
        envelope.push_attribute((format!("{ENV_PREFIX}:encodingStyle").as_str(), SOAP_ENC_NS));
    }

    let mut writer = EnvelopeWriter {
        writer: Writer::new(Vec::new()),
        description,
        prefixed: function.namespace.is_some(),
        qualify_children: function.style == BindingStyle::Document
            && description.qualified_elements()
            && function.namespace.is_some(),
        encoded,
    };

    writer.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.emit(Event::Start(envelope))?;
    writer.emit(Event::Start(BytesStart::new(format!("{ENV_PREFIX}:Body"))))?;

    match function.style {
        BindingStyle::Document => {
            for (param, arg) in function.parameters.iter().zip(args) {
                let name = writer.qualified(param.element_name());
                writer.element(&name, arg, Some(&param.type_name))?;
            }
        }
        BindingStyle::Rpc => {
            let wrapper = writer.qualified(&function.name);
            writer.emit(Event::Start(BytesStart::new(wrapper.clone())))?;
            for (param, arg) in function.parameters.iter().zip(args) {
                writer.element(&param.name, arg, Some(&param.type_name))?;
            }
            writer.emit(Event::End(BytesEnd::new(wrapper)))?;
        }
    }

    writer.emit(Event::End(BytesEnd::new(format!("{ENV_PREFIX}:Body"))))?;
    writer.emit(Event::End(BytesEnd::new(format!("{ENV_PREFIX}:Envelope"))))?;

    String::from_utf8(writer.writer.into_inner())
        .map_err(|e| SoapError::encode(format!("envelope is not UTF-8: {}", e)))
}

/// Parses a response envelope for `function` into its result value.
///
/// A `Fault` body yields [`SoapError::RemoteFault`]; anything that is not a
/// SOAP envelope yields [`SoapError::Decode`]. One-way operations (no
/// output parts) accept an empty reply, as sent with `202 Accepted`.
pub fn decode_response(
    description: &ServiceDescription,
    function: &FunctionSignature,
    body: &[u8],
) -> Result<Value, SoapError> {
    if function.output.is_empty() && body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let root = XmlNode::parse(body)?;
    let version = root
        .namespace
        .as_deref()
        .and_then(SoapVersion::from_envelope_namespace)
        .filter(|_| root.name == "Envelope")
        .ok_or_else(|| SoapError::decode(format!("expected SOAP Envelope, found '{}'", root.name)))?;
    let env_ns = version.envelope_namespace();

    let soap_body = root
        .child_ns(env_ns, "Body")
        .ok_or_else(|| SoapError::decode("SOAP envelope has no Body"))?;
    let decoder = ValueDecoder {
        description,
        body: soap_body,
    };

    let Some(first) = soap_body.children.first() else {
        return Ok(Value::Null);
    };
    if first.is(env_ns, "Fault") {
        return Err(SoapError::RemoteFault(decoder.fault(first, version)?));
    }

    match function.style {
        BindingStyle::Document => match function.output.as_slice() {
            [] => Ok(Value::Null),
            [single] => decoder.decode(first, Some(&single.type_name)),
            parts => {
                let mut map = Map::new();
                for (part, node) in parts.iter().zip(&soap_body.children) {
                    map.insert(part.name.clone(), decoder.decode(node, Some(&part.type_name))?);
                }
                Ok(Value::Object(map))
            }
        },
        BindingStyle::Rpc => {
            let outputs = &function.output;
            let part_type = |node: &XmlNode| {
                outputs
                    .iter()
                    .find(|p| p.name == node.name)
                    .map(|p| p.type_name.as_str())
            };
            match first.children.as_slice() {
                [] => Ok(Value::Null),
                [single] => {
                    let declared = part_type(single)
                        .or_else(|| outputs.first().map(|p| p.type_name.as_str()));
                    decoder.decode(single, declared)
                }
                nodes => {
                    let mut map = Map::new();
                    for node in nodes {
                        map.insert(node.name.clone(), decoder.decode(node, part_type(node))?);
                    }
                    Ok(Value::Object(map))
                }
            }
        }
    }
}

/// Whether `body` is a SOAP 1.1 or 1.2 envelope whose Body holds a Fault.
pub fn is_fault_envelope(body: &[u8]) -> bool {
    let Ok(root) = XmlNode::parse(body) else {
        return false;
    };
    let Some(version) = root
        .namespace
        .as_deref()
        .and_then(SoapVersion::from_envelope_namespace)
    else {
        return false;
    };
    let env_ns = version.envelope_namespace();
    root.name == "Envelope"
        && root
            .child_ns(env_ns, "Body")
            .and_then(|b| b.children.first())
            .is_some_and(|first| first.is(env_ns, "Fault"))
}

struct EnvelopeWriter<'a> {
    writer: Writer<Vec<u8>>,
    description: &'a ServiceDescription,
    prefixed: bool,
    qualify_children: bool,
    encoded: bool,
}

impl<'a> EnvelopeWriter<'a> {
    fn emit(&mut self, event: Event<'_>) -> Result<(), SoapError> {
        self.writer
            .write_event(event)
            .map_err(|e| SoapError::encode(e.to_string()))
    }

    fn qualified(&self, name: &str) -> String {
        if self.prefixed {
            format!("{BODY_PREFIX}:{name}")
        } else {
            name.to_string()
        }
    }

    fn definition(&self, type_name: Option<&str>) -> Option<&'a TypeDefinition> {
        let description = self.description;
        type_name.and_then(|t| description.type_named(t))
    }

    fn element(&mut self, name: &str, value: &Value, type_name: Option<&str>) -> Result<(), SoapError> {
        let mut start = BytesStart::new(name.to_string());
        if value.is_null() {
            start.push_attribute(("xsi:nil", "true"));
            return self.emit(Event::Empty(start));
        }

        if self.encoded {
            if let Some(xsi_type) = self.xsi_type(value, type_name) {
                start.push_attribute(("xsi:type", xsi_type.as_str()));
            }
            if let Value::Array(items) = value {
                let item = match self.definition(type_name).map(|d| &d.kind) {
                    Some(TypeKind::Array(item)) => self.type_reference(item),
                    _ => "xsd:anyType".to_string(),
                };
                let array_type = format!("{}[{}]", item, items.len());
                start.push_attribute(("SOAP-ENC:arrayType", array_type.as_str()));
            }
        }

        self.emit(Event::Start(start))?;
        self.content(value, type_name)?;
        self.emit(Event::End(BytesEnd::new(name.to_string())))
    }

    fn content(&mut self, value: &Value, type_name: Option<&str>) -> Result<(), SoapError> {
        let definition = self.definition(type_name);
        match value {
            Value::Object(map) => {
                let fields = match definition.map(|d| &d.kind) {
                    Some(TypeKind::Struct(fields)) => fields.as_slice(),
                    _ => &[],
                };
                // Schema order first, then whatever else the caller supplied.
                for field in fields {
                    if let Some(v) = map.get(&field.name) {
                        self.field(&field.name, v, Some(&field.type_name))?;
                    }
                }
                for (key, v) in map {
                    if !fields.iter().any(|f| &f.name == key) {
                        self.field(key, v, None)?;
                    }
                }
                Ok(())
            }
            Value::Array(items) => {
                let item_type = match definition.map(|d| &d.kind) {
                    Some(TypeKind::Array(item)) => Some(item.as_str()),
                    _ => None,
                };
                for item in items {
                    self.element("item", item, item_type)?;
                }
                Ok(())
            }
            Value::String(s) => self.emit(Event::Text(BytesText::new(s))),
            Value::Number(n) => self.emit(Event::Text(BytesText::new(&n.to_string()))),
            Value::Bool(b) => self.emit(Event::Text(BytesText::new(if *b { "true" } else { "false" }))),
            Value::Null => Ok(()),
        }
    }

    fn field(&mut self, name: &str, value: &Value, type_name: Option<&str>) -> Result<(), SoapError> {
        let is_array_type = matches!(
            self.definition(type_name).map(|d| &d.kind),
            Some(TypeKind::Array(_))
        );
        let element_name = if self.qualify_children {
            format!("{BODY_PREFIX}:{name}")
        } else {
            name.to_string()
        };

        match value {
            // Literal sequences repeat the element once per item.
            Value::Array(items) if !is_array_type => {
                for item in items {
                    self.element(&element_name, item, type_name)?;
                }
                Ok(())
            }
            _ => self.element(&element_name, value, type_name),
        }
    }

    fn type_reference(&self, type_name: &str) -> String {
        if is_builtin(type_name) {
            format!("xsd:{}", type_name)
        } else {
            format!("{TYPES_PREFIX}:{}", type_name)
        }
    }

    fn xsi_type(&self, value: &Value, type_name: Option<&str>) -> Option<String> {
        if let Some(type_name) = type_name {
            if is_builtin(type_name) {
                return Some(format!("xsd:{}", type_name));
            }
            if let Some(definition) = self.definition(Some(type_name)) {
                return Some(match &definition.kind {
                    TypeKind::Array(_) => "SOAP-ENC:Array".to_string(),
                    TypeKind::Simple { base, .. } => self.type_reference(base),
                    TypeKind::Struct(_) => self.type_reference(type_name),
                });
            }
        }
        let inferred = match value {
            Value::String(_) => "xsd:string",
            Value::Number(n) if n.is_i64() || n.is_u64() => "xsd:int",
            Value::Number(_) => "xsd:double",
            Value::Bool(_) => "xsd:boolean",
            Value::Array(_) => "SOAP-ENC:Array",
            Value::Object(_) => "SOAP-ENC:Struct",
            Value::Null => return None,
        };
        Some(inferred.to_string())
    }
}

struct ValueDecoder<'a> {
    description: &'a ServiceDescription,
    body: &'a XmlNode,
}

impl<'a> ValueDecoder<'a> {
    fn decode(&self, node: &XmlNode, declared: Option<&str>) -> Result<Value, SoapError> {
        self.decode_at(node, declared, 0)
    }

    fn decode_at(&self, node: &XmlNode, declared: Option<&str>, depth: usize) -> Result<Value, SoapError> {
        if depth > 64 {
            return Err(SoapError::decode("value nesting too deep"));
        }
        if matches!(node.attribute_ns(XSI_NS, "nil"), Some("true") | Some("1")) {
            return Ok(Value::Null);
        }

        // rpc/encoded multi-reference values
        if let Some(id) = node.attribute("href").and_then(|h| h.strip_prefix('#')) {
            let target = self
                .body
                .children
                .iter()
                .find(|c| c.attribute("id") == Some(id))
                .ok_or_else(|| SoapError::decode(format!("unresolved href '#{}'", id)))?;
            return self.decode_at(target, declared, depth + 1);
        }

        let xsi_type = node.attribute_ns(XSI_NS, "type").map(|t| node.resolve_qname(t));
        let encoded_array = node.attribute_ns(SOAP_ENC_NS, "arrayType").is_some()
            || matches!(&xsi_type, Some((Some(ns), local)) if ns == SOAP_ENC_NS && local == "Array");
        let type_name = xsi_type.map(|(_, local)| local).or_else(|| declared.map(str::to_string));
        let definition = type_name.as_deref().and_then(|t| self.description.type_named(t));

        if encoded_array || matches!(definition.map(|d| &d.kind), Some(TypeKind::Array(_))) {
            let item_type = match definition.map(|d| &d.kind) {
                Some(TypeKind::Array(item)) => Some(item.clone()),
                _ => node
                    .attribute_ns(SOAP_ENC_NS, "arrayType")
                    .map(|t| local_name(t.split('[').next().unwrap_or(t)).to_string()),
            };
            return node
                .children
                .iter()
                .map(|child| self.decode_at(child, item_type.as_deref(), depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array);
        }

        if node.has_children() {
            let mut occurrences: HashMap<&str, usize> = HashMap::new();
            for child in &node.children {
                *occurrences.entry(child.name.as_str()).or_default() += 1;
            }

            let mut map = Map::new();
            for child in &node.children {
                let field = definition.and_then(|d| d.field(&child.name));
                let value = self.decode_at(child, field.map(|f| f.type_name.as_str()), depth + 1)?;
                let as_list = field.is_some_and(|f| f.repeated)
                    || occurrences.get(child.name.as_str()).copied().unwrap_or(0) > 1;
                if as_list {
                    if let Value::Array(items) = map
                        .entry(child.name.clone())
                        .or_insert_with(|| Value::Array(Vec::new()))
                    {
                        items.push(value);
                    }
                } else {
                    map.insert(child.name.clone(), value);
                }
            }
            return Ok(Value::Object(map));
        }

        match definition.map(|d| &d.kind) {
            Some(TypeKind::Struct(_)) if node.text.trim().is_empty() => Ok(Value::Object(Map::new())),
            Some(TypeKind::Simple { base, .. }) => coerce_scalar(&node.text, base),
            _ => match type_name.as_deref() {
                Some(t) => coerce_scalar(&node.text, t),
                None => Ok(Value::String(node.text.clone())),
            },
        }
    }

    fn fault(&self, node: &XmlNode, version: SoapVersion) -> Result<SoapFault, SoapError> {
        let text = |n: Option<&XmlNode>| n.map(|n| n.text.trim().to_string());

        let (code, message, actor, detail) = match version {
            SoapVersion::Soap11 => (
                text(node.child("faultcode")),
                text(node.child("faultstring")),
                text(node.child("faultactor")),
                node.child("detail"),
            ),
            SoapVersion::Soap12 => (
                text(node.child("Code").and_then(|c| c.child("Value"))),
                text(node.child("Reason").and_then(|r| r.child("Text"))),
                text(node.child("Role")),
                node.child("Detail"),
            ),
        };

        let detail = match detail {
            Some(d) if d.has_children() || !d.text.trim().is_empty() => Some(self.decode(d, None)?),
            _ => None,
        };

        Ok(SoapFault {
            code: code.unwrap_or_default(),
            message: message.unwrap_or_default(),
            actor,
            detail,
        })
    }
}

fn is_builtin(type_name: &str) -> bool {
    matches!(
        type_name,
        "string"
            | "normalizedString"
            | "token"
            | "int"
            | "integer"
            | "long"
            | "short"
            | "byte"
            | "unsignedInt"
            | "unsignedLong"
            | "unsignedShort"
            | "unsignedByte"
            | "nonNegativeInteger"
            | "positiveInteger"
            | "negativeInteger"
            | "nonPositiveInteger"
            | "float"
            | "double"
            | "decimal"
            | "boolean"
            | "dateTime"
            | "date"
            | "time"
            | "duration"
            | "base64Binary"
            | "hexBinary"
            | "anyURI"
            | "QName"
            | "anyType"
    )
}

fn coerce_scalar(text: &str, type_name: &str) -> Result<Value, SoapError> {
    let invalid = || SoapError::decode(format!("invalid xsd:{} value '{}'", type_name, text));
    match type_name {
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger" | "positiveInteger"
        | "negativeInteger" | "nonPositiveInteger" => {
            text.trim().parse::<i64>().map(Value::from).map_err(|_| invalid())
        }
        "unsignedInt" | "unsignedLong" | "unsignedShort" | "unsignedByte" => {
            text.trim().parse::<u64>().map(Value::from).map_err(|_| invalid())
        }
        "float" | "double" | "decimal" => {
            let parsed = text.trim().parse::<f64>().map_err(|_| invalid())?;
            Ok(Number::from_f64(parsed)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(text.trim().to_string())))
        }
        "boolean" => match text.trim() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        _ => Ok(Value::String(text.to_string())),
    }
}
