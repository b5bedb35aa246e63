//! WSDL 1.1 reader.
//!
//! Builds a [`ServiceDescription`] from the `types`, `message`, `portType`,
//! `binding` and `service` sections of a WSDL document. Only SOAP bindings
//! are considered; HTTP GET/POST bindings are skipped. When an operation is
//! bound for both SOAP 1.1 and SOAP 1.2 the binding for the preferred
//! version wins, so function names stay unique.

use crate::description::{
    BindingStyle, BodyUse, Field, FunctionSignature, Parameter, ServiceDescription, SoapVersion,
    TypeDefinition, TypeKind,
};
use crate::xml::{local_name, XmlNode, SOAP_ENC_NS, WSDL_NS, WSDL_SOAP11_NS, WSDL_SOAP12_NS, XSD_NS};
use crate::SoapError;
use std::collections::HashMap;
use tracing::{debug, trace};

struct MessagePart {
    name: String,
    element: Option<String>,
    element_namespace: Option<String>,
    type_name: Option<String>,
}

struct PortOperation {
    input: Option<String>,
    output: Option<String>,
}

struct BoundOperation {
    name: String,
    soap_action: String,
    style: BindingStyle,
    body_use: BodyUse,
    namespace: Option<String>,
}

struct Binding {
    name: String,
    port_type: String,
    version: SoapVersion,
    operations: Vec<BoundOperation>,
}

/// Parses a WSDL document, preferring bindings of the given SOAP version.
pub fn parse_wsdl(document: &[u8], preferred: SoapVersion) -> Result<ServiceDescription, SoapError> {
    let root = XmlNode::parse(document).map_err(|e| SoapError::InvalidWsdl(e.to_string()))?;
    if !root.is(WSDL_NS, "definitions") {
        return Err(SoapError::InvalidWsdl(format!(
            "expected wsdl:definitions root element, found '{}'",
            root.name
        )));
    }

    let target_namespace = root.attribute("targetNamespace").map(str::to_string);
    let mut description = ServiceDescription::new(target_namespace.clone());

    let mut schema_namespace = None;
    if let Some(types) = root.child_ns(WSDL_NS, "types") {
        let mut reader = SchemaReader::default();
        for schema in types.children.iter().filter(|c| c.is(XSD_NS, "schema")) {
            if schema.attribute("elementFormDefault") == Some("qualified") {
                description.set_qualified_elements(true);
            }
            if schema_namespace.is_none() {
                schema_namespace = schema.attribute("targetNamespace").map(str::to_string);
            }
            reader.read_schema(schema);
        }
        reader.finish(&mut description);
    }

    let messages = read_messages(&root);
    let port_types = read_port_types(&root);
    let bindings = read_bindings(&root);
    let mut ports = read_ports(&root);
    description.service_name = root
        .child_ns(WSDL_NS, "service")
        .and_then(|s| s.attribute("name"))
        .map(str::to_string);

    // Preferred version first; stable sort keeps document order otherwise.
    let mut bound: Vec<(Binding, String)> = bindings
        .into_iter()
        .filter_map(|b| ports.remove(&b.name).map(|location| (b, location)))
        .collect();
    bound.sort_by_key(|(b, _)| b.version != preferred);

    if bound.is_empty() {
        return Err(SoapError::InvalidWsdl("no SOAP service port found".to_string()));
    }

    for (binding, location) in &bound {
        let Some(operations) = port_types.get(&binding.port_type) else {
            return Err(SoapError::InvalidWsdl(format!(
                "binding '{}' refers to unknown portType '{}'",
                binding.name, binding.port_type
            )));
        };

        for op in &binding.operations {
            if description.contains_function(&op.name) {
                trace!(function = %op.name, binding = %binding.name, "skipping duplicate binding operation");
                continue;
            }
            let port_op = operations.get(&op.name).ok_or_else(|| {
                SoapError::InvalidWsdl(format!(
                    "operation '{}' is not declared by portType '{}'",
                    op.name, binding.port_type
                ))
            })?;

            let namespace = match op.style {
                BindingStyle::Rpc => op.namespace.clone().or_else(|| target_namespace.clone()),
                BindingStyle::Document => port_op
                    .input
                    .as_deref()
                    .and_then(|input| messages.get(input))
                    .and_then(|parts| parts.iter().find_map(|p| p.element_namespace.clone()))
                    .or_else(|| schema_namespace.clone())
                    .or_else(|| target_namespace.clone()),
            };

            let function = FunctionSignature {
                name: op.name.clone(),
                parameters: parameters(&description, &messages, port_op.input.as_deref())?,
                output: parameters(&description, &messages, port_op.output.as_deref())?,
                style: op.style,
                body_use: op.body_use,
                soap_action: op.soap_action.clone(),
                namespace,
                location: location.clone(),
                version: binding.version,
            };
            debug!(function = %function, location = %function.location, "registered SOAP function");
            description.add_function(function)?;
        }
    }

    Ok(description)
}

fn parameters(
    description: &ServiceDescription,
    messages: &HashMap<String, Vec<MessagePart>>,
    message: Option<&str>,
) -> Result<Vec<Parameter>, SoapError> {
    let Some(message) = message else {
        return Ok(Vec::new());
    };
    let parts = messages
        .get(message)
        .ok_or_else(|| SoapError::InvalidWsdl(format!("unknown message '{}'", message)))?;

    Ok(parts
        .iter()
        .map(|part| match (&part.element, &part.type_name) {
            (Some(element), _) => {
                let type_name = description.element_type(element).unwrap_or(element.as_str());
                Parameter::new(&part.name, type_name).with_element(element)
            }
            (None, Some(type_name)) => Parameter::new(&part.name, type_name),
            (None, None) => Parameter::new(&part.name, "anyType"),
        })
        .collect())
}

fn read_messages(root: &XmlNode) -> HashMap<String, Vec<MessagePart>> {
    root.children
        .iter()
        .filter(|c| c.is(WSDL_NS, "message"))
        .filter_map(|message| {
            let name = message.attribute("name")?;
            let parts = message
                .children_named("part")
                .filter_map(|part| {
                    let (element_namespace, element) = match part.attribute("element") {
                        Some(qname) => {
                            let (namespace, local) = part.resolve_qname(qname);
                            (namespace, Some(local))
                        }
                        None => (None, None),
                    };
                    Some(MessagePart {
                        name: part.attribute("name")?.to_string(),
                        element,
                        element_namespace,
                        type_name: part.attribute("type").map(|t| local_name(t).to_string()),
                    })
                })
                .collect();
            Some((name.to_string(), parts))
        })
        .collect()
}

fn read_port_types(root: &XmlNode) -> HashMap<String, HashMap<String, PortOperation>> {
    root.children
        .iter()
        .filter(|c| c.is(WSDL_NS, "portType"))
        .filter_map(|port_type| {
            let name = port_type.attribute("name")?;
            let operations = port_type
                .children_named("operation")
                .filter_map(|op| {
                    let message = |kind: &str| {
                        op.child(kind)
                            .and_then(|n| n.attribute("message"))
                            .map(|m| local_name(m).to_string())
                    };
                    Some((
                        op.attribute("name")?.to_string(),
                        PortOperation {
                            input: message("input"),
                            output: message("output"),
                        },
                    ))
                })
                .collect();
            Some((name.to_string(), operations))
        })
        .collect()
}

fn read_bindings(root: &XmlNode) -> Vec<Binding> {
    let mut bindings = Vec::new();

    for binding in root.children.iter().filter(|c| c.is(WSDL_NS, "binding")) {
        let soap = binding
            .children
            .iter()
            .find(|c| c.name == "binding" && is_soap_binding_ns(c.namespace.as_deref()));
        let Some(soap) = soap else {
            continue;
        };
        let (Some(name), Some(port_type)) = (binding.attribute("name"), binding.attribute("type"))
        else {
            continue;
        };

        let version = match soap.namespace.as_deref() {
            Some(WSDL_SOAP12_NS) => SoapVersion::Soap12,
            _ => SoapVersion::Soap11,
        };
        let default_style = parse_style(soap.attribute("style")).unwrap_or_default();

        let operations = binding
            .children_named("operation")
            .filter(|op| op.namespace.as_deref() == Some(WSDL_NS))
            .filter_map(|op| {
                let soap_op = op.child("operation");
                let body = op.child("input").and_then(|input| input.child("body"));
                Some(BoundOperation {
                    name: op.attribute("name")?.to_string(),
                    soap_action: soap_op
                        .and_then(|s| s.attribute("soapAction"))
                        .unwrap_or_default()
                        .to_string(),
                    style: parse_style(soap_op.and_then(|s| s.attribute("style")))
                        .unwrap_or(default_style),
                    body_use: match body.and_then(|b| b.attribute("use")) {
                        Some("encoded") => BodyUse::Encoded,
                        _ => BodyUse::Literal,
                    },
                    namespace: body.and_then(|b| b.attribute("namespace")).map(str::to_string),
                })
            })
            .collect();

        bindings.push(Binding {
            name: name.to_string(),
            port_type: local_name(port_type).to_string(),
            version,
            operations,
        });
    }

    bindings
}

/// Maps binding name to the address of the port that exposes it.
fn read_ports(root: &XmlNode) -> HashMap<String, String> {
    root.children
        .iter()
        .filter(|c| c.is(WSDL_NS, "service"))
        .flat_map(|service| service.children_named("port"))
        .filter_map(|port| {
            let binding = port.attribute("binding")?;
            let address = port
                .children
                .iter()
                .find(|c| c.name == "address" && is_soap_binding_ns(c.namespace.as_deref()))?;
            Some((
                local_name(binding).to_string(),
                address.attribute("location")?.to_string(),
            ))
        })
        .collect()
}

fn is_soap_binding_ns(namespace: Option<&str>) -> bool {
    matches!(namespace, Some(WSDL_SOAP11_NS) | Some(WSDL_SOAP12_NS))
}

fn parse_style(style: Option<&str>) -> Option<BindingStyle> {
    match style? {
        "rpc" => Some(BindingStyle::Rpc),
        "document" => Some(BindingStyle::Document),
        _ => None,
    }
}

/// Collects named and anonymous schema types across all `xsd:schema` blocks.
#[derive(Default)]
struct SchemaReader {
    types: Vec<TypeDefinition>,
    bases: HashMap<String, String>,
    elements: Vec<(String, String)>,
}

impl SchemaReader {
    fn read_schema(&mut self, schema: &XmlNode) {
        let namespace = schema.attribute("targetNamespace").map(str::to_string);

        for child in schema.children.iter().filter(|c| c.namespace.as_deref() == Some(XSD_NS)) {
            let Some(name) = child.attribute("name") else {
                continue;
            };
            match child.name.as_str() {
                "complexType" => self.read_complex(child, name, namespace.clone()),
                "simpleType" => self.read_simple(child, name, namespace.clone()),
                "element" => {
                    if let Some(ty) = child.attribute("type") {
                        self.elements.push((name.to_string(), local_name(ty).to_string()));
                    } else if let Some(inline) = child.child("complexType") {
                        self.read_complex(inline, name, namespace.clone());
                        self.elements.push((name.to_string(), name.to_string()));
                    } else if let Some(inline) = child.child("simpleType") {
                        self.read_simple(inline, name, namespace.clone());
                        self.elements.push((name.to_string(), name.to_string()));
                    }
                }
                _ => {}
            }
        }
    }

    fn read_complex(&mut self, node: &XmlNode, name: &str, namespace: Option<String>) {
        let mut fields = Vec::new();

        if let Some(content) = node.child("complexContent") {
            if let Some(restriction) = content.child("restriction") {
                let base = restriction.attribute("base").unwrap_or_default();
                let (base_ns, base_local) = restriction.resolve_qname(base);
                if base_local == "Array" && base_ns.as_deref() == Some(SOAP_ENC_NS) {
                    let item = array_item_type(restriction).unwrap_or_else(|| "anyType".to_string());
                    self.push(name, namespace, TypeKind::Array(item));
                    return;
                }
                self.read_particles(restriction, name, &namespace, &mut fields);
            } else if let Some(extension) = content.child("extension") {
                if let Some(base) = extension.attribute("base") {
                    self.bases.insert(name.to_string(), local_name(base).to_string());
                }
                self.read_particles(extension, name, &namespace, &mut fields);
            }
        } else {
            self.read_particles(node, name, &namespace, &mut fields);
        }

        self.push(name, namespace, TypeKind::Struct(fields));
    }

    fn read_particles(
        &mut self,
        node: &XmlNode,
        owner: &str,
        namespace: &Option<String>,
        fields: &mut Vec<Field>,
    ) {
        for group in node
            .children
            .iter()
            .filter(|c| matches!(c.name.as_str(), "sequence" | "all" | "choice"))
        {
            for element in group.children_named("element") {
                let Some(field_name) = element.attribute("name").or_else(|| element.attribute("ref"))
                else {
                    continue;
                };
                let field_name = local_name(field_name).to_string();

                let type_name = match element.attribute("type") {
                    Some(ty) => local_name(ty).to_string(),
                    None => match element.child("complexType") {
                        Some(inline) => {
                            let nested = format!("{}.{}", owner, field_name);
                            self.read_complex(inline, &nested, namespace.clone());
                            nested
                        }
                        None if element.attribute("ref").is_some() => field_name.clone(),
                        None => "string".to_string(),
                    },
                };

                let repeated = match element.attribute("maxOccurs") {
                    Some("unbounded") => true,
                    Some(n) => n.parse::<u32>().map(|n| n > 1).unwrap_or(false),
                    None => false,
                };

                fields.push(Field {
                    name: field_name,
                    type_name,
                    min_occurs: element
                        .attribute("minOccurs")
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(1),
                    repeated,
                    nillable: element.attribute("nillable") == Some("true"),
                });
            }
            // Nested groups (sequence inside choice etc.) share the same owner.
            self.read_particles(group, owner, namespace, fields);
        }
    }

    fn read_simple(&mut self, node: &XmlNode, name: &str, namespace: Option<String>) {
        let restriction = node.child("restriction");
        let base = restriction
            .and_then(|r| r.attribute("base"))
            .map(|b| local_name(b).to_string())
            .unwrap_or_else(|| "string".to_string());
        let enumeration = restriction
            .map(|r| {
                r.children_named("enumeration")
                    .filter_map(|e| e.attribute("value").map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        self.push(name, namespace, TypeKind::Simple { base, enumeration });
    }

    fn push(&mut self, name: &str, namespace: Option<String>, kind: TypeKind) {
        self.types.push(TypeDefinition {
            name: name.to_string(),
            namespace,
            kind,
        });
    }

    /// Flattens `complexContent/extension` inheritance and hands the result over.
    fn finish(mut self, description: &mut ServiceDescription) {
        let snapshot = self.types.clone();
        for ty in &mut self.types {
            let mut inherited = Vec::new();
            let mut base = self.bases.get(&ty.name);
            let mut depth = 0;
            while let Some(base_name) = base {
                if depth > 16 {
                    break;
                }
                if let Some(TypeKind::Struct(base_fields)) =
                    snapshot.iter().find(|t| &t.name == base_name).map(|t| &t.kind)
                {
                    let mut merged = base_fields.clone();
                    merged.append(&mut inherited);
                    inherited = merged;
                }
                base = self.bases.get(base_name);
                depth += 1;
            }
            if let TypeKind::Struct(fields) = &mut ty.kind {
                inherited.append(fields);
                *fields = inherited;
            }
        }

        for ty in self.types {
            description.add_type(ty);
        }
        for (element, ty) in self.elements {
            description.add_element(element, ty);
        }
    }
}

/// Item type of a `soapenc:Array` restriction, from `wsdl:arrayType="xsd:string[]"`.
fn array_item_type(restriction: &XmlNode) -> Option<String> {
    restriction
        .children_named("attribute")
        .find_map(|attr| attr.attribute_ns(WSDL_NS, "arrayType"))
        .map(|array_type| local_name(array_type.trim_end_matches("[]")).to_string())
}
