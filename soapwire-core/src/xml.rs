//! Minimal namespace-aware XML tree.
//!
//! Both the WSDL reader and the envelope decoder work on whole documents of
//! modest size, so the input is read once with `quick-xml` into an owned tree
//! of [`XmlNode`]s. Every node remembers the namespace bindings in scope so
//! that QName-valued attributes (`type="tns:detailsType"`) can be resolved
//! after the fact.

use crate::SoapError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const SOAP_ENC_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
pub const SOAP11_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const WSDL_SOAP12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";

type Scope = Arc<BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub prefix: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

/// An element with its resolved namespace, attributes, children and text.
#[derive(Debug, Clone)]
pub struct XmlNode {
    pub prefix: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
    pub text: String,
    scope: Scope,
}

/// Splits `prefix:local` into its parts.
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Local part of a QName.
pub fn local_name(qname: &str) -> &str {
    split_qname(qname).1
}

impl XmlNode {
    /// Parses a complete document and returns its root element.
    pub fn parse(input: &[u8]) -> Result<XmlNode, SoapError> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    let node = XmlNode::open(&start, stack.last().map(|n| &n.scope))?;
                    stack.push(node);
                }
                Event::Empty(start) => {
                    let node = XmlNode::open(&start, stack.last().map(|n| &n.scope))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| SoapError::decode("unbalanced closing tag"))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(SoapError::decode("unexpected end of document"));
        }
        root.ok_or_else(|| SoapError::decode("document has no root element"))
    }

    fn open(start: &BytesStart<'_>, parent: Option<&Scope>) -> Result<XmlNode, SoapError> {
        let mut scope = parent.cloned().unwrap_or_default();
        let mut declared = BTreeMap::new();
        let mut raw = Vec::new();

        for attr in start.attributes() {
            let attr = attr?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            if key == "xmlns" {
                declared.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declared.insert(prefix.to_string(), value);
            } else {
                raw.push((key, value));
            }
        }

        if !declared.is_empty() {
            let mut merged = (*scope).clone();
            merged.extend(declared);
            scope = Arc::new(merged);
        }

        let qname = utf8(start.name().as_ref())?.to_string();
        let (prefix, name) = split_qname(&qname);
        let namespace = lookup(&scope, prefix.unwrap_or(""));

        let attributes = raw
            .into_iter()
            .map(|(key, value)| {
                let (prefix, name) = split_qname(&key);
                XmlAttribute {
                    namespace: prefix.and_then(|p| lookup(&scope, p)),
                    prefix: prefix.map(str::to_string),
                    name: name.to_string(),
                    value,
                }
            })
            .collect();

        Ok(XmlNode {
            prefix: prefix.map(str::to_string),
            name: name.to_string(),
            namespace,
            attributes,
            children: Vec::new(),
            text: String::new(),
            scope,
        })
    }

    /// True if this element has the given namespace and local name.
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Unqualified attribute by local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.prefix.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Namespace-qualified attribute.
    pub fn attribute_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.namespace.as_deref() == Some(namespace))
            .map(|a| a.value.as_str())
    }

    /// First child with the given local name, regardless of namespace.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_ns(&self, namespace: &str, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn lookup_namespace(&self, prefix: &str) -> Option<String> {
        lookup(&self.scope, prefix)
    }

    /// Resolves a QName-valued attribute against the bindings in scope.
    pub fn resolve_qname(&self, qname: &str) -> (Option<String>, String) {
        let (prefix, local) = split_qname(qname);
        (self.lookup_namespace(prefix.unwrap_or("")), local.to_string())
    }
}

fn lookup(scope: &Scope, prefix: &str) -> Option<String> {
    if prefix == "xml" {
        return Some(XML_NS.to_string());
    }
    scope.get(prefix).filter(|ns| !ns.is_empty()).cloned()
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), SoapError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_some() => return Err(SoapError::decode("multiple root elements")),
        None => *root = Some(node),
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<&str, SoapError> {
    std::str::from_utf8(bytes).map_err(|e| SoapError::decode(format!("invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolves_namespaces() {
        let doc = br#"<?xml version="1.0"?>
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
              <s:Body>
                <m:ping xmlns:m="urn:test" xmlns="urn:default"><value>1 &amp; 2</value></m:ping>
              </s:Body>
            </s:Envelope>"#;

        let root = XmlNode::parse(doc).unwrap();
        assert!(root.is(SOAP11_ENV_NS, "Envelope"));

        let body = root.child_ns(SOAP11_ENV_NS, "Body").unwrap();
        let ping = body.child("ping").unwrap();
        assert_eq!(ping.namespace.as_deref(), Some("urn:test"));

        let value = ping.child("value").unwrap();
        assert_eq!(value.namespace.as_deref(), Some("urn:default"));
        assert_eq!(value.text, "1 & 2");
    }

    #[test]
    fn test_qualified_attributes_and_qnames() {
        let doc = br#"<item xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                           xmlns:xsd="http://www.w3.org/2001/XMLSchema"
                           xsi:type="xsd:int" name="n">5</item>"#;

        let node = XmlNode::parse(doc).unwrap();
        let ty = node.attribute_ns(XSI_NS, "type").unwrap();
        assert_eq!(ty, "xsd:int");
        assert_eq!(node.attribute("name"), Some("n"));
        assert_eq!(node.attribute("type"), None);

        let (ns, local) = node.resolve_qname(ty);
        assert_eq!(ns.as_deref(), Some(XSD_NS));
        assert_eq!(local, "int");
    }

    #[test]
    fn test_cdata_is_text() {
        let node = XmlNode::parse(b"<a><![CDATA[<raw>]]></a>").unwrap();
        assert_eq!(node.text, "<raw>");
    }

    #[test]
    fn test_malformed_documents() {
        assert!(XmlNode::parse(b"").is_err());
        assert!(XmlNode::parse(b"<a><b></a>").is_err());
        assert!(XmlNode::parse(b"<a>").is_err());
        assert!(XmlNode::parse(b"not xml at all").is_err());
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("tns:getBank"), (Some("tns"), "getBank"));
        assert_eq!(split_qname("getBank"), (None, "getBank"));
        assert_eq!(local_name("xsd:string"), "string");
    }
}
