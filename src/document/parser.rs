//! XML reader: converts document source into the owned element tree.

use roxmltree::Node as XmlNode;

use super::{Attribute, Document, Element, Namespace, Node, QName, XML_NAMESPACE};
use crate::error::ParseError;

/// Parse serialized document bytes into a [`Document`].
pub fn load(data: &[u8]) -> Result<Document, ParseError> {
    let xml = std::str::from_utf8(data).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    parse_document(xml)
}

/// Parse an XML string into a [`Document`].
pub fn parse_document(xml: &str) -> Result<Document, ParseError> {
    let root = parse_fragment(xml)?;
    let doc = Document::from_root(root)?;
    log::debug!(
        "loaded <{}> document with {} identified elements",
        doc.root().name,
        doc.identity_count()
    );
    Ok(doc)
}

/// Parse XML into a bare element tree. Whitespace-only text, comments and
/// processing instructions are dropped.
pub fn parse_fragment(xml: &str) -> Result<Element, ParseError> {
    // MEI files exported by notation software may carry a DOCTYPE
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)
        .map_err(|e| ParseError::InvalidXml(e.to_string()))?;

    Ok(convert_element(&doc.root_element(), &[]))
}

fn convert_element(node: &XmlNode, parent_scope: &[Namespace]) -> Element {
    let scope: Vec<Namespace> = node
        .namespaces()
        .filter(|ns| ns.uri() != XML_NAMESPACE)
        .map(|ns| Namespace {
            prefix: ns.name().map(String::from),
            uri: ns.uri().to_string(),
        })
        .collect();

    let namespaces = scope
        .iter()
        .filter(|ns| !parent_scope.contains(ns))
        .cloned()
        .collect();

    let tag = node.tag_name();
    let name = QName {
        prefix: tag
            .namespace()
            .and_then(|uri| prefix_for(&scope, uri, true)),
        local: tag.name().to_string(),
    };

    let attributes = node
        .attributes()
        .map(|attr| Attribute {
            name: QName {
                prefix: attr.namespace().and_then(|uri| {
                    if uri == XML_NAMESPACE {
                        Some("xml".to_string())
                    } else {
                        prefix_for(&scope, uri, false)
                    }
                }),
                local: attr.name().to_string(),
            },
            value: attr.value().to_string(),
        })
        .collect();

    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(Node::Element(convert_element(&child, &scope)));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                if !text.trim().is_empty() {
                    children.push(Node::Text(text.to_string()));
                }
            }
        }
    }

    Element {
        name,
        attributes,
        namespaces,
        children,
    }
}

/// Prefix bound to `uri` in `scope`. Attributes never take the default
/// namespace, elements prefer it.
fn prefix_for(scope: &[Namespace], uri: &str, allow_default: bool) -> Option<String> {
    if allow_default
        && scope
            .iter()
            .any(|ns| ns.prefix.is_none() && ns.uri == uri)
    {
        return None;
    }
    scope
        .iter()
        .rev()
        .find(|ns| ns.prefix.is_some() && ns.uri == uri)
        .and_then(|ns| ns.prefix.clone())
}
