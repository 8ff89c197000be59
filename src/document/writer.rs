//! XML writer: turns element trees back into markup.
//!
//! Output is compact: no indentation is added, so text content survives a
//! load/serialize cycle unchanged.

use super::{Element, Namespace, Node};

const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A full document, with XML declaration.
pub(crate) fn write_document(root: &Element) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(DECLARATION);
    out.push('\n');
    write_element(&mut out, root, &[]);
    out.push('\n');
    out
}

/// A standalone fragment. `in_scope` namespaces the root does not declare
/// itself are declared on it so the fragment parses on its own.
pub(crate) fn write_fragment(root: &Element, in_scope: &[Namespace]) -> String {
    let inherited: Vec<&Namespace> = in_scope
        .iter()
        .filter(|ns| !root.namespaces.iter().any(|own| own.prefix == ns.prefix))
        .collect();
    let mut out = String::new();
    write_element(&mut out, root, &inherited);
    out
}

fn write_element(out: &mut String, element: &Element, extra: &[&Namespace]) {
    out.push('<');
    out.push_str(&element.name.to_string());

    for ns in extra.iter().copied().chain(element.namespaces.iter()) {
        match &ns.prefix {
            Some(prefix) => {
                out.push_str(" xmlns:");
                out.push_str(prefix);
            }
            None => out.push_str(" xmlns"),
        }
        out.push_str("=\"");
        out.push_str(&escape_attr(&ns.uri));
        out.push('"');
    }

    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name.to_string());
        out.push_str("=\"");
        out.push_str(&escape_attr(&attr.value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    for child in &element.children {
        match child {
            Node::Element(e) => write_element(out, e, &[]),
            Node::Text(t) => out.push_str(&escape_text(t)),
        }
    }

    out.push_str("</");
    out.push_str(&element.name.to_string());
    out.push('>');
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
