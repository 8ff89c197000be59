//! Layer ordering: restacks competing candidate layers in a rendered
//! measure so the first-seen layer paints on top.
//!
//! Elements are grouped by the attribute the renderer uses to mark which
//! candidate drew them (first-seen-wins while scanning front-to-back). Each
//! group is re-appended to its parent in reverse first-seen order. Only the
//! projection changes; the document and the elimination set are untouched.

use std::collections::HashMap;

use crate::document::{Element, Node};
use crate::projection::Projection;

/// Layer values in the order they are first met while scanning.
pub fn first_seen_layers(projection: &Projection, layer_attribute: &str) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for element in projection.root().descendants() {
        if let Some(layer) = layer_of(element, layer_attribute) {
            if !order.iter().any(|l| l == layer) {
                order.push(layer.to_string());
            }
        }
    }
    order
}

/// Restack the projection. The set of elements is preserved exactly.
pub fn reorder_layers(projection: Projection, layer_attribute: &str) -> Projection {
    let order = first_seen_layers(&projection, layer_attribute);
    if order.len() < 2 {
        return projection;
    }

    // Appended last = painted last; reversed first-seen puts the first layer on top
    let rank: HashMap<String, usize> = order
        .iter()
        .rev()
        .enumerate()
        .map(|(rank, layer)| (layer.clone(), rank))
        .collect();
    log::debug!("restacking layers, paint order {:?}", order.iter().rev().collect::<Vec<_>>());

    let mut root = projection.clone().into_root();
    restack(&mut root, layer_attribute, &rank);

    // Reordering siblings cannot create duplicate identities
    Projection::from_root(root).unwrap_or(projection)
}

fn restack(element: &mut Element, layer_attribute: &str, rank: &HashMap<String, usize>) {
    let children = std::mem::take(&mut element.children);
    let (mut moved, kept): (Vec<Node>, Vec<Node>) = children.into_iter().partition(|child| {
        matches!(child, Node::Element(e) if layer_of(e, layer_attribute).is_some())
    });

    moved.sort_by_key(|child| match child {
        Node::Element(e) => layer_of(e, layer_attribute)
            .and_then(|layer| rank.get(layer).copied())
            .unwrap_or(usize::MAX),
        Node::Text(_) => usize::MAX,
    });

    element.children = kept;
    element.children.extend(moved);

    for child in element.child_elements_mut() {
        restack(child, layer_attribute, rank);
    }
}

/// Layer of an addressable element; unaddressable marks are left alone.
fn layer_of<'a>(element: &'a Element, layer_attribute: &str) -> Option<&'a str> {
    Projection::identity_of(element)?;
    element.attribute(layer_attribute)
}
