//! Identity addressing across the structured tree and its rendered projection.
//!
//! The same identity string names the same conceptual element in both
//! representations. [`IdentityIndex`] locates an identity inside one tree;
//! [`IdentityBinding`] pairs a measure sub-tree with the projection rendered
//! from it, so the pairing is checked once instead of assumed at every click.

use std::collections::HashMap;

use crate::document::{Element, Node, Subtree};
use crate::error::BindingError;
use crate::model::ElementIdentity;
use crate::projection::Projection;

/// Picks the identity of an element (e.g. `xml:id` in MEI, `id` in SVG).
pub type IdentityFn = fn(&Element) -> Option<&str>;

/// Identity → child-index path from the root of one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityIndex {
    paths: HashMap<ElementIdentity, Vec<usize>>,
}

impl IdentityIndex {
    /// Index every identified element below (and including) `root`.
    /// Fails with the first identity seen twice.
    pub fn build(root: &Element, identity: IdentityFn) -> Result<Self, ElementIdentity> {
        let mut index = IdentityIndex::default();
        let mut path = Vec::new();
        index.visit(root, identity, &mut path)?;
        Ok(index)
    }

    fn visit(
        &mut self,
        element: &Element,
        identity: IdentityFn,
        path: &mut Vec<usize>,
    ) -> Result<(), ElementIdentity> {
        if let Some(id) = identity(element) {
            let id = ElementIdentity::from(id);
            if self.paths.contains_key(&id) {
                return Err(id);
            }
            self.paths.insert(id, path.clone());
        }
        for (i, child) in element.children.iter().enumerate() {
            if let Node::Element(child) = child {
                path.push(i);
                self.visit(child, identity, path)?;
                path.pop();
            }
        }
        Ok(())
    }

    pub fn path(&self, id: &str) -> Option<&[usize]> {
        self.paths.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.paths.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = &ElementIdentity> {
        self.paths.keys()
    }
}

/// Locate `id` below `root` without building a full index.
pub fn find_path(root: &Element, id: &str, identity: IdentityFn) -> Option<Vec<usize>> {
    if identity(root) == Some(id) {
        return Some(Vec::new());
    }
    for (i, child) in root.children.iter().enumerate() {
        if let Node::Element(child) = child {
            if let Some(mut rest) = find_path(child, id, identity) {
                rest.insert(0, i);
                return Some(rest);
            }
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════
// Cross-representation binding
// ═══════════════════════════════════════════════════════════════════════

/// Bidirectional lookup between a measure sub-tree and its projection.
#[derive(Debug, Clone, Default)]
pub struct IdentityBinding {
    to_document: HashMap<String, ElementIdentity>,
    to_visual: HashMap<ElementIdentity, String>,
    /// Projection identities with no element in the sub-tree
    /// (renderer-generated parts such as stems or page furniture)
    unmatched_visual: Vec<String>,
    /// Sub-tree identities the renderer did not draw
    unrendered: Vec<ElementIdentity>,
}

impl IdentityBinding {
    pub fn bind(subtree: &Subtree, projection: &Projection) -> Self {
        let mut binding = IdentityBinding::default();

        for visual in projection.identities() {
            if subtree.contains(&visual) {
                binding
                    .to_document
                    .insert(visual.clone(), ElementIdentity::from(visual.as_str()));
                binding.to_visual.insert(ElementIdentity::from(visual.as_str()), visual);
            } else {
                binding.unmatched_visual.push(visual);
            }
        }

        binding.unrendered = subtree
            .identities()
            .into_iter()
            .filter(|id| !binding.to_visual.contains_key(id))
            .collect();

        log::debug!(
            "bound projection: {} shared identities, {} renderer-only, {} unrendered",
            binding.to_visual.len(),
            binding.unmatched_visual.len(),
            binding.unrendered.len()
        );
        binding
    }

    /// The document element a visual element stands for.
    pub fn document_identity(&self, visual: &str) -> Result<&ElementIdentity, BindingError> {
        self.to_document
            .get(visual)
            .ok_or_else(|| BindingError::UnknownIdentity(ElementIdentity::from(visual)))
    }

    /// The visual element drawn for a document element, if it was rendered.
    pub fn visual_identity(&self, id: &str) -> Option<&str> {
        self.to_visual.get(id).map(String::as_str)
    }

    pub fn unmatched_visual(&self) -> &[String] {
        &self.unmatched_visual
    }

    pub fn unrendered(&self) -> &[ElementIdentity] {
        &self.unrendered
    }

    pub fn len(&self) -> usize {
        self.to_visual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_visual.is_empty()
    }
}
