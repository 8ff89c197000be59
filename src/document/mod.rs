//! Document model: an owned, mutable tree of the score with stable
//! per-element identities.
//!
//! The tree is loaded once per editing session. Measures are read out of it
//! as detached [`Subtree`] copies and spliced back in wholesale once they are
//! resolved.

mod normalize;
mod parser;
mod writer;

use std::fmt;

use crate::error::{DocumentError, ParseError};
use crate::identity::{self, IdentityIndex};
use crate::model::ElementIdentity;

pub use normalize::{generate_ids, normalize};
pub use parser::{load, parse_document, parse_fragment};

/// Namespace URI of the reserved `xml:` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix for identities handed out by the document itself.
const GENERATED_PREFIX: &str = "m-";

// ─── Tree ────────────────────────────────────────────────────────────

/// Element or attribute name as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
        }
    }

    pub fn prefixed(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            local: local.into(),
        }
    }

    /// Parse `prefix:local` or `local`.
    pub fn parse(name: &str) -> Self {
        match name.split_once(':') {
            Some((prefix, local)) => Self::prefixed(prefix, local),
            None => Self::new(name),
        }
    }

    fn is(&self, name: &QName) -> bool {
        self.prefix == name.prefix && self.local == name.local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// A namespace declaration (`xmlns` / `xmlns:prefix`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    /// Namespaces declared on this element (not inherited ones)
    pub namespaces: Vec<Namespace>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Local name, e.g. `note` for `<mei:note>`.
    pub fn kind(&self) -> &str {
        &self.name.local
    }

    /// The element's `xml:id`.
    pub fn identity(&self) -> Option<&str> {
        self.attribute("xml:id")
    }

    pub fn set_identity(&mut self, id: &str) {
        self.set_attribute("xml:id", id);
    }

    /// Look up an attribute by its written name (`dur`, `xml:id`, ...).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        let name = QName::parse(name);
        self.attributes
            .iter()
            .find(|a| a.name.is(&name))
            .map(|a| a.value.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let name = QName::parse(name);
        match self.attributes.iter_mut().find(|a| a.name.is(&name)) {
            Some(attr) => attr.value = value.to_string(),
            None => self.attributes.push(Attribute {
                name,
                value: value.to_string(),
            }),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let name = QName::parse(name);
        let pos = self.attributes.iter().position(|a| a.name.is(&name))?;
        Some(self.attributes.remove(pos).value)
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// This element and every element below it, in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        out.push(self);
        for child in self.child_elements() {
            child.collect_descendants(out);
        }
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .children
            .iter()
            .filter_map(|c| match c {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Follow a child-index path down from this element.
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &i in path {
            current = match current.children.get(i)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &i in path {
            current = match current.children.get_mut(i)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    /// Apply `f` to this element and every element below it.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in self.child_elements_mut() {
            child.walk_mut(f);
        }
    }

    /// Drop child elements (recursively) for which `keep` returns false.
    pub fn retain_elements(&mut self, keep: &impl Fn(&Element) -> bool) {
        self.children.retain(|c| match c {
            Node::Element(e) => keep(e),
            Node::Text(_) => true,
        });
        for child in self.child_elements_mut() {
            child.retain_elements(keep);
        }
    }
}

fn xml_identity(element: &Element) -> Option<&str> {
    element.identity()
}

// ─── Subtree ─────────────────────────────────────────────────────────

/// A detached copy of one element and everything below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    root: Element,
    /// Namespaces in scope where the copy was taken (or declared by the
    /// standalone source it was parsed from)
    in_scope: Vec<Namespace>,
}

impl Subtree {
    pub fn new(root: Element) -> Self {
        Self {
            root,
            in_scope: Vec::new(),
        }
    }

    /// Parse a standalone XML fragment, e.g. a measure sent back by the
    /// merge service.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let xml = std::str::from_utf8(data).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
        let mut root = parser::parse_fragment(xml)?;
        IdentityIndex::build(&root, xml_identity).map_err(ParseError::DuplicateIdentity)?;
        let in_scope = std::mem::take(&mut root.namespaces);
        Ok(Self { root, in_scope })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn identity(&self) -> Option<&str> {
        self.root.identity()
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        let path = identity::find_path(&self.root, id, xml_identity)?;
        self.root.element_at(&path)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        let path = identity::find_path(&self.root, id, xml_identity)?;
        self.root.element_at_mut(&path)
    }

    pub fn contains(&self, id: &str) -> bool {
        identity::find_path(&self.root, id, xml_identity).is_some()
    }

    /// Every identity in the sub-tree, in document order.
    pub fn identities(&self) -> Vec<ElementIdentity> {
        self.root
            .descendants()
            .into_iter()
            .filter_map(|e| e.identity().map(ElementIdentity::from))
            .collect()
    }

    /// Standalone XML (no declaration), with inherited namespaces declared
    /// on the root.
    pub fn serialize(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }

    pub fn to_xml_string(&self) -> String {
        writer::write_fragment(&self.root, &self.in_scope)
    }
}

// ─── Document ────────────────────────────────────────────────────────

/// The full structured tree of a score.
#[derive(Debug, Clone)]
pub struct Document {
    root: Element,
    index: IdentityIndex,
    /// Highest `m-<n>` suffix this document has ever held
    high_water: u64,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Document {
    /// Wrap an owned tree, indexing its identities.
    pub fn from_root(root: Element) -> Result<Self, ParseError> {
        let index = IdentityIndex::build(&root, xml_identity).map_err(ParseError::DuplicateIdentity)?;
        let high_water = index
            .identities()
            .filter_map(|id| generated_number(id.as_str()))
            .max()
            .unwrap_or(0);
        Ok(Self {
            root,
            index,
            high_water,
        })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Number of identified elements.
    pub fn identity_count(&self) -> usize {
        self.index.len()
    }

    pub fn identities(&self) -> impl Iterator<Item = &ElementIdentity> {
        self.index.identities()
    }

    pub fn find_by_identity(&self, id: &str) -> Result<&Element, DocumentError> {
        let path = self.path_of(id)?;
        self.root.element_at(path).ok_or_else(|| not_found(id))
    }

    /// Elements enclosing `id`, nearest first. Excludes the element itself.
    pub fn ancestors(&self, id: &str) -> Result<Vec<&Element>, DocumentError> {
        let path = self.path_of(id)?;
        Ok((0..path.len())
            .rev()
            .filter_map(|depth| self.root.element_at(&path[..depth]))
            .collect())
    }

    /// Walk strictly upward from `id` and return the first ancestor
    /// satisfying `predicate`.
    pub fn find_ancestor_matching(
        &self,
        id: &str,
        predicate: impl Fn(&Element) -> bool,
    ) -> Result<&Element, DocumentError> {
        self.ancestors(id)?
            .into_iter()
            .find(|e| predicate(e))
            .ok_or_else(|| not_found(id))
    }

    /// Detached copy of the element addressed by `id`.
    pub fn extract_subtree(&self, id: &str) -> Result<Subtree, DocumentError> {
        let path = self.path_of(id)?;
        let root = self.root.element_at(path).ok_or_else(|| not_found(id))?.clone();
        Ok(Subtree {
            root,
            in_scope: self.parent_scope(path),
        })
    }

    /// Replace the element addressed by `id` with `replacement`.
    ///
    /// Elements of the replacement without an identity get fresh ones.
    /// Returns the identity of the spliced-in root.
    pub fn replace_subtree(
        &mut self,
        id: &str,
        replacement: Subtree,
    ) -> Result<ElementIdentity, DocumentError> {
        let path = self.path_of(id)?.to_vec();

        // The replacement may reuse identities of the element it replaces,
        // never ones living elsewhere.
        let mut seen = std::collections::HashSet::new();
        for new_id in replacement.identities() {
            if !seen.insert(new_id.clone()) {
                return Err(DocumentError::DuplicateIdentity(new_id));
            }
            if let Some(existing) = self.index.path(new_id.as_str()) {
                if !existing.starts_with(&path) {
                    return Err(DocumentError::DuplicateIdentity(new_id));
                }
            }
        }

        let Subtree { mut root, in_scope } = replacement;
        let parent_scope = self.parent_scope(&path);
        for ns in in_scope {
            let bound = parent_scope
                .iter()
                .chain(root.namespaces.iter())
                .any(|p| p.prefix == ns.prefix && p.uri == ns.uri);
            if !bound {
                root.namespaces.push(ns);
            }
        }

        let mut high_water = self.high_water;
        root.walk_mut(&mut |e: &mut Element| {
            if let Some(n) = e.identity().and_then(generated_number) {
                high_water = high_water.max(n);
            }
        });
        let mut exhausted = false;
        root.walk_mut(&mut |e: &mut Element| {
            if e.identity().is_none() {
                match high_water.checked_add(1) {
                    Some(next) => {
                        high_water = next;
                        e.set_identity(&format!("{GENERATED_PREFIX}{high_water}"));
                    }
                    None => exhausted = true,
                }
            }
        });
        if exhausted {
            return Err(exhausted_error(high_water));
        }
        let new_id = root.identity().map(ElementIdentity::from);

        let slot = self.root.element_at_mut(&path).ok_or_else(|| not_found(id))?;
        *slot = root;
        self.high_water = high_water;
        self.reindex()?;

        let new_id = new_id.ok_or_else(|| not_found(id))?;
        log::debug!("replaced sub-tree '{id}' with '{new_id}'");
        Ok(new_id)
    }

    /// A fresh identity that has never been used in this document.
    pub fn generate_identity(&mut self) -> Result<ElementIdentity, DocumentError> {
        self.high_water = self
            .high_water
            .checked_add(1)
            .ok_or_else(|| exhausted_error(self.high_water))?;
        Ok(ElementIdentity::new(format!(
            "{GENERATED_PREFIX}{}",
            self.high_water
        )))
    }

    /// The whole document as XML bytes, with declaration.
    pub fn serialize(&self) -> Vec<u8> {
        writer::write_document(&self.root).into_bytes()
    }

    pub(crate) fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Rebuild the identity index after an in-place edit of the tree.
    pub(crate) fn reindex(&mut self) -> Result<(), DocumentError> {
        self.index = IdentityIndex::build(&self.root, xml_identity)
            .map_err(DocumentError::DuplicateIdentity)?;
        if let Some(max) = self
            .index
            .identities()
            .filter_map(|id| generated_number(id.as_str()))
            .max()
        {
            self.high_water = self.high_water.max(max);
        }
        Ok(())
    }

    fn path_of(&self, id: &str) -> Result<&[usize], DocumentError> {
        self.index.path(id).ok_or_else(|| not_found(id))
    }

    /// Namespaces in scope for the children of the parent of the element at
    /// `path`. Later declarations shadow earlier ones.
    fn parent_scope(&self, path: &[usize]) -> Vec<Namespace> {
        let mut scope: Vec<Namespace> = Vec::new();
        for depth in 0..path.len() {
            if let Some(element) = self.root.element_at(&path[..depth]) {
                for ns in &element.namespaces {
                    scope.retain(|s| s.prefix != ns.prefix);
                    scope.push(ns.clone());
                }
            }
        }
        scope
    }
}

fn not_found(id: &str) -> DocumentError {
    DocumentError::NotFound(ElementIdentity::from(id))
}

fn exhausted_error(high_water: u64) -> DocumentError {
    DocumentError::IdentitiesExhausted(ElementIdentity::new(format!(
        "{GENERATED_PREFIX}{high_water}"
    )))
}

/// `m-17` → 17. Identities of any other shape return `None`.
fn generated_number(id: &str) -> Option<u64> {
    id.strip_prefix(GENERATED_PREFIX)?.parse().ok()
}
