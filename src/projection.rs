//! Rendered projection of a measure and the rendering capability that
//! produces it.
//!
//! Rendering itself happens outside this crate. A renderer hands back markup
//! (SVG in practice) whose elements carry the same identity strings as the
//! structured tree; [`Projection`] keeps that markup as an element tree so
//! it can be addressed by identity and reordered.

use crate::document::{self, Element, Subtree};
use crate::error::{ParseError, RenderError};
use crate::identity::IdentityIndex;
use crate::model::ElementIdentity;

/// The rendering engine, consumed as a capability.
pub trait Renderer {
    /// Render document source to a visual fragment addressable by identity.
    fn render_document(&self, source: &[u8]) -> Result<Projection, RenderError>;

    /// Render document source to audio bytes.
    fn render_to_audio(&self, source: &[u8]) -> Result<Vec<u8>, RenderError>;
}

/// Identity of a visual element: SVG `id`, falling back to `xml:id`.
fn visual_identity(element: &Element) -> Option<&str> {
    element.attribute("id").or_else(|| element.identity())
}

/// A visual fragment addressable by element identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    root: Element,
    index: IdentityIndex,
}

impl Projection {
    /// Read renderer output.
    pub fn parse(markup: &str) -> Result<Self, ParseError> {
        let root = document::parse_fragment(markup)?;
        Self::from_root(root)
    }

    pub fn from_root(root: Element) -> Result<Self, ParseError> {
        let index =
            IdentityIndex::build(&root, visual_identity).map_err(ParseError::DuplicateIdentity)?;
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.root.element_at(self.index.path(id)?)
    }

    /// Identities of addressable elements in paint order (front-to-back
    /// scan order, the last one painted on top).
    pub fn identities(&self) -> Vec<String> {
        self.root
            .descendants()
            .into_iter()
            .filter_map(|e| visual_identity(e).map(String::from))
            .collect()
    }

    /// Value of `attribute` on the element drawn for `id`.
    pub fn attribute_of(&self, id: &str, attribute: &str) -> Option<&str> {
        self.element(id)?.attribute(attribute)
    }

    pub fn to_markup(&self) -> String {
        Subtree::new(self.root.clone()).to_xml_string()
    }

    pub(crate) fn identity_of(element: &Element) -> Option<&str> {
        visual_identity(element)
    }
}

/// A measure opened for resolution, ready to hand to a [`Renderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableMeasure {
    pub measure: ElementIdentity,
    pub subtree: Subtree,
}

impl RenderableMeasure {
    /// Serialized measure source for the renderer.
    pub fn source(&self) -> Vec<u8> {
        self.subtree.serialize()
    }

    pub fn render<R: Renderer>(&self, renderer: &R) -> Result<Projection, RenderError> {
        renderer.render_document(&self.source())
    }

    /// Audio preview of the measure as it currently stands.
    pub fn render_audio<R: Renderer>(&self, renderer: &R) -> Result<Vec<u8>, RenderError> {
        renderer.render_to_audio(&self.source())
    }
}
