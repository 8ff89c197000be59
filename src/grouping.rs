//! Grouping resolver: decides which identities toggle together.
//!
//! A note inside a chord or beam is one part of a single musical decision:
//! clicking it selects the whole group. Stems are drawn for notes but are
//! never eliminated on their own, so they stay out of every unit.

use crate::config::ResolveConfig;
use crate::document::{Document, Element};
use crate::error::ResolveError;
use crate::identity;
use crate::model::{ElementIdentity, SelectionUnit};

#[derive(Debug, Clone)]
pub struct GroupingResolver {
    group_kinds: Vec<String>,
    stem_kinds: Vec<String>,
}

impl GroupingResolver {
    pub fn new(config: &ResolveConfig) -> Self {
        Self {
            group_kinds: config.group_kinds.clone(),
            stem_kinds: config.stem_kinds.clone(),
        }
    }

    /// Selection unit for `clicked` anywhere in `doc`.
    pub fn resolve_selection_unit(
        &self,
        doc: &Document,
        clicked: &str,
    ) -> Result<SelectionUnit, ResolveError> {
        self.resolve_in(doc.root(), clicked)
    }

    /// Selection unit for `clicked` within the tree rooted at `scope`
    /// (typically the open measure).
    ///
    /// The outermost enclosing group inside `scope` wins, so a chord inside
    /// a beam selects the beam and units never overlap. This differs from
    /// a nearest-group walk, which would stop at the chord.
    pub fn resolve_in(&self, scope: &Element, clicked: &str) -> Result<SelectionUnit, ResolveError> {
        let path = identity::find_path(scope, clicked, Element::identity)
            .ok_or_else(|| ResolveError::NotFound(ElementIdentity::from(clicked)))?;

        // Root first, clicked element last
        let chain: Vec<&Element> = (0..=path.len())
            .filter_map(|depth| scope.element_at(&path[..depth]))
            .collect();

        if chain.iter().any(|e| self.is_stem(e)) {
            return Err(ResolveError::NotEliminable(ElementIdentity::from(clicked)));
        }

        let group = chain.iter().find_map(|e| {
            if self.is_group(e) {
                e.identity().map(|id| (*e, ElementIdentity::from(id)))
            } else {
                None
            }
        });

        match group {
            Some((group, anchor)) => {
                let mut members = Vec::new();
                self.collect_members(group, &mut members);
                log::debug!("'{clicked}' selects <{}> '{anchor}' ({} members)", group.kind(), members.len());
                Ok(SelectionUnit {
                    anchor,
                    members,
                    grouped: true,
                })
            }
            None => Ok(SelectionUnit::single(ElementIdentity::from(clicked))),
        }
    }

    fn collect_members(&self, element: &Element, out: &mut Vec<ElementIdentity>) {
        if self.is_stem(element) {
            return;
        }
        if let Some(id) = element.identity() {
            out.push(ElementIdentity::from(id));
        }
        for child in element.child_elements() {
            self.collect_members(child, out);
        }
    }

    fn is_group(&self, element: &Element) -> bool {
        self.group_kinds.iter().any(|k| k == element.kind())
    }

    fn is_stem(&self, element: &Element) -> bool {
        self.stem_kinds.iter().any(|k| k == element.kind())
    }
}
