//! Shared value types for the resolution engine.
//!
//! These structures are the vocabulary every other module speaks: element
//! identities, selection units, toggle results and the session state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Subtree;

/// Opaque token addressing one element of the structured tree, and the
/// same conceptual element in its rendered projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementIdentity(String);

impl ElementIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ElementIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ElementIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ElementIdentity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The minimal set of identities that must be included or excluded together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionUnit {
    /// The group element (chord/beam) or the clicked element itself
    pub anchor: ElementIdentity,
    /// Every member identity in document order, the anchor first
    pub members: Vec<ElementIdentity>,
    /// Whether the anchor is an enclosing group rather than the clicked element
    pub grouped: bool,
}

impl SelectionUnit {
    /// A unit consisting of a single ungrouped element.
    pub fn single(id: ElementIdentity) -> Self {
        Self {
            anchor: id.clone(),
            members: vec![id],
            grouped: false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|m| m.as_str() == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Aggregate membership of a unit in the elimination set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitState {
    Included,
    Excluded,
    Partial,
}

/// The state a unit ends up in after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToggleState {
    Included,
    Excluded,
}

/// Where a resolution session currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Open { measure: ElementIdentity },
    Submitting { measure: ElementIdentity },
}

impl SessionState {
    /// The measure this state is scoped to, if any.
    pub fn measure(&self) -> Option<&ElementIdentity> {
        match self {
            SessionState::Idle => None,
            SessionState::Open { measure } | SessionState::Submitting { measure } => Some(measure),
        }
    }
}

/// Result of one merge attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// The measure was merged into a single layer and spliced into the document.
    Resolved(Subtree),
    /// The measure still has competing layers. Carries the service's
    /// partially merged measure for re-display when it sent one back.
    StillConflicting(Option<Subtree>),
}

impl ResolutionOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }
}
