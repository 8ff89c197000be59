//! Elimination state: which identities of the open measure the user wants
//! removed.
//!
//! Membership only changes a whole [`SelectionUnit`] at a time. A toggle
//! decides its direction from the unit's aggregate state before touching
//! any member, then applies it to all of them.

use std::collections::BTreeSet;

use crate::model::{ElementIdentity, SelectionUnit, ToggleState, UnitState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EliminationTracker {
    excluded: BTreeSet<ElementIdentity>,
}

impl EliminationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; called when a measure is opened.
    pub fn reset(&mut self) {
        self.excluded.clear();
    }

    pub fn unit_state(&self, unit: &SelectionUnit) -> UnitState {
        let excluded = unit
            .members
            .iter()
            .filter(|id| self.excluded.contains(*id))
            .count();
        if excluded == 0 {
            UnitState::Included
        } else if excluded == unit.members.len() {
            UnitState::Excluded
        } else {
            UnitState::Partial
        }
    }

    /// Flip the unit. A partially excluded unit counts as included, so the
    /// first toggle always excludes every member.
    pub fn toggle_unit(&mut self, unit: &SelectionUnit) -> ToggleState {
        match self.unit_state(unit) {
            UnitState::Excluded => {
                for id in &unit.members {
                    self.excluded.remove(id);
                }
                ToggleState::Included
            }
            UnitState::Included | UnitState::Partial => {
                self.excluded.extend(unit.members.iter().cloned());
                ToggleState::Excluded
            }
        }
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.excluded.contains(id)
    }

    /// The current elimination set.
    pub fn snapshot(&self) -> BTreeSet<ElementIdentity> {
        self.excluded.clone()
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}
