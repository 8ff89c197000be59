//! Resolution session: opens one measure at a time, tracks what the user
//! eliminates from it, and reconciles it through the merge service.
//!
//! ```text
//!   Idle ──open──▶ Open(m) ──begin_submit──▶ Submitting(m)
//!                   ▲  │                         │
//!                   │  └──toggle                 ├─ resolved ──────▶ Idle (document updated)
//!                   └─────────────────────────────┴─ still conflicting / error ─▶ Open(m)
//!   any state ──cancel──▶ Idle
//! ```
//!
//! The session owns the document. The merge round trip is the only
//! suspension point; while it is outstanding every edit is refused with
//! [`ResolveError::SessionBusy`].

use std::collections::BTreeSet;

use crate::config::ResolveConfig;
use crate::document::{Document, Element, Subtree};
use crate::elimination::EliminationTracker;
use crate::error::{MergeServiceError, ResolveError};
use crate::grouping::GroupingResolver;
use crate::identity::IdentityBinding;
use crate::layers::reorder_layers;
use crate::merge::{MergeRequest, MergeResponse, MergeService};
use crate::model::{ElementIdentity, ResolutionOutcome, SelectionUnit, SessionState, ToggleState};
use crate::projection::{Projection, RenderableMeasure};

/// The measure currently being resolved.
#[derive(Debug, Clone)]
struct OpenMeasure {
    id: ElementIdentity,
    subtree: Subtree,
    binding: Option<IdentityBinding>,
}

pub struct ResolutionSession<M> {
    document: Document,
    config: ResolveConfig,
    grouping: GroupingResolver,
    tracker: EliminationTracker,
    merge: M,
    state: SessionState,
    open: Option<OpenMeasure>,
}

impl<M: MergeService> ResolutionSession<M> {
    pub fn new(document: Document, merge: M) -> Self {
        Self::with_config(document, ResolveConfig::default(), merge)
    }

    pub fn with_config(document: Document, config: ResolveConfig, merge: M) -> Self {
        Self {
            grouping: GroupingResolver::new(&config),
            document,
            config,
            tracker: EliminationTracker::new(),
            merge,
            state: SessionState::Idle,
            open: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn merge_service(&self) -> &M {
        &self.merge
    }

    /// The working copy of the open measure.
    pub fn open_measure(&self) -> Option<&Subtree> {
        self.open.as_ref().map(|m| &m.subtree)
    }

    pub fn binding(&self) -> Option<&IdentityBinding> {
        self.open.as_ref().and_then(|m| m.binding.as_ref())
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.tracker.is_excluded(id)
    }

    /// The current elimination set.
    pub fn snapshot(&self) -> BTreeSet<ElementIdentity> {
        self.tracker.snapshot()
    }

    // ─── Opening and editing ─────────────────────────────────────────

    /// Open `measure_id` for resolution. Any previously open measure is
    /// discarded along with its elimination state.
    pub fn open(&mut self, measure_id: &str) -> Result<RenderableMeasure, ResolveError> {
        self.ensure_not_busy()?;

        let element = self.document.find_by_identity(measure_id)?;
        if element.kind() != self.config.measure_kind {
            return Err(ResolveError::NotAMeasure {
                id: ElementIdentity::from(measure_id),
                kind: element.kind().to_string(),
            });
        }
        let subtree = self.document.extract_subtree(measure_id)?;
        let id = ElementIdentity::from(measure_id);

        self.tracker.reset();
        self.open = Some(OpenMeasure {
            id: id.clone(),
            subtree: subtree.clone(),
            binding: None,
        });
        self.state = SessionState::Open {
            measure: id.clone(),
        };
        log::debug!("opened measure '{id}' for resolution");

        Ok(RenderableMeasure {
            measure: id,
            subtree,
        })
    }

    /// Attach the projection rendered for the open measure. Returns it with
    /// candidate layers restacked for display.
    pub fn bind_projection(&mut self, projection: Projection) -> Result<Projection, ResolveError> {
        self.ensure_not_busy()?;
        let layer_attribute = self.config.layer_attribute.clone();
        let open = self.open.as_mut().ok_or(ResolveError::NoOpenMeasure)?;
        open.binding = Some(IdentityBinding::bind(&open.subtree, &projection));
        Ok(reorder_layers(projection, &layer_attribute))
    }

    /// The unit a click on `clicked` would toggle.
    pub fn selection_unit(&self, clicked: &str) -> Result<SelectionUnit, ResolveError> {
        let open = self.open.as_ref().ok_or(ResolveError::NoOpenMeasure)?;
        let id = match &open.binding {
            Some(binding) => binding.document_identity(clicked)?.clone(),
            None => ElementIdentity::from(clicked),
        };
        self.grouping.resolve_in(open.subtree.root(), id.as_str())
    }

    /// Toggle the selection unit containing `clicked` (a visual identity
    /// when a projection is bound).
    pub fn toggle(&mut self, clicked: &str) -> Result<ToggleState, ResolveError> {
        self.ensure_not_busy()?;
        let unit = self.selection_unit(clicked)?;
        let state = self.tracker.toggle_unit(&unit);
        log::debug!("toggled '{}' ({} members) -> {state:?}", unit.anchor, unit.len());
        Ok(state)
    }

    // ─── Submitting ──────────────────────────────────────────────────

    /// Merge the open measure through the merge service.
    ///
    /// Dropping the returned future before it completes (a timeout, a lost
    /// `select!` branch) aborts the submission and leaves the measure open.
    pub async fn submit(&mut self) -> Result<ResolutionOutcome, ResolveError> {
        let request = self.begin_submit()?;
        let mut pending = PendingSubmit {
            session: self,
            armed: true,
        };
        let response = pending.session.merge.merge(&request).await;
        pending.armed = false;
        pending.session.finish_submit(response)
    }

    /// Build the merge request and enter `Submitting`.
    ///
    /// Eliminated elements are flagged invisible rather than removed, so
    /// identities stay valid if the measure comes back still conflicting.
    pub fn begin_submit(&mut self) -> Result<MergeRequest, ResolveError> {
        self.ensure_not_busy()?;
        let open = self.open.as_ref().ok_or(ResolveError::NoOpenMeasure)?;

        let mut flagged = open.subtree.clone();
        let mut missing = None;
        for id in self.tracker.snapshot() {
            match flagged.find_mut(id.as_str()) {
                Some(element) => element.set_attribute(&self.config.visibility_attribute, "false"),
                None => {
                    missing = Some(id);
                    break;
                }
            }
        }
        if let Some(id) = missing {
            let measure = open.id.clone();
            self.abort_to_idle();
            return Err(ResolveError::Invariant(format!(
                "eliminated '{id}' is not part of measure '{measure}'"
            )));
        }

        let request = MergeRequest::from_subtree(&flagged);
        self.state = SessionState::Submitting {
            measure: open.id.clone(),
        };
        log::info!(
            "submitting measure '{}' with {} eliminated elements",
            open.id,
            self.tracker.len()
        );
        Ok(request)
    }

    /// Interpret the merge service's answer and leave `Submitting`.
    pub fn finish_submit(
        &mut self,
        response: Result<MergeResponse, MergeServiceError>,
    ) -> Result<ResolutionOutcome, ResolveError> {
        let measure = match &self.state {
            SessionState::Submitting { measure } => measure.clone(),
            // Cancelled while the request was in flight
            _ => return Err(ResolveError::NoOpenMeasure),
        };

        let reply = match response.and_then(MergeResponse::into_reply) {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("merge of measure '{measure}' failed: {err}");
                self.state = SessionState::Open { measure };
                return Err(ResolveError::MergeService(err));
            }
        };

        if !reply.resolved {
            log::info!("measure '{measure}' still has conflicting layers");
            self.state = SessionState::Open { measure };
            return Ok(ResolutionOutcome::StillConflicting(reply.measure));
        }

        let mut resolved = match reply.measure {
            Some(resolved) => resolved,
            None => {
                self.state = SessionState::Open { measure };
                return Err(ResolveError::MergeService(MergeServiceError::Protocol(
                    "resolved reply carries no measure".to_string(),
                )));
            }
        };
        strip_candidate_marks(resolved.root_mut(), &self.config.candidate_attributes);

        let new_id = match self.document.replace_subtree(measure.as_str(), resolved) {
            Ok(new_id) => new_id,
            Err(err) => {
                log::warn!("could not splice resolved measure '{measure}': {err}");
                self.state = SessionState::Open { measure };
                return Err(err.into());
            }
        };
        let spliced = self.document.extract_subtree(new_id.as_str())?;

        self.tracker.reset();
        self.open = None;
        self.state = SessionState::Idle;
        log::info!("measure '{measure}' resolved as '{new_id}'");
        Ok(ResolutionOutcome::Resolved(spliced))
    }

    /// Give up on an outstanding submission. The document is untouched and
    /// the measure stays open with its elimination set.
    pub fn abort_submit(&mut self) -> bool {
        match &self.state {
            SessionState::Submitting { measure } => {
                log::debug!("aborted submission of measure '{measure}'");
                self.state = SessionState::Open {
                    measure: measure.clone(),
                };
                true
            }
            _ => false,
        }
    }

    /// Close the open measure, discarding its elimination state.
    pub fn cancel(&mut self) {
        if let Some(measure) = self.state.measure() {
            log::debug!("cancelled resolution of measure '{measure}'");
        }
        self.abort_to_idle();
    }

    fn abort_to_idle(&mut self) {
        self.tracker.reset();
        self.open = None;
        self.state = SessionState::Idle;
    }

    fn ensure_not_busy(&self) -> Result<(), ResolveError> {
        match &self.state {
            SessionState::Submitting { measure } => Err(ResolveError::SessionBusy(measure.clone())),
            _ => Ok(()),
        }
    }
}

/// Rolls an unfinished `submit` back to `Open` when dropped.
struct PendingSubmit<'a, M: MergeService> {
    session: &'a mut ResolutionSession<M>,
    armed: bool,
}

impl<M: MergeService> Drop for PendingSubmit<'_, M> {
    fn drop(&mut self) {
        if self.armed && self.session.abort_submit() {
            log::warn!("merge request dropped before it completed");
        }
    }
}

/// Remove per-candidate marking (colors etc.) left on resolved material.
fn strip_candidate_marks(root: &mut Element, attributes: &[String]) {
    root.walk_mut(&mut |e: &mut Element| {
        for attr in attributes {
            e.remove_attribute(attr);
        }
    });
}
