//! The review session state machine.
//!
//! A session reconciles one field layer against its authoritative
//! counterpart in three strictly ordered phases — new features, deleted
//! features, geometry changes — then waits for explicit approval before
//! the single irreversible commit. Each phase recomputes its id set on
//! entry, because resolving new-feature duplicates (and the merges they
//! imply) changes which ids count as removed for the later phases. An
//! empty phase advances without prompting.
//!
//! All mutation happens on an in-memory working copy; the archive on
//! disk is untouched until [`ReviewSession::commit`], so abandoning a
//! session at any earlier point is always safe.
//!
//! # Usage
//!
//! ```no_run
//! use amrut::{Archive, AuthoritativeLayer, ReviewSession, ScriptedSource, SessionContext};
//!
//! let mut archive = Archive::open("cell_42.amrut").unwrap();
//! let field = archive.extract_layer("roads").unwrap();
//! let authoritative = AuthoritativeLayer::from_geojson_file("roads", "office/roads.geojson").unwrap();
//!
//! let context = SessionContext::new("roads", archive.metadata().bounds());
//! let mut session = ReviewSession::new(context, authoritative, field);
//!
//! let mut verdicts = ScriptedSource::from_json(r#"{"reject": [17]}"#).unwrap();
//! session.run(&mut verdicts).unwrap();
//! session.commit(&mut archive).unwrap();
//! ```

mod decision;

pub use decision::{
    AcceptAll, DecisionRecord, DecisionSource, DefaultVerdict, RejectAll, ReviewDecision,
    ReviewItem, ReviewPhase, ScriptedSource,
};

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tracing::{debug, info};

use crate::archive::Archive;
use crate::commit::finalize_metadata;
use crate::diff::{classify, removed_ids, DiffConfig};
use crate::error::{AmrutError, Result};
use crate::feature::FeatureId;
use crate::layer::{AuthoritativeLayer, FieldLayer};
use crate::merge::{detect_merge_group, MergeGroup};
use crate::metadata::{Bounds, ResurveyEntry};
use crate::worker::{Backdrop, BackgroundTask};

/// Where a session stands. Transitions are one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    NewFeatures,
    DeletedFeatures,
    GeometryChanges,
    Approve,
    Committed,
}

/// Everything a session needs to know about its surroundings, passed
/// explicitly rather than held in shared state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub layer_name: String,
    pub bounds: Bounds,
    pub diff: DiffConfig,
}

impl SessionContext {
    pub fn new(layer_name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            layer_name: layer_name.into(),
            bounds,
            diff: DiffConfig::default(),
        }
    }

    pub fn with_diff(mut self, diff: DiffConfig) -> Self {
        self.diff = diff;
        self
    }
}

/// A single-layer reconciliation in progress.
#[derive(Debug)]
pub struct ReviewSession {
    context: SessionContext,
    authoritative: AuthoritativeLayer,
    working: FieldLayer,
    state: SessionState,
    /// Ids present in the office copy but physically absent from the
    /// working copy. Feeds merge detection.
    removed: BTreeSet<FeatureId>,
    merge_groups: BTreeMap<FeatureId, MergeGroup>,
    resurvey: Vec<ResurveyEntry>,
    decisions: Vec<DecisionRecord>,
    backdrop_task: Option<BackgroundTask<Backdrop>>,
    backdrop: Option<Backdrop>,
}

impl ReviewSession {
    pub fn new(
        context: SessionContext,
        authoritative: AuthoritativeLayer,
        field: FieldLayer,
    ) -> Self {
        let removed = removed_ids(&authoritative, &field);
        Self {
            context,
            authoritative,
            working: field,
            state: SessionState::Init,
            removed,
            merge_groups: BTreeMap::new(),
            resurvey: Vec::new(),
            decisions: Vec::new(),
            backdrop_task: None,
            backdrop: None,
        }
    }

    /// Attach a backdrop being prepared in the background. The session
    /// waits for it once, just before presenting the first feature.
    pub fn with_backdrop(mut self, task: BackgroundTask<Backdrop>) -> Self {
        self.backdrop_task = Some(task);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The working copy in its current reviewed form.
    pub fn working(&self) -> &FieldLayer {
        &self.working
    }

    pub fn resurvey_ledger(&self) -> &[ResurveyEntry] {
        &self.resurvey
    }

    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    pub fn merge_groups(&self) -> &BTreeMap<FeatureId, MergeGroup> {
        &self.merge_groups
    }

    /// The prepared backdrop, once the worker has delivered it.
    pub fn backdrop(&self) -> Option<&Backdrop> {
        self.backdrop.as_ref()
    }

    /// Walk all three phases, pulling one verdict per presented id from
    /// the decision source, then stop at `Approve`.
    pub fn run(&mut self, source: &mut dyn DecisionSource) -> Result<()> {
        if self.state != SessionState::Init {
            return Err(AmrutError::InvalidState(format!(
                "session already started (state {:?})",
                self.state
            )));
        }

        for phase in [
            ReviewPhase::NewFeatures,
            ReviewPhase::DeletedFeatures,
            ReviewPhase::GeometryChanges,
        ] {
            self.state = phase_state(phase);
            let ids = self.phase_ids(phase)?;
            if ids.is_empty() {
                debug!(phase = phase.label(), "nothing to review, advancing");
                continue;
            }
            for id in ids {
                let item = self.review_item(phase, id);
                if let Some(task) = self.backdrop_task.take() {
                    self.backdrop = Some(task.join()?);
                }
                let decision = source.decide(&item)?;
                self.apply_decision(phase, id, decision)?;
            }
        }

        self.state = SessionState::Approve;
        info!(
            layer = %self.context.layer_name,
            decisions = self.decisions.len(),
            resurvey = self.resurvey.len(),
            "review complete, awaiting approval"
        );
        Ok(())
    }

    /// The explicit confirmation: serialize the working copy, fold QC
    /// bookkeeping into the metadata, and atomically rewrite the
    /// archive. Only valid in `Approve`.
    pub fn commit(&mut self, archive: &mut Archive) -> Result<()> {
        if self.state != SessionState::Approve {
            return Err(AmrutError::InvalidState(format!(
                "commit requires an approved session (state {:?})",
                self.state
            )));
        }
        let unresolved = self.working.duplicated_ids();
        if !unresolved.is_empty() {
            return Err(AmrutError::InvalidState(format!(
                "unresolved duplicate feature ids: {unresolved:?}"
            )));
        }

        let mut metadata = archive.metadata().clone();
        finalize_metadata(&mut metadata, &self.context.layer_name, &self.resurvey)?;
        archive.commit(&self.working, &metadata)?;

        self.state = SessionState::Committed;
        Ok(())
    }

    /// Compute the id set for a phase. Classification runs fresh on
    /// every entry so earlier decisions are reflected.
    fn phase_ids(&mut self, phase: ReviewPhase) -> Result<Vec<FeatureId>> {
        let diff = classify(
            &self.authoritative,
            &self.working,
            &self.context.bounds,
            &self.context.diff,
        )?;
        self.removed = removed_ids(&self.authoritative, &self.working);

        let ids: BTreeSet<FeatureId> = match phase {
            ReviewPhase::NewFeatures => {
                // Duplicate captures of an existing id are resolved
                // here too, alongside genuinely new ids.
                let duplicated = self.working.duplicated_ids();
                diff.new.union(&duplicated).copied().collect()
            }
            ReviewPhase::DeletedFeatures => diff.deleted_flagged,
            ReviewPhase::GeometryChanges => diff.geometry_changed,
        };
        Ok(ids.into_iter().collect())
    }

    fn review_item(&self, phase: ReviewPhase, id: FeatureId) -> ReviewItem {
        ReviewItem {
            phase,
            layer: self.context.layer_name.clone(),
            id,
            authoritative: self.authoritative.get(id).cloned(),
            field: self
                .working
                .features_with_id(id)
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    fn apply_decision(
        &mut self,
        phase: ReviewPhase,
        id: FeatureId,
        decision: ReviewDecision,
    ) -> Result<()> {
        match &decision {
            ReviewDecision::Accept => match phase {
                ReviewPhase::NewFeatures => self.accept_new(id),
                // The device may have collapsed duplicate captures
                // before export, so a merged shape can arrive under an
                // existing id with no duplicate left: it shows up as a
                // plain geometry change and still needs the absorption
                // check. Accepted deletions simply keep their flag.
                ReviewPhase::GeometryChanges => self.detect_absorption(id),
                ReviewPhase::DeletedFeatures => {}
            },
            ReviewDecision::Reject => self.reject(id),
            ReviewDecision::Resurvey(reason) => self.record_resurvey(id, reason)?,
        }
        self.decisions.push(DecisionRecord {
            phase,
            id,
            decision,
            decided_at: Utc::now(),
        });
        Ok(())
    }

    /// Accept in the new-feature phase: resolve duplicates so exactly
    /// one feature keeps the id, then check whether the survivor's
    /// geometry absorbed features the device dropped.
    fn accept_new(&mut self, id: FeatureId) {
        if self.working.duplicated_ids().contains(&id) {
            // Fresh ids must also clear the authoritative layer, or a
            // renumbered capture would shadow an office feature.
            let next = self.working.max_id().max(self.authoritative.max_id()) + 1;
            let fresh = self.working.renumber_duplicates(id, next);
            debug!(id, renumbered = fresh.len(), "resolved duplicate captures");
        }
        self.detect_absorption(id);
    }

    /// Record a merge group when the accepted feature's geometry
    /// absorbed features physically absent from the field copy.
    fn detect_absorption(&mut self, id: FeatureId) {
        let Some(survivor) = self.working.first_with_id(id) else {
            return;
        };
        if let Some(group) = detect_merge_group(survivor, &self.removed, &self.authoritative) {
            info!(
                survivor = id,
                absorbed = group.absorbed.len(),
                "surveyed geometry absorbed dropped features"
            );
            self.merge_groups.insert(id, group);
        }
    }

    /// Reject: restore the office original in place. Rejecting a merge
    /// survivor also restores every feature it had absorbed.
    fn reject(&mut self, id: FeatureId) {
        if let Some(group) = self.merge_groups.remove(&id) {
            for absorbed in &group.absorbed {
                if let Some(original) = self.authoritative.get(*absorbed) {
                    self.working.replace_with(original.clone());
                    self.removed.remove(absorbed);
                }
            }
        }
        match self.authoritative.get(id) {
            Some(original) => self.working.replace_with(original.clone()),
            // No original exists: the capture is discarded outright.
            None => {
                self.working.remove_all(id);
            }
        }
    }

    /// Resurvey: note the spot for the field team and leave the working
    /// copy alone.
    fn record_resurvey(&mut self, id: FeatureId, reason: &str) -> Result<()> {
        let Some(feature) = self.working.first_with_id(id) else {
            return Err(AmrutError::InvalidState(format!(
                "no field feature {id} to mark for resurvey"
            )));
        };
        let coordinate = feature.centroid()?;
        self.resurvey.push(ResurveyEntry {
            message: reason.to_string(),
            layer: self.context.layer_name.clone(),
            coordinate,
        });
        Ok(())
    }
}

fn phase_state(phase: ReviewPhase) -> SessionState {
    match phase {
        ReviewPhase::NewFeatures => SessionState::NewFeatures,
        ReviewPhase::DeletedFeatures => SessionState::DeletedFeatures,
        ReviewPhase::GeometryChanges => SessionState::GeometryChanges,
    }
}
