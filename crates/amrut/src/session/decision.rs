//! Review decisions and the sources that produce them.
//!
//! The session is agnostic to where verdicts come from: a dialog
//! callback and a scripted harness drive the same state machine through
//! the [`DecisionSource`] trait.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::feature::{Feature, FeatureId};

/// The three review phases, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewPhase {
    NewFeatures,
    DeletedFeatures,
    GeometryChanges,
}

impl ReviewPhase {
    /// Human-readable phase label.
    pub fn label(&self) -> &'static str {
        match self {
            ReviewPhase::NewFeatures => "new features",
            ReviewPhase::DeletedFeatures => "deleted features",
            ReviewPhase::GeometryChanges => "geometry changes",
        }
    }
}

/// Verdict on a single presented feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Keep the surveyed version.
    Accept,
    /// Discard the surveyed version and restore the office original.
    Reject,
    /// Defer to a physical re-survey, with a reason for the field team.
    Resurvey(String),
}

/// One decision point: the office original (if any) and every field
/// capture sharing the id, cloned so the source can hold them freely.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub phase: ReviewPhase,
    pub layer: String,
    pub id: FeatureId,
    pub authoritative: Option<Feature>,
    pub field: Vec<Feature>,
}

/// Supplier of verdicts, one per presented item.
pub trait DecisionSource {
    fn decide(&mut self, item: &ReviewItem) -> Result<ReviewDecision>;
}

/// Accepts every surveyed change.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl DecisionSource for AcceptAll {
    fn decide(&mut self, _item: &ReviewItem) -> Result<ReviewDecision> {
        Ok(ReviewDecision::Accept)
    }
}

/// Rejects every surveyed change, keeping the office data.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl DecisionSource for RejectAll {
    fn decide(&mut self, _item: &ReviewItem) -> Result<ReviewDecision> {
        Ok(ReviewDecision::Reject)
    }
}

/// Fallback verdict for ids a script does not mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultVerdict {
    #[default]
    Accept,
    Reject,
}

/// Verdicts scripted as JSON, for batch runs and test harnesses:
///
/// ```json
/// { "accept": [3, 7], "reject": [4], "resurvey": {"9": "gate locked"},
///   "default": "reject" }
/// ```
///
/// Resurvey entries take precedence over the accept/reject lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptedSource {
    #[serde(default)]
    accept: Vec<FeatureId>,
    #[serde(default)]
    reject: Vec<FeatureId>,
    #[serde(default)]
    resurvey: HashMap<FeatureId, String>,
    #[serde(default)]
    default: DefaultVerdict,
}

impl ScriptedSource {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

impl DecisionSource for ScriptedSource {
    fn decide(&mut self, item: &ReviewItem) -> Result<ReviewDecision> {
        if let Some(reason) = self.resurvey.get(&item.id) {
            return Ok(ReviewDecision::Resurvey(reason.clone()));
        }
        if self.accept.contains(&item.id) {
            return Ok(ReviewDecision::Accept);
        }
        if self.reject.contains(&item.id) {
            return Ok(ReviewDecision::Reject);
        }
        Ok(match self.default {
            DefaultVerdict::Accept => ReviewDecision::Accept,
            DefaultVerdict::Reject => ReviewDecision::Reject,
        })
    }
}

/// An applied verdict, kept for the session audit trail.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub phase: ReviewPhase,
    pub id: FeatureId,
    pub decision: ReviewDecision,
    pub decided_at: DateTime<Utc>,
}
