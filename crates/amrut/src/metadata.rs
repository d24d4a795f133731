//! Archive metadata: bounds, layer roster, and QC bookkeeping.
//!
//! `metadata.json` is the single piece of mutable state an archive
//! carries between the export pipeline, the field device, and the QC
//! review. Two invariants are enforced here rather than at call sites:
//!
//! - `layers_qc_completed` is always a subset of `layers`.
//! - `qc_status` is `verified` exactly when every layer has completed
//!   QC and no resurvey entries exist.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AmrutError, Result};

/// QC verdict recorded in the archive. Only one terminal value exists;
/// "in progress" is expressed by the field being absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QcStatus {
    Verified,
}

/// A feature deferred to a future physical re-survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResurveyEntry {
    pub message: String,
    pub layer: String,
    pub coordinate: (f64, f64),
}

/// Geographic extent of the archive's grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    /// Latitude of the extent's midline, used for the longitude
    /// meters-per-degree correction in geographic CRS.
    pub fn mid_latitude(&self) -> f64 {
        (self.north + self.south) / 2.0
    }
}

/// Contents of `metadata.json`.
///
/// Unknown keys written by the export pipeline are preserved round-trip
/// in `extra` so a QC commit never strips them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<String>,

    pub layers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers_qc_completed: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_status: Option<QcStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resurvey: Vec<ResurveyEntry>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ArchiveMetadata {
    /// Parse `metadata.json` content, mirroring the two checks the rest
    /// of the pipeline relies on: valid JSON and a `layers` array.
    pub fn from_json(content: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(content)
            .map_err(|e| AmrutError::MalformedMetadata(e.to_string()))?;

        match value.get("layers") {
            Some(Value::Array(_)) => {}
            _ => {
                return Err(AmrutError::MalformedMetadata(
                    "'layers' array is missing or invalid".to_string(),
                ))
            }
        }

        serde_json::from_value(value).map_err(|e| AmrutError::MalformedMetadata(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            north: self.north,
            south: self.south,
            east: self.east,
            west: self.west,
        }
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l == name)
    }

    /// Layers still awaiting QC, in declaration order.
    pub fn qc_pending_layers(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter(|layer| !self.layers_qc_completed.contains(layer))
            .map(String::as_str)
            .collect()
    }

    pub fn is_fully_verified(&self) -> bool {
        self.qc_status == Some(QcStatus::Verified)
    }

    pub fn is_marked_for_resurvey(&self) -> bool {
        !self.resurvey.is_empty()
    }

    /// Record that a layer finished QC. Idempotent set-insert; unknown
    /// layer names are rejected to keep `layers_qc_completed ⊆ layers`.
    pub fn mark_layer_completed(&mut self, layer: &str) -> Result<()> {
        if !self.has_layer(layer) {
            return Err(AmrutError::MissingLayer(layer.to_string()));
        }
        if !self.layers_qc_completed.iter().any(|l| l == layer) {
            self.layers_qc_completed.push(layer.to_string());
        }
        Ok(())
    }

    /// Re-derive `qc_status`: verified iff every layer completed QC and
    /// nothing is pending resurvey.
    pub fn recompute_qc_status(&mut self) {
        let complete = self
            .layers
            .iter()
            .all(|layer| self.layers_qc_completed.contains(layer));
        self.qc_status = if complete && self.resurvey.is_empty() {
            Some(QcStatus::Verified)
        } else {
            None
        };
    }
}
