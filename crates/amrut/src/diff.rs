//! Difference classification between an authoritative layer and a
//! field layer.
//!
//! The classifier partitions feature ids into the three review sets —
//! new, soft-deleted, geometry-changed — that the review session walks
//! in order. Ids present in the office copy but physically absent from
//! the field copy are reported separately (`removed_ids`); they feed
//! merge detection and are never shown as a phase of their own.

use std::collections::BTreeSet;

use geo::{BoundingRect, Geometry, Point};
use tracing::debug;

use crate::error::{AmrutError, Result};
use crate::feature::FeatureId;
use crate::layer::{AuthoritativeLayer, FieldLayer};
use crate::metadata::Bounds;

/// Approximate meters per degree of latitude.
const METERS_PER_DEGREE_LAT: f64 = 110_540.0;
/// Approximate meters per degree of longitude at the equator.
const METERS_PER_DEGREE_LON: f64 = 111_320.0;

/// How coordinates are to be interpreted when applying thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrsKind {
    /// Degrees; thresholds are meters, corrected for latitude.
    /// GeoJSON layers are geographic by convention.
    #[default]
    Geographic,
    /// Planar map units; thresholds apply directly.
    Projected,
}

/// Thresholds for type-dependent geometry comparison.
#[derive(Debug, Clone, Copy)]
pub struct DiffConfig {
    pub crs: CrsKind,
    /// Maximum point displacement (map units / meters) treated as noise.
    pub point_threshold: f64,
    /// Inward buffer on the archive extent; line/polygon changes whose
    /// bounding box leaves the buffered extent are clipping artifacts
    /// from the partition edge, not survey edits.
    pub edge_buffer: f64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            crs: CrsKind::Geographic,
            point_threshold: 1.0,
            edge_buffer: 10.0,
        }
    }
}

/// Feature ids partitioned by kind of difference. The three sets are
/// mutually exclusive by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DifferenceSet {
    /// Ids in the field layer with no authoritative counterpart.
    pub new: BTreeSet<FeatureId>,
    /// Ids the field device soft-deleted.
    pub deleted_flagged: BTreeSet<FeatureId>,
    /// Ids whose surveyed geometry moved past the type threshold.
    pub geometry_changed: BTreeSet<FeatureId>,
}

impl DifferenceSet {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted_flagged.is_empty() && self.geometry_changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new.len() + self.deleted_flagged.len() + self.geometry_changed.len()
    }
}

/// Classify the differences between the two layers.
///
/// Ids duplicated in the field layer are left to the new-feature review
/// (where duplicate resolution and merge detection live) and excluded
/// from the other two sets.
pub fn classify(
    authoritative: &AuthoritativeLayer,
    field: &FieldLayer,
    bounds: &Bounds,
    config: &DiffConfig,
) -> Result<DifferenceSet> {
    let authoritative_ids = authoritative.ids();
    let field_ids = field.ids();
    let duplicated = field.duplicated_ids();

    let new: BTreeSet<FeatureId> = field_ids
        .difference(&authoritative_ids)
        .copied()
        .collect();

    let mut deleted_flagged = BTreeSet::new();
    let mut geometry_changed = BTreeSet::new();

    for &id in field_ids.intersection(&authoritative_ids) {
        if duplicated.contains(&id) {
            continue;
        }
        let Some(field_feature) = field.first_with_id(id) else {
            continue;
        };
        if field_feature.is_delete_flagged() {
            deleted_flagged.insert(id);
            continue;
        }
        let Some(original) = authoritative.get(id) else {
            continue;
        };
        if geometry_differs(&original.geometry, &field_feature.geometry, bounds, config)? {
            geometry_changed.insert(id);
        }
    }

    let diff = DifferenceSet {
        new,
        deleted_flagged,
        geometry_changed,
    };
    debug!(
        new = diff.new.len(),
        deleted = diff.deleted_flagged.len(),
        changed = diff.geometry_changed.len(),
        "classified layer differences"
    );
    Ok(diff)
}

/// Ids present in the authoritative layer but absent from the field
/// layer. Tracked for merge detection, not reviewed directly.
pub fn removed_ids(authoritative: &AuthoritativeLayer, field: &FieldLayer) -> BTreeSet<FeatureId> {
    let field_ids = field.ids();
    authoritative
        .ids()
        .difference(&field_ids)
        .copied()
        .collect()
}

/// Type-dependent geometry comparison.
///
/// Points differ when displaced beyond the point threshold. Everything
/// else differs when not exactly equal and lying fully inside the
/// inward-buffered archive extent.
pub fn geometry_differs(
    original: &Geometry<f64>,
    surveyed: &Geometry<f64>,
    bounds: &Bounds,
    config: &DiffConfig,
) -> Result<bool> {
    if let (Geometry::Point(a), Geometry::Point(b)) = (original, surveyed) {
        return Ok(displacement(*a, *b, config) > config.point_threshold);
    }

    if original == surveyed {
        return Ok(false);
    }
    within_buffered_extent(surveyed, bounds, config)
}

/// Displacement between two positions, in threshold units: planar
/// distance for projected CRS, approximate meters for geographic.
fn displacement(a: Point<f64>, b: Point<f64>, config: &DiffConfig) -> f64 {
    match config.crs {
        CrsKind::Projected => (b.x() - a.x()).hypot(b.y() - a.y()),
        CrsKind::Geographic => {
            let mid_latitude = ((a.y() + b.y()) / 2.0).to_radians();
            let dx = (b.x() - a.x()) * METERS_PER_DEGREE_LON * mid_latitude.cos();
            let dy = (b.y() - a.y()) * METERS_PER_DEGREE_LAT;
            dx.hypot(dy)
        }
    }
}

/// Whether the geometry's bounding box lies entirely inside the archive
/// extent shrunk inward by the edge buffer.
fn within_buffered_extent(
    geometry: &Geometry<f64>,
    bounds: &Bounds,
    config: &DiffConfig,
) -> Result<bool> {
    let rect = geometry
        .bounding_rect()
        .ok_or_else(|| AmrutError::GeometryError("empty geometry in comparison".to_string()))?;

    let (buffer_x, buffer_y) = match config.crs {
        CrsKind::Projected => (config.edge_buffer, config.edge_buffer),
        CrsKind::Geographic => {
            let latitude = bounds.mid_latitude().to_radians();
            (
                config.edge_buffer / (METERS_PER_DEGREE_LON * latitude.cos()),
                config.edge_buffer / METERS_PER_DEGREE_LAT,
            )
        }
    };

    Ok(rect.min().x >= bounds.west + buffer_x
        && rect.max().x <= bounds.east - buffer_x
        && rect.min().y >= bounds.south + buffer_y
        && rect.max().y <= bounds.north - buffer_y)
}
