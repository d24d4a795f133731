//! Merge detection for accepted replacement features.
//!
//! Surveyors sometimes redraw several adjacent features as one — two
//! hut footprints that turn out to be a single building, or a road
//! split at an old junction that no longer exists. The device exports
//! the combined shape under one surviving id and drops the rest. When
//! the reviewer accepts such a survivor, the dropped originals it
//! spatially covers are retired with it instead of lingering as
//! phantom removals.

use std::collections::BTreeSet;

use geo::{Intersects, Relate};

use crate::feature::{Feature, FeatureId};
use crate::layer::AuthoritativeLayer;

/// A survivor feature together with the authoritative ids it absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    pub survivor: FeatureId,
    pub absorbed: BTreeSet<FeatureId>,
}

/// Find which of the `removed` authoritative features the survivor's
/// geometry absorbs.
///
/// A removed feature is absorbed when the survivor intersects it and
/// nothing of the original lies outside the survivor, i.e. the redrawn
/// shape covers it. Returns `None` when nothing is absorbed.
pub fn detect_merge_group(
    survivor: &Feature,
    removed: &BTreeSet<FeatureId>,
    authoritative: &AuthoritativeLayer,
) -> Option<MergeGroup> {
    let mut absorbed = BTreeSet::new();
    for &id in removed {
        let Some(original) = authoritative.get(id) else {
            continue;
        };
        if survivor.geometry.intersects(&original.geometry)
            && survivor.geometry.relate(&original.geometry).is_covers()
        {
            absorbed.insert(id);
        }
    }

    if absorbed.is_empty() {
        None
    } else {
        Some(MergeGroup {
            survivor: survivor.id,
            absorbed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, Geometry};

    fn point_feature(id: FeatureId, x: f64, y: f64) -> Feature {
        Feature::new(id, Geometry::Point(point! { x: x, y: y }))
    }

    #[test]
    fn test_line_absorbing_dropped_endpoint() {
        // Two surveyed posts replaced by one fence line drawn through
        // both; the line keeps the first post's id.
        let authoritative = AuthoritativeLayer::from_features(
            "fences",
            vec![point_feature(1, 0.0, 0.0), point_feature(2, 1.0, 0.0)],
        )
        .unwrap();
        let removed = BTreeSet::from([2]);

        let survivor = Feature::new(
            1,
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
        );

        let group = detect_merge_group(&survivor, &removed, &authoritative).unwrap();
        assert_eq!(group.survivor, 1);
        assert_eq!(group.absorbed, BTreeSet::from([2]));
    }

    #[test]
    fn test_disjoint_removed_feature_is_not_absorbed() {
        let authoritative = AuthoritativeLayer::from_features(
            "fences",
            vec![point_feature(1, 0.0, 0.0), point_feature(2, 50.0, 50.0)],
        )
        .unwrap();
        let removed = BTreeSet::from([2]);

        let survivor = Feature::new(
            1,
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
        );

        assert!(detect_merge_group(&survivor, &removed, &authoritative).is_none());
    }

    #[test]
    fn test_polygon_absorbing_covered_footprints() {
        let authoritative = AuthoritativeLayer::from_features(
            "buildings",
            vec![
                Feature::new(
                    10,
                    Geometry::Polygon(polygon![
                        (x: 0.0, y: 0.0), (x: 1.0, y: 0.0),
                        (x: 1.0, y: 1.0), (x: 0.0, y: 1.0),
                    ]),
                ),
                Feature::new(
                    11,
                    Geometry::Polygon(polygon![
                        (x: 1.0, y: 0.0), (x: 2.0, y: 0.0),
                        (x: 2.0, y: 1.0), (x: 1.0, y: 1.0),
                    ]),
                ),
                Feature::new(
                    12,
                    Geometry::Polygon(polygon![
                        (x: 8.0, y: 8.0), (x: 9.0, y: 8.0),
                        (x: 9.0, y: 9.0), (x: 8.0, y: 9.0),
                    ]),
                ),
            ],
        )
        .unwrap();
        let removed = BTreeSet::from([11, 12]);

        // The two adjacent footprints redrawn as one building under the
        // first one's id; the far-away footprint is untouched.
        let survivor = Feature::new(
            10,
            Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0), (x: 2.0, y: 0.0),
                (x: 2.0, y: 1.0), (x: 0.0, y: 1.0),
            ]),
        );

        let group = detect_merge_group(&survivor, &removed, &authoritative).unwrap();
        assert_eq!(group.absorbed, BTreeSet::from([11]));
    }
}
