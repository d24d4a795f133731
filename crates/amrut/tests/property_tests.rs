//! Property-based tests for the difference classifier and attribute
//! sanitizer.
//!
//! These verify the invariants the review session depends on:
//!
//! 1. **Determinism**: classification of unchanged inputs never varies
//! 2. **Exclusivity**: the three difference sets never overlap
//! 3. **Completeness**: every id lands in the right bucket relative to
//!    the two layers' id sets
//! 4. **Sanitization**: attribute values always flatten to GeoJSON
//!    scalars

use std::collections::BTreeMap;

use proptest::prelude::*;

use amrut::feature::sanitize_value;
use amrut::{classify, removed_ids, AuthoritativeLayer, Bounds, DiffConfig, Feature, FieldLayer};
use geo::{point, Geometry};

fn bounds() -> Bounds {
    Bounds {
        north: 21.0,
        south: 20.0,
        east: 11.0,
        west: 10.0,
    }
}

/// Points with small ids so layers overlap often.
fn raw_features() -> impl Strategy<Value = Vec<(i64, f64, f64)>> {
    prop::collection::vec((0i64..20, 10.05f64..10.95, 20.05f64..20.95), 0..30)
}

fn build_authoritative(raw: &[(i64, f64, f64)]) -> AuthoritativeLayer {
    // Last occurrence wins; ids must be unique on the office side.
    let mut unique = BTreeMap::new();
    for &(id, x, y) in raw {
        unique.insert(id, Feature::new(id, Geometry::Point(point! { x: x, y: y })));
    }
    AuthoritativeLayer::from_features("sampled", unique.into_values().collect()).unwrap()
}

fn build_field(raw: &[(i64, f64, f64)]) -> FieldLayer {
    let features = raw
        .iter()
        .map(|&(id, x, y)| Feature::new(id, Geometry::Point(point! { x: x, y: y })))
        .collect();
    FieldLayer::from_features("sampled", features)
}

fn json_value() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-zA-Z0-9 ]{0,20}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| serde_json::Value::from(serde_json::Map::from_iter(m))),
        ]
    })
}

proptest! {
    #[test]
    fn classification_is_deterministic(auth in raw_features(), field in raw_features()) {
        let a = build_authoritative(&auth);
        let f = build_field(&field);
        let config = DiffConfig::default();

        let first = classify(&a, &f, &bounds(), &config).unwrap();
        let second = classify(&a, &f, &bounds(), &config).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn unchanged_layers_classify_as_empty(raw in raw_features()) {
        let a = build_authoritative(&raw);
        let copy: Vec<(i64, f64, f64)> = a.iter().map(|feature| {
            let (x, y) = feature.centroid().unwrap();
            (feature.id, x, y)
        }).collect();
        let f = build_field(&copy);

        let diff = classify(&a, &f, &bounds(), &DiffConfig::default()).unwrap();
        prop_assert!(diff.is_empty());
        prop_assert!(removed_ids(&a, &f).is_empty());
    }

    #[test]
    fn difference_sets_never_overlap(auth in raw_features(), field in raw_features()) {
        let a = build_authoritative(&auth);
        let f = build_field(&field);

        let diff = classify(&a, &f, &bounds(), &DiffConfig::default()).unwrap();
        prop_assert!(diff.new.is_disjoint(&diff.deleted_flagged));
        prop_assert!(diff.new.is_disjoint(&diff.geometry_changed));
        prop_assert!(diff.deleted_flagged.is_disjoint(&diff.geometry_changed));
    }

    #[test]
    fn buckets_respect_layer_membership(auth in raw_features(), field in raw_features()) {
        let a = build_authoritative(&auth);
        let f = build_field(&field);

        let diff = classify(&a, &f, &bounds(), &DiffConfig::default()).unwrap();
        let removed = removed_ids(&a, &f);
        let auth_ids = a.ids();
        let field_ids = f.ids();

        // New ids exist only on the field side.
        prop_assert!(diff.new.iter().all(|id| !auth_ids.contains(id)));
        // Changed ids exist on both sides.
        prop_assert!(diff
            .geometry_changed
            .iter()
            .all(|id| auth_ids.contains(id) && field_ids.contains(id)));
        // Removed ids never appear in any review bucket.
        prop_assert!(removed.iter().all(|id| !field_ids.contains(id)));
        prop_assert!(removed.is_disjoint(&diff.new));
        prop_assert!(removed.is_disjoint(&diff.deleted_flagged));
        prop_assert!(removed.is_disjoint(&diff.geometry_changed));
    }

    #[test]
    fn sanitized_values_are_scalars(value in json_value()) {
        let sanitized = sanitize_value(&value);
        prop_assert!(
            !sanitized.is_array() && !sanitized.is_object(),
            "sanitize produced a nested value: {sanitized}"
        );
    }

    #[test]
    fn sanitization_is_idempotent(value in json_value()) {
        let once = sanitize_value(&value);
        let twice = sanitize_value(&once);
        prop_assert_eq!(once, twice);
    }
}
