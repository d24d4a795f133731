//! Vector features and attribute handling.

use geo::{Centroid, Geometry};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{AmrutError, Result};

/// Stable integer identifier assigned at export time. The sole join key
/// between authoritative and field copies of a feature.
pub type FeatureId = i64;

/// Attribute name carrying the join key in GeoJSON properties.
pub const FEATURE_ID_KEY: &str = "feature_id";

/// Attribute name carrying the soft-delete flag set by field devices.
pub const DELETE_KEY: &str = "delete";

/// A single vector feature: join key, geometry, and ordered attributes.
///
/// `attributes` holds every GeoJSON property except `feature_id`, which
/// lives in `id` and is re-injected on serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry<f64>,
    pub attributes: IndexMap<String, Value>,
}

impl Feature {
    /// Create a feature with no attributes.
    pub fn new(id: FeatureId, geometry: Geometry<f64>) -> Self {
        Self {
            id,
            geometry,
            attributes: IndexMap::new(),
        }
    }

    /// Builder-style attribute insertion, mainly for tests and fixtures.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Whether the field device flagged this feature as deleted.
    ///
    /// Accepts a boolean `true` or the string `"true"` — some capture
    /// apps write form values as strings.
    pub fn is_delete_flagged(&self) -> bool {
        match self.attributes.get(DELETE_KEY) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Centroid of the geometry as an (x, y) pair.
    pub fn centroid(&self) -> Result<(f64, f64)> {
        let point = self
            .geometry
            .centroid()
            .ok_or_else(|| AmrutError::GeometryError(format!("feature {} has empty geometry", self.id)))?;
        Ok((point.x(), point.y()))
    }

    /// Attributes sanitized for GeoJSON serialization, with the join key
    /// re-injected as the first property.
    pub fn sanitized_properties(&self) -> serde_json::Map<String, Value> {
        let mut properties = serde_json::Map::new();
        properties.insert(FEATURE_ID_KEY.to_string(), Value::from(self.id));
        for (key, value) in &self.attributes {
            properties.insert(key.clone(), sanitize_value(value));
        }
        properties
    }
}

/// Sanitize an attribute value for GeoJSON output.
///
/// Scalars pass through unchanged. Nested maps and lists are serialized
/// to a JSON string; empty ones collapse to null.
pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
        Value::Array(items) if items.is_empty() => Value::Null,
        Value::Object(map) if map.is_empty() => Value::Null,
        other => Value::String(other.to_string()),
    }
}
