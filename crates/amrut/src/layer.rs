//! Authoritative and field layer containers with GeoJSON I/O.
//!
//! The authoritative layer is the office copy a field archive is
//! reconciled against; its `feature_id`s are unique. The field layer is
//! what came back from the device — the same logical feature may have
//! been captured more than once, so duplicate ids are permitted until a
//! review session resolves them.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use geojson::{FeatureCollection, GeoJson};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{AmrutError, Result};
use crate::feature::{Feature, FeatureId, FEATURE_ID_KEY};

/// The office/original vector layer. `feature_id` unique by invariant.
#[derive(Debug, Clone)]
pub struct AuthoritativeLayer {
    name: String,
    features: Vec<Feature>,
    index: HashMap<FeatureId, usize>,
}

impl AuthoritativeLayer {
    /// Build from features, rejecting duplicated ids.
    pub fn from_features(name: impl Into<String>, features: Vec<Feature>) -> Result<Self> {
        let name = name.into();
        let mut index = HashMap::with_capacity(features.len());
        for (position, feature) in features.iter().enumerate() {
            if index.insert(feature.id, position).is_some() {
                return Err(AmrutError::DuplicateFeatureId {
                    layer: name,
                    id: feature.id,
                });
            }
        }
        Ok(Self {
            name,
            features,
            index,
        })
    }

    /// Parse a GeoJSON FeatureCollection string.
    pub fn from_geojson(name: impl Into<String>, content: &str) -> Result<Self> {
        let name = name.into();
        let features = parse_feature_collection(&name, content)?;
        Self::from_features(name, features)
    }

    /// Load from a `.geojson` file on disk.
    pub fn from_geojson_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let name = name.into();
        let content = fs::read_to_string(path.as_ref())
            .map_err(|_| AmrutError::MissingLayer(name.clone()))?;
        Self::from_geojson(name, &content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.index.get(&id).map(|&position| &self.features[position])
    }

    pub fn ids(&self) -> BTreeSet<FeatureId> {
        self.features.iter().map(|f| f.id).collect()
    }

    /// Largest id in the layer; 0 when empty.
    pub fn max_id(&self) -> FeatureId {
        self.features.iter().map(|f| f.id).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// The working copy extracted from an archive. Duplicate ids allowed.
#[derive(Debug, Clone)]
pub struct FieldLayer {
    name: String,
    features: Vec<Feature>,
}

impl FieldLayer {
    pub fn from_features(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    /// Parse a GeoJSON FeatureCollection string.
    pub fn from_geojson(name: impl Into<String>, content: &str) -> Result<Self> {
        let name = name.into();
        let features = parse_feature_collection(&name, content)?;
        Ok(Self { name, features })
    }

    /// Serialize to a GeoJSON FeatureCollection string, sanitizing
    /// attribute values on the way out.
    pub fn to_geojson(&self) -> Result<String> {
        let features = self
            .features
            .iter()
            .map(|feature| geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &feature.geometry,
                ))),
                id: None,
                properties: Some(feature.sanitized_properties()),
                foreign_members: None,
            })
            .collect();

        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        Ok(serde_json::to_string(&collection)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distinct ids present in the layer.
    pub fn ids(&self) -> BTreeSet<FeatureId> {
        self.features.iter().map(|f| f.id).collect()
    }

    /// Ids captured more than once.
    pub fn duplicated_ids(&self) -> BTreeSet<FeatureId> {
        let mut seen = BTreeSet::new();
        let mut duplicated = BTreeSet::new();
        for feature in &self.features {
            if !seen.insert(feature.id) {
                duplicated.insert(feature.id);
            }
        }
        duplicated
    }

    /// All features sharing an id, in layer order.
    pub fn features_with_id(&self, id: FeatureId) -> Vec<&Feature> {
        self.features.iter().filter(|f| f.id == id).collect()
    }

    /// First feature with the id, if any.
    pub fn first_with_id(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Largest id currently in the layer; 0 when empty.
    pub fn max_id(&self) -> FeatureId {
        self.features.iter().map(|f| f.id).max().unwrap_or(0)
    }

    /// Resolve duplicates for `id`: the first occurrence in layer order
    /// keeps the id, every later occurrence is renumbered starting from
    /// `next_id`. The caller picks `next_id` past every id it knows
    /// about, including ids in the layer being reconciled against.
    /// Returns the freshly assigned ids.
    pub fn renumber_duplicates(&mut self, id: FeatureId, next_id: FeatureId) -> Vec<FeatureId> {
        let mut next_id = next_id.max(self.max_id() + 1);
        let mut assigned = Vec::new();
        let mut kept_first = false;
        for feature in &mut self.features {
            if feature.id != id {
                continue;
            }
            if !kept_first {
                kept_first = true;
                continue;
            }
            feature.id = next_id;
            assigned.push(next_id);
            next_id += 1;
        }
        assigned
    }

    /// Remove every feature with the id. Returns how many were removed.
    pub fn remove_all(&mut self, id: FeatureId) -> usize {
        let before = self.features.len();
        self.features.retain(|f| f.id != id);
        before - self.features.len()
    }

    /// Replace all features sharing `feature.id` with the given feature,
    /// keeping the position of the first occurrence; appends when absent.
    pub fn replace_with(&mut self, feature: Feature) {
        let position = self.features.iter().position(|f| f.id == feature.id);
        self.features.retain(|f| f.id != feature.id);
        match position {
            Some(position) if position <= self.features.len() => {
                self.features.insert(position, feature)
            }
            _ => self.features.push(feature),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Parse a GeoJSON FeatureCollection into features, pulling the
/// `feature_id` join key out of the properties.
fn parse_feature_collection(layer: &str, content: &str) -> Result<Vec<Feature>> {
    let geojson: GeoJson = content.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut features = Vec::with_capacity(collection.features.len());
    for parsed in collection.features {
        let geometry = parsed.geometry.ok_or_else(|| {
            AmrutError::GeometryError(format!("feature without geometry in layer '{layer}'"))
        })?;
        let geometry = geo::Geometry::<f64>::try_from(geometry.value)?;

        let mut attributes = IndexMap::new();
        let mut id = None;
        if let Some(properties) = parsed.properties {
            for (key, value) in properties {
                if key == FEATURE_ID_KEY {
                    id = feature_id_from_value(&value);
                } else {
                    attributes.insert(key, value);
                }
            }
        }
        let id = id.ok_or_else(|| AmrutError::MissingFeatureId {
            layer: layer.to_string(),
        })?;

        features.push(Feature {
            id,
            geometry,
            attributes,
        });
    }
    Ok(features)
}

/// Mobile exports occasionally widen the id to a float; accept it only
/// when the value is exactly integral. A fractional or non-finite id
/// means corruption and must not silently truncate.
fn feature_id_from_value(value: &Value) -> Option<FeatureId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as FeatureId)
        }),
        _ => None,
    }
}
