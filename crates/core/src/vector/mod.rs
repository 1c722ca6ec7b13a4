//! Minimal vector feature model.
//!
//! Features are a geometry plus an attribute map, just enough to carry a
//! classified polygon with its `{fid, code, formula}` attributes through the
//! host-independent classification path. Layer storage, indexing and
//! rendering stay with the host.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric view of the value, `None` for non-numeric variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// A geographic feature with geometry, attributes and an optional integer id.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: HashMap<String, AttributeValue>,
    /// Feature identifier (`fid` in sink schemas).
    pub id: Option<i64>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Create a feature with no geometry.
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: HashMap::new(),
            id: None,
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Numeric attribute lookup; `None` if absent or non-numeric.
    pub fn numeric_property(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(AttributeValue::as_f64)
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_property_coercion() {
        let mut feature = Feature::empty();
        feature.set_property("il", AttributeValue::Float(3.5));
        feature.set_property("dn", AttributeValue::Int(7));
        feature.set_property("name", AttributeValue::String("unit A".into()));

        assert_eq!(feature.numeric_property("il"), Some(3.5));
        assert_eq!(feature.numeric_property("dn"), Some(7.0));
        assert_eq!(feature.numeric_property("name"), None);
        assert_eq!(feature.numeric_property("absent"), None);
    }

    #[test]
    fn test_collection_from_iterator() {
        let collection: FeatureCollection = (0..3)
            .map(|i| {
                let mut f = Feature::empty();
                f.id = Some(i);
                f
            })
            .collect();
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.features[2].id, Some(2));
    }
}
