use crate::envelope::Envelope;
use geo::{BoundingRect, Geometry, Point};
use serde_json::{Map, Value};

/// A geographic feature: identifier, geometry and free-form attributes.
///
/// The envelope is derived from the geometry once, at construction, and
/// cannot be changed independently. Caches key features by `id` and index
/// them by `envelope`; attributes are only ever read by filters.
///
/// # Examples
///
/// ```
/// use spatio_cache_types::feature::Feature;
///
/// let hydrant = Feature::point("hydrant.17", -73.98, 40.75)
///     .with_property("status", "ok");
///
/// assert_eq!(hydrant.id(), "hydrant.17");
/// assert_eq!(hydrant.envelope().min_x(), -73.98);
/// assert_eq!(hydrant.property("status").and_then(|v| v.as_str()), Some("ok"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: String,
    geometry: Geometry<f64>,
    envelope: Envelope,
    properties: Map<String, Value>,
}

impl Feature {
    /// Create a feature from any geometry with a spatial extent.
    ///
    /// Returns `None` for empty geometries (an empty polygon, an empty
    /// collection, ...) because they cannot be placed in a spatial index.
    pub fn from_geometry(
        id: impl Into<String>,
        geometry: impl Into<Geometry<f64>>,
    ) -> Option<Self> {
        let geometry = geometry.into();
        let envelope = Envelope::from_rect(geometry.bounding_rect()?);
        if !envelope.is_finite() {
            return None;
        }

        Some(Self {
            id: id.into(),
            geometry,
            envelope,
            properties: Map::new(),
        })
    }

    /// Create a point feature.
    pub fn point(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            geometry: Geometry::Point(Point::new(x, y)),
            envelope: Envelope::from_point(x, y),
            properties: Map::new(),
        }
    }

    /// Create a feature whose geometry is the rectangle itself.
    pub fn from_envelope(id: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            id: id.into(),
            geometry: Geometry::Rect(envelope.rect()),
            envelope,
            properties: Map::new(),
        }
    }

    /// Attach an attribute value.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Replace every attribute at once.
    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// An ordered set of features of one feature type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    type_name: String,
    features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(type_name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            type_name: type_name.into(),
            features,
        }
    }

    pub fn empty(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Vec::new())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Identifiers in collection order.
    pub fn ids(&self) -> Vec<&str> {
        self.features.iter().map(Feature::id).collect()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.features.iter().any(|f| f.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id() == id)
    }

    /// Envelope covering every feature, `None` when empty.
    pub fn bounds(&self) -> Option<Envelope> {
        Envelope::bounds_of(self.features.iter().map(Feature::envelope))
    }

    pub fn truncate(&mut self, len: usize) {
        self.features.truncate(len);
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    #[test]
    fn test_point_feature_envelope() {
        let f = Feature::point("a", 1.5, -2.0);
        assert_eq!(*f.envelope(), Envelope::from_point(1.5, -2.0));
        assert!(f.properties().is_empty());
    }

    #[test]
    fn test_polygon_feature_envelope() {
        let poly = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 0.0)]),
            vec![],
        );
        let f = Feature::from_geometry("tri", poly).unwrap();
        assert_eq!(*f.envelope(), Envelope::new(0.0, 0.0, 4.0, 3.0));
    }

    #[test]
    fn test_empty_geometry_rejected() {
        let empty = Polygon::new(LineString::new(vec![]), vec![]);
        assert!(Feature::from_geometry("nothing", empty).is_none());
    }

    #[test]
    fn test_collection_bounds_and_lookup() {
        let collection = FeatureCollection::new(
            "roads",
            vec![
                Feature::point("r1", 0.0, 0.0),
                Feature::from_envelope("r2", Envelope::new(2.0, 2.0, 3.0, 5.0)),
            ],
        );

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.ids(), vec!["r1", "r2"]);
        assert!(collection.contains_id("r2"));
        assert_eq!(collection.bounds(), Some(Envelope::new(0.0, 0.0, 3.0, 5.0)));
        assert!(FeatureCollection::empty("roads").bounds().is_none());
    }
}
