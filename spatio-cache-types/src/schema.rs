use serde::{Deserialize, Serialize};

/// Value type bound to a feature attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeBinding {
    Boolean,
    Integer,
    Float,
    Text,
    Geometry,
}

/// A named, typed attribute of a feature type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub binding: AttributeBinding,
}

/// Schema of a feature type as published by a feature store.
///
/// Two feature types are compatible only when they are equal: same name,
/// same geometry property and the same attributes in the same order.
///
/// ```
/// use spatio_cache_types::schema::{AttributeBinding, FeatureType};
///
/// let roads = FeatureType::new("roads", "geom")
///     .with_attribute("name", AttributeBinding::Text)
///     .with_attribute("lanes", AttributeBinding::Integer);
///
/// assert_eq!(roads.attributes().len(), 3);
/// assert!(roads.attribute("lanes").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureType {
    name: String,
    geometry_property: String,
    attributes: Vec<AttributeDescriptor>,
}

impl FeatureType {
    /// Create a feature type whose only attribute is its geometry.
    pub fn new(name: impl Into<String>, geometry_property: impl Into<String>) -> Self {
        let geometry_property = geometry_property.into();
        Self {
            name: name.into(),
            attributes: vec![AttributeDescriptor {
                name: geometry_property.clone(),
                binding: AttributeBinding::Geometry,
            }],
            geometry_property,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, binding: AttributeBinding) -> Self {
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            binding,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry_property(&self) -> &str {
        &self.geometry_property
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }
}
