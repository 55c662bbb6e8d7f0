//! Feature predicates.
//!
//! Filters are a closed tagged union. The cache recognises exactly one
//! spatial shape, [`BBoxFilter`], and treats everything else as opaque
//! restrictions evaluated feature by feature.

use crate::types::{Envelope, Feature};
use geo::Intersects;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A bounding-box predicate: the feature's geometry intersects `envelope`.
#[derive(Debug, Clone, PartialEq)]
pub struct BBoxFilter {
    /// Name of the geometry property the predicate targets.
    pub property: String,
    pub envelope: Envelope,
    /// Spatial reference system identifier, carried through untouched.
    pub srs: Option<String>,
}

impl BBoxFilter {
    pub fn new(property: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            property: property.into(),
            envelope,
            srs: None,
        }
    }

    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }

    /// The same property and reference system over another envelope.
    pub fn with_envelope(&self, envelope: Envelope) -> Self {
        Self {
            property: self.property.clone(),
            envelope,
            srs: self.srs.clone(),
        }
    }

    pub fn evaluate(&self, feature: &Feature) -> bool {
        feature.envelope().intersects(&self.envelope)
            && feature.geometry().intersects(&self.envelope.rect())
    }
}

/// A named, opaque predicate supplied by the caller.
///
/// Two predicates are equal only if they share the same closure allocation.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<dyn Fn(&Feature) -> bool + Send + Sync>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Feature) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn test(&self, feature: &Feature) -> bool {
        (self.func)(feature)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

/// A predicate over features.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every feature.
    Include,
    /// Matches nothing. Also the "nothing left to fetch" sentinel.
    Exclude,
    BBox(BBoxFilter),
    /// Identifier membership.
    Ids(BTreeSet<String>),
    PropertyEquals { name: String, value: Value },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Custom(Predicate),
}

impl Filter {
    /// Bounding-box predicate over `property`.
    pub fn bbox(
        property: impl Into<String>,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Self {
        Filter::BBox(BBoxFilter::new(
            property,
            Envelope::new(min_x, min_y, max_x, max_y),
        ))
    }

    pub fn bbox_envelope(property: impl Into<String>, envelope: Envelope) -> Self {
        Filter::BBox(BBoxFilter::new(property, envelope))
    }

    /// Identifier-equality filter for a single feature.
    pub fn id(id: impl Into<String>) -> Self {
        Filter::Ids(BTreeSet::from([id.into()]))
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub fn property_equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::PropertyEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Feature) -> bool + Send + Sync + 'static,
    {
        Filter::Custom(Predicate::new(name, func))
    }

    pub fn is_include(&self) -> bool {
        matches!(self, Filter::Include)
    }

    pub fn is_exclude(&self) -> bool {
        matches!(self, Filter::Exclude)
    }

    pub fn as_bbox(&self) -> Option<&BBoxFilter> {
        match self {
            Filter::BBox(bbox) => Some(bbox),
            _ => None,
        }
    }

    /// Conjunction, folding away `Include` and short-circuiting `Exclude`.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Exclude, _) | (_, Filter::Exclude) => Filter::Exclude,
            (Filter::Include, f) | (f, Filter::Include) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Disjunction, folding away `Exclude` and short-circuiting `Include`.
    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Include, _) | (_, Filter::Include) => Filter::Include,
            (Filter::Exclude, f) | (f, Filter::Exclude) => f,
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), f) => {
                left.push(f);
                Filter::Or(left)
            }
            (a, b) => Filter::Or(vec![a, b]),
        }
    }

    pub fn evaluate(&self, feature: &Feature) -> bool {
        match self {
            Filter::Include => true,
            Filter::Exclude => false,
            Filter::BBox(bbox) => bbox.evaluate(feature),
            Filter::Ids(ids) => ids.contains(feature.id()),
            Filter::PropertyEquals { name, value } => feature.property(name) == Some(value),
            Filter::And(parts) => parts.iter().all(|f| f.evaluate(feature)),
            Filter::Or(parts) => parts.iter().any(|f| f.evaluate(feature)),
            Filter::Not(inner) => !inner.evaluate(feature),
            Filter::Custom(predicate) => predicate.test(feature),
        }
    }

    /// Separate the spatially trackable part from the rest of the filter.
    ///
    /// Only a top-level bounding box, or the first bounding-box conjunct of
    /// a top-level `And`, is extracted. Spatial predicates nested anywhere
    /// else stay in the returned restrictions and are never tracked.
    pub fn split_spatial(&self) -> (Option<BBoxFilter>, Filter) {
        match self {
            Filter::BBox(bbox) => (Some(bbox.clone()), Filter::Include),
            Filter::And(parts) => {
                let Some(pos) = parts.iter().position(|f| matches!(f, Filter::BBox(_))) else {
                    return (None, self.clone());
                };
                let spatial = parts[pos].as_bbox().cloned();
                let rest = parts
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != pos)
                    .fold(Filter::Include, |acc, (_, f)| acc.and(f.clone()));
                (spatial, rest)
            }
            _ => (None, self.clone()),
        }
    }

    /// Envelopes of a purely spatial filter.
    ///
    /// A bounding box yields one envelope; an `Or` of bounding boxes (the
    /// shape of a multi-part residual) yields one per branch. Anything
    /// else yields `None`.
    pub fn spatial_parts(&self) -> Option<Vec<Envelope>> {
        match self {
            Filter::BBox(bbox) => Some(vec![bbox.envelope]),
            Filter::Or(parts) if !parts.is_empty() => parts
                .iter()
                .map(|f| f.as_bbox().map(|b| b.envelope))
                .collect(),
            _ => None,
        }
    }
}

impl From<BBoxFilter> for Filter {
    fn from(bbox: BBoxFilter) -> Self {
        Filter::BBox(bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_at(id: &str, x: f64, y: f64) -> Feature {
        Feature::point(id, x, y).with_property("kind", "tree")
    }

    #[test]
    fn test_bbox_evaluate() {
        let f = Filter::bbox("geom", 0.0, 0.0, 10.0, 10.0);
        assert!(f.evaluate(&feature_at("a", 5.0, 5.0)));
        assert!(f.evaluate(&feature_at("edge", 10.0, 10.0)));
        assert!(!f.evaluate(&feature_at("b", 11.0, 5.0)));
    }

    #[test]
    fn test_and_simplification() {
        let bbox = Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0);
        assert_eq!(Filter::Include.and(bbox.clone()), bbox);
        assert_eq!(bbox.clone().and(Filter::Exclude), Filter::Exclude);

        let combined = bbox.clone().and(Filter::property_equals("kind", "tree"));
        assert!(matches!(combined, Filter::And(ref parts) if parts.len() == 2));
    }

    #[test]
    fn test_or_simplification() {
        let a = Filter::id("a");
        assert_eq!(Filter::Exclude.or(a.clone()), a);
        assert_eq!(a.clone().or(Filter::Include), Filter::Include);
    }

    #[test]
    fn test_split_top_level_bbox() {
        let f = Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0);
        let (spatial, rest) = f.split_spatial();
        assert_eq!(spatial.unwrap().envelope, Envelope::new(0.0, 0.0, 1.0, 1.0));
        assert!(rest.is_include());
    }

    #[test]
    fn test_split_conjunction_takes_first_bbox_only() {
        let f = Filter::And(vec![
            Filter::property_equals("kind", "tree"),
            Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
            Filter::bbox("geom", 5.0, 5.0, 6.0, 6.0),
        ]);
        let (spatial, rest) = f.split_spatial();
        assert_eq!(spatial.unwrap().envelope, Envelope::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(
            rest,
            Filter::And(vec![
                Filter::property_equals("kind", "tree"),
                Filter::bbox("geom", 5.0, 5.0, 6.0, 6.0),
            ])
        );
    }

    #[test]
    fn test_split_nested_bbox_is_not_spatial() {
        let f = Filter::Or(vec![
            Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
            Filter::id("x"),
        ]);
        let (spatial, rest) = f.split_spatial();
        assert!(spatial.is_none());
        assert_eq!(rest, f);
    }

    #[test]
    fn test_spatial_parts() {
        let multi = Filter::Or(vec![
            Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
            Filter::bbox("geom", 2.0, 2.0, 3.0, 3.0),
        ]);
        assert_eq!(multi.spatial_parts().map(|p| p.len()), Some(2));

        let mixed = Filter::Or(vec![Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0), Filter::id("a")]);
        assert!(mixed.spatial_parts().is_none());
        assert!(Filter::Include.spatial_parts().is_none());
    }

    #[test]
    fn test_custom_predicate_equality_is_by_identity() {
        let p = Filter::custom("even", |f: &Feature| f.id().len() % 2 == 0);
        let same = p.clone();
        let other = Filter::custom("even", |f: &Feature| f.id().len() % 2 == 0);
        assert_eq!(p, same);
        assert_ne!(p, other);
        assert!(p.evaluate(&feature_at("ab", 0.0, 0.0)));
    }

    #[test]
    fn test_not_and_ids() {
        let f = Filter::Not(Box::new(Filter::ids(["a", "b"])));
        assert!(!f.evaluate(&feature_at("a", 0.0, 0.0)));
        assert!(f.evaluate(&feature_at("c", 0.0, 0.0)));
    }
}
