//! Queries addressed to a cache or a feature store.

use crate::filter::Filter;

/// A request for features of one type.
///
/// Only `type_name` and `filter` influence what the cache fetches and
/// tracks. `max_features` truncates the returned collection;
/// `property_names` is carried for stores that honour projections.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub type_name: String,
    pub filter: Filter,
    pub property_names: Option<Vec<String>>,
    pub max_features: Option<usize>,
}

impl Query {
    /// Every feature of `type_name`.
    pub fn all(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Filter::Include)
    }

    pub fn new(type_name: impl Into<String>, filter: Filter) -> Self {
        Self {
            type_name: type_name.into(),
            filter,
            property_names: None,
            max_features: None,
        }
    }

    pub fn with_max_features(mut self, max: usize) -> Self {
        self.max_features = Some(max);
        self
    }

    pub fn with_property_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_names = Some(names.into_iter().map(Into::into).collect());
        self
    }
}
