//! Read-only view of cached features.

use crate::cache::index::FeatureIndex;
use crate::filter::Filter;
use crate::types::{Envelope, FeatureCollection};

/// Features of one cache matching a fixed filter.
///
/// The view holds no copy of the data: every call re-evaluates the filter
/// against the index, so it always reflects the cache's current content.
/// It never reaches the backing store and never updates access times.
pub struct FeatureView<'a> {
    type_name: &'a str,
    index: &'a FeatureIndex,
    filter: Filter,
}

impl<'a> FeatureView<'a> {
    pub(crate) fn new(type_name: &'a str, index: &'a FeatureIndex, filter: Filter) -> Self {
        Self {
            type_name,
            index,
            filter,
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn features(&self) -> FeatureCollection {
        FeatureCollection::new(
            self.type_name,
            self.index.select_untracked(&self.filter, &self.filter),
        )
    }

    pub fn len(&self) -> usize {
        self.features().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index
            .peek(id)
            .is_some_and(|feature| self.filter.evaluate(feature))
    }

    pub fn bounds(&self) -> Option<Envelope> {
        self.features().bounds()
    }
}
