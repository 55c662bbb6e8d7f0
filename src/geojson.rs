//! GeoJSON import and export for feature collections.

use crate::error::{CacheError, Result};
use crate::source::MemoryFeatureStore;
use crate::types::{Feature, FeatureCollection};
use geojson::feature::Id;
use geojson::{Geometry, Value};

/// Parses a GeoJSON `FeatureCollection` into features of `type_name`.
///
/// Features without an `id` are named `<type_name>.<n>` by their position,
/// counting from 1. Features with a null or empty geometry are skipped.
pub fn features_from_geojson(type_name: &str, geojson: &str) -> Result<FeatureCollection> {
    let parsed: geojson::FeatureCollection = serde_json::from_str(geojson)
        .map_err(|e| CacheError::InvalidInput(format!("Failed to parse GeoJSON: {}", e)))?;

    let mut features = Vec::with_capacity(parsed.features.len());
    for (position, source) in parsed.features.into_iter().enumerate() {
        let id = match source.id {
            Some(Id::String(id)) => id,
            Some(Id::Number(number)) => number.to_string(),
            None => format!("{}.{}", type_name, position + 1),
        };

        let Some(geometry) = source.geometry else {
            log::warn!("skipping GeoJSON feature '{}' without geometry", id);
            continue;
        };
        let geometry = geo::Geometry::<f64>::try_from(geometry).map_err(|e| {
            CacheError::InvalidInput(format!("Invalid geometry for feature '{}': {}", id, e))
        })?;

        let Some(mut feature) = Feature::from_geometry(id.clone(), geometry) else {
            log::warn!("skipping GeoJSON feature '{}' with empty geometry", id);
            continue;
        };
        if let Some(properties) = source.properties {
            feature = feature.with_properties(properties);
        }
        features.push(feature);
    }

    Ok(FeatureCollection::new(type_name, features))
}

/// Loads a GeoJSON `FeatureCollection` into an existing type of `store`.
///
/// Returns the number of features inserted.
pub fn load_geojson(store: &MemoryFeatureStore, type_name: &str, geojson: &str) -> Result<usize> {
    let features = features_from_geojson(type_name, geojson)?;
    let count = store.insert_all(type_name, features)?;
    log::debug!("loaded {} '{}' feature(s) from GeoJSON", count, type_name);
    Ok(count)
}

/// Serializes a collection as a GeoJSON `FeatureCollection`.
pub fn to_geojson(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .iter()
        .map(|feature| {
            let envelope = feature.envelope();
            geojson::Feature {
                bbox: Some(vec![
                    envelope.min_x(),
                    envelope.min_y(),
                    envelope.max_x(),
                    envelope.max_y(),
                ]),
                geometry: Some(Geometry::new(Value::from(feature.geometry()))),
                id: Some(Id::String(feature.id().to_string())),
                properties: Some(feature.properties().clone()),
                foreign_members: None,
            }
        })
        .collect();

    let output = geojson::FeatureCollection {
        bbox: collection
            .bounds()
            .map(|b| vec![b.min_x(), b.min_y(), b.max_x(), b.max_y()]),
        features,
        foreign_members: None,
    };
    Ok(serde_json::to_string(&output)?)
}
