//! GeoJSON tiles, overlays and map layer output.

use std::convert::TryFrom;
use std::path::Path;

use geojson::feature::Id;
use geojson::{Feature as GjFeature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use geo_types::Geometry;

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::gis::{Feature, Overlay};
use crate::io::{read_to_string, write_string};
use crate::tiles::Tile;

fn gj_err(path: &Path, message: impl ToString) -> Error {
    Error::GeoJson {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Reads a GeoJSON document as a feature collection. A bare feature or
/// geometry is wrapped into a one-element collection.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection> {
    let text = read_to_string(path)?;
    let gj: GeoJson = text.parse().map_err(|e| gj_err(path, e))?;
    Ok(match gj {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(f) => FeatureCollection {
            bbox: None,
            features: vec![f],
            foreign_members: None,
        },
        GeoJson::Geometry(g) => FeatureCollection {
            bbox: None,
            features: vec![GjFeature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        },
    })
}

/// Renders a JSON property as a plain string; whole numbers lose their
/// fractional part.
pub fn property_string(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

fn properties_to_attributes(props: Option<JsonObject>) -> std::collections::BTreeMap<String, String> {
    props
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), property_string(v)))
        .collect()
}

fn feature_geometry(path: &Path, feature: &mut GjFeature) -> Result<Option<Geometry<f64>>> {
    match feature.geometry.take() {
        Some(g) => Geometry::<f64>::try_from(g.value)
            .map(Some)
            .map_err(|e| gj_err(path, e)),
        None => Ok(None),
    }
}

/// Reads tile polygons from a GeoJSON feature collection. The identifier is
/// taken from the `id_field` property, falling back to the feature `id`.
pub fn read_tiles_geojson(path: &Path, id_field: &str) -> Result<Vec<Tile>> {
    let fc = read_feature_collection(path)?;
    let mut tiles = Vec::with_capacity(fc.features.len());
    for (idx, mut feature) in fc.features.into_iter().enumerate() {
        let geometry = feature_geometry(path, &mut feature)?;
        let mut attributes = properties_to_attributes(feature.properties.take());
        let tile_ref = attributes
            .remove(id_field)
            .filter(|id| !id.is_empty())
            .or_else(|| match &feature.id {
                Some(Id::String(s)) => Some(s.clone()),
                Some(Id::Number(n)) => Some(property_string(&JsonValue::Number(n.clone()))),
                None => None,
            })
            .ok_or_else(|| Error::MissingTileId {
                path: path.to_path_buf(),
                record: idx + 1,
                field: id_field.to_string(),
            })?;
        let boundary = match geometry {
            Some(Geometry::Polygon(p)) => p.into(),
            Some(Geometry::MultiPolygon(mp)) => mp,
            _ => {
                log::warn!("{}: tile {} is not a polygon, skipped", path.display(), tile_ref);
                continue;
            }
        };
        tiles.push(Tile {
            tile_ref,
            boundary,
            attributes,
        });
    }
    log::info!("{}: loaded {} tiles", path.display(), tiles.len());
    Ok(tiles)
}

/// Reads every feature of a GeoJSON document as an overlay layer.
pub fn read_overlay_geojson(path: &Path, name: &str, crs: Crs, color: &str) -> Result<Overlay> {
    let fc = read_feature_collection(path)?;
    let mut features = Vec::new();
    for mut f in fc.features {
        if let Some(geometry) = feature_geometry(path, &mut f)? {
            let mut feature = Feature::with_attributes(geometry, properties_to_attributes(f.properties.take()));
            feature.class = Some(name.to_string());
            features.push(feature);
        }
    }
    log::info!("{}: loaded {} overlay features for {}", path.display(), features.len(), name);
    Ok(Overlay {
        name: name.to_string(),
        crs,
        color: color.to_string(),
        features,
    })
}

/// Builds a GeoJSON feature from a geometry and a property map.
pub fn to_feature(geometry: &Geometry<f64>, properties: JsonObject) -> GjFeature {
    GjFeature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Writes a feature collection as pretty-printed GeoJSON.
pub fn write_feature_collection(path: &Path, fc: &FeatureCollection) -> Result<()> {
    let json = serde_json::to_string_pretty(fc).map_err(|e| gj_err(path, e))?;
    write_string(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn doc(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const TILES: &str = r#"{ "type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"tile_ref": "SX9090", "area": 1},
         "geometry": {"type": "Polygon", "coordinates": [[[-3.6,50.7],[-3.5,50.7],[-3.5,50.8],[-3.6,50.8],[-3.6,50.7]]]}},
        {"type": "Feature", "id": 42, "properties": {},
         "geometry": {"type": "MultiPolygon", "coordinates": [[[[0,0],[1,0],[1,1],[0,0]]]]}},
        {"type": "Feature", "properties": {"tile_ref": "LINE"},
         "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1]]}}
    ] }"#;

    #[test]
    fn reads_polygon_tiles() {
        let file = doc(TILES);
        let tiles = read_tiles_geojson(file.path(), "tile_ref").unwrap();
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].tile_ref, "SX9090");
        assert_eq!(tiles[0].attributes.get("area").map(String::as_str), Some("1"));
        assert_eq!(tiles[1].tile_ref, "42");
    }

    #[test]
    fn tile_without_id_is_an_error() {
        let file = doc(
            r#"{"type": "Feature", "properties": {"name": "x"},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}"#,
        );
        assert!(matches!(
            read_tiles_geojson(file.path(), "tile_ref"),
            Err(Error::MissingTileId { record: 1, .. })
        ));
    }

    #[test]
    fn malformed_document_is_reported() {
        let file = doc("{ not json");
        assert!(matches!(
            read_feature_collection(file.path()),
            Err(Error::GeoJson { .. })
        ));
    }

    #[test]
    fn overlay_keeps_every_geometry() {
        let file = doc(TILES);
        let overlay = read_overlay_geojson(file.path(), "County Boundaries", Crs::wgs84(), "orange").unwrap();
        assert_eq!(overlay.features.len(), 3);
        assert_eq!(overlay.features[0].class.as_deref(), Some("County Boundaries"));
    }
}
