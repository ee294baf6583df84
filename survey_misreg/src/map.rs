//! Map layers for web viewers.
//!
//! The survey points, tile boundaries and reference overlays are written as a
//! single GeoJSON feature collection in the geographic target system. Each
//! feature names its layer and carries the styling a Leaflet-style viewer
//! needs; the initial view goes in the collection's foreign members.

use std::path::Path;

use geojson::{Feature as GjFeature, FeatureCollection, JsonObject, JsonValue};
use geo_types::{Geometry, Point};
use serde_json::json;

use crate::error::Result;
use crate::gis::Overlay;
use crate::io::geojson::{to_feature, write_feature_collection};
use crate::loader::SurveyData;
use crate::survey::SurveyDataset;
use crate::tiles::TileSet;

pub const DEFAULT_ZOOM: u8 = 10;
pub const POINT_COLOR: &str = "red";
pub const POINT_RADIUS: f64 = 1.0;
pub const TILE_LAYER: &str = "Tiles";
pub const TILE_COLOR: &str = "#3388ff";

/// One named layer of the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    pub name: String,
    pub color: String,
    pub features: Vec<GjFeature>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    /// Initial centre as `(longitude, latitude)`.
    pub center: Option<(f64, f64)>,
    pub zoom: u8,
    pub layers: Vec<MapLayer>,
}

fn props(pairs: impl IntoIterator<Item = (&'static str, JsonValue)>) -> JsonObject {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn point_layer(ds: &SurveyDataset) -> MapLayer {
    let features = ds
        .points()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.has_lon_lat())
        .map(|(row, p)| {
            let geom = Geometry::Point(Point::new(p.longitude, p.latitude));
            let mut properties = props([
                ("layer", json!(ds.name())),
                ("popup", json!(ds.name())),
                ("row", json!(row)),
                ("radius", json!(POINT_RADIUS)),
                ("color", json!(POINT_COLOR)),
                ("fill", json!(true)),
                ("fill_color", json!(POINT_COLOR)),
            ]);
            for (field, value) in &p.offsets {
                if value.is_finite() {
                    properties.insert(field.clone(), json!(value));
                }
            }
            to_feature(&geom, properties)
        })
        .collect();
    MapLayer {
        name: ds.name().to_string(),
        color: POINT_COLOR.to_string(),
        features,
    }
}

fn tile_layer(tiles: &TileSet) -> MapLayer {
    let features = tiles
        .iter()
        .map(|t| {
            let mut properties = props([
                ("layer", json!(TILE_LAYER)),
                ("tooltip", json!(TILE_LAYER)),
                ("tile_ref", json!(t.tile_ref)),
                ("color", json!(TILE_COLOR)),
            ]);
            for (k, v) in &t.attributes {
                properties.entry(k.clone()).or_insert_with(|| json!(v));
            }
            to_feature(&Geometry::MultiPolygon(t.boundary.clone()), properties)
        })
        .collect();
    MapLayer {
        name: TILE_LAYER.to_string(),
        color: TILE_COLOR.to_string(),
        features,
    }
}

fn overlay_layer(overlay: &Overlay) -> MapLayer {
    let features = overlay
        .features
        .iter()
        .map(|f| {
            let mut properties = props([
                ("layer", json!(overlay.name)),
                ("tooltip", json!(overlay.name)),
                ("color", json!(overlay.color)),
                ("fill_opacity", json!(0.5)),
            ]);
            for (k, v) in &f.attributes {
                properties.entry(k.clone()).or_insert_with(|| json!(v));
            }
            to_feature(&f.geometry, properties)
        })
        .collect();
    MapLayer {
        name: overlay.name.clone(),
        color: overlay.color.clone(),
        features,
    }
}

impl MapView {
    /// Builds the map from data already in the geographic target system.
    ///
    /// The view is centred on the mean position of the first dataset.
    pub fn build(datasets: &[SurveyDataset], tiles: &TileSet, overlays: &[Overlay]) -> Self {
        let mut layers: Vec<MapLayer> = datasets.iter().map(point_layer).collect();
        layers.push(tile_layer(tiles));
        layers.extend(overlays.iter().map(overlay_layer));
        Self {
            center: datasets.first().and_then(SurveyDataset::mean_lon_lat),
            zoom: DEFAULT_ZOOM,
            layers,
        }
    }

    pub fn from_data(data: &SurveyData) -> Result<Self> {
        let tiles = data.tiles_in_target()?;
        Ok(Self::build(&data.datasets, &tiles, &data.overlays))
    }

    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|l| l.features.len()).sum()
    }

    pub fn to_geojson(&self) -> FeatureCollection {
        let mut foreign = JsonObject::new();
        if let Some((lon, lat)) = self.center {
            foreign.insert("center".to_string(), json!([lat, lon]));
        }
        foreign.insert("zoom".to_string(), json!(self.zoom));
        foreign.insert(
            "layers".to_string(),
            json!(self
                .layers
                .iter()
                .map(|l| json!({ "name": l.name, "color": l.color }))
                .collect::<Vec<_>>()),
        );
        FeatureCollection {
            bbox: None,
            features: self.layers.iter().flat_map(|l| l.features.iter().cloned()).collect(),
            foreign_members: Some(foreign),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_feature_collection(path, &self.to_geojson())?;
        log::info!(
            "wrote {} features in {} layers to {}",
            self.feature_count(),
            self.layers.len(),
            path.display()
        );
        Ok(())
    }
}
