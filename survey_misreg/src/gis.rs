use std::collections::BTreeMap;

use geo::MapCoords;
use geo_types::{Coord, Geometry};

use crate::crs::{Crs, Reprojector};

/// Wrapper linking a geometry with optional feature class and GIS attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<T> {
    /// Optional feature class name, e.g. layer or category.
    pub class: Option<String>,
    /// Arbitrary attribute key/value pairs.
    pub attributes: BTreeMap<String, String>,
    /// Underlying geometry.
    pub geometry: T,
}

impl<T> Feature<T> {
    /// Creates a new feature with empty attributes.
    pub fn new(geometry: T) -> Self {
        Self {
            class: None,
            attributes: BTreeMap::new(),
            geometry,
        }
    }

    /// Creates a feature carrying the given attributes.
    pub fn with_attributes(geometry: T, attributes: BTreeMap<String, String>) -> Self {
        Self {
            class: None,
            attributes,
            geometry,
        }
    }
}

/// A reference layer drawn under the survey points, e.g. county boundaries or
/// the central meridian.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub name: String,
    pub crs: Crs,
    /// CSS colour used when the layer is drawn.
    pub color: String,
    pub features: Vec<Feature<Geometry<f64>>>,
}

impl Overlay {
    /// Returns a copy of this overlay expressed in the reprojector's target
    /// system.
    pub fn reprojected(&self, reprojector: &Reprojector) -> Overlay {
        Overlay {
            name: self.name.clone(),
            crs: reprojector.target().clone(),
            color: self.color.clone(),
            features: self
                .features
                .iter()
                .map(|f| Feature {
                    class: f.class.clone(),
                    attributes: f.attributes.clone(),
                    geometry: reproject_geometry(&f.geometry, reprojector),
                })
                .collect(),
        }
    }
}

/// Transforms every vertex of `geometry`. Vertices outside the source domain
/// become NaN, matching the per-row behaviour for survey points.
pub fn reproject_geometry<G>(geometry: &G, reprojector: &Reprojector) -> G::Output
where
    G: MapCoords<f64, f64>,
{
    geometry.map_coords(|c: Coord<f64>| {
        let (x, y) = reprojector.project(c.x, c.y);
        Coord { x, y }
    })
}
