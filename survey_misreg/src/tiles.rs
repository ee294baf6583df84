//! Tile polygons and the point containment predicate.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use geo::{Contains, Intersects};
use geo_types::{MultiPolygon, Point};

use crate::crs::{Crs, Reprojector};
use crate::error::{Error, Result};
use crate::gis::reproject_geometry;

/// Default attribute holding the tile identifier.
pub const TILE_REF_FIELD: &str = "tile_ref";

/// How points lying exactly on a tile boundary are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Containment {
    /// OGC `contains`: the point must lie in the interior, boundary points are
    /// excluded.
    #[default]
    Interior,
    /// OGC `covers`: boundary points are included.
    Covers,
}

impl Containment {
    /// Evaluates the predicate. NaN coordinates are never contained.
    pub fn test(self, boundary: &MultiPolygon<f64>, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        let p = Point::new(x, y);
        match self {
            Containment::Interior => boundary.contains(&p),
            Containment::Covers => boundary.intersects(&p),
        }
    }
}

impl FromStr for Containment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interior" | "within" => Ok(Containment::Interior),
            "covers" | "boundary" => Ok(Containment::Covers),
            other => Err(format!("unknown containment `{other}` (expected interior or covers)")),
        }
    }
}

impl fmt::Display for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Containment::Interior => "interior",
            Containment::Covers => "covers",
        })
    }
}

/// A named spatial region used to partition survey data.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub tile_ref: String,
    pub boundary: MultiPolygon<f64>,
    /// Remaining attributes of the source record.
    pub attributes: BTreeMap<String, String>,
}

impl Tile {
    pub fn new(tile_ref: impl Into<String>, boundary: MultiPolygon<f64>) -> Self {
        Self {
            tile_ref: tile_ref.into(),
            boundary,
            attributes: BTreeMap::new(),
        }
    }

    pub fn contains(&self, x: f64, y: f64, containment: Containment) -> bool {
        containment.test(&self.boundary, x, y)
    }
}

/// Reference set of tiles sharing one coordinate system.
#[derive(Debug, Clone)]
pub struct TileSet {
    crs: Crs,
    tiles: Vec<Tile>,
    index: HashMap<String, usize>,
}

impl TileSet {
    /// Builds the set. When identifiers repeat the first tile wins and the
    /// later ones are dropped.
    pub fn new(crs: Crs, tiles: Vec<Tile>) -> Self {
        let mut index = HashMap::with_capacity(tiles.len());
        let mut kept = Vec::with_capacity(tiles.len());
        for t in tiles {
            if index.contains_key(&t.tile_ref) {
                log::warn!("duplicate tile_ref `{}` ignored", t.tile_ref);
                continue;
            }
            index.insert(t.tile_ref.clone(), kept.len());
            kept.push(t);
        }
        Self {
            crs,
            tiles: kept,
            index,
        }
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// Looks up a tile by identifier.
    pub fn get(&self, tile_ref: &str) -> Result<&Tile> {
        self.index
            .get(tile_ref.trim())
            .map(|&i| &self.tiles[i])
            .ok_or_else(|| Error::TileNotFound {
                tile_ref: tile_ref.to_string(),
                available: self.tiles.len(),
            })
    }

    /// Returns the set with every boundary transformed into the reprojector's
    /// target system.
    pub fn reprojected(&self, reprojector: &Reprojector) -> TileSet {
        let tiles = self
            .tiles
            .iter()
            .map(|t| Tile {
                tile_ref: t.tile_ref.clone(),
                boundary: reproject_geometry(&t.boundary, reprojector),
                attributes: t.attributes.clone(),
            })
            .collect();
        TileSet::new(reprojector.target().clone(), tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn unit_tile(name: &str) -> Tile {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        Tile::new(name, MultiPolygon(vec![poly]))
    }

    #[test]
    fn interior_excludes_boundary() {
        let t = unit_tile("A");
        assert!(t.contains(5.0, 5.0, Containment::Interior));
        assert!(!t.contains(10.0, 5.0, Containment::Interior));
        assert!(!t.contains(11.0, 5.0, Containment::Interior));
    }

    #[test]
    fn covers_includes_boundary() {
        let t = unit_tile("A");
        assert!(t.contains(10.0, 5.0, Containment::Covers));
        assert!(t.contains(0.0, 0.0, Containment::Covers));
        assert!(!t.contains(10.5, 5.0, Containment::Covers));
    }

    #[test]
    fn nan_is_never_inside() {
        let t = unit_tile("A");
        assert!(!t.contains(f64::NAN, 5.0, Containment::Covers));
    }

    #[test]
    fn unknown_tile_is_an_error() {
        let set = TileSet::new(Crs::wgs84(), vec![unit_tile("A"), unit_tile("B")]);
        assert!(set.get("A").is_ok());
        match set.get("Z") {
            Err(Error::TileNotFound { tile_ref, available }) => {
                assert_eq!(tile_ref, "Z");
                assert_eq!(available, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_refs_keep_first() {
        let mut second = unit_tile("A");
        second.attributes.insert("n".into(), "2".into());
        let set = TileSet::new(Crs::wgs84(), vec![unit_tile("A"), second, unit_tile("B")]);
        assert!(set.get("A").unwrap().attributes.is_empty());
        assert_eq!(set.len(), 2);
        let refs: Vec<&str> = set.iter().map(|t| t.tile_ref.as_str()).collect();
        assert_eq!(refs, vec!["A", "B"]);
        assert!(set.get("B").is_ok());
    }

    #[test]
    fn containment_parses() {
        assert_eq!("covers".parse::<Containment>().unwrap(), Containment::Covers);
        assert_eq!("Interior".parse::<Containment>().unwrap(), Containment::Interior);
        assert!("edge".parse::<Containment>().is_err());
    }
}
