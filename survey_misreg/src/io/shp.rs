use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::path::Path;

use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point as ShpPoint, Polygon as ShpPolygon, PolygonRing, Reader, Shape, Writer};

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::gis::{Feature, Overlay};
use crate::io::{prj_path, write_string};
use crate::tiles::Tile;

fn shp_err(path: &Path) -> impl FnOnce(shapefile::Error) -> Error + '_ {
    move |source| Error::Shapefile {
        path: path.to_path_buf(),
        source,
    }
}

fn field_value_to_string(v: &FieldValue) -> String {
    match v {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Character(None) => String::new(),
        // Identifiers stored as numbers should not grow a trailing `.0`.
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        FieldValue::Numeric(Some(n)) => n.to_string(),
        FieldValue::Numeric(None) => String::new(),
        FieldValue::Logical(Some(b)) => b.to_string(),
        FieldValue::Logical(None) => String::new(),
        FieldValue::Date(Some(d)) => format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day()),
        FieldValue::Date(None) => String::new(),
        FieldValue::Float(Some(f)) => f.to_string(),
        FieldValue::Float(None) => String::new(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Currency(c) => c.to_string(),
        FieldValue::DateTime(dt) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            dt.date().year(),
            dt.date().month(),
            dt.date().day(),
            dt.time().hours(),
            dt.time().minutes(),
            dt.time().seconds()
        ),
        FieldValue::Double(d) => d.to_string(),
        FieldValue::Memo(s) => s.trim().to_string(),
    }
}

fn record_attributes(record: Record) -> BTreeMap<String, String> {
    record
        .into_iter()
        .map(|(k, v)| {
            let value = field_value_to_string(&v);
            (k, value)
        })
        .collect()
}

fn line_string<P>(points: &[P], xy: impl Fn(&P) -> Coord<f64>) -> LineString<f64> {
    LineString(points.iter().map(xy).collect())
}

/// Outer rings start a new polygon; inner rings become holes of the most
/// recent outer ring.
fn rings_to_multipolygon<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord<f64> + Copy) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    for ring in rings {
        let ls = line_string(ring.points(), xy);
        match ring {
            PolygonRing::Outer(_) => polys.push(Polygon::new(ls, Vec::new())),
            PolygonRing::Inner(_) => match polys.last_mut() {
                Some(outer) => outer.interiors_push(ls),
                None => polys.push(Polygon::new(ls, Vec::new())),
            },
        }
    }
    MultiPolygon(polys)
}

fn parts_to_multiline<P>(parts: &[Vec<P>], xy: impl Fn(&P) -> Coord<f64> + Copy) -> MultiLineString<f64> {
    MultiLineString(parts.iter().map(|part| line_string(part, xy)).collect())
}

/// Converts a shape to a 2D geometry, dropping Z and M values.
pub fn shape_to_geometry(shape: Shape) -> Option<Geometry<f64>> {
    let geom = match shape {
        Shape::NullShape => return None,
        Shape::Point(p) => Geometry::Point((p.x, p.y).into()),
        Shape::PointM(p) => Geometry::Point((p.x, p.y).into()),
        Shape::PointZ(p) => Geometry::Point((p.x, p.y).into()),
        Shape::Polyline(pl) => {
            Geometry::MultiLineString(parts_to_multiline(pl.parts(), |p| Coord { x: p.x, y: p.y }))
        }
        Shape::PolylineM(pl) => {
            Geometry::MultiLineString(parts_to_multiline(pl.parts(), |p| Coord { x: p.x, y: p.y }))
        }
        Shape::PolylineZ(pl) => {
            Geometry::MultiLineString(parts_to_multiline(pl.parts(), |p| Coord { x: p.x, y: p.y }))
        }
        Shape::Polygon(pg) => {
            Geometry::MultiPolygon(rings_to_multipolygon(pg.rings(), |p| Coord { x: p.x, y: p.y }))
        }
        Shape::PolygonM(pg) => {
            Geometry::MultiPolygon(rings_to_multipolygon(pg.rings(), |p| Coord { x: p.x, y: p.y }))
        }
        Shape::PolygonZ(pg) => {
            Geometry::MultiPolygon(rings_to_multipolygon(pg.rings(), |p| Coord { x: p.x, y: p.y }))
        }
        Shape::Multipoint(mp) => Geometry::MultiPoint(MultiPoint(
            mp.points().iter().map(|p| (p.x, p.y).into()).collect(),
        )),
        Shape::MultipointM(mp) => Geometry::MultiPoint(MultiPoint(
            mp.points().iter().map(|p| (p.x, p.y).into()).collect(),
        )),
        Shape::MultipointZ(mp) => Geometry::MultiPoint(MultiPoint(
            mp.points().iter().map(|p| (p.x, p.y).into()).collect(),
        )),
        Shape::Multipatch(_) => return None,
    };
    Some(geom)
}

/// Reads tile polygons from a shapefile, using `id_field` as the identifier.
pub fn read_tiles_shp(path: &Path, id_field: &str) -> Result<Vec<Tile>> {
    let mut reader = Reader::from_path(path).map_err(shp_err(path))?;
    let mut tiles = Vec::new();
    for (idx, res) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = res.map_err(shp_err(path))?;
        let mut attributes = record_attributes(record);
        let tile_ref = attributes
            .remove(id_field)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingTileId {
                path: path.to_path_buf(),
                record: idx + 1,
                field: id_field.to_string(),
            })?;
        let boundary = match shape_to_geometry(shape) {
            Some(Geometry::MultiPolygon(mp)) => mp,
            Some(_) => {
                log::warn!("{}: tile {} is not a polygon, skipped", path.display(), tile_ref);
                continue;
            }
            None => {
                log::warn!("{}: tile {} has no geometry, skipped", path.display(), tile_ref);
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

/// Reads every shape of a shapefile as an overlay layer.
pub fn read_overlay_shp(path: &Path, name: &str, crs: Crs, color: &str) -> Result<Overlay> {
    let mut reader = Reader::from_path(path).map_err(shp_err(path))?;
    let mut features = Vec::new();
    for res in reader.iter_shapes_and_records() {
        let (shape, record) = res.map_err(shp_err(path))?;
        if let Some(geometry) = shape_to_geometry(shape) {
            let mut feature = Feature::with_attributes(geometry, record_attributes(record));
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

fn field_name(name: &str, path: &Path) -> Result<FieldName> {
    FieldName::try_from(name).map_err(|_| Error::Report {
        path: path.to_path_buf(),
        message: format!("`{name}` is not a valid dBase field name (max 10 characters)"),
    })
}

/// Writes tiles with a `points` attribute holding the number of survey
/// points inside each one. The CRS definition is always written to a `.prj`
/// sidecar so the file reloads in the same system.
pub fn write_tiles_shp(path: &Path, tiles: &[(&Tile, usize)], id_field: &str, crs: &Crs) -> Result<()> {
    let builder = TableWriterBuilder::new()
        .add_character_field(field_name(id_field, path)?, 64)
        .add_numeric_field(field_name("points", path)?, 10, 0);
    let mut writer = Writer::from_path(path, builder).map_err(shp_err(path))?;
    for (tile, count) in tiles {
        let rings: Vec<PolygonRing<ShpPoint>> = tile
            .boundary
            .iter()
            .flat_map(|poly| {
                let to_pts = |ls: &LineString<f64>| -> Vec<ShpPoint> {
                    ls.coords().map(|c| ShpPoint { x: c.x, y: c.y }).collect()
                };
                std::iter::once(PolygonRing::Outer(to_pts(poly.exterior())))
                    .chain(poly.interiors().iter().map(move |i| PolygonRing::Inner(to_pts(i))))
            })
            .collect();
        if rings.is_empty() {
            continue;
        }
        let mut r = Record::default();
        r.insert(id_field.to_string(), FieldValue::Character(Some(tile.tile_ref.clone())));
        r.insert("points".to_string(), FieldValue::Numeric(Some(*count as f64)));
        let shape = ShpPolygon::with_rings(rings);
        writer.write_shape_and_record(&shape, &r).map_err(shp_err(path))?;
    }
    write_string(&prj_path(path), crs.definition())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    #[test]
    fn numeric_ids_have_no_fraction() {
        assert_eq!(field_value_to_string(&FieldValue::Numeric(Some(12.0))), "12");
        assert_eq!(field_value_to_string(&FieldValue::Numeric(Some(1.5))), "1.5");
        assert_eq!(
            field_value_to_string(&FieldValue::Character(Some("SX90 ".into()))),
            "SX90"
        );
    }

    #[test]
    fn holes_attach_to_outer_ring() {
        let outer = vec![
            ShpPoint { x: 0.0, y: 0.0 },
            ShpPoint { x: 0.0, y: 10.0 },
            ShpPoint { x: 10.0, y: 10.0 },
            ShpPoint { x: 10.0, y: 0.0 },
            ShpPoint { x: 0.0, y: 0.0 },
        ];
        let inner = vec![
            ShpPoint { x: 4.0, y: 4.0 },
            ShpPoint { x: 6.0, y: 4.0 },
            ShpPoint { x: 6.0, y: 6.0 },
            ShpPoint { x: 4.0, y: 6.0 },
            ShpPoint { x: 4.0, y: 4.0 },
        ];
        let mp = rings_to_multipolygon(
            &[PolygonRing::Outer(outer), PolygonRing::Inner(inner)],
            |p| Coord { x: p.x, y: p.y },
        );
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
    }

    #[test]
    fn tiles_roundtrip_with_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.shp");
        let tile = Tile::new(
            "ST1020",
            MultiPolygon(vec![polygon![
                (x: 310000.0, y: 120000.0),
                (x: 310000.0, y: 121000.0),
                (x: 311000.0, y: 121000.0),
                (x: 311000.0, y: 120000.0),
                (x: 310000.0, y: 120000.0),
            ]]),
        );
        write_tiles_shp(&path, &[(&tile, 7)], "tile_ref", &Crs::british_national_grid()).unwrap();
        let tiles = read_tiles_shp(&path, "tile_ref").unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].tile_ref, "ST1020");
        assert_eq!(tiles[0].attributes.get("points").map(String::as_str), Some("7"));
        assert_eq!(tiles[0].boundary.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn missing_id_field_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.shp");
        let tile = Tile::new(
            "A",
            MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)]]),
        );
        write_tiles_shp(&path, &[(&tile, 0)], "tile_ref", &Crs::wgs84()).unwrap();
        assert!(matches!(
            read_tiles_shp(&path, "name"),
            Err(Error::MissingTileId { record: 1, .. })
        ));
    }
}
