//! Loading survey inputs once and aligning them to common coordinate systems.

use std::path::Path;

use crate::config::ProjectConfig;
use crate::crs::Crs;
use crate::error::Result;
#[cfg(not(feature = "shapefile"))]
use crate::error::Error;
use crate::gis::Overlay;
use crate::io;
use crate::io::csv::read_survey_csv;
use crate::summary::{summarize_tile, tile_occupancy, CoordFrame, StatsScope, SummaryOptions, TileOccupancy, TileSummary};
use crate::survey::SurveyDataset;
use crate::tiles::{Containment, Tile, TileSet};

/// Source of the immutable collections a summary runs over.
pub trait Loader {
    /// Survey tables without derived geographic coordinates.
    fn load_datasets(&self) -> Result<Vec<SurveyDataset>>;
    /// Tile polygons in their own reference system.
    fn load_tiles(&self) -> Result<TileSet>;
    /// Reference layers in their own reference systems.
    fn load_overlays(&self) -> Result<Vec<Overlay>>;
}

/// Loads everything named by a [`ProjectConfig`] from disk.
#[derive(Debug, Clone)]
pub struct FileLoader {
    config: ProjectConfig,
}

impl FileLoader {
    pub fn new(config: ProjectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// CRS of a polygon file: explicit EPSG code, then `.prj` sidecar, then
    /// WGS84 for GeoJSON, then the survey source system.
    fn layer_crs(&self, path: &Path, epsg: Option<u32>) -> Result<Crs> {
        if let Some(code) = epsg {
            return Ok(Crs::from_epsg(code));
        }
        if let Some(crs) = io::read_prj(path)? {
            return Ok(crs);
        }
        if io::is_geojson(path) {
            return Ok(Crs::wgs84());
        }
        Ok(self.config.source_crs())
    }
}

#[cfg(feature = "shapefile")]
fn read_tiles_shp(path: &Path, id_field: &str) -> Result<Vec<Tile>> {
    io::shp::read_tiles_shp(path, id_field)
}

#[cfg(feature = "shapefile")]
fn read_overlay_shp(path: &Path, name: &str, crs: Crs, color: &str) -> Result<Overlay> {
    io::shp::read_overlay_shp(path, name, crs, color)
}

#[cfg(not(feature = "shapefile"))]
fn shapefile_unsupported(path: &Path) -> Error {
    Error::io(
        "reading",
        path,
        std::io::Error::new(std::io::ErrorKind::Unsupported, "built without shapefile support"),
    )
}

#[cfg(not(feature = "shapefile"))]
fn read_tiles_shp(path: &Path, _id_field: &str) -> Result<Vec<Tile>> {
    Err(shapefile_unsupported(path))
}

#[cfg(not(feature = "shapefile"))]
fn read_overlay_shp(path: &Path, _name: &str, _crs: Crs, _color: &str) -> Result<Overlay> {
    Err(shapefile_unsupported(path))
}

impl Loader for FileLoader {
    fn load_datasets(&self) -> Result<Vec<SurveyDataset>> {
        self.config
            .datasets
            .iter()
            .map(|ds| read_survey_csv(&ds.path, ds.name.as_deref(), &self.config.columns))
            .collect()
    }

    fn load_tiles(&self) -> Result<TileSet> {
        let cfg = &self.config.tiles;
        let crs = self.layer_crs(&cfg.path, cfg.epsg)?;
        let tiles = if io::is_geojson(&cfg.path) {
            io::geojson::read_tiles_geojson(&cfg.path, &cfg.id_field)?
        } else {
            read_tiles_shp(&cfg.path, &cfg.id_field)?
        };
        log::debug!("tiles are in {}", crs);
        Ok(TileSet::new(crs, tiles))
    }

    fn load_overlays(&self) -> Result<Vec<Overlay>> {
        self.config
            .overlays
            .iter()
            .map(|ov| {
                let crs = self.layer_crs(&ov.path, ov.epsg)?;
                if io::is_geojson(&ov.path) {
                    io::geojson::read_overlay_geojson(&ov.path, &ov.name, crs, &ov.color)
                } else {
                    read_overlay_shp(&ov.path, &ov.name, crs, &ov.color)
                }
            })
            .collect()
    }
}

/// Everything read at start-up, aligned for tile summaries.
///
/// Datasets carry derived longitude/latitude, overlays are in the target
/// system and tiles are either left in the survey source system or the target
/// system, whichever they already match; tiles in any other system are
/// reprojected to the target system.
#[derive(Debug, Clone)]
pub struct SurveyData {
    pub datasets: Vec<SurveyDataset>,
    pub tiles: TileSet,
    pub overlays: Vec<Overlay>,
    pub frame: CoordFrame,
    source: Crs,
    target: Crs,
}

impl SurveyData {
    pub fn load(loader: &dyn Loader, source: &Crs, target: &Crs) -> Result<Self> {
        let reprojector = source.to(target)?;
        let datasets: Vec<SurveyDataset> = loader
            .load_datasets()?
            .into_iter()
            .map(|ds| ds.reproject(&reprojector))
            .collect();

        let tiles = loader.load_tiles()?;
        let (tiles, frame) = match CoordFrame::for_tiles(tiles.crs(), source, target) {
            Some(frame) => (tiles, frame),
            None => {
                log::info!("reprojecting {} tiles from {} to {}", tiles.len(), tiles.crs(), target);
                let rp = tiles.crs().to(target)?;
                (tiles.reprojected(&rp), CoordFrame::Geographic)
            }
        };

        let overlays = loader
            .load_overlays()?
            .into_iter()
            .map(|ov| {
                if &ov.crs == target {
                    Ok(ov)
                } else {
                    let rp = ov.crs.to(target)?;
                    Ok(ov.reprojected(&rp))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "loaded {} datasets ({} points), {} tiles, {} overlays",
            datasets.len(),
            datasets.iter().map(SurveyDataset::len).sum::<usize>(),
            tiles.len(),
            overlays.len()
        );
        Ok(Self {
            datasets,
            tiles,
            overlays,
            frame,
            source: source.clone(),
            target: target.clone(),
        })
    }

    /// Loads the inputs named by `config` from disk.
    pub fn from_config(config: &ProjectConfig) -> Result<Self> {
        let loader = FileLoader::new(config.clone());
        Self::load(&loader, &config.source_crs(), &config.target_crs())
    }

    pub fn source_crs(&self) -> &Crs {
        &self.source
    }

    pub fn target_crs(&self) -> &Crs {
        &self.target
    }

    /// Summary options matching how the tiles were aligned.
    pub fn options(&self, containment: Containment, scope: StatsScope, offset_fields: Vec<String>) -> SummaryOptions {
        SummaryOptions {
            containment,
            scope,
            frame: self.frame,
            offset_fields,
        }
    }

    pub fn summarize(&self, tile_ref: &str, options: &SummaryOptions) -> Result<TileSummary<'_>> {
        summarize_tile(&self.datasets, &self.tiles, tile_ref, options)
    }

    pub fn occupancy(&self, containment: Containment) -> Vec<TileOccupancy> {
        tile_occupancy(&self.datasets, &self.tiles, containment, self.frame)
    }

    /// The tiles expressed in the target system, for display.
    pub fn tiles_in_target(&self) -> Result<TileSet> {
        match self.frame {
            CoordFrame::Geographic => Ok(self.tiles.clone()),
            CoordFrame::Projected => Ok(self.tiles.reprojected(&self.source.to(&self.target)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{SurveyPoint, DISTANCE_EASTING};
    use crate::tiles::Tile;
    use geo_types::{polygon, MultiPolygon};
    use std::collections::BTreeMap;

    struct MemoryLoader {
        tiles_crs: Crs,
    }

    impl Loader for MemoryLoader {
        fn load_datasets(&self) -> Result<Vec<SurveyDataset>> {
            let mut offsets = BTreeMap::new();
            offsets.insert(DISTANCE_EASTING.to_string(), 0.1);
            Ok(vec![SurveyDataset::new(
                "mem",
                vec![DISTANCE_EASTING.to_string()],
                vec![SurveyPoint::new(292_500.0, 92_500.0, offsets)],
            )])
        }

        fn load_tiles(&self) -> Result<TileSet> {
            let sq = polygon![
                (x: 292_000.0, y: 92_000.0),
                (x: 293_000.0, y: 92_000.0),
                (x: 293_000.0, y: 93_000.0),
                (x: 292_000.0, y: 93_000.0),
                (x: 292_000.0, y: 92_000.0),
            ];
            Ok(TileSet::new(self.tiles_crs.clone(), vec![Tile::new("SX9292", MultiPolygon(vec![sq]))]))
        }

        fn load_overlays(&self) -> Result<Vec<Overlay>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn tiles_in_source_system_use_native_coordinates() {
        let loader = MemoryLoader {
            tiles_crs: Crs::british_national_grid(),
        };
        let data = SurveyData::load(&loader, &Crs::british_national_grid(), &Crs::wgs84()).unwrap();
        assert_eq!(data.frame, CoordFrame::Projected);
        assert!(data.datasets[0].points()[0].has_lon_lat());
        let opts = data.options(Containment::Interior, StatsScope::Tile, vec![DISTANCE_EASTING.into()]);
        assert_eq!(data.summarize("SX9292", &opts).unwrap().count(), 1);
    }

    #[test]
    fn tiles_in_display_system_are_reprojected_for_the_map() {
        let loader = MemoryLoader {
            tiles_crs: Crs::british_national_grid(),
        };
        let data = SurveyData::load(&loader, &Crs::british_national_grid(), &Crs::wgs84()).unwrap();
        let display = data.tiles_in_target().unwrap();
        assert_eq!(display.crs(), &Crs::wgs84());
        let tile = display.get("SX9292").unwrap();
        let p = &data.datasets[0].points()[0];
        assert!(tile.contains(p.longitude, p.latitude, Containment::Interior));
    }

    #[test]
    fn layer_crs_prefers_sidecar_over_geojson_default() {
        let dir = tempfile::tempdir().unwrap();
        let tiles = dir.path().join("tiles.geojson");
        let loader = FileLoader::new(ProjectConfig::new(Vec::new(), tiles.clone()));
        assert_eq!(loader.layer_crs(&tiles, None).unwrap(), Crs::wgs84());
        std::fs::write(dir.path().join("tiles.prj"), "EPSG:27700").unwrap();
        assert_eq!(loader.layer_crs(&tiles, None).unwrap(), Crs::british_national_grid());
        assert_eq!(loader.layer_crs(&tiles, Some(3857)).unwrap(), Crs::from_epsg(3857));
        let shp = dir.path().join("bare.shp");
        assert_eq!(loader.layer_crs(&shp, None).unwrap(), loader.config().source_crs());
    }
}
