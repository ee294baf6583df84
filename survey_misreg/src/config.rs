//! Project configuration: which tables, tiles and overlays to load and how.
//!
//! Stored as pretty-printed JSON. Relative paths inside the file are resolved
//! against the directory holding the file.

use std::path::{Path, PathBuf};

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::io::csv::SurveyColumns;
use crate::summary::StatsScope;
use crate::tiles::{Containment, TILE_REF_FIELD};

/// Default projected system of the survey tables (British National Grid).
pub const DEFAULT_SOURCE_EPSG: u32 = 27700;
/// Default geographic system for derived coordinates (WGS84).
pub const DEFAULT_TARGET_EPSG: u32 = 4326;

/// One survey table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    /// Display name; derived from the file name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The tile reference layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TilesConfig {
    pub path: PathBuf,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Overrides the CRS found in a `.prj` sidecar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsg: Option<u32>,
}

fn default_id_field() -> String {
    TILE_REF_FIELD.to_string()
}

/// A reference layer drawn with the survey points.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverlayConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsg: Option<u32>,
    #[serde(default = "default_overlay_color")]
    pub color: String,
}

fn default_overlay_color() -> String {
    "black".to_string()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_source_epsg")]
    pub source_epsg: u32,
    #[serde(default = "default_target_epsg")]
    pub target_epsg: u32,
    pub datasets: Vec<DatasetConfig>,
    pub tiles: TilesConfig,
    #[serde(default)]
    pub overlays: Vec<OverlayConfig>,
    #[serde(default)]
    pub columns: SurveyColumns,
    #[serde(default)]
    pub containment: Containment,
    #[serde(default)]
    pub stats_scope: StatsScope,
}

fn default_source_epsg() -> u32 {
    DEFAULT_SOURCE_EPSG
}

fn default_target_epsg() -> u32 {
    DEFAULT_TARGET_EPSG
}

impl ProjectConfig {
    /// Creates a configuration with default settings for the given inputs.
    pub fn new(datasets: Vec<PathBuf>, tiles: PathBuf) -> Self {
        Self {
            source_epsg: DEFAULT_SOURCE_EPSG,
            target_epsg: DEFAULT_TARGET_EPSG,
            datasets: datasets
                .into_iter()
                .map(|path| DatasetConfig { path, name: None })
                .collect(),
            tiles: TilesConfig {
                path: tiles,
                id_field: default_id_field(),
                epsg: None,
            },
            overlays: Vec::new(),
            columns: SurveyColumns::default(),
            containment: Containment::default(),
            stats_scope: StatsScope::default(),
        }
    }

    /// Template matching the layout of the south-west mesh survey.
    pub fn template() -> Self {
        let mut cfg = Self::new(
            vec![
                PathBuf::from("data/STSW_1_Data.csv"),
                PathBuf::from("data/STSW_2_Data.csv"),
                PathBuf::from("data/STNE_2_Data.csv"),
            ],
            PathBuf::from("shapefiles/Standard_southwest_mesh_tiles.shp"),
        );
        cfg.overlays = vec![
            OverlayConfig {
                name: "Central Meridian".to_string(),
                path: PathBuf::from("shapefiles/central_meridian.shp"),
                epsg: None,
                color: "black".to_string(),
            },
            OverlayConfig {
                name: "County Boundaries".to_string(),
                path: PathBuf::from("shapefiles/county_boundaries.shp"),
                epsg: None,
                color: "orange".to_string(),
            },
        ];
        cfg
    }

    pub fn source_crs(&self) -> Crs {
        Crs::from_epsg(self.source_epsg)
    }

    pub fn target_crs(&self) -> Crs {
        Crs::from_epsg(self.target_epsg)
    }

    /// Rewrites relative paths so they are relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        for ds in &mut self.datasets {
            fix(&mut ds.path);
        }
        fix(&mut self.tiles.path);
        for ov in &mut self.overlays {
            fix(&mut ov.path);
        }
    }

    /// Saves this configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        crate::io::write_string(path, &json)
    }

    /// Loads a configuration from a JSON file, resolving relative paths
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let data = crate::io::read_to_string(path)?;
        let mut cfg: ProjectConfig = serde_json::from_str(&data).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(dir) = path.parent() {
            cfg.resolve_paths(dir);
        }
        Ok(cfg)
    }
}
