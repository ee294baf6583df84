//! Core library for survey misregistration analysis.
//!
//! Survey tables in a projected grid are reprojected to geographic
//! coordinates, matched against a set of reference tiles and summarised as
//! offset statistics per tile.

pub mod config;
pub mod crs;
pub mod error;
pub mod gis;
pub mod io;
pub mod loader;
pub mod map;
pub mod reporting;
pub mod stats;
pub mod summary;
pub mod survey;
pub mod tiles;

pub use config::ProjectConfig;
pub use crs::{Crs, Reprojector};
pub use error::{Error, Result};
pub use loader::{FileLoader, Loader, SurveyData};
pub use stats::OffsetStats;
pub use summary::{summarize_tile, CoordFrame, StatsScope, SummaryOptions, TileSummary};
pub use survey::{SurveyDataset, SurveyPoint};
pub use tiles::{Containment, Tile, TileSet};
