//! Per-tile point filtering and offset statistics.
//!
//! A summary is recomputed from scratch for every selection: the containment
//! test runs over all loaded points and nothing is cached between calls.

use std::fmt;
use std::str::FromStr;

use crate::crs::Crs;
use crate::error::Result;
use crate::stats::OffsetStats;
use crate::survey::{SurveyDataset, SurveyPoint, DISTANCE_EASTING, DISTANCE_NORTHING};
use crate::tiles::{Containment, TileSet};

/// Which coordinate pair of a [`SurveyPoint`] is compared with the tile
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordFrame {
    /// Native easting/northing.
    Projected,
    /// Reprojected longitude/latitude.
    Geographic,
}

impl CoordFrame {
    /// Picks the frame matching `tiles`, or `None` when the tiles are in a
    /// third system and have to be reprojected first.
    pub fn for_tiles(tiles: &Crs, source: &Crs, target: &Crs) -> Option<CoordFrame> {
        if tiles == source {
            Some(CoordFrame::Projected)
        } else if tiles == target {
            Some(CoordFrame::Geographic)
        } else {
            None
        }
    }

    pub fn coords(self, p: &SurveyPoint) -> (f64, f64) {
        match self {
            CoordFrame::Projected => (p.easting, p.northing),
            CoordFrame::Geographic => (p.longitude, p.latitude),
        }
    }
}

/// Point set the offset statistics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsScope {
    /// Every loaded point, whatever tile is selected. This reproduces the
    /// dashboard the tool replaces and is probably not what its owners meant.
    #[default]
    Dataset,
    /// Only the points inside the selected tile.
    Tile,
}

impl FromStr for StatsScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dataset" | "all" => Ok(StatsScope::Dataset),
            "tile" => Ok(StatsScope::Tile),
            other => Err(format!("unknown stats scope `{other}` (expected dataset or tile)")),
        }
    }
}

impl fmt::Display for StatsScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatsScope::Dataset => "dataset",
            StatsScope::Tile => "tile",
        })
    }
}

/// Knobs for [`summarize_tile`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOptions {
    pub containment: Containment,
    pub scope: StatsScope,
    pub frame: CoordFrame,
    pub offset_fields: Vec<String>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            containment: Containment::default(),
            scope: StatsScope::default(),
            frame: CoordFrame::Geographic,
            offset_fields: vec![DISTANCE_EASTING.to_string(), DISTANCE_NORTHING.to_string()],
        }
    }
}

/// A survey point found inside the selected tile.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TilePoint<'a> {
    pub dataset: &'a str,
    /// Zero-based row within the dataset.
    pub row: usize,
    pub point: &'a SurveyPoint,
}

/// Statistics of one offset field.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldStats {
    pub field: String,
    pub stats: OffsetStats,
}

/// Result of one tile selection.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TileSummary<'a> {
    pub tile_ref: String,
    pub containment: Containment,
    pub scope: StatsScope,
    /// Number of points the containment test ran over.
    pub total_points: usize,
    pub points: Vec<TilePoint<'a>>,
    pub fields: Vec<FieldStats>,
}

impl TileSummary<'_> {
    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn field(&self, name: &str) -> Option<&OffsetStats> {
        self.fields.iter().find(|f| f.field == name).map(|f| &f.stats)
    }
}

/// Filters the points inside `tile_ref` and computes offset statistics.
///
/// Fails with [`Error::TileNotFound`](crate::Error::TileNotFound) when the
/// identifier is not in `tiles`. `tiles` must already be in the system named
/// by `options.frame`.
pub fn summarize_tile<'a>(
    datasets: &'a [SurveyDataset],
    tiles: &TileSet,
    tile_ref: &str,
    options: &SummaryOptions,
) -> Result<TileSummary<'a>> {
    let tile = tiles.get(tile_ref)?;

    let all = datasets.iter().flat_map(|ds| {
        ds.points()
            .iter()
            .enumerate()
            .map(move |(row, point)| TilePoint {
                dataset: ds.name(),
                row,
                point,
            })
    });
    let mut total_points = 0usize;
    let points: Vec<TilePoint<'a>> = all
        .inspect(|_| total_points += 1)
        .filter(|tp| {
            let (x, y) = options.frame.coords(tp.point);
            tile.contains(x, y, options.containment)
        })
        .collect();

    let fields = options
        .offset_fields
        .iter()
        .map(|field| {
            let stats = match options.scope {
                StatsScope::Dataset => OffsetStats::from_values(
                    datasets
                        .iter()
                        .flat_map(|ds| ds.points().iter())
                        .map(|p| p.offset(field)),
                ),
                StatsScope::Tile => {
                    OffsetStats::from_values(points.iter().map(|tp| tp.point.offset(field)))
                }
            };
            FieldStats {
                field: field.clone(),
                stats,
            }
        })
        .collect();

    if options.scope == StatsScope::Dataset {
        log::warn!(
            "offset statistics for tile {} cover all {} loaded points, not only the {} inside the tile",
            tile.tile_ref,
            total_points,
            points.len()
        );
    }
    log::info!(
        "tile {}: {} of {} points inside ({})",
        tile.tile_ref,
        points.len(),
        total_points,
        options.containment
    );

    Ok(TileSummary {
        tile_ref: tile.tile_ref.clone(),
        containment: options.containment,
        scope: options.scope,
        total_points,
        points,
        fields,
    })
}

/// Number of points inside one tile.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TileOccupancy {
    pub tile_ref: String,
    pub points: usize,
}

/// Counts contained points for every tile, in tile order.
pub fn tile_occupancy(
    datasets: &[SurveyDataset],
    tiles: &TileSet,
    containment: Containment,
    frame: CoordFrame,
) -> Vec<TileOccupancy> {
    tiles
        .iter()
        .map(|tile| {
            let points = datasets
                .iter()
                .flat_map(|ds| ds.points().iter())
                .filter(|p| {
                    let (x, y) = frame.coords(p);
                    tile.contains(x, y, containment)
                })
                .count();
            TileOccupancy {
                tile_ref: tile.tile_ref.clone(),
                points,
            }
        })
        .collect()
}
