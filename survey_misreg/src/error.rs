//! Error type shared by the loaders, the tile summary and the report writers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading survey data or summarising a tile.
///
/// Per-row reprojection failures are not represented here: they surface as
/// NaN coordinates on the affected [`SurveyPoint`](crate::survey::SurveyPoint).
#[derive(Debug, Error)]
pub enum Error {
    #[error("{operation} {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} line {line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{}: missing column `{column}`", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}: record {record} has no `{field}` attribute", .path.display())]
    MissingTileId {
        path: PathBuf,
        record: usize,
        field: String,
    },

    #[cfg(feature = "shapefile")]
    #[error("shapefile {}: {source}", .path.display())]
    Shapefile {
        path: PathBuf,
        #[source]
        source: shapefile::Error,
    },

    #[error("geojson {}: {message}", .path.display())]
    GeoJson { path: PathBuf, message: String },

    #[error("config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot build transformation {from} -> {to}: {message}")]
    Crs {
        from: String,
        to: String,
        message: String,
    },

    #[error("tile `{tile_ref}` not found ({available} tiles loaded)")]
    TileNotFound { tile_ref: String, available: usize },

    #[error("report {}: {message}", .path.display())]
    Report { path: PathBuf, message: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
