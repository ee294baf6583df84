//! File input and output helpers for survey tables, tiles and overlays.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::crs::Crs;
use crate::error::{Error, Result};

pub mod csv;
pub mod geojson;
#[cfg(feature = "shapefile")]
pub mod shp;

/// Reads a file to string.
pub fn read_to_string(path: &Path) -> Result<String> {
    let mut buffer = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut buffer))
        .map_err(|e| Error::io("reading", path, e))?;
    Ok(buffer)
}

/// Reads a file and returns its lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| Error::io("opening", path, e))?;
    BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io("reading", path, e))
}

/// Writes a string to a file, replacing any existing contents.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| Error::io("writing", path, e))
}

/// Path of the `.prj` sidecar that accompanies a shapefile.
pub fn prj_path(path: &Path) -> PathBuf {
    path.with_extension("prj")
}

/// Reads the coordinate system from a `.prj` sidecar, if one exists. A body
/// of the form `EPSG:<code>` names the system by code; anything else is WKT.
pub fn read_prj(path: &Path) -> Result<Option<Crs>> {
    let prj = prj_path(path);
    if !prj.is_file() {
        return Ok(None);
    }
    let wkt = read_to_string(&prj)?;
    if wkt.trim().is_empty() {
        return Ok(None);
    }
    log::debug!("{}: using CRS from {}", path.display(), prj.display());
    Ok(Some(parse_prj(&wkt)))
}

fn parse_prj(body: &str) -> Crs {
    let body = body.trim();
    body.get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
        .and_then(|_| body[5..].trim().parse::<u32>().ok())
        .map(Crs::from_epsg)
        .unwrap_or_else(|| Crs::from_wkt(body))
}

/// True when `path` names a GeoJSON document rather than a shapefile.
pub fn is_geojson(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
