//! Coordinate reference system utilities built on top of the `proj` crate.

use std::fmt;

use proj::Proj;

use crate::error::{Error, Result};

/// Representation of a coordinate reference system.
///
/// A CRS is stored internally as a definition string which can be an EPSG
/// identifier (`"EPSG:27700"`), a Proj4 definition or a WKT definition.  When
/// created from an EPSG code the numeric value is retained so that callers can
/// inspect it if necessary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs {
    definition: String,
    epsg: Option<u32>,
}

impl Crs {
    /// Creates a new CRS from the given EPSG code.
    pub fn from_epsg(code: u32) -> Self {
        Self {
            definition: format!("EPSG:{}", code),
            epsg: Some(code),
        }
    }

    /// Creates a CRS from a Proj4 definition string.
    pub fn from_proj4(definition: &str) -> Self {
        Self {
            definition: definition.to_string(),
            epsg: None,
        }
    }

    /// Creates a CRS from a WKT definition string, e.g. the contents of a
    /// shapefile `.prj` sidecar.
    pub fn from_wkt(definition: &str) -> Self {
        Self {
            definition: definition.trim().to_string(),
            epsg: None,
        }
    }

    /// Returns the EPSG code for this CRS, if available.
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Returns the underlying definition string.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// WGS84 geographic coordinates (EPSG:4326).
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// OSGB36 / British National Grid (EPSG:27700), the grid the survey
    /// tables are recorded in.
    pub fn british_national_grid() -> Self {
        Self::from_epsg(27700)
    }

    /// Builds a reusable transformation from this CRS to `target`.
    pub fn to(&self, target: &Crs) -> Result<Reprojector> {
        Reprojector::new(self.clone(), target.clone())
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(code) => write!(f, "EPSG:{code}"),
            None if self.definition.chars().count() > 48 => {
                let head: String = self.definition.chars().take(48).collect();
                write!(f, "{head}...")
            }
            None => f.write_str(&self.definition),
        }
    }
}

/// A transformation between two fixed reference systems.
///
/// The PROJ pipeline is created once and reused for every coordinate, so a
/// whole table is converted without rebuilding the transformation per row.
/// Output is always in `(x, y)` / `(longitude, latitude)` order.
pub struct Reprojector {
    source: Crs,
    target: Crs,
    proj: Proj,
}

impl Reprojector {
    /// Creates the transformation `source -> target`.
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        let proj = Proj::new_known_crs(source.definition(), target.definition(), None).map_err(
            |e| Error::Crs {
                from: source.to_string(),
                to: target.to_string(),
                message: e.to_string(),
            },
        )?;
        Ok(Self {
            source,
            target,
            proj,
        })
    }

    pub fn source(&self) -> &Crs {
        &self.source
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// Transforms one coordinate.
    ///
    /// Inputs outside the validity domain of the source system, or inputs that
    /// are already NaN, yield `(NaN, NaN)` instead of an error so that one bad
    /// row never aborts a batch.
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        if !x.is_finite() || !y.is_finite() {
            return (f64::NAN, f64::NAN);
        }
        match self.proj.convert((x, y)) {
            Ok((px, py)) if px.is_finite() && py.is_finite() => (px, py),
            _ => (f64::NAN, f64::NAN),
        }
    }

    /// Transforms a batch of coordinates, preserving order and count.
    pub fn project_all(&self, coords: &[(f64, f64)]) -> Vec<(f64, f64)> {
        coords.iter().map(|&(x, y)| self.project(x, y)).collect()
    }

    /// Returns the reverse transformation `target -> source`.
    pub fn inverse(&self) -> Result<Reprojector> {
        Reprojector::new(self.target.clone(), self.source.clone())
    }
}

impl fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reprojector")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_grid_to_wgs84() {
        let rp = Crs::british_national_grid().to(&Crs::wgs84()).unwrap();
        // Greenwich observatory, roughly.
        let (lon, lat) = rp.project(538_874.0, 177_344.0);
        assert!((lon - 0.0).abs() < 0.01, "lon {lon}");
        assert!((lat - 51.477).abs() < 0.01, "lat {lat}");
    }

    #[test]
    fn nan_input_stays_nan() {
        let rp = Crs::british_national_grid().to(&Crs::wgs84()).unwrap();
        let (lon, lat) = rp.project(f64::NAN, 100_000.0);
        assert!(lon.is_nan() && lat.is_nan());
    }

    #[test]
    fn batch_preserves_order_and_count() {
        let rp = Crs::british_national_grid().to(&Crs::wgs84()).unwrap();
        let input = [(400_000.0, 100_000.0), (f64::INFINITY, 0.0), (300_000.0, 90_000.0)];
        let out = rp.project_all(&input);
        assert_eq!(out.len(), 3);
        assert!(out[1].0.is_nan());
        assert!(out[0].0 > out[2].0);
    }

    #[test]
    fn display_prefers_epsg() {
        assert_eq!(Crs::from_epsg(27700).to_string(), "EPSG:27700");
        assert_eq!(Crs::from_proj4("+proj=longlat").to_string(), "+proj=longlat");
    }
}
