//! Survey point records and named datasets.

use std::collections::BTreeMap;

use crate::crs::Reprojector;

/// Field name of the easting offset between the 2D and 3D captures.
pub const DISTANCE_EASTING: &str = "Distance_Easting";
/// Field name of the northing offset between the 2D and 3D captures.
pub const DISTANCE_NORTHING: &str = "Distance_Northing";

/// One row of a misregistration table.
///
/// `easting`/`northing` are in the projected source system. `longitude` and
/// `latitude` are derived by reprojection and are NaN until
/// [`SurveyDataset::reproject`] runs, or when the row lies outside the
/// source system's validity domain.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SurveyPoint {
    pub easting: f64,
    pub northing: f64,
    pub longitude: f64,
    pub latitude: f64,
    pub offsets: BTreeMap<String, f64>,
}

impl SurveyPoint {
    /// Creates a point without derived geographic coordinates.
    pub fn new(easting: f64, northing: f64, offsets: BTreeMap<String, f64>) -> Self {
        Self {
            easting,
            northing,
            longitude: f64::NAN,
            latitude: f64::NAN,
            offsets,
        }
    }

    /// Returns the offset measurement for `field`, NaN when absent.
    pub fn offset(&self, field: &str) -> f64 {
        self.offsets.get(field).copied().unwrap_or(f64::NAN)
    }

    pub fn has_lon_lat(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

/// A named, ordered table of survey points loaded from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyDataset {
    name: String,
    offset_fields: Vec<String>,
    points: Vec<SurveyPoint>,
}

impl SurveyDataset {
    pub fn new(name: impl Into<String>, offset_fields: Vec<String>, points: Vec<SurveyPoint>) -> Self {
        Self {
            name: name.into(),
            offset_fields,
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset columns carried by every point, in file order.
    pub fn offset_fields(&self) -> &[String] {
        &self.offset_fields
    }

    pub fn points(&self) -> &[SurveyPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fills in longitude/latitude for every row using one shared
    /// transformation. Row order and count are unchanged; rows that cannot be
    /// transformed keep NaN coordinates.
    pub fn reproject(mut self, reprojector: &Reprojector) -> Self {
        let mut failed = 0usize;
        for p in &mut self.points {
            let (lon, lat) = reprojector.project(p.easting, p.northing);
            p.longitude = lon;
            p.latitude = lat;
            if lon.is_nan() {
                failed += 1;
            }
        }
        if failed > 0 {
            log::warn!(
                "{}: {} of {} rows could not be reprojected to {}",
                self.name,
                failed,
                self.points.len(),
                reprojector.target()
            );
        }
        log::debug!("{}: reprojected {} rows", self.name, self.points.len());
        self
    }

    /// Mean longitude/latitude of the rows that have geographic coordinates.
    pub fn mean_lon_lat(&self) -> Option<(f64, f64)> {
        let (sum_lon, sum_lat, n) = self
            .points
            .iter()
            .filter(|p| p.has_lon_lat())
            .fold((0.0, 0.0, 0usize), |(lon, lat, n), p| {
                (lon + p.longitude, lat + p.latitude, n + 1)
            });
        if n == 0 {
            None
        } else {
            Some((sum_lon / n as f64, sum_lat / n as f64))
        }
    }
}
