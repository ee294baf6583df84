//! Text, CSV, JSON and spreadsheet renderings of a tile summary.

use std::path::Path;

use chrono::{DateTime, Utc};
#[cfg(feature = "reporting")]
use umya_spreadsheet::{self, writer::xlsx, Spreadsheet};

use crate::error::{Error, Result};
use crate::io::write_string;
use crate::summary::{FieldStats, StatsScope, TileOccupancy, TileSummary};
use crate::tiles::Containment;

/// Formats a statistic; missing values are shown as `NaN`.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.4}")
    }
}

/// Statistics of a tile summary laid out as a grid: a header row naming the
/// offset fields, then one row per statistic (`min`, `mean`, `std`, `max`).
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub rows: Vec<Vec<String>>,
}

impl SummaryTable {
    pub fn new(summary: &TileSummary<'_>) -> Self {
        let mut rows = Vec::with_capacity(5);
        let mut header = vec!["statistic".to_string()];
        header.extend(summary.fields.iter().map(|f| f.field.clone()));
        rows.push(header);
        for (i, name) in ["min", "mean", "std", "max"].into_iter().enumerate() {
            let mut row = vec![name.to_string()];
            row.extend(summary.fields.iter().map(|f| format_value(f.stats.rows()[i].1)));
            rows.push(row);
        }
        Self { rows }
    }

    /// Fixed-width rendering.
    pub fn to_text(&self) -> String {
        align(&self.rows)
    }

    pub fn to_csv(&self) -> String {
        self.rows.iter().map(|r| r.join(",") + "\n").collect()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_string(path, &self.to_csv())
    }
}

fn scope_note(summary: &TileSummary<'_>) -> String {
    match summary.scope {
        StatsScope::Dataset => format!("statistics over all {} loaded points", summary.total_points),
        StatsScope::Tile => "statistics over points in tile".to_string(),
    }
}

fn align(rows: &[Vec<String>]) -> String {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..cols)
        .map(|c| rows.iter().filter_map(|r| r.get(c)).map(String::len).max().unwrap_or(0))
        .collect();
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(c, cell)| {
                if c == 0 {
                    format!("{cell:<w$}", w = widths[c])
                } else {
                    format!("{cell:>w$}", w = widths[c])
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Plain text report for a terminal.
pub fn format_text(summary: &TileSummary<'_>) -> String {
    let mut out = format!(
        "Tile {}: {} of {} points inside ({}, {})\n\n",
        summary.tile_ref,
        summary.count(),
        summary.total_points,
        summary.containment,
        scope_note(summary)
    );
    out.push_str(&SummaryTable::new(summary).to_text());
    out
}

const POINT_HEADER: [&str; 6] = ["dataset", "row", "easting", "northing", "longitude", "latitude"];

/// One line per contained point.
pub fn format_points(summary: &TileSummary<'_>) -> String {
    let mut rows = vec![POINT_HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
    for tp in &summary.points {
        rows.push(vec![
            tp.dataset.to_string(),
            tp.row.to_string(),
            format!("{:.3}", tp.point.easting),
            format!("{:.3}", tp.point.northing),
            format!("{:.7}", tp.point.longitude),
            format!("{:.7}", tp.point.latitude),
        ]);
    }
    align(&rows)
}

/// Occupancy listing for the `tiles` command.
pub fn format_occupancy(rows: &[TileOccupancy]) -> String {
    let mut table = vec![vec!["tile_ref".to_string(), "points".to_string()]];
    table.extend(rows.iter().map(|o| vec![o.tile_ref.clone(), o.points.to_string()]));
    align(&table)
}

/// Serialized form of a summary. NaN statistics become `null`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SummaryReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub tile_ref: &'a str,
    pub containment: Containment,
    pub scope: StatsScope,
    pub count: usize,
    pub total_points: usize,
    pub fields: &'a [FieldStats],
}

impl<'a> SummaryReport<'a> {
    pub fn new(summary: &'a TileSummary<'_>) -> Self {
        Self {
            generated_at: Utc::now(),
            tile_ref: &summary.tile_ref,
            containment: summary.containment,
            scope: summary.scope,
            count: summary.count(),
            total_points: summary.total_points,
            fields: &summary.fields,
        }
    }

    /// Pretty JSON; `-` is reported as the path on failure.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Report {
            path: "-".into(),
            message: e.to_string(),
        })
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_string(path, &self.to_json()?)
    }
}

#[cfg(feature = "reporting")]
fn write_excel(path: &Path, sheets: &[(&str, Vec<Vec<String>>)]) -> Result<()> {
    let report_err = |message: String| Error::Report {
        path: path.to_path_buf(),
        message,
    };
    let mut wb: Spreadsheet = umya_spreadsheet::new_file_empty_worksheet();
    for (name, rows) in sheets {
        let ws = wb.new_sheet(*name).map_err(|e| report_err(e.to_string()))?;
        for (r_idx, row) in rows.iter().enumerate() {
            for (c_idx, val) in row.iter().enumerate() {
                let cell = ws.get_cell_mut(((c_idx + 1) as u32, (r_idx + 1) as u32));
                match val.parse::<f64>() {
                    Ok(n) if r_idx > 0 && c_idx > 0 && n.is_finite() => cell.set_value_number(n),
                    _ => cell.set_value(val.clone()),
                };
            }
        }
    }
    xlsx::write(&wb, path).map_err(|e| report_err(e.to_string()))
}

/// Writes the statistics and the contained points to an XLSX workbook.
#[cfg(feature = "reporting")]
pub fn write_xlsx(path: &Path, summary: &TileSummary<'_>) -> Result<()> {
    let mut points: Vec<Vec<String>> = vec![POINT_HEADER.iter().map(|h| h.to_string()).collect()];
    points.extend(summary.points.iter().map(|tp| {
        vec![
            tp.dataset.to_string(),
            tp.row.to_string(),
            tp.point.easting.to_string(),
            tp.point.northing.to_string(),
            tp.point.longitude.to_string(),
            tp.point.latitude.to_string(),
        ]
    }));
    write_excel(path, &[("Statistics", SummaryTable::new(summary).rows), ("Points", points)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::OffsetStats;

    fn summary() -> TileSummary<'static> {
        TileSummary {
            tile_ref: "SX9292".into(),
            containment: Containment::Interior,
            scope: StatsScope::Tile,
            total_points: 10,
            points: Vec::new(),
            fields: vec![
                FieldStats {
                    field: "Distance_Easting".into(),
                    stats: OffsetStats::from_values([1.0, 2.0, 3.0]),
                },
                FieldStats {
                    field: "Distance_Northing".into(),
                    stats: OffsetStats::empty(),
                },
            ],
        }
    }

    #[test]
    fn table_layout() {
        let t = SummaryTable::new(&summary()).rows;
        assert_eq!(t[0], vec!["statistic", "Distance_Easting", "Distance_Northing"]);
        assert_eq!(t[1], vec!["min", "1.0000", "NaN"]);
        assert_eq!(t[3], vec!["std", "1.0000", "NaN"]);
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn text_mentions_tile_and_counts() {
        let text = format_text(&summary());
        assert!(text.starts_with("Tile SX9292: 0 of 10 points inside (interior"));
        assert!(text.contains("mean"));
    }

    #[test]
    fn csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        SummaryTable::new(&summary()).write_csv(&path).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().nth(2), Some("mean,2.0000,NaN"));
    }

    #[test]
    fn json_has_nulls_for_nan() {
        let s = summary();
        let json: serde_json::Value = serde_json::from_str(&SummaryReport::new(&s).to_json().unwrap()).unwrap();
        assert_eq!(json["tile_ref"], "SX9292");
        assert_eq!(json["scope"], "tile");
        assert!(json["generated_at"].is_string());
        assert_eq!(json["fields"][0]["stats"]["max"], 3.0);
        assert!(json["fields"][1]["stats"]["mean"].is_null());
    }

    #[test]
    fn occupancy_listing() {
        let text = format_occupancy(&[TileOccupancy {
            tile_ref: "A".into(),
            points: 12,
        }]);
        assert_eq!(text, "tile_ref  points\nA             12\n");
    }
}
