//! Comma separated survey tables.
//!
//! The tables carry a header row; columns are looked up by name so extra
//! columns in the export are ignored. Fields may be wrapped in double quotes,
//! in which case they may contain commas and `""` stands for one quote.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::io::{read_lines, write_string};
use crate::survey::{SurveyDataset, SurveyPoint, DISTANCE_EASTING, DISTANCE_NORTHING};

static DATA_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(.+?)[_\- ]data$").unwrap());

/// Column names read from a survey table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SurveyColumns {
    pub easting: String,
    pub northing: String,
    pub offsets: Vec<String>,
}

impl Default for SurveyColumns {
    fn default() -> Self {
        Self {
            easting: "3D_Easting".to_string(),
            northing: "3D_Northing".to_string(),
            offsets: vec![DISTANCE_EASTING.to_string(), DISTANCE_NORTHING.to_string()],
        }
    }
}

/// Derives a dataset name from a file name: `STSW_1_Data.csv` -> `STSW_1`.
pub fn dataset_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match DATA_SUFFIX.captures(&stem) {
        Some(caps) => caps[1].to_string(),
        None => stem,
    }
}

/// Splits one record on the commas that lie outside double quotes.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

fn column_index(header: &[String], name: &str, path: &Path) -> Result<usize> {
    header
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

fn parse_coord(value: &str, column: &str, path: &Path, line: usize) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| Error::parse(path, line, format!("{column} `{value}`: {e}")))
}

fn parse_offset(value: &str, column: &str, path: &Path, line: usize) -> Result<f64> {
    if value.is_empty() {
        return Ok(f64::NAN);
    }
    parse_coord(value, column, path, line)
}

/// Reads a survey table. The returned points carry no geographic
/// coordinates yet; see [`SurveyDataset::reproject`].
pub fn read_survey_csv(path: &Path, name: Option<&str>, columns: &SurveyColumns) -> Result<SurveyDataset> {
    let lines = read_lines(path)?;
    let mut rows = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let (_, header_line) = rows
        .next()
        .ok_or_else(|| Error::parse(path, 1, "missing header row"))?;
    let header = split_row(header_line.trim_start_matches('\u{feff}'));

    let e_idx = column_index(&header, &columns.easting, path)?;
    let n_idx = column_index(&header, &columns.northing, path)?;
    let offset_idx = columns
        .offsets
        .iter()
        .map(|c| column_index(&header, c, path).map(|i| (c.clone(), i)))
        .collect::<Result<Vec<_>>>()?;

    let mut points = Vec::new();
    for (idx, line) in rows {
        let line_no = idx + 1;
        let fields = split_row(line);
        if fields.len() != header.len() {
            return Err(Error::parse(
                path,
                line_no,
                format!("expected {} fields, found {}", header.len(), fields.len()),
            ));
        }
        let easting = parse_coord(&fields[e_idx], &columns.easting, path, line_no)?;
        let northing = parse_coord(&fields[n_idx], &columns.northing, path, line_no)?;
        let mut offsets = BTreeMap::new();
        for (column, i) in &offset_idx {
            offsets.insert(column.clone(), parse_offset(&fields[*i], column, path, line_no)?);
        }
        points.push(SurveyPoint::new(easting, northing, offsets));
    }

    let name = name.map(str::to_string).unwrap_or_else(|| dataset_name(path));
    log::info!("{}: loaded {} rows from {}", name, points.len(), path.display());
    Ok(SurveyDataset::new(name, columns.offsets.clone(), points))
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

/// Writes a dataset with the derived `longitude` and `latitude` columns
/// appended. NaN values are written as empty cells.
pub fn write_survey_csv(path: &Path, dataset: &SurveyDataset, columns: &SurveyColumns) -> Result<()> {
    let mut out = String::new();
    let mut header = vec![columns.easting.as_str(), columns.northing.as_str()];
    header.extend(dataset.offset_fields().iter().map(String::as_str));
    header.extend(["longitude", "latitude"]);
    out.push_str(&header.join(","));
    out.push('\n');
    for p in dataset.points() {
        let mut row = vec![p.easting.to_string(), p.northing.to_string()];
        row.extend(dataset.offset_fields().iter().map(|f| fmt_value(p.offset(f))));
        row.push(fmt_value(p.longitude));
        row.push(fmt_value(p.latitude));
        // writing into a String cannot fail
        let _ = writeln!(out, "{}", row.join(","));
    }
    write_string(path, &out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn table(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_named_columns() {
        let file = table(
            "ID,3D_Easting,3D_Northing,Distance_Easting,Distance_Northing\n\
             1,300000.0,100000.0,0.12,-0.05\n\
             \n\
             2,300010.0,100010.0,,0.3\n",
        );
        let ds = read_survey_csv(file.path(), Some("STSW_1"), &SurveyColumns::default()).unwrap();
        assert_eq!(ds.name(), "STSW_1");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.points()[0].easting, 300000.0);
        assert_eq!(ds.points()[0].offset(DISTANCE_NORTHING), -0.05);
        assert!(ds.points()[1].offset(DISTANCE_EASTING).is_nan());
        assert!(ds.points()[0].longitude.is_nan());
    }

    #[test]
    fn missing_column_is_reported() {
        let file = table("3D_Easting,3D_Northing,Distance_Easting\n1,2,3\n");
        let err = read_survey_csv(file.path(), None, &SurveyColumns::default()).unwrap_err();
        match err {
            Error::MissingColumn { column, .. } => assert_eq!(column, DISTANCE_NORTHING),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_coordinate_reports_line() {
        let file = table(
            "3D_Easting,3D_Northing,Distance_Easting,Distance_Northing\n\
             1,2,3,4\n\
             x,2,3,4\n",
        );
        let err = read_survey_csv(file.path(), None, &SurveyColumns::default()).unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ragged_row_is_rejected() {
        let file = table("3D_Easting,3D_Northing,Distance_Easting,Distance_Northing\n1,2,3\n");
        assert!(matches!(
            read_survey_csv(file.path(), None, &SurveyColumns::default()),
            Err(Error::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn quoted_header_and_bom() {
        let file = table(
            "\u{feff}\"3D_Easting\",\"3D_Northing\",\"Distance_Easting\",\"Distance_Northing\"\n\
             \"1.5\",\"2.5\",\"0.1\",\"0.2\"\n",
        );
        let ds = read_survey_csv(file.path(), None, &SurveyColumns::default()).unwrap();
        assert_eq!(ds.points()[0].northing, 2.5);
    }

    #[test]
    fn commas_inside_quotes_stay_in_one_field() {
        let file = table(
            "ID,Location,3D_Easting,3D_Northing,Distance_Easting,Distance_Northing\n\
             1,\"Exeter, Devon\",292100,92100,0.1,0.2\n\
             2,\"The \"\"Quay\"\", Exeter\",292200,92200,0.3,0.4\n",
        );
        let ds = read_survey_csv(file.path(), None, &SurveyColumns::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.points()[0].easting, 292100.0);
        assert_eq!(ds.points()[1].offset(DISTANCE_NORTHING), 0.4);
    }

    #[test]
    fn split_row_handles_escaped_quotes() {
        assert_eq!(
            split_row(r#"a, "b, c" ,"say ""hi""","#),
            vec!["a", "b, c", "say \"hi\"", ""]
        );
    }

    #[test]
    fn names_from_file_stem() {
        assert_eq!(dataset_name(&PathBuf::from("/data/STSW_1_Data.csv")), "STSW_1");
        assert_eq!(dataset_name(&PathBuf::from("STNE_2_data.csv")), "STNE_2");
        assert_eq!(dataset_name(&PathBuf::from("plain.csv")), "plain");
    }

    #[test]
    fn writes_derived_columns() {
        let src = table(
            "3D_Easting,3D_Northing,Distance_Easting,Distance_Northing\n\
             10,20,0.5,\n",
        );
        let ds = read_survey_csv(src.path(), None, &SurveyColumns::default()).unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        write_survey_csv(out.path(), &ds, &SurveyColumns::default()).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "3D_Easting,3D_Northing,Distance_Easting,Distance_Northing,longitude,latitude"
        );
        assert_eq!(lines.next().unwrap(), "10,20,0.5,,,");
    }
}
