use std::collections::BTreeMap;

use geo_types::{polygon, MultiPolygon};
use survey_misreg::crs::Crs;
use survey_misreg::summary::{summarize_tile, CoordFrame, StatsScope, SummaryOptions};
use survey_misreg::survey::{SurveyDataset, SurveyPoint, DISTANCE_EASTING, DISTANCE_NORTHING};
use survey_misreg::tiles::{Containment, Tile, TileSet};

fn km_square(e0: f64, n0: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![polygon![
        (x: e0, y: n0),
        (x: e0 + 1000.0, y: n0),
        (x: e0 + 1000.0, y: n0 + 1000.0),
        (x: e0, y: n0 + 1000.0),
        (x: e0, y: n0),
    ]])
}

fn grid_tiles() -> TileSet {
    TileSet::new(
        Crs::british_national_grid(),
        vec![
            Tile::new("SX9292", km_square(292_000.0, 92_000.0)),
            Tile::new("SX9392", km_square(293_000.0, 92_000.0)),
        ],
    )
}

/// Points on a 100 m lattice offset 50 m from the tile edges, so none lie
/// near a boundary in either system.
fn lattice() -> SurveyDataset {
    let fields = vec![DISTANCE_EASTING.to_string(), DISTANCE_NORTHING.to_string()];
    let mut points = Vec::new();
    for i in 0..25 {
        for j in 0..15 {
            let e = 291_550.0 + 100.0 * i as f64;
            let n = 91_550.0 + 100.0 * j as f64;
            let mut offsets = BTreeMap::new();
            offsets.insert(DISTANCE_EASTING.to_string(), i as f64);
            offsets.insert(DISTANCE_NORTHING.to_string(), j as f64);
            points.push(SurveyPoint::new(e, n, offsets));
        }
    }
    let rp = Crs::british_national_grid().to(&Crs::wgs84()).unwrap();
    SurveyDataset::new("lattice", fields, points).reproject(&rp)
}

fn contained_rows(datasets: &[SurveyDataset], tiles: &TileSet, tile: &str, frame: CoordFrame) -> Vec<usize> {
    let opts = SummaryOptions {
        frame,
        scope: StatsScope::Tile,
        ..SummaryOptions::default()
    };
    summarize_tile(datasets, tiles, tile, &opts)
        .unwrap()
        .points
        .iter()
        .map(|tp| tp.row)
        .collect()
}

#[test]
fn same_points_in_grid_and_geographic_systems() {
    let datasets = vec![lattice()];
    let grid = grid_tiles();
    let rp = Crs::british_national_grid().to(&Crs::wgs84()).unwrap();
    let geographic = grid.reprojected(&rp);
    for tile in ["SX9292", "SX9392"] {
        let native = contained_rows(&datasets, &grid, tile, CoordFrame::Projected);
        let derived = contained_rows(&datasets, &geographic, tile, CoordFrame::Geographic);
        assert_eq!(native.len(), 100, "tile {tile}");
        assert_eq!(native, derived, "tile {tile}");
    }
}

#[test]
fn boundary_points_follow_the_convention() {
    let tile = Tile::new("SX9292", km_square(292_000.0, 92_000.0));
    assert!(!tile.contains(292_000.0, 92_500.0, Containment::Interior));
    assert!(tile.contains(292_000.0, 92_500.0, Containment::Covers));
    assert!(!tile.contains(293_000.0, 93_000.0, Containment::Interior));
    assert!(tile.contains(293_000.0, 93_000.0, Containment::Covers));
    assert!(tile.contains(292_500.0, 92_500.0, Containment::Interior));
    assert!(!tile.contains(f64::NAN, 92_500.0, Containment::Covers));
}

#[test]
fn shared_edge_belongs_to_both_tiles_only_when_covering() {
    let mut offsets = BTreeMap::new();
    offsets.insert(DISTANCE_EASTING.to_string(), 1.0);
    let on_edge = SurveyDataset::new(
        "edge",
        vec![DISTANCE_EASTING.to_string()],
        vec![SurveyPoint::new(293_000.0, 92_500.0, offsets)],
    );
    let datasets = vec![on_edge];
    let tiles = grid_tiles();
    for (containment, expected) in [(Containment::Interior, 0), (Containment::Covers, 1)] {
        for tile in ["SX9292", "SX9392"] {
            let opts = SummaryOptions {
                frame: CoordFrame::Projected,
                containment,
                ..SummaryOptions::default()
            };
            let s = summarize_tile(&datasets, &tiles, tile, &opts).unwrap();
            assert_eq!(s.count(), expected, "{tile} with {containment}");
        }
    }
}
