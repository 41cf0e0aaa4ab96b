use std::cell::RefCell;
use std::collections::HashMap;

use caf_georef_core::aggregate::{assemble, validate};
use caf_georef_core::model::{AttributeValue, GridPoint, TreatmentZone, YearSpanResult};
use caf_georef_core::outputs::assignments_csv_bytes;
use caf_georef_core::pipelines::{assign_treatments, TreatmentAssignment};
use caf_georef_core::resolver::ZoneLoader;
use caf_georef_core::rules::{cook_east_rules, DEFAULT_END_YEAR};
use caf_georef_core::{GeorefError, Result};
use geo::{coord, MultiPolygon, Rect};

/// Six points: three columns (x = 0.5, 1.5, 2.5) by two rows (y = 0.5, 1.5).
fn grid_points() -> Vec<GridPoint> {
    let strips = [("A", 1.0), ("C", 8.0), ("C", 7.0)];
    let mut points = Vec::new();
    let mut id2 = 1;
    for row in 0..2 {
        for (column, (field, strip)) in strips.iter().enumerate() {
            points.push(
                GridPoint::new(id2, column as f64 + 0.5, row as f64 + 0.5)
                    .with_attribute("FIELD", AttributeValue::Text(field.to_string()))
                    .with_attribute("STRIP", AttributeValue::Number(*strip)),
            );
            id2 += 1;
        }
    }
    points
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> TreatmentZone {
    let rect = Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 });
    TreatmentZone::new(MultiPolygon::new(vec![rect.to_polygon()]))
}

fn column(index: usize) -> TreatmentZone {
    let x0 = index as f64;
    rect(x0 + 0.1, 0.0, x0 + 0.9, 2.0)
}

fn fert_zones(attribute: &str) -> Vec<TreatmentZone> {
    vec![
        rect(0.0, 0.0, 1.0, 2.0).with_attribute(attribute, AttributeValue::Integer(1)),
        rect(1.0, 0.0, 3.0, 2.0).with_attribute(attribute, AttributeValue::Integer(2)),
    ]
}

struct MapZones {
    zones: HashMap<&'static str, Vec<TreatmentZone>>,
    boundary: Vec<TreatmentZone>,
    requested: RefCell<Vec<String>>,
}

impl MapZones {
    fn cook_east() -> Self {
        let strips = vec![
            column(0)
                .with_attribute("Field", AttributeValue::Text("A".into()))
                .with_attribute("Strip", AttributeValue::Integer(1)),
            column(1)
                .with_attribute("Field", AttributeValue::Text("C".into()))
                .with_attribute("Strip", AttributeValue::Integer(8)),
            column(2)
                .with_attribute("Field", AttributeValue::Text("C".into()))
                .with_attribute("Strip", AttributeValue::Integer(7)),
        ];
        let c01 = vec![
            rect(0.0, 0.0, 3.0, 1.0)
                .with_attribute("Description", AttributeValue::Text("0".into())),
            rect(0.0, 1.0, 3.0, 2.0)
                .with_attribute("Description", AttributeValue::Text("Grass".into())),
        ];
        let c02 = vec![rect(0.0, 1.0, 3.0, 2.0)
            .with_attribute("Description", AttributeValue::Text("0".into()))];

        let zones = HashMap::from([
            ("1999-2015", strips),
            ("2016-C01", c01),
            ("2016-C02", c02),
            ("2017", fert_zones("Zone")),
            ("2019", fert_zones("Zone")),
            ("2020", fert_zones("Id")),
            ("2021", fert_zones("Zone")),
            ("2022", fert_zones("Zone")),
        ]);

        Self {
            zones,
            boundary: vec![rect(-1.0, -1.0, 4.0, 4.0)],
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl ZoneLoader for MapZones {
    fn treatment_zones(&self, key: &str) -> Result<Vec<TreatmentZone>> {
        self.requested.borrow_mut().push(key.to_string());
        self.zones
            .get(key)
            .cloned()
            .ok_or_else(|| GeorefError::MissingSource {
                key: key.to_string(),
            })
    }

    fn field_boundary(&self) -> Result<Vec<TreatmentZone>> {
        Ok(self.boundary.clone())
    }
}

fn run(zones: &MapZones) -> Result<TreatmentAssignment> {
    let rules = cook_east_rules(DEFAULT_END_YEAR);
    assign_treatments(&rules, &grid_points(), zones)
}

fn span<'a>(assignment: &'a TreatmentAssignment, key: &str) -> &'a YearSpanResult {
    assignment
        .results
        .iter()
        .find(|result| result.key == key)
        .unwrap_or_else(|| panic!("missing span {key}"))
}

fn plot_ids(result: &YearSpanResult) -> Vec<Option<&str>> {
    result
        .assignments
        .iter()
        .map(|assignment| assignment.plot_id.as_deref())
        .collect()
}

#[test]
fn every_grid_point_appears_once_per_span() {
    let assignment = run(&MapZones::cook_east()).expect("pipeline failed");
    let expected: Vec<i64> = grid_points().iter().map(|point| point.id2).collect();

    for result in &assignment.results {
        let mut ids: Vec<i64> = result.assignments.iter().map(|a| a.id2).collect();
        ids.sort_unstable();
        if result.key.starts_with("2016") {
            assert_eq!(ids.len(), 3, "{} should hold one row of points", result.key);
        } else {
            assert_eq!(ids, expected, "span {}", result.key);
        }
    }

    let mut split: Vec<i64> = ["2016-C01", "2016-C02"]
        .iter()
        .flat_map(|key| span(&assignment, key).assignments.iter().map(|a| a.id2))
        .collect();
    split.sort_unstable();
    assert_eq!(split, expected);
}

#[test]
fn no_zoning_year_gets_constant_labels() {
    let assignment = run(&MapZones::cook_east()).unwrap();
    let result = span(&assignment, "2018");

    assert_eq!(result.len(), 6);
    for row in &result.assignments {
        assert_eq!(row.plot_id.as_deref(), Some("CE"));
        assert_eq!(row.treatment_id.as_deref(), Some("ASP"));
        assert_eq!((row.start_year, row.end_year), (2018, 2018));
    }
}

#[test]
fn binary_zone_one_is_high_except_in_2020() {
    let assignment = run(&MapZones::cook_east()).unwrap();

    let high = Some("CE_HighFertZone_2017");
    let low = Some("CE_LowFertZone_2017");
    assert_eq!(
        plot_ids(span(&assignment, "2017")),
        vec![high, low, low, high, low, low]
    );

    let high = Some("CE_HighFertZone_2020");
    let low = Some("CE_LowFertZone_2020");
    assert_eq!(
        plot_ids(span(&assignment, "2020")),
        vec![low, high, high, low, high, high]
    );

    assert!(span(&assignment, "2021")
        .assignments
        .iter()
        .all(|row| row.treatment_id.as_deref() == Some("ASP")));
}

#[test]
fn reused_zones_are_labeled_with_the_current_year() {
    let zones = MapZones::cook_east();
    let assignment = run(&zones).unwrap();

    let result = span(&assignment, "2024");
    assert_eq!(
        result.assignments[0].plot_id.as_deref(),
        Some("CE_HighFertZone_2024")
    );
    assert!(result
        .assignments
        .iter()
        .all(|row| row.start_year == 2024 && row.end_year == 2024));

    let requested = zones.requested.borrow();
    assert!(!requested.iter().any(|key| key == "2024"));
    assert_eq!(requested.iter().filter(|key| *key == "2022").count(), 2);
}

#[test]
fn field_c_strips_fold_into_shared_treatments() {
    let assignment = run(&MapZones::cook_east()).unwrap();
    let result = span(&assignment, "1999-2015");

    assert_eq!(
        plot_ids(result),
        vec![Some("A1"), Some("C8"), Some("C7"), Some("A1"), Some("C8"), Some("C7")]
    );
    let treatments: Vec<Option<&str>> = result
        .assignments
        .iter()
        .map(|row| row.treatment_id.as_deref())
        .collect();
    assert_eq!(
        treatments,
        vec![Some("A1"), Some("C5"), Some("C6"), Some("A1"), Some("C5"), Some("C6")]
    );
}

#[test]
fn split_2016_boundaries_filter_on_description() {
    let assignment = run(&MapZones::cook_east()).unwrap();

    let c01 = span(&assignment, "2016-C01");
    assert_eq!(
        c01.assignments.iter().map(|a| a.id2).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(c01
        .assignments
        .iter()
        .all(|a| a.plot_id.as_deref() == Some("C01_2016")));

    let c02 = span(&assignment, "2016-C02");
    assert_eq!(
        c02.assignments.iter().map(|a| a.id2).collect::<Vec<_>>(),
        vec![4, 5, 6]
    );
}

#[test]
fn whole_field_span_runs_from_1998_to_end_year() {
    let assignment = run(&MapZones::cook_east()).unwrap();
    let result = span(&assignment, "1998-current");

    assert_eq!(result.len(), 6);
    assert!(result.assignments.iter().all(|a| a.start_year == 1998
        && a.end_year == DEFAULT_END_YEAR
        && a.plot_id.as_deref() == Some("CE")));
}

#[test]
fn table_is_sorted_by_id_then_start_year() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let assignment = run(&MapZones::cook_east())?;
    let table = &assignment.table;

    let names: Vec<&str> = table
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec!["ID2", "PlotId", "TreatmentId", "StartYear", "EndYear"]);
    assert_eq!(table.height(), 6 * 11);

    let ids: Vec<i64> = table.column("ID2")?.i64()?.into_no_null_iter().collect();
    let starts: Vec<i32> = table
        .column("StartYear")?
        .i32()?
        .into_no_null_iter()
        .collect();
    let keys: Vec<(i64, i32)> = ids.into_iter().zip(starts).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(keys[0], (1, 1998));
    assert_eq!(keys[1], (1, 1999));
    Ok(())
}

#[test]
fn csv_output_is_byte_identical_across_runs() {
    let mut first = run(&MapZones::cook_east()).unwrap();
    let mut second = run(&MapZones::cook_east()).unwrap();

    let first_bytes = assignments_csv_bytes(&mut first.table).unwrap();
    let second_bytes = assignments_csv_bytes(&mut second.table).unwrap();
    assert_eq!(first_bytes, second_bytes);

    let text = String::from_utf8(first_bytes).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("ID2,PlotId,TreatmentId,StartYear,EndYear"));
    assert_eq!(lines.next(), Some("1,CE,ASP,1998,2024"));
    assert_eq!(lines.next(), Some("1,A1,A1,1999,2015"));
    assert_eq!(lines.next(), Some("1,C01_2016,C01_2016,2016,2016"));
}

#[test]
fn missing_split_rows_fail_the_group_count() {
    let mut zones = MapZones::cook_east();
    zones.zones.insert("2016-C02", Vec::new());

    let err = run(&zones).unwrap_err();
    match err {
        GeorefError::RowCountMismatch {
            span,
            expected,
            found,
        } => {
            assert_eq!(span, "2016");
            assert_eq!(expected, 6);
            assert_eq!(found, 3);
        }
        other => panic!("expected RowCountMismatch, got {other:?}"),
    }
}

#[test]
fn short_span_fails_validation() {
    let assignment = run(&MapZones::cook_east()).unwrap();
    let mut results = assignment.results.clone();
    let index = results.iter().position(|r| r.key == "2019").unwrap();
    results[index].assignments.pop();

    let err = validate(&results, 6).unwrap_err();
    assert!(matches!(
        err,
        GeorefError::RowCountMismatch { ref span, expected: 6, found: 5 } if span == "2019"
    ));
    assert!(assemble(&results).is_ok());
}

#[test]
fn mismatched_strip_codes_abort_the_run() {
    let mut zones = MapZones::cook_east();
    let strips = zones.zones.get_mut("1999-2015").unwrap();
    for (index, strip) in strips.iter_mut().enumerate() {
        strip
            .attributes
            .insert("Strip".into(), AttributeValue::Integer(20 + index as i64));
    }

    let err = run(&zones).unwrap_err();
    assert!(matches!(
        err,
        GeorefError::JoinKeyMismatch { ref point_attribute, .. } if point_attribute == "STRIP"
    ));
}

#[test]
fn unconfigured_source_is_reported_by_key() {
    let mut zones = MapZones::cook_east();
    zones.zones.remove("2019");

    let err = run(&zones).unwrap_err();
    assert!(matches!(err, GeorefError::MissingSource { ref key } if key == "2019"));
}

#[test]
fn excluded_description_overlapping_a_field_polygon_keeps_the_point() {
    let mut zones = MapZones::cook_east();
    zones.zones.insert(
        "2016-C01",
        vec![
            rect(0.0, 0.0, 1.0, 1.0)
                .with_attribute("Description", AttributeValue::Text("Waterway".into())),
            rect(0.0, 0.0, 3.0, 1.0)
                .with_attribute("Description", AttributeValue::Text("0".into())),
        ],
    );

    let assignment = run(&zones).expect("pipeline failed");
    let c01 = span(&assignment, "2016-C01");
    assert_eq!(
        c01.assignments.iter().map(|a| a.id2).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}
