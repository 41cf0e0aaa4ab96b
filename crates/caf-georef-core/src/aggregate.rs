use std::collections::BTreeMap;
use std::io::Write;

use polars::prelude::*;
use tracing::info;

use crate::error::{GeorefError, Result};
use crate::model::YearSpanResult;
use crate::rules::RowCountRule;

pub const ASSIGNMENT_COLUMNS: [&str; 5] = ["ID2", "PlotId", "TreatmentId", "StartYear", "EndYear"];

/// Checks each span (or split-span group) has one row per grid point.
pub fn validate(results: &[YearSpanResult], grid_point_count: usize) -> Result<()> {
    let mut groups: BTreeMap<&'static str, usize> = BTreeMap::new();

    for result in results {
        match result.row_count {
            RowCountRule::Exact => {
                if result.len() != grid_point_count {
                    return Err(GeorefError::RowCountMismatch {
                        span: result.key.to_string(),
                        expected: grid_point_count,
                        found: result.len(),
                    });
                }
            }
            RowCountRule::Group(group) => {
                *groups.entry(group).or_default() += result.len();
            }
        }
    }

    for (group, found) in groups {
        if found != grid_point_count {
            return Err(GeorefError::RowCountMismatch {
                span: group.to_string(),
                expected: grid_point_count,
                found,
            });
        }
    }

    info!(
        spans = results.len(),
        grid_points = grid_point_count,
        "row counts validated"
    );
    Ok(())
}

/// Concatenates span results in order and sorts by `(ID2, StartYear)`. The
/// sort is stable, so ties keep enumeration order.
pub fn assemble(results: &[YearSpanResult]) -> Result<DataFrame> {
    let total: usize = results.iter().map(YearSpanResult::len).sum();
    let mut id2 = Vec::with_capacity(total);
    let mut plot_id = Vec::with_capacity(total);
    let mut treatment_id = Vec::with_capacity(total);
    let mut start_year = Vec::with_capacity(total);
    let mut end_year = Vec::with_capacity(total);

    for assignment in results.iter().flat_map(|result| &result.assignments) {
        id2.push(assignment.id2);
        plot_id.push(assignment.plot_id.clone());
        treatment_id.push(assignment.treatment_id.clone());
        start_year.push(assignment.start_year);
        end_year.push(assignment.end_year);
    }

    let [id2_name, plot_name, treatment_name, start_name, end_name] = ASSIGNMENT_COLUMNS;
    let df = DataFrame::new(vec![
        Series::new(id2_name.into(), id2).into(),
        Series::new(plot_name.into(), plot_id).into(),
        Series::new(treatment_name.into(), treatment_id).into(),
        Series::new(start_name.into(), start_year).into(),
        Series::new(end_name.into(), end_year).into(),
    ])?;

    let sorted = df.sort(
        [id2_name, start_name],
        SortMultipleOptions::default().with_maintain_order(true),
    )?;
    Ok(sorted)
}

/// Header row, comma separated, no index column, nulls as empty cells.
pub fn write_assignments_csv<W: Write>(df: &mut DataFrame, writer: W) -> Result<()> {
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(())
}
