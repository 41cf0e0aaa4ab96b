use polars::prelude::DataFrame;
use tracing::info;

use crate::aggregate;
use crate::config::PipelineConfig;
use crate::error::{GeorefError, Result};
use crate::loader;
use crate::model::{GridPoint, YearSpanResult};
use crate::outputs::{self, DateStamp, WrittenFile};
use crate::resolver::{resolve_all, ConfiguredZones, ZoneLoader};
use crate::rules::{cook_east_rules, YearSpanRule};
use crate::standardize::{layer_specs, standardize_layer};

#[derive(Debug)]
pub struct TreatmentAssignment {
    pub results: Vec<YearSpanResult>,
    pub table: DataFrame,
}

#[derive(Debug)]
pub struct TreatmentRun {
    pub assignment: TreatmentAssignment,
    pub written: Vec<WrittenFile>,
}

pub fn load_cook_east_grid_points(config: &PipelineConfig) -> Result<Vec<GridPoint>> {
    let source = &config.cook_east.grid_points;
    let points = loader::load_grid_points(&config.resolve(source), source.crs)?;

    if let Some(expected) = config.expected_grid_points {
        if points.len() != expected {
            return Err(GeorefError::RowCountMismatch {
                span: "grid points".to_string(),
                expected,
                found: points.len(),
            });
        }
    }

    Ok(points)
}

/// Resolves, validates, and assembles every rule. Nothing is written, so a
/// failure here leaves no partial output behind.
pub fn assign_treatments(
    rules: &[YearSpanRule],
    points: &[GridPoint],
    zones: &dyn ZoneLoader,
) -> Result<TreatmentAssignment> {
    let results = resolve_all(rules, points, zones)?;
    aggregate::validate(&results, points.len())?;
    let table = aggregate::assemble(&results)?;
    info!(rows = table.height(), spans = results.len(), "assembled treatment table");
    Ok(TreatmentAssignment { results, table })
}

pub fn run_treatment_assignment(config: &PipelineConfig, stamp: &DateStamp) -> Result<TreatmentRun> {
    let points = load_cook_east_grid_points(config)?;
    let rules = cook_east_rules(config.end_year);
    let zones = ConfiguredZones::new(config);

    let mut assignment = assign_treatments(&rules, &points, &zones)?;
    let written = outputs::write_treatment_outputs(&config.output_dir, stamp, &mut assignment.table)?;

    Ok(TreatmentRun {
        assignment,
        written,
    })
}

pub fn run_standardize(config: &PipelineConfig, stamp: &DateStamp) -> Result<Vec<WrittenFile>> {
    let layers = layer_specs(config)
        .iter()
        .map(|spec| standardize_layer(config, spec))
        .collect::<Result<Vec<_>>>()?;

    for layer in &layers {
        info!(layer = layer.name, features = layer.features.len(), "standardized layer");
    }

    outputs::write_standardized_outputs(&config.output_dir, stamp, &layers)
}
