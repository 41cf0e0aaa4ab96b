use tracing::info;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader;
use crate::model::{GridPoint, TreatmentZone, YearSpanResult};
use crate::normalizer::{check_join_keys, normalize};
use crate::rules::{Labeling, YearSpanRule, ZoneSource};
use crate::spatial_join::{join_for_span, JoinedRow};

/// Supplies treatment polygons to the resolver.
pub trait ZoneLoader {
    /// Zones configured under a year-span rule key.
    fn treatment_zones(&self, key: &str) -> Result<Vec<TreatmentZone>>;
    /// The Cook East field boundary as zones.
    fn field_boundary(&self) -> Result<Vec<TreatmentZone>>;
}

/// Loads zones from the files named in a [`PipelineConfig`].
pub struct ConfiguredZones<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ConfiguredZones<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }
}

impl ZoneLoader for ConfiguredZones<'_> {
    fn treatment_zones(&self, key: &str) -> Result<Vec<TreatmentZone>> {
        let source = self.config.treatment_source(key)?;
        loader::load_treatment_zones(&self.config.resolve(source), source.crs)
    }

    fn field_boundary(&self) -> Result<Vec<TreatmentZone>> {
        let source = &self.config.cook_east.boundary;
        loader::load_treatment_zones(&self.config.resolve(source), source.crs)
    }
}

pub fn resolve_year_span(
    rule: &YearSpanRule,
    points: &[GridPoint],
    zones: &dyn ZoneLoader,
) -> Result<YearSpanResult> {
    let loaded = match rule.source {
        ZoneSource::None => None,
        ZoneSource::Dataset => Some(zones.treatment_zones(rule.key)?),
        ZoneSource::ReusePrior { key } => {
            info!(span = rule.key, reused = key, "reusing prior year zones");
            Some(zones.treatment_zones(key)?)
        }
        ZoneSource::Boundary => Some(zones.field_boundary()?),
    };

    let assignments = match &loaded {
        Some(zone_set) => {
            let rows = join_for_span(rule.key, points, zone_set, rule.filter.as_ref());
            check_join_keys(rule.key, &rows, rule.join_key_checks)?;
            normalize(rule, &rows)
        }
        None => {
            debug_assert!(matches!(rule.labeling, Labeling::Constant { .. }));
            let rows: Vec<JoinedRow<'_>> = points
                .iter()
                .map(|point| JoinedRow { point, zone: None })
                .collect();
            normalize(rule, &rows)
        }
    };

    info!(
        span = rule.key,
        years = %rule.span,
        zones = loaded.as_ref().map_or(0, Vec::len),
        rows = assignments.len(),
        "resolved year-span"
    );

    Ok(YearSpanResult {
        key: rule.key,
        span: rule.span,
        row_count: rule.row_count,
        assignments,
    })
}

/// Resolves every rule in order. The first failing rule aborts the run.
pub fn resolve_all(
    rules: &[YearSpanRule],
    points: &[GridPoint],
    zones: &dyn ZoneLoader,
) -> Result<Vec<YearSpanResult>> {
    rules
        .iter()
        .map(|rule| resolve_year_span(rule, points, zones))
        .collect()
}
