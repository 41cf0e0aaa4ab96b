use tracing::warn;

use crate::error::{GeorefError, Result};
use crate::model::{attribute, Assignment, AttributeValue, TreatmentZone, YearSpan};
use crate::rules::{AttributeFilter, JoinKeyCheck, Labeling, YearSpanRule};
use crate::spatial_join::JoinedRow;

impl AttributeFilter {
    pub fn accepts_zone(&self, zone: &TreatmentZone) -> bool {
        attribute(&zone.attributes, self.attribute)
            .matches(&AttributeValue::Text(self.equals.to_string()))
    }

    /// Rows outside every zone are rejected.
    pub fn accepts(&self, row: &JoinedRow<'_>) -> bool {
        row.zone.is_some_and(|zone| self.accepts_zone(zone))
    }
}

impl Labeling {
    /// `(PlotId, TreatmentId)` for one joined row.
    pub fn labels(&self, row: &JoinedRow<'_>, span: YearSpan) -> (Option<String>, Option<String>) {
        match *self {
            Labeling::Constant {
                plot_id,
                treatment_id,
            } => (Some(plot_id.to_string()), Some(treatment_id.to_string())),
            Labeling::BinaryZone {
                attribute: name,
                one_means,
                treatment_id,
            } => {
                let is_one = row
                    .zone
                    .is_some_and(|zone| equals_one(attribute(&zone.attributes, name)));
                let level = if is_one { one_means } else { one_means.other() };
                (
                    Some(level.plot_label(span.start)),
                    Some(treatment_id.to_string()),
                )
            }
            Labeling::Composite { parts, remaps } => {
                let Some(zone) = row.zone else {
                    return (None, None);
                };
                let code = parts
                    .iter()
                    .map(|name| attribute(&zone.attributes, name).as_label())
                    .collect::<Option<String>>();
                let treatment = code.as_deref().map(|code| {
                    remaps
                        .iter()
                        .find(|(from, _)| *from == code)
                        .map(|(_, to)| to.to_string())
                        .unwrap_or_else(|| code.to_string())
                });
                (code, treatment)
            }
        }
    }
}

/// Numeric equality with `1`. Text is never coerced, so `"1"` is not one.
fn equals_one(value: &AttributeValue) -> bool {
    match value {
        AttributeValue::Integer(value) => *value == 1,
        AttributeValue::Number(value) => *value == 1.0,
        AttributeValue::Bool(flag) => *flag,
        AttributeValue::Null | AttributeValue::Text(_) => false,
    }
}

/// Confirms the point and zone datasets agree on their shared codes.
///
/// At least one joined row must agree for each check; rows that disagree are
/// only logged, since points outside every zone never agree.
pub fn check_join_keys(span: &str, rows: &[JoinedRow<'_>], checks: &[JoinKeyCheck]) -> Result<()> {
    for check in checks {
        let mut agreeing = 0usize;
        let mut disagreeing = Vec::new();

        for row in rows {
            let Some(zone) = row.zone else {
                continue;
            };
            let point_value = attribute(&row.point.attributes, check.point_attribute);
            let zone_value = attribute(&zone.attributes, check.zone_attribute);
            if point_value.matches(zone_value) {
                agreeing += 1;
            } else {
                disagreeing.push(row.point.id2);
            }
        }

        if agreeing == 0 {
            return Err(GeorefError::JoinKeyMismatch {
                span: span.to_string(),
                point_attribute: check.point_attribute.to_string(),
                zone_attribute: check.zone_attribute.to_string(),
            });
        }

        if !disagreeing.is_empty() {
            warn!(
                span,
                point_attribute = check.point_attribute,
                zone_attribute = check.zone_attribute,
                count = disagreeing.len(),
                id2 = ?disagreeing,
                "joined rows disagree on join key"
            );
        }
    }

    Ok(())
}

/// Filters and labels joined rows into assignments, keeping point order.
pub fn normalize(rule: &YearSpanRule, rows: &[JoinedRow<'_>]) -> Vec<Assignment> {
    rows.iter()
        .filter(|row| rule.filter.map_or(true, |filter| filter.accepts(row)))
        .map(|row| {
            let (plot_id, treatment_id) = rule.labeling.labels(row, rule.span);
            Assignment {
                id2: row.point.id2,
                plot_id,
                treatment_id,
                start_year: rule.span.start,
                end_year: rule.span.end,
            }
        })
        .collect()
}
