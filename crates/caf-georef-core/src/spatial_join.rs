use geo::Intersects;
use tracing::{debug, warn};

use crate::model::{GridPoint, TreatmentZone};
use crate::rules::AttributeFilter;

/// A grid point paired with the zone it fell in, if any.
#[derive(Debug, Clone, Copy)]
pub struct JoinedRow<'a> {
    pub point: &'a GridPoint,
    pub zone: Option<&'a TreatmentZone>,
}

#[derive(Debug, Default, Clone)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched: usize,
    /// `ID2`s that fell inside more than one zone.
    pub ambiguous: Vec<i64>,
}

/// Left join of points onto zones: one row per point, in point order.
///
/// A point on a zone edge counts as inside. When zones overlap, the first zone
/// in dataset order wins and the point is reported in [`JoinStats::ambiguous`].
pub fn spatial_join<'a>(
    points: &'a [GridPoint],
    zones: &'a [TreatmentZone],
) -> (Vec<JoinedRow<'a>>, JoinStats) {
    spatial_join_where(points, zones, |_| true)
}

/// [`spatial_join`] over only the zones `accept` keeps. Rejected zones never
/// take part in the tie-break, so a point under a rejected zone still joins
/// to an accepted zone beneath it.
pub fn spatial_join_where<'a, F>(
    points: &'a [GridPoint],
    zones: &'a [TreatmentZone],
    accept: F,
) -> (Vec<JoinedRow<'a>>, JoinStats)
where
    F: Fn(&TreatmentZone) -> bool,
{
    let mut stats = JoinStats::default();

    let rows = points
        .iter()
        .map(|point| {
            let mut hits = zones
                .iter()
                .filter(|zone| accept(zone) && zone.shape.intersects(&point.location));
            let zone = hits.next();
            if zone.is_some() {
                stats.matched += 1;
                if hits.next().is_some() {
                    stats.ambiguous.push(point.id2);
                }
            } else {
                stats.unmatched += 1;
            }
            JoinedRow { point, zone }
        })
        .collect();

    (rows, stats)
}

/// Joins against the zones `filter` accepts and logs overlap tie-breaks for
/// `span`.
pub fn join_for_span<'a>(
    span: &str,
    points: &'a [GridPoint],
    zones: &'a [TreatmentZone],
    filter: Option<&AttributeFilter>,
) -> Vec<JoinedRow<'a>> {
    let (rows, stats) = spatial_join_where(points, zones, |zone| {
        filter.map_or(true, |filter| filter.accepts_zone(zone))
    });
    if !stats.ambiguous.is_empty() {
        warn!(
            span,
            count = stats.ambiguous.len(),
            id2 = ?stats.ambiguous,
            "points fall inside overlapping zones; first zone in dataset order was used"
        );
    }
    debug!(
        span,
        matched = stats.matched,
        unmatched = stats.unmatched,
        "spatial join complete"
    );
    rows
}
