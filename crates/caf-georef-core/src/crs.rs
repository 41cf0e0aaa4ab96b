use std::fmt;
use std::str::FromStr;

use geo::{Coord, MapCoords, MultiPolygon, Point};
use proj4rs::proj::Proj;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GeorefError, Result};

/// Coordinate reference systems the Cook farm datasets arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// EPSG:26911, NAD83 / UTM zone 11N (metres).
    Utm11nNad83,
    /// EPSG:4326, WGS84 longitude/latitude (degrees).
    Wgs84,
}

impl Crs {
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Utm11nNad83 => 26911,
            Crs::Wgs84 => 4326,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }

    fn proj_string(&self) -> &'static str {
        match self {
            Crs::Utm11nNad83 => "+proj=utm +zone=11 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            Crs::Wgs84 => "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs",
        }
    }

}

/// Parses `definition` for the `from -> to` reprojection, so a failure names
/// the pair being built.
fn parse_projection(definition: &str, from: Crs, to: Crs) -> Result<Proj> {
    Proj::from_proj_string(definition).map_err(|err| GeorefError::Reprojection {
        from: from.to_string(),
        to: to.to_string(),
        message: format!("invalid projection definition '{definition}': {err:?}"),
    })
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = GeorefError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let code = trimmed
            .strip_prefix("EPSG:")
            .or_else(|| trimmed.strip_prefix("epsg:"))
            .unwrap_or(trimmed);
        match code {
            "26911" => Ok(Crs::Utm11nNad83),
            "4326" => Ok(Crs::Wgs84),
            _ => Err(GeorefError::UnknownCrs(value.to_string())),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = GeorefError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

/// Reprojects coordinates between two [`Crs`] values. Geographic coordinates are
/// exchanged in degrees; the radian conversion `proj4rs` expects happens here.
pub struct Reprojector {
    from: Crs,
    to: Crs,
    projections: Option<(Proj, Proj)>,
}

impl Reprojector {
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        let projections = if from == to {
            None
        } else {
            Some((
                parse_projection(from.proj_string(), from, to)?,
                parse_projection(to.proj_string(), from, to)?,
            ))
        };
        debug!(%from, %to, identity = projections.is_none(), "built reprojector");
        Ok(Self {
            from,
            to,
            projections,
        })
    }

    pub fn to_wgs84(from: Crs) -> Result<Self> {
        Self::new(from, Crs::Wgs84)
    }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let Some((src, dst)) = &self.projections else {
            return Ok(coord);
        };

        let mut point = if self.from.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        proj4rs::transform::transform(src, dst, &mut point).map_err(|err| {
            GeorefError::Reprojection {
                from: self.from.to_string(),
                to: self.to.to_string(),
                message: format!("{err:?} at ({}, {})", coord.x, coord.y),
            }
        })?;

        if self.to.is_geographic() {
            Ok(Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            })
        } else {
            Ok(Coord {
                x: point.0,
                y: point.1,
            })
        }
    }

    pub fn transform_point(&self, point: &Point<f64>) -> Result<Point<f64>> {
        point.try_map_coords(|coord| self.transform_coord(coord))
    }

    pub fn transform_multi_polygon(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord| self.transform_coord(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_epsg_spellings() {
        assert_eq!("EPSG:26911".parse::<Crs>().unwrap(), Crs::Utm11nNad83);
        assert_eq!("epsg:4326".parse::<Crs>().unwrap(), Crs::Wgs84);
        assert_eq!("26911".parse::<Crs>().unwrap(), Crs::Utm11nNad83);
        assert!(matches!(
            "EPSG:3857".parse::<Crs>(),
            Err(GeorefError::UnknownCrs(_))
        ));
    }

    #[test]
    fn bad_projection_definition_names_both_crs() {
        let err = parse_projection("+proj=nonexistent", Crs::Utm11nNad83, Crs::Wgs84)
            .err()
            .expect("definition should be rejected");
        match err {
            GeorefError::Reprojection { from, to, message } => {
                assert_eq!(from, "EPSG:26911");
                assert_eq!(to, "EPSG:4326");
                assert!(message.contains("+proj=nonexistent"), "{message}");
            }
            other => panic!("expected Reprojection, got {other:?}"),
        }
    }

    #[test]
    fn identity_reprojection_is_passthrough() {
        let reprojector = Reprojector::new(Crs::Wgs84, Crs::Wgs84).unwrap();
        let coord = Coord {
            x: -117.08,
            y: 46.78,
        };
        assert_eq!(reprojector.transform_coord(coord).unwrap(), coord);
    }

    #[test]
    fn utm_central_meridian_maps_to_minus_117() {
        let reprojector = Reprojector::to_wgs84(Crs::Utm11nNad83).unwrap();
        let out = reprojector
            .transform_coord(Coord {
                x: 500_000.0,
                y: 5_000_000.0,
            })
            .unwrap();
        assert!((out.x + 117.0).abs() < 1e-6, "longitude was {}", out.x);
        assert!(out.y > 45.1 && out.y < 45.2, "latitude was {}", out.y);
    }
}
