use std::collections::HashSet;
use std::fs;
use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use geojson::{GeoJson, Value as GeoJsonValue};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use tracing::{debug, info};

use crate::crs::{Crs, Reprojector};
use crate::error::{GeorefError, Result};
use crate::model::{AttributeValue, Attributes, Feature, Geometry, GridPoint, TreatmentZone};

pub const GRID_POINT_ID_ATTRIBUTE: &str = "ID2";

/// Reads a vector dataset, stamps it with `source_crs` (ignoring any `.prj`),
/// and returns its features reprojected to WGS84.
pub fn load_features(path: &Path, source_crs: Crs) -> Result<Vec<Feature>> {
    let raw = read_features(path)?;
    let reprojector = Reprojector::to_wgs84(source_crs)?;

    let features = raw
        .into_iter()
        .map(|feature| {
            let geometry = match &feature.geometry {
                Geometry::Point(point) => Geometry::Point(reprojector.transform_point(point)?),
                Geometry::Polygons(shape) => {
                    Geometry::Polygons(reprojector.transform_multi_polygon(shape)?)
                }
            };
            Ok(Feature {
                geometry,
                attributes: feature.attributes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        path = %path.display(),
        %source_crs,
        features = features.len(),
        "loaded dataset"
    );
    Ok(features)
}

pub fn load_grid_points(path: &Path, source_crs: Crs) -> Result<Vec<GridPoint>> {
    let features = load_features(path, source_crs)?;
    grid_points_from_features(&path.display().to_string(), features)
}

pub fn load_treatment_zones(path: &Path, source_crs: Crs) -> Result<Vec<TreatmentZone>> {
    let features = load_features(path, source_crs)?;
    zones_from_features(&path.display().to_string(), features)
}

pub fn grid_points_from_features(dataset: &str, features: Vec<Feature>) -> Result<Vec<GridPoint>> {
    let mut seen = HashSet::with_capacity(features.len());
    let mut points = Vec::with_capacity(features.len());

    for feature in features {
        let location = match feature.geometry {
            Geometry::Point(point) => point,
            other => {
                return Err(GeorefError::UnsupportedGeometry {
                    dataset: dataset.to_string(),
                    kind: other.kind().to_string(),
                })
            }
        };

        let raw_id = feature.attributes.get(GRID_POINT_ID_ATTRIBUTE).ok_or_else(|| {
            GeorefError::MissingAttribute {
                dataset: dataset.to_string(),
                attribute: GRID_POINT_ID_ATTRIBUTE.to_string(),
            }
        })?;
        let id2 = raw_id.as_i64().ok_or_else(|| GeorefError::InvalidAttribute {
            dataset: dataset.to_string(),
            attribute: GRID_POINT_ID_ATTRIBUTE.to_string(),
            value: raw_id.to_string(),
        })?;

        if !seen.insert(id2) {
            return Err(GeorefError::DuplicateGridPoint { id2 });
        }

        points.push(GridPoint {
            id2,
            location,
            attributes: feature.attributes,
        });
    }

    Ok(points)
}

pub fn zones_from_features(dataset: &str, features: Vec<Feature>) -> Result<Vec<TreatmentZone>> {
    features
        .into_iter()
        .map(|feature| match feature.geometry {
            Geometry::Polygons(shape) => Ok(TreatmentZone {
                shape,
                attributes: feature.attributes,
            }),
            other => Err(GeorefError::UnsupportedGeometry {
                dataset: dataset.to_string(),
                kind: other.kind().to_string(),
            }),
        })
        .collect()
}

/// Reads features in their stored coordinates.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("shp") => read_shapefile(path),
        Some("geojson") | Some("json") => read_geojson(path),
        _ => Err(GeorefError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

fn read_shapefile(path: &Path) -> Result<Vec<Feature>> {
    let dataset = path.display().to_string();
    let mut reader = shapefile::Reader::from_path(path)?;
    let mut features = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        let geometry = match shape {
            Shape::Point(p) => Geometry::Point(Point::new(p.x, p.y)),
            Shape::PointM(p) => Geometry::Point(Point::new(p.x, p.y)),
            Shape::PointZ(p) => Geometry::Point(Point::new(p.x, p.y)),
            Shape::Polygon(polygon) => Geometry::Polygons(rings_to_multi_polygon(
                polygon.rings(),
                |p| Coord { x: p.x, y: p.y },
            )),
            Shape::PolygonM(polygon) => Geometry::Polygons(rings_to_multi_polygon(
                polygon.rings(),
                |p| Coord { x: p.x, y: p.y },
            )),
            Shape::PolygonZ(polygon) => Geometry::Polygons(rings_to_multi_polygon(
                polygon.rings(),
                |p| Coord { x: p.x, y: p.y },
            )),
            other => {
                return Err(GeorefError::UnsupportedGeometry {
                    dataset,
                    kind: format!("{:?}", other.shapetype()),
                })
            }
        };

        let attributes: Attributes = record
            .into_iter()
            .map(|(name, value)| (name, field_value_to_attribute(value)))
            .collect();

        features.push(Feature {
            geometry,
            attributes,
        });
    }

    debug!(path = %dataset, features = features.len(), "read shapefile");
    Ok(features)
}

/// Shapefile polygons list each outer ring followed by its holes.
fn rings_to_multi_polygon<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> Coord<f64>,
) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for ring in rings {
        let line: LineString<f64> = ring.points().iter().map(&xy).collect();
        match ring {
            PolygonRing::Inner(_) if !polygons.is_empty() => {
                if let Some(last) = polygons.last_mut() {
                    last.interiors_push(line);
                }
            }
            _ => polygons.push(Polygon::new(line, Vec::new())),
        }
    }

    MultiPolygon::new(polygons)
}

fn field_value_to_attribute(value: FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(text)) | FieldValue::Memo(text) => {
            let trimmed = text.trim_end();
            if trimmed.is_empty() {
                AttributeValue::Null
            } else {
                AttributeValue::Text(trimmed.to_string())
            }
        }
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None) => AttributeValue::Null,
        FieldValue::Numeric(Some(number)) | FieldValue::Double(number) | FieldValue::Currency(number) => {
            AttributeValue::Number(number)
        }
        FieldValue::Float(Some(number)) => AttributeValue::Number(f64::from(number)),
        FieldValue::Integer(number) => AttributeValue::Integer(i64::from(number)),
        FieldValue::Logical(Some(flag)) => AttributeValue::Bool(flag),
        other => AttributeValue::Text(format!("{other:?}")),
    }
}

fn read_geojson(path: &Path) -> Result<Vec<Feature>> {
    let dataset = path.display().to_string();
    let contents = fs::read_to_string(path)?;
    let geojson: GeoJson = contents.parse()?;

    let raw_features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut features = Vec::with_capacity(raw_features.len());
    for feature in raw_features {
        let Some(geometry) = feature.geometry else {
            return Err(GeorefError::UnsupportedGeometry {
                dataset,
                kind: "null".to_string(),
            });
        };

        let geometry = match geometry.value {
            GeoJsonValue::Point(position) => Geometry::Point(Point::new(position[0], position[1])),
            GeoJsonValue::Polygon(rings) => {
                Geometry::Polygons(MultiPolygon::new(vec![polygon_from_rings(rings)]))
            }
            GeoJsonValue::MultiPolygon(polygons) => Geometry::Polygons(MultiPolygon::new(
                polygons.into_iter().map(polygon_from_rings).collect(),
            )),
            other => {
                return Err(GeorefError::UnsupportedGeometry {
                    dataset,
                    kind: geojson_kind(&other).to_string(),
                })
            }
        };

        let attributes: Attributes = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name, AttributeValue::from_json(&value)))
            .collect();

        features.push(Feature {
            geometry,
            attributes,
        });
    }

    debug!(path = %dataset, features = features.len(), "read geojson");
    Ok(features)
}

fn geojson_kind(value: &GeoJsonValue) -> &'static str {
    match value {
        GeoJsonValue::Point(_) => "Point",
        GeoJsonValue::MultiPoint(_) => "MultiPoint",
        GeoJsonValue::LineString(_) => "LineString",
        GeoJsonValue::MultiLineString(_) => "MultiLineString",
        GeoJsonValue::Polygon(_) => "Polygon",
        GeoJsonValue::MultiPolygon(_) => "MultiPolygon",
        GeoJsonValue::GeometryCollection(_) => "GeometryCollection",
    }
}

fn polygon_from_rings(rings: Vec<Vec<Vec<f64>>>) -> Polygon<f64> {
    let mut lines = rings.into_iter().map(|ring| {
        ring.into_iter()
            .map(|position| Coord {
                x: position[0],
                y: position[1],
            })
            .collect::<LineString<f64>>()
    });
    let exterior = lines.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, lines.collect())
}
