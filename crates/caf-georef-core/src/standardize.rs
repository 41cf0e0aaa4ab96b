use geo::{LineString, Polygon};
use geojson::{FeatureCollection, Geometry as GeoJsonGeometry, Value as GeoJsonValue};
use serde_json::Map;

use crate::config::{DatasetSource, PipelineConfig};
use crate::error::Result;
use crate::loader;
use crate::model::{AttributeValue, Feature, Geometry};

/// How one published layer is derived from its source dataset.
#[derive(Debug, Clone)]
pub struct LayerSpec {
    /// Output file stem, e.g. `cookeast_boundary`.
    pub name: &'static str,
    pub source: DatasetSource,
    pub drop: &'static [&'static str],
    /// Value written to the `Id` attribute after dropping.
    pub assign_id: Option<&'static str>,
}

pub const ID_ATTRIBUTE: &str = "Id";

const CE_BOUNDARY_DROP: &[&str] = &["Id", "Area", "Perimeter", "Acres", "Hectares"];
const CW_BOUNDARY_DROP: &[&str] = &["Id", "POLY_AREA", "AREA_GEO", "PERIMETER", "PERIM_GEO"];
const CE_GRID_POINT_DROP: &[&str] = &[
    "FID_1", "COLUMN", "ROW", "ROW2", "COL_ROW", "COL_ROW2", "EASTING", "NORTHING", "STRIP",
    "FIELD", "CROP", "AREA", "PERIMETER", "AREA_AC", "TARGET",
];
const CW_GRID_POINT_DROP: &[&str] = &["POINT_X", "POINT_Y"];

pub fn layer_specs(config: &PipelineConfig) -> Vec<LayerSpec> {
    vec![
        LayerSpec {
            name: "cookeast_boundary",
            source: config.cook_east.boundary.clone(),
            drop: CE_BOUNDARY_DROP,
            assign_id: Some("CE"),
        },
        LayerSpec {
            name: "cookwest_boundary",
            source: config.cook_west.boundary.clone(),
            drop: CW_BOUNDARY_DROP,
            assign_id: Some("CW"),
        },
        LayerSpec {
            name: "cookeast_georeferencepoint",
            source: config.cook_east.grid_points.clone(),
            drop: CE_GRID_POINT_DROP,
            assign_id: None,
        },
        LayerSpec {
            name: "cookwest_georeferencepoint",
            source: config.cook_west.grid_points.clone(),
            drop: CW_GRID_POINT_DROP,
            assign_id: None,
        },
    ]
}

/// A loaded, cleaned layer ready to be written.
#[derive(Debug, Clone)]
pub struct StandardizedLayer {
    pub name: &'static str,
    pub features: Vec<Feature>,
}

pub fn standardize_layer(config: &PipelineConfig, spec: &LayerSpec) -> Result<StandardizedLayer> {
    let features = loader::load_features(&config.resolve(&spec.source), spec.source.crs)?;
    Ok(StandardizedLayer {
        name: spec.name,
        features: clean_features(features, spec.drop, spec.assign_id),
    })
}

/// Drops the listed attributes (absent ones are ignored) and stamps `Id`.
pub fn clean_features(
    features: Vec<Feature>,
    drop: &[&str],
    assign_id: Option<&str>,
) -> Vec<Feature> {
    features
        .into_iter()
        .map(|mut feature| {
            feature
                .attributes
                .retain(|name, _| !drop.contains(&name.as_str()));
            if let Some(id) = assign_id {
                feature
                    .attributes
                    .insert(ID_ATTRIBUTE.to_string(), AttributeValue::Text(id.to_string()));
            }
            feature
        })
        .collect()
}

pub fn to_feature_collection(features: &[Feature]) -> FeatureCollection {
    let features = features
        .iter()
        .map(|feature| {
            let properties: Map<String, serde_json::Value> = feature
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: Some(GeoJsonGeometry::new(geometry_value(&feature.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn geometry_value(geometry: &Geometry) -> GeoJsonValue {
    match geometry {
        Geometry::Point(point) => GeoJsonValue::Point(vec![point.x(), point.y()]),
        Geometry::Polygons(shape) => {
            let mut polygons: Vec<_> = shape.0.iter().map(polygon_rings).collect();
            if polygons.len() == 1 {
                GeoJsonValue::Polygon(polygons.remove(0))
            } else {
                GeoJsonValue::MultiPolygon(polygons)
            }
        }
    }
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_positions)
        .collect()
}

fn ring_positions(ring: &LineString<f64>) -> Vec<Vec<f64>> {
    ring.coords().map(|coord| vec![coord.x, coord.y]).collect()
}
