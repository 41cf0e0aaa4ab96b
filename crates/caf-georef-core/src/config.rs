use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::crs::Crs;
use crate::error::{GeorefError, Result};
use crate::rules::DEFAULT_END_YEAR;

/// Number of long-term georeference points in Cook East.
pub const COOK_EAST_GRID_POINT_COUNT: usize = 369;

/// A vector dataset and the CRS it is stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub path: PathBuf,
    pub crs: Crs,
}

impl DatasetSource {
    pub fn new(path: impl Into<PathBuf>, crs: Crs) -> Self {
        Self {
            path: path.into(),
            crs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSources {
    pub boundary: DatasetSource,
    pub grid_points: DatasetSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub end_year: i32,
    /// Grid-point count the Cook East dataset must have; `None` skips the
    /// check. A TOML value of `0` reads as `None`.
    #[serde(deserialize_with = "grid_point_count")]
    pub expected_grid_points: Option<usize>,
    pub cook_east: FieldSources,
    pub cook_west: FieldSources,
    /// Treatment polygons keyed by year-span rule key. Entries read from TOML
    /// replace the default for their key and leave the other keys in place.
    #[serde(deserialize_with = "treatments_over_defaults")]
    pub treatments: BTreeMap<String, DatasetSource>,
}

fn grid_point_count<'de, D>(deserializer: D) -> std::result::Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let count = usize::deserialize(deserializer)?;
    Ok((count > 0).then_some(count))
}

fn treatments_over_defaults<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, DatasetSource>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, DatasetSource>::deserialize(deserializer)?;
    let mut treatments = default_treatments();
    treatments.extend(overrides);
    Ok(treatments)
}

/// Treatment sources of the published Cook East inputs.
fn default_treatments() -> BTreeMap<String, DatasetSource> {
    let fert_zones = Path::new("20250307_CookEastFertZonesFromDataStream");
    let operational = Path::new("CE_WGS1984_2016_OperationalFieldBoundaries");
    let zones_2022 = fert_zones
        .join("WSU_C01_Fert_2zones2022_WGS84")
        .join("WSU_C01_Fert_2zones2022_WGS84")
        .join("WSU_C01_Fert_2zones2022_WGS84.shp");

    [
        (
            "1999-2015",
            DatasetSource::new(
                Path::new("CookEastStrips").join("Field_Plan_Final.shp"),
                Crs::Utm11nNad83,
            ),
        ),
        (
            "2016-C01",
            DatasetSource::new(operational.join("C01").join("C0117001.shp"), Crs::Wgs84),
        ),
        (
            "2016-C02",
            DatasetSource::new(operational.join("C02").join("C0217001.shp"), Crs::Wgs84),
        ),
        (
            "2017",
            DatasetSource::new(
                fert_zones
                    .join("CE_SW_2zones2017rates")
                    .join("CE_SW_2zones2017rates.shp"),
                Crs::Utm11nNad83,
            ),
        ),
        (
            "2019",
            DatasetSource::new(
                fert_zones.join("CE_WW_2zones2019").join("CE_WW_2zones2019.shp"),
                Crs::Utm11nNad83,
            ),
        ),
        (
            "2020",
            DatasetSource::new(
                fert_zones
                    .join("CE_C01_Fert_2zones2020_WGS84")
                    .join("CE_C01_Fert_2zones2020_WGS84.shp"),
                Crs::Wgs84,
            ),
        ),
        (
            "2021",
            DatasetSource::new(
                fert_zones
                    .join("WSU_C01_Fert_2zones2021_WGS84")
                    .join("WSU_C01_Fert_2zones2021_WGS84.shp"),
                Crs::Wgs84,
            ),
        ),
        ("2022", DatasetSource::new(zones_2022, Crs::Wgs84)),
    ]
    .into_iter()
    .map(|(key, source)| (key.to_string(), source))
    .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let wgs84_layers = Path::new("FromIanLeslie_CafGeospatial").join("CE_CW_WGS1984");

        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            end_year: DEFAULT_END_YEAR,
            expected_grid_points: Some(COOK_EAST_GRID_POINT_COUNT),
            cook_east: FieldSources {
                boundary: DatasetSource::new(
                    Path::new("20170206_CafRoughBoundaries").join("CafCookEastArea.shp"),
                    Crs::Utm11nNad83,
                ),
                grid_points: DatasetSource::new(
                    Path::new("CookEast_GeoReferencePoints_2016_IL").join("All_CookEast.shp"),
                    Crs::Utm11nNad83,
                ),
            },
            cook_west: FieldSources {
                boundary: DatasetSource::new(
                    wgs84_layers
                        .join("CookWestBoundariesWGS1984")
                        .join("CookWestBoundariesWGS1984.shp"),
                    Crs::Wgs84,
                ),
                grid_points: DatasetSource::new(
                    wgs84_layers
                        .join("CookWestGeoRefPointsWGS1984")
                        .join("CookWestGeoRefPoints_WGS1984.shp"),
                    Crs::Wgs84,
                ),
            },
            treatments: default_treatments(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Dataset paths are relative to `input_dir` unless absolute.
    pub fn resolve(&self, source: &DatasetSource) -> PathBuf {
        self.input_dir.join(&source.path)
    }

    pub fn treatment_source(&self, key: &str) -> Result<&DatasetSource> {
        self.treatments
            .get(key)
            .ok_or_else(|| GeorefError::MissingSource {
                key: key.to_string(),
            })
    }
}
