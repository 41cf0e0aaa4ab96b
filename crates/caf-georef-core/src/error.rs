// crates/caf-georef-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeorefError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shapefile read failed: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid date stamp '{0}', expected YYYYMMDD")]
    InvalidDateStamp(String),

    #[error("unknown coordinate reference system '{0}'")]
    UnknownCrs(String),

    #[error("reprojection from {from} to {to} failed: {message}")]
    Reprojection {
        from: String,
        to: String,
        message: String,
    },

    #[error("unsupported dataset format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("{dataset}: unsupported geometry type {kind}")]
    UnsupportedGeometry { dataset: String, kind: String },

    #[error("{dataset}: missing attribute '{attribute}'")]
    MissingAttribute { dataset: String, attribute: String },

    #[error("{dataset}: attribute '{attribute}' has invalid value '{value}'")]
    InvalidAttribute {
        dataset: String,
        attribute: String,
        value: String,
    },

    #[error("grid point ID2 {id2} appears more than once")]
    DuplicateGridPoint { id2: i64 },

    #[error("no treatment source configured for year-span '{key}'")]
    MissingSource { key: String },

    #[error(
        "{span}: no joined row has matching '{point_attribute}' (points) and '{zone_attribute}' (zones)"
    )]
    JoinKeyMismatch {
        span: String,
        point_attribute: String,
        zone_attribute: String,
    },

    #[error("{span}: expected {expected} rows, found {found}")]
    RowCountMismatch {
        span: String,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, GeorefError>;
