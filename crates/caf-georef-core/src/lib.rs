pub mod aggregate;
pub mod config;
pub mod crs;
pub mod dictionary;
pub mod error;
pub mod loader;
pub mod model;
pub mod normalizer;
pub mod outputs;
pub mod pipelines;
pub mod resolver;
pub mod rules;
pub mod spatial_join;
pub mod standardize;

pub use error::{GeorefError, Result};
