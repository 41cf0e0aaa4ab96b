use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use polars::prelude::DataFrame;
use tracing::info;

use crate::aggregate::write_assignments_csv;
use crate::dictionary::{
    write_dictionary, DictionaryEntry, BOUNDARY_DICTIONARY, GRID_POINT_DICTIONARY,
    TREATMENT_DICTIONARY,
};
use crate::error::{GeorefError, Result};
use crate::standardize::{to_feature_collection, StandardizedLayer};

const TREATMENT_STEM: &str = "georeferencepoint_treatments_cookeast_1999-2024";

/// `YYYYMMDD` stamp appended to every output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateStamp(String);

impl DateStamp {
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y%m%d").to_string())
    }

    pub fn parse(value: &str) -> Result<Self> {
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .map(Self::from_date)
            .map_err(|_| GeorefError::InvalidDateStamp(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn treatment_csv_name(stamp: &DateStamp) -> String {
    format!("{TREATMENT_STEM}_{stamp}.csv")
}

pub fn treatment_dictionary_name(stamp: &DateStamp) -> String {
    format!("{TREATMENT_STEM}_Dictionary_{stamp}.csv")
}

pub fn layer_file_name(layer: &str, stamp: &DateStamp) -> String {
    format!("{layer}_{stamp}.geojson")
}

#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: usize,
    pub blake3: String,
}

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> Result<WrittenFile> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, contents)?;
    let hash = blake3::hash(contents).to_hex().to_string();
    info!(path = %path.display(), bytes = contents.len(), blake3 = %hash, "wrote output");
    Ok(WrittenFile {
        path,
        bytes: contents.len(),
        blake3: hash,
    })
}

fn dictionary_bytes(entries: &[DictionaryEntry]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_dictionary(entries, &mut buffer)?;
    Ok(buffer)
}

pub fn assignments_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_assignments_csv(df, &mut buffer)?;
    Ok(buffer)
}

/// Writes the sorted assignment table and its data dictionary.
pub fn write_treatment_outputs(
    dir: &Path,
    stamp: &DateStamp,
    df: &mut DataFrame,
) -> Result<Vec<WrittenFile>> {
    let csv = assignments_csv_bytes(df)?;
    let dictionary = dictionary_bytes(TREATMENT_DICTIONARY)?;
    Ok(vec![
        write_file(dir, &treatment_csv_name(stamp), &csv)?,
        write_file(dir, &treatment_dictionary_name(stamp), &dictionary)?,
    ])
}

/// Writes each layer as GeoJSON plus the boundary and grid-point dictionaries.
pub fn write_standardized_outputs(
    dir: &Path,
    stamp: &DateStamp,
    layers: &[StandardizedLayer],
) -> Result<Vec<WrittenFile>> {
    let mut written = Vec::with_capacity(layers.len() + 2);

    for layer in layers {
        let collection = to_feature_collection(&layer.features);
        let contents = serde_json::to_vec(&collection)?;
        written.push(write_file(dir, &layer_file_name(layer.name, stamp), &contents)?);
    }

    written.push(write_file(
        dir,
        &format!("boundary_data_dictionary_{stamp}.csv"),
        &dictionary_bytes(BOUNDARY_DICTIONARY)?,
    )?);
    written.push(write_file(
        dir,
        &format!("georeferencepoint_data_dictionary_{stamp}.csv"),
        &dictionary_bytes(GRID_POINT_DICTIONARY)?,
    )?);

    Ok(written)
}
