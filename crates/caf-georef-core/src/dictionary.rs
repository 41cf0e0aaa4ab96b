use std::io::Write;

use serde::Serialize;

use crate::error::Result;

/// One row of a published data dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DictionaryEntry {
    #[serde(rename = "FieldName")]
    pub field_name: &'static str,
    #[serde(rename = "Units")]
    pub units: &'static str,
    #[serde(rename = "Description")]
    pub description: &'static str,
    #[serde(rename = "DataType")]
    pub data_type: &'static str,
}

const ID2_ENTRY: DictionaryEntry = DictionaryEntry {
    field_name: "ID2",
    units: "unitless",
    description: "Numeric value used to identify georeferenced points for long-term sample collection. Values are unique among both Cook fields (CE and CW). Use 'ID2' instead of 'Id' for historic reasons.",
    data_type: "Int",
};

pub const TREATMENT_DICTIONARY: &[DictionaryEntry] = &[
    ID2_ENTRY,
    DictionaryEntry {
        field_name: "PlotId",
        units: "unitless",
        description: "String designation used to identify the plot, a rough designation indicating common management practices (loosly an experimental unit), that the georeference point was located within for the given timespan between start and end year",
        data_type: "String",
    },
    DictionaryEntry {
        field_name: "TreatmentId",
        units: "unitless",
        description: "String designation used to identify the treatment that the georeference point was located within for the given timespan between start and end year. TreatmentId differs from PlotId between 1999-2015 because some treatments in Field C were split between two strips due to smaller area of the strips relative to those in Field A and Field B",
        data_type: "String",
    },
    DictionaryEntry {
        field_name: "StartYear",
        units: "unitless",
        description: "The harvest year that the treatment designation was first assigned, inclusive",
        data_type: "String",
    },
    DictionaryEntry {
        field_name: "EndYear",
        units: "unitless",
        description: "The harvest year that the treatment designation ended, inclusive",
        data_type: "String",
    },
];

pub const BOUNDARY_DICTIONARY: &[DictionaryEntry] = &[DictionaryEntry {
    field_name: "Id",
    units: "unitless",
    description: "Identifier of the field, used sometimes to identify experimental boundary or management boundary",
    data_type: "String",
}];

pub const GRID_POINT_DICTIONARY: &[DictionaryEntry] = &[ID2_ENTRY];

pub fn write_dictionary<W: Write>(entries: &[DictionaryEntry], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for entry in entries {
        csv_writer.serialize(entry)?;
    }
    csv_writer.flush()?;
    Ok(())
}
