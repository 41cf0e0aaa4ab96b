//! Per-year treatment rules for Cook East, expressed as data.
//!
//! Each [`YearSpanRule`] says where a year-span's zones come from and how a
//! joined zone turns into `PlotId`/`TreatmentId`. The exceptions that used to
//! live in one-off code (swapped zone meanings, strip remaps, reused polygons)
//! are fields here.

use once_cell::sync::Lazy;

use crate::model::YearSpan;

/// First harvest year of the Cook East record.
pub const COOK_EAST_FIRST_YEAR: i32 = 1998;
pub const DEFAULT_END_YEAR: i32 = 2024;
pub const WHOLE_FIELD_KEY: &str = "1998-current";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSource {
    /// No zoning this span; every point gets the constant labels.
    None,
    /// Polygons configured under the rule's own key.
    Dataset,
    /// Polygons configured under another rule's key.
    ReusePrior { key: &'static str },
    /// The configured Cook East field boundary.
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneLevel {
    High,
    Low,
}

impl ZoneLevel {
    pub fn other(self) -> Self {
        match self {
            ZoneLevel::High => ZoneLevel::Low,
            ZoneLevel::Low => ZoneLevel::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneLevel::High => "High",
            ZoneLevel::Low => "Low",
        }
    }

    pub fn plot_label(self, year: i32) -> String {
        format!("CE_{}FertZone_{}", self.as_str(), year)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Labeling {
    /// Same `PlotId`/`TreatmentId` for every emitted row.
    Constant {
        plot_id: &'static str,
        treatment_id: &'static str,
    },
    /// Raw value `1` in `attribute` means `one_means`; anything else, including
    /// points outside every zone, means the other level.
    BinaryZone {
        attribute: &'static str,
        one_means: ZoneLevel,
        treatment_id: &'static str,
    },
    /// Concatenation of zone attributes; `TreatmentId` then goes through `remaps`.
    Composite {
        parts: &'static [&'static str],
        remaps: &'static [(&'static str, &'static str)],
    },
}

/// Keep only joined rows whose zone attribute equals `equals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeFilter {
    pub attribute: &'static str,
    pub equals: &'static str,
}

/// Point attribute that must agree with a zone attribute on joined rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinKeyCheck {
    pub point_attribute: &'static str,
    pub zone_attribute: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCountRule {
    /// The span must have one row per grid point.
    Exact,
    /// Spans sharing the group name must together have one row per grid point.
    Group(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearSpanRule {
    pub key: &'static str,
    pub span: YearSpan,
    pub source: ZoneSource,
    pub labeling: Labeling,
    pub filter: Option<AttributeFilter>,
    pub join_key_checks: &'static [JoinKeyCheck],
    pub row_count: RowCountRule,
    pub note: Option<&'static str>,
}

const ASP: &str = "ASP";

const NO_ZONING: Labeling = Labeling::Constant {
    plot_id: "CE",
    treatment_id: ASP,
};

const FERT_ZONE: Labeling = Labeling::BinaryZone {
    attribute: "Zone",
    one_means: ZoneLevel::High,
    treatment_id: ASP,
};

/// Field C strips were split, so two strip codes share one treatment.
pub const FIELD_C_TREATMENT_REMAPS: &[(&str, &str)] = &[("C8", "C5"), ("C7", "C6")];

const STRIP_JOIN_KEYS: &[JoinKeyCheck] = &[
    JoinKeyCheck {
        point_attribute: "STRIP",
        zone_attribute: "Strip",
    },
    JoinKeyCheck {
        point_attribute: "FIELD",
        zone_attribute: "Field",
    },
];

const OPERATIONAL_BOUNDARY: AttributeFilter = AttributeFilter {
    attribute: "Description",
    equals: "0",
};

fn yearly(key: &'static str, year: i32, source: ZoneSource, labeling: Labeling) -> YearSpanRule {
    YearSpanRule {
        key,
        span: YearSpan::single(year),
        source,
        labeling,
        filter: None,
        join_key_checks: &[],
        row_count: RowCountRule::Exact,
        note: None,
    }
}

/// Yearly Cook East rules in enumeration order.
pub static COOK_EAST_YEARLY_RULES: Lazy<Vec<YearSpanRule>> = Lazy::new(|| {
    vec![
        YearSpanRule {
            key: "1999-2015",
            span: YearSpan::new(1999, 2015),
            source: ZoneSource::Dataset,
            labeling: Labeling::Composite {
                parts: &["Field", "Strip"],
                remaps: FIELD_C_TREATMENT_REMAPS,
            },
            filter: None,
            join_key_checks: STRIP_JOIN_KEYS,
            row_count: RowCountRule::Exact,
            note: Some("field/strip layout; C8 and C7 fold into C5 and C6"),
        },
        YearSpanRule {
            key: "2016-C01",
            span: YearSpan::single(2016),
            source: ZoneSource::Dataset,
            labeling: Labeling::Constant {
                plot_id: "C01_2016",
                treatment_id: "C01_2016",
            },
            filter: Some(OPERATIONAL_BOUNDARY),
            join_key_checks: &[],
            row_count: RowCountRule::Group("2016"),
            note: Some("operational boundary C01"),
        },
        YearSpanRule {
            key: "2016-C02",
            span: YearSpan::single(2016),
            source: ZoneSource::Dataset,
            labeling: Labeling::Constant {
                plot_id: "C02_2016",
                treatment_id: "C02_2016",
            },
            filter: Some(OPERATIONAL_BOUNDARY),
            join_key_checks: &[],
            row_count: RowCountRule::Group("2016"),
            note: Some("operational boundary C02"),
        },
        yearly("2017", 2017, ZoneSource::Dataset, FERT_ZONE),
        YearSpanRule {
            note: Some("no fert zones; crop was garbanzos"),
            ..yearly("2018", 2018, ZoneSource::None, NO_ZONING)
        },
        yearly("2019", 2019, ZoneSource::Dataset, FERT_ZONE),
        YearSpanRule {
            note: Some("zone meanings swapped: Id 1 is the low rate"),
            ..yearly(
                "2020",
                2020,
                ZoneSource::Dataset,
                Labeling::BinaryZone {
                    attribute: "Id",
                    one_means: ZoneLevel::Low,
                    treatment_id: ASP,
                },
            )
        },
        yearly("2021", 2021, ZoneSource::Dataset, FERT_ZONE),
        yearly("2022", 2022, ZoneSource::Dataset, FERT_ZONE),
        YearSpanRule {
            note: Some("no fert zones; crop was winter peas"),
            ..yearly("2023", 2023, ZoneSource::None, NO_ZONING)
        },
        YearSpanRule {
            note: Some("2022 fert zones were used again"),
            ..yearly(
                "2024",
                2024,
                ZoneSource::ReusePrior { key: "2022" },
                FERT_ZONE,
            )
        },
    ]
});

/// Whole-field assignment from the first Cook East year through `end_year`.
pub fn whole_field_rule(end_year: i32) -> YearSpanRule {
    YearSpanRule {
        key: WHOLE_FIELD_KEY,
        span: YearSpan::new(COOK_EAST_FIRST_YEAR, end_year),
        source: ZoneSource::Boundary,
        labeling: NO_ZONING,
        filter: None,
        join_key_checks: &[],
        row_count: RowCountRule::Exact,
        note: Some("whole Cook East field"),
    }
}

pub fn cook_east_rules(end_year: i32) -> Vec<YearSpanRule> {
    let mut rules = COOK_EAST_YEARLY_RULES.clone();
    rules.push(whole_field_rule(end_year));
    rules
}
