use std::collections::BTreeMap;
use std::fmt;

use geo::{MultiPolygon, Point};
use serde_json::Value;

use crate::rules::RowCountRule;

/// A single attribute cell read from a `.dbf` table or GeoJSON properties.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(value) => Some(*value as f64),
            AttributeValue::Number(value) => Some(*value),
            AttributeValue::Text(text) => text.trim().parse().ok(),
            AttributeValue::Null | AttributeValue::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(value) => Some(*value),
            AttributeValue::Number(value) if value.fract() == 0.0 => Some(*value as i64),
            AttributeValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text form used when building codes. Whole numbers render without a
    /// fractional part so a numeric strip `8.0` reads as `8`.
    pub fn as_label(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(value) => Some(value.to_string()),
            AttributeValue::Integer(value) => Some(value.to_string()),
            AttributeValue::Number(value) if value.fract() == 0.0 && value.is_finite() => {
                Some(format!("{}", *value as i64))
            }
            AttributeValue::Number(value) => Some(value.to_string()),
            AttributeValue::Text(text) => Some(text.trim().to_string()),
        }
    }

    /// Loose equality across storage types: `8`, `8.0` and `"8"` all match.
    pub fn matches(&self, other: &AttributeValue) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a == b;
        }
        self.as_label() == other.as_label()
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(value) => Value::Bool(*value),
            AttributeValue::Integer(value) => Value::from(*value),
            AttributeValue::Number(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::Text(text) => Value::String(text.clone()),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(flag) => AttributeValue::Bool(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => AttributeValue::Integer(int),
                None => number
                    .as_f64()
                    .map(AttributeValue::Number)
                    .unwrap_or(AttributeValue::Null),
            },
            Value::String(text) => AttributeValue::Text(text.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_label() {
            Some(label) => f.write_str(&label),
            None => f.write_str("null"),
        }
    }
}

/// Attribute table row, ordered by column name so output is stable.
pub type Attributes = BTreeMap<String, AttributeValue>;

pub fn attribute<'a>(attributes: &'a Attributes, name: &str) -> &'a AttributeValue {
    const NULL: &AttributeValue = &AttributeValue::Null;
    attributes.get(name).unwrap_or(NULL)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    Polygons(MultiPolygon<f64>),
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::Polygons(_) => "MultiPolygon",
        }
    }
}

/// One feature of a vector dataset as loaded, before it is typed as a grid
/// point, zone, or boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub attributes: Attributes,
}

/// Long-term sampling location. `ID2` is unique across Cook East and Cook West.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub id2: i64,
    pub location: Point<f64>,
    pub attributes: Attributes,
}

impl GridPoint {
    pub fn new(id2: i64, x: f64, y: f64) -> Self {
        Self {
            id2,
            location: Point::new(x, y),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

/// Polygon carrying a zone label for one year-span.
#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentZone {
    pub shape: MultiPolygon<f64>,
    pub attributes: Attributes,
}

impl TreatmentZone {
    pub fn new(shape: MultiPolygon<f64>) -> Self {
        Self {
            shape,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

/// Inclusive harvest-year interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearSpan {
    pub start: i32,
    pub end: i32,
}

impl YearSpan {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub const fn single(year: i32) -> Self {
        Self {
            start: year,
            end: year,
        }
    }
}

impl fmt::Display for YearSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One output row: the treatment a grid point held for a year-span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id2: i64,
    pub plot_id: Option<String>,
    pub treatment_id: Option<String>,
    pub start_year: i32,
    pub end_year: i32,
}

/// Assignments produced by one year-span rule, in grid-point order.
#[derive(Debug, Clone)]
pub struct YearSpanResult {
    pub key: &'static str,
    pub span: YearSpan,
    pub row_count: RowCountRule,
    pub assignments: Vec<Assignment>,
}

impl YearSpanResult {
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_numbers_label_without_fraction() {
        assert_eq!(AttributeValue::Number(8.0).as_label().as_deref(), Some("8"));
        assert_eq!(AttributeValue::Number(2.5).as_label().as_deref(), Some("2.5"));
        assert_eq!(
            AttributeValue::Text(" C ".into()).as_label().as_deref(),
            Some("C")
        );
        assert_eq!(AttributeValue::Null.as_label(), None);
    }

    #[test]
    fn matches_across_storage_types() {
        assert!(AttributeValue::Integer(8).matches(&AttributeValue::Number(8.0)));
        assert!(AttributeValue::Text("8".into()).matches(&AttributeValue::Integer(8)));
        assert!(AttributeValue::Text("A".into()).matches(&AttributeValue::Text("A".into())));
        assert!(!AttributeValue::Null.matches(&AttributeValue::Null));
        assert!(!AttributeValue::Text("A".into()).matches(&AttributeValue::Text("B".into())));
    }

    #[test]
    fn json_conversion_keeps_integers() {
        assert_eq!(AttributeValue::from_json(&json!(3)), AttributeValue::Integer(3));
        assert_eq!(AttributeValue::from_json(&json!(1.5)), AttributeValue::Number(1.5));
        assert_eq!(AttributeValue::Integer(3).to_json(), json!(3));
    }

    #[test]
    fn year_span_display() {
        assert_eq!(YearSpan::new(1999, 2015).to_string(), "1999-2015");
        assert_eq!(YearSpan::single(2018).to_string(), "2018");
    }
}
