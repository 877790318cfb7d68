//! In-memory representation of a power plant dataset.
//!
//! A [`Dataset`] holds one [`Record`] per plant: a point location plus a row
//! of attribute values stored positionally against a dataset-level column
//! registry. Column kinds are decided once, at ingestion, and drive the
//! missing-value policy during normalization.

use std::fmt;

use geo::Point;

/// A single attribute cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    /// The source had no value for this cell.
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used for grouping keys and marker popups.
    pub fn display_text(&self) -> String {
        match self {
            Value::Number(n) => format!("{}", n),
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "Unknown".to_string(),
        }
    }
}

/// What a column holds, decided once when the file is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every non-null value is numeric; nulls are filled with 0.
    Numeric,
    /// Textual or mixed values; nulls are filled with "Unknown".
    Text,
    /// Anything else (e.g. pure booleans); nulls are left alone.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// One power plant: a point location and its attribute row.
///
/// `values[i]` belongs to the owning dataset's `columns[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub point: Point<f64>,
    pub values: Vec<Value>,
}

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crs {
    pub epsg: u32,
}

impl Crs {
    pub const WGS84: Crs = Crs { epsg: 4326 };

    /// Parses the `name` member of a GeoJSON `crs` declaration.
    ///
    /// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`, and the OGC CRS84
    /// alias (which is WGS84 in lon/lat order).
    pub fn parse(name: &str) -> Option<Crs> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84")
            || name.eq_ignore_ascii_case("OGC:CRS84")
        {
            return Some(Crs::WGS84);
        }
        if !name.to_ascii_uppercase().contains("EPSG") {
            return None;
        }
        let code = name.rsplit(':').next()?;
        code.parse().ok().map(|epsg| Crs { epsg })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// The working collection: column registry, records, and the declared CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub records: Vec<Record>,
    /// `None` means the source file declared no reference system.
    pub crs: Option<Crs>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_epsg_code() {
        assert_eq!(Crs::parse("EPSG:3857"), Some(Crs { epsg: 3857 }));
    }

    #[test]
    fn parses_urn_form() {
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:EPSG::4326"),
            Some(Crs::WGS84)
        );
    }

    #[test]
    fn crs84_is_wgs84() {
        assert_eq!(Crs::parse("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(Crs::WGS84));
    }

    #[test]
    fn rejects_unknown_authority() {
        assert_eq!(Crs::parse("ESRI:102100"), None);
        assert_eq!(Crs::parse("not a crs"), None);
    }

    #[test]
    fn null_displays_as_unknown() {
        assert_eq!(Value::Null.display_text(), "Unknown");
        assert_eq!(Value::Number(42.0).display_text(), "42");
        assert_eq!(Value::Text("CA".into()).display_text(), "CA");
    }
}
