use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geo::Point;
use geojson::{GeoJson, Value as GeoJsonValue};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::dataset::{Column, ColumnKind, Crs, Dataset, Record, Value};
use crate::error::PipelineError;

// Loads a GeoJSON feature collection of power plant points into a Dataset.
//
// Point features become records; features without a usable point geometry
// are skipped. The column registry is the union of property names in
// first-seen order, and column kinds are inferred here, once.
pub fn load_geojson(path: &Path) -> Result<Dataset, PipelineError> {
    info!("loading plant data from {}", path.display());

    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).map_err(|source| PipelineError::Parse {
        path: path.to_path_buf(),
        source: source.into(),
    })?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(_) => {
            return Err(PipelineError::UnsupportedInput(
                "expected a FeatureCollection, found a single feature".to_string(),
            ))
        }
        GeoJson::Geometry(_) => {
            return Err(PipelineError::UnsupportedInput(
                "expected a FeatureCollection, found a bare geometry".to_string(),
            ))
        }
    };

    let crs = collection
        .foreign_members
        .as_ref()
        .and_then(declared_collection_crs);

    let total_features = collection.features.len();
    let mut names: Vec<String> = Vec::new();
    let mut rows: Vec<(Point<f64>, serde_json::Map<String, JsonValue>)> = Vec::new();
    let mut skipped = 0usize;

    for feature in collection.features {
        let point = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(GeoJsonValue::Point(coords)) if coords.len() >= 2 => {
                Point::new(coords[0], coords[1])
            }
            _ => {
                skipped += 1;
                continue;
            }
        };
        let properties = feature.properties.unwrap_or_default();
        for key in properties.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
        rows.push((point, properties));
    }

    if skipped > 0 {
        warn!(
            "skipped {} of {} features without a usable point geometry",
            skipped, total_features
        );
    }

    let columns: Vec<Column> = names
        .iter()
        .map(|name| Column {
            name: name.clone(),
            kind: infer_kind(rows.iter().map(|(_, props)| props.get(name))),
        })
        .collect();

    let records: Vec<Record> = rows
        .into_iter()
        .map(|(point, mut props)| Record {
            point,
            values: names
                .iter()
                .map(|name| props.remove(name).map(convert_value).unwrap_or(Value::Null))
                .collect(),
        })
        .collect();

    let dataset = Dataset {
        columns,
        records,
        crs,
    };

    info!("loaded {} plant records", dataset.len());
    debug!("columns: {}", dataset.column_names().join(", "));
    Ok(dataset)
}

// Reads the legacy `crs` member of a feature collection, if present.
fn declared_collection_crs(members: &serde_json::Map<String, JsonValue>) -> Option<Crs> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    let crs = Crs::parse(name);
    if crs.is_none() {
        warn!("unrecognized CRS declaration '{}'; treating as undeclared", name);
    }
    crs
}

// Column kind inference, mirroring how a dataframe would type the column:
// uniformly numeric values make a numeric column, pure booleans stay a
// non-text kind, and everything else (strings, containers, mixtures) is
// handled as text.
fn infer_kind<'a, I>(values: I) -> ColumnKind
where
    I: Iterator<Item = Option<&'a JsonValue>>,
{
    let mut saw_number = false;
    let mut saw_bool = false;
    let mut saw_text = false;

    for value in values.flatten() {
        match value {
            JsonValue::Null => {}
            JsonValue::Number(_) => saw_number = true,
            JsonValue::Bool(_) => saw_bool = true,
            _ => saw_text = true,
        }
    }

    if saw_text || (saw_number && saw_bool) {
        ColumnKind::Text
    } else if saw_number {
        ColumnKind::Numeric
    } else if saw_bool {
        ColumnKind::Other
    } else {
        // All-null columns get the text fill ("Unknown").
        ColumnKind::Text
    }
}

fn convert_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        JsonValue::String(s) => Value::Text(s),
        // Arrays and objects ride along as their JSON text.
        container => Value::Text(container.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write fixture");
        file
    }

    const PLANTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-118.25, 34.05]},
                "properties": {"Plant Name": "Alpha", "Total_MW": 150.0, "State": "CA", "FID": 1}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [-96.80, 32.78]},
                "properties": {"Plant Name": null, "Total_MW": "not reported", "State": "TX", "FID": 2}
            }
        ]
    }"#;

    #[test]
    fn loads_point_features() {
        let file = write_fixture(PLANTS);
        let dataset = load_geojson(file.path()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.crs, None);
        let mut names = dataset.column_names();
        names.sort();
        assert_eq!(names, vec!["FID", "Plant Name", "State", "Total_MW"]);

        let name_idx = dataset.column_index("Plant Name").unwrap();
        assert_eq!(
            dataset.records[0].values[name_idx],
            Value::Text("Alpha".into())
        );
        assert!(dataset.records[1].values[name_idx].is_null());

        let point = dataset.records[0].point;
        assert_eq!((point.x(), point.y()), (-118.25, 34.05));
    }

    #[test]
    fn infers_column_kinds_once() {
        let file = write_fixture(PLANTS);
        let dataset = load_geojson(file.path()).unwrap();

        let kind_of = |name: &str| dataset.columns[dataset.column_index(name).unwrap()].kind;
        assert_eq!(kind_of("Plant Name"), ColumnKind::Text);
        // Mixed numeric and text values type as text, like an object column.
        assert_eq!(kind_of("Total_MW"), ColumnKind::Text);
        assert_eq!(kind_of("State"), ColumnKind::Text);
        assert_eq!(kind_of("FID"), ColumnKind::Numeric);
    }

    #[test]
    fn skips_features_without_point_geometry() {
        let file = write_fixture(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]},
                        "properties": {"State": "CA"}
                    },
                    {
                        "type": "Feature",
                        "geometry": {"type": "Point", "coordinates": [-74.00, 40.71]},
                        "properties": {"State": "NY"}
                    }
                ]
            }"#,
        );
        let dataset = load_geojson(file.path()).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn reads_declared_crs() {
        let file = write_fixture(
            r#"{
                "type": "FeatureCollection",
                "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
                "features": []
            }"#,
        );
        let dataset = load_geojson(file.path()).unwrap();
        assert_eq!(dataset.crs, Some(Crs { epsg: 3857 }));
    }

    #[test]
    fn missing_file_is_a_load_failure() {
        let err = load_geojson(Path::new("does/not/exist.geojson")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn malformed_content_is_a_load_failure() {
        let file = write_fixture("{ this is not geojson");
        let err = load_geojson(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn bare_geometry_is_unsupported() {
        let file = write_fixture(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#);
        let err = load_geojson(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedInput(_)));
    }
}
