use geo::Point;
use proj::Proj;
use tracing::{debug, info, warn};

use crate::dataset::{Column, ColumnKind, Crs, Dataset, Record, Value};
use crate::error::PipelineError;

/// Attribute names kept after feature selection, in output order.
///
/// Identifying fields, location fields, categorical descriptors, and the
/// per-fuel-type capacity fields. Geometry is inherent to every record and
/// always kept.
pub const SELECTED_COLUMNS: [&str; 31] = [
    "plant_code",
    "plant_name",
    "utility_id",
    "utility_na",
    "sector_nam",
    "street_add",
    "city",
    "county",
    "state",
    "zip",
    "primsource",
    "source_des",
    "tech_desc",
    "install_mw",
    "total_mw",
    "bat_mw",
    "bio_mw",
    "coal_mw",
    "geo_mw",
    "hydro_mw",
    "hydrops_mw",
    "ng_mw",
    "nuclear_mw",
    "crude_mw",
    "solar_mw",
    "wind_mw",
    "other_mw",
    "source",
    "period",
    "longitude",
    "latitude",
];

// Cleans and prepares a raw dataset for analysis. The stages are ordered:
// later ones assume the invariants established by earlier ones.
pub fn normalize(dataset: Dataset) -> Result<Dataset, PipelineError> {
    info!("processing {} plant records", dataset.len());

    let dataset = rename_columns(dataset);
    debug!("standardized column names");

    let dataset = fill_missing(dataset);
    debug!("filled missing values");

    let dataset = coerce_capacity(dataset);
    debug!("converted capacity columns to numeric");

    let dataset = normalize_crs(dataset)?;

    let dataset = select_features(dataset);
    debug!("selected relevant features");

    Ok(dataset)
}

pub fn standardize_name(name: &str) -> String {
    name.replace(' ', "_").replace('.', "_").to_lowercase()
}

// Standardizes every column name to lowercase_with_underscores. When two
// original names standardize to the same name, the later column wins and the
// earlier one is dropped with a diagnostic.
pub fn rename_columns(dataset: Dataset) -> Dataset {
    let new_names: Vec<String> = dataset
        .columns
        .iter()
        .map(|c| standardize_name(&c.name))
        .collect();

    let mut dropped = vec![false; new_names.len()];
    for i in 0..new_names.len() {
        for j in (i + 1)..new_names.len() {
            if new_names[i] == new_names[j] {
                warn!(
                    "column name collision: '{}' and '{}' both standardize to '{}'; keeping the later column",
                    dataset.columns[i].name, dataset.columns[j].name, new_names[j]
                );
                dropped[i] = true;
                break;
            }
        }
    }

    let columns: Vec<Column> = dataset
        .columns
        .iter()
        .zip(new_names)
        .enumerate()
        .filter(|(i, _)| !dropped[*i])
        .map(|(_, (column, name))| Column {
            name,
            kind: column.kind,
        })
        .collect();

    let records: Vec<Record> = dataset
        .records
        .into_iter()
        .map(|record| Record {
            point: record.point,
            values: record
                .values
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !dropped[*i])
                .map(|(_, value)| value)
                .collect(),
        })
        .collect();

    Dataset {
        columns,
        records,
        crs: dataset.crs,
    }
}

// Fills absent values by column kind: 0 for numeric columns, "Unknown" for
// text columns. Other kinds are left untouched.
pub fn fill_missing(mut dataset: Dataset) -> Dataset {
    for record in &mut dataset.records {
        for (column, value) in dataset.columns.iter().zip(record.values.iter_mut()) {
            if value.is_null() {
                match column.kind {
                    ColumnKind::Numeric => *value = Value::Number(0.0),
                    ColumnKind::Text => *value = Value::Text("Unknown".to_string()),
                    ColumnKind::Other => {}
                }
            }
        }
    }
    dataset
}

// Ensures every capacity column (name containing "_mw") is numeric. Values
// that cannot parse as a number become 0.
pub fn coerce_capacity(mut dataset: Dataset) -> Dataset {
    let mw_columns: Vec<usize> = dataset
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.name.contains("_mw"))
        .map(|(i, _)| i)
        .collect();
    if mw_columns.is_empty() {
        return dataset;
    }

    for &i in &mw_columns {
        dataset.columns[i].kind = ColumnKind::Numeric;
    }
    for record in &mut dataset.records {
        for &i in &mw_columns {
            let coerced = match &record.values[i] {
                Value::Number(n) => *n,
                Value::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
                Value::Bool(_) | Value::Null => 0.0,
            };
            record.values[i] = Value::Number(coerced);
        }
    }
    dataset
}

// Reprojects every geometry into WGS84 if the dataset declares a different
// reference system. An undeclared CRS gives the transform nothing to work
// from, so the collection is tagged WGS84 per the GeoJSON convention.
pub fn normalize_crs(mut dataset: Dataset) -> Result<Dataset, PipelineError> {
    match dataset.crs {
        Some(crs) if crs == Crs::WGS84 => {
            debug!("CRS is already {}; no conversion needed", crs);
            Ok(dataset)
        }
        Some(crs) => {
            info!(
                "reprojecting {} geometries from {} to {}",
                dataset.len(),
                crs,
                Crs::WGS84
            );
            let transform =
                Proj::new_known_crs(&crs.to_string(), &Crs::WGS84.to_string(), None)?;
            for record in &mut dataset.records {
                let (x, y) = transform.convert((record.point.x(), record.point.y()))?;
                record.point = Point::new(x, y);
            }
            dataset.crs = Some(Crs::WGS84);
            Ok(dataset)
        }
        None => {
            info!(
                "no CRS declared; tagging as {} per the GeoJSON convention",
                Crs::WGS84
            );
            dataset.crs = Some(Crs::WGS84);
            Ok(dataset)
        }
    }
}

// Restricts the dataset to the allow-listed columns, in allow-list order.
// Listed columns absent from the input are simply not there.
pub fn select_features(dataset: Dataset) -> Dataset {
    let keep: Vec<usize> = SELECTED_COLUMNS
        .iter()
        .filter_map(|name| dataset.column_index(name))
        .collect();

    let columns: Vec<Column> = keep.iter().map(|&i| dataset.columns[i].clone()).collect();
    let records: Vec<Record> = dataset
        .records
        .into_iter()
        .map(|record| Record {
            point: record.point,
            values: keep.iter().map(|&i| record.values[i].clone()).collect(),
        })
        .collect();

    Dataset {
        columns,
        records,
        crs: dataset.crs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn column(name: &str, kind: ColumnKind) -> Column {
        Column {
            name: name.to_string(),
            kind,
        }
    }

    fn dataset(columns: Vec<Column>, rows: Vec<Vec<Value>>, crs: Option<Crs>) -> Dataset {
        let records = rows
            .into_iter()
            .map(|values| Record {
                point: Point::new(-96.80, 32.78),
                values,
            })
            .collect();
        Dataset {
            columns,
            records,
            crs,
        }
    }

    #[test]
    fn standardizes_spaces_dots_and_case() {
        assert_eq!(standardize_name("Plant Code"), "plant_code");
        assert_eq!(standardize_name("Plant.Name"), "plant_name");
        assert_eq!(standardize_name("Total_MW"), "total_mw");
    }

    #[test]
    fn standardization_is_idempotent() {
        for name in ["plant_code", "total_mw", "state"] {
            assert_eq!(standardize_name(name), name);
            assert_eq!(standardize_name(&standardize_name(name)), standardize_name(name));
        }
    }

    #[test]
    fn rename_collision_keeps_the_later_column() {
        let ds = dataset(
            vec![
                column("Plant Name", ColumnKind::Text),
                column("plant.name", ColumnKind::Text),
            ],
            vec![vec![
                Value::Text("first".into()),
                Value::Text("second".into()),
            ]],
            Some(Crs::WGS84),
        );
        let renamed = rename_columns(ds);
        assert_eq!(renamed.column_names(), vec!["plant_name"]);
        assert_eq!(renamed.records[0].values, vec![Value::Text("second".into())]);
    }

    #[test]
    fn fills_missing_by_column_kind() {
        let ds = dataset(
            vec![
                column("install_mw", ColumnKind::Numeric),
                column("state", ColumnKind::Text),
                column("retired", ColumnKind::Other),
            ],
            vec![vec![Value::Null, Value::Null, Value::Null]],
            Some(Crs::WGS84),
        );
        let filled = fill_missing(ds);
        assert_eq!(
            filled.records[0].values,
            vec![
                Value::Number(0.0),
                Value::Text("Unknown".into()),
                Value::Null,
            ]
        );
    }

    #[test]
    fn coerces_capacity_columns_to_numeric() {
        let ds = dataset(
            vec![
                column("total_mw", ColumnKind::Text),
                column("city", ColumnKind::Text),
            ],
            vec![
                vec![Value::Text("150.5".into()), Value::Text("Dallas".into())],
                vec![Value::Text("not reported".into()), Value::Text("Austin".into())],
                vec![Value::Null, Value::Text("Waco".into())],
            ],
            Some(Crs::WGS84),
        );
        let coerced = coerce_capacity(ds);
        assert_eq!(coerced.columns[0].kind, ColumnKind::Numeric);
        assert_eq!(coerced.records[0].values[0], Value::Number(150.5));
        assert_eq!(coerced.records[1].values[0], Value::Number(0.0));
        assert_eq!(coerced.records[2].values[0], Value::Number(0.0));
        // Non-capacity columns are untouched.
        assert_eq!(coerced.records[0].values[1], Value::Text("Dallas".into()));
    }

    #[test]
    fn reprojects_web_mercator_into_wgs84() {
        let mut ds = dataset(vec![], vec![vec![]], Some(Crs { epsg: 3857 }));
        ds.records[0].point = Point::new(111319.49079327357, 111325.14286638486);

        let out = normalize_crs(ds).unwrap();
        assert_eq!(out.crs, Some(Crs::WGS84));
        let point = out.records[0].point;
        assert!((point.x() - 1.0).abs() < 1e-6, "x was {}", point.x());
        assert!((point.y() - 1.0).abs() < 1e-6, "y was {}", point.y());
    }

    #[test]
    fn wgs84_geometries_are_left_alone() {
        let ds = dataset(vec![], vec![vec![]], Some(Crs::WGS84));
        let before = ds.records[0].point;
        let out = normalize_crs(ds).unwrap();
        assert_eq!(out.records[0].point, before);
    }

    #[test]
    fn undeclared_crs_is_tagged_without_moving_points() {
        let ds = dataset(vec![], vec![vec![]], None);
        let before = ds.records[0].point;
        let out = normalize_crs(ds).unwrap();
        assert_eq!(out.crs, Some(Crs::WGS84));
        assert_eq!(out.records[0].point, before);
    }

    #[test]
    fn selects_the_intersection_in_allow_list_order() {
        let ds = dataset(
            vec![
                column("state", ColumnKind::Text),
                column("fid", ColumnKind::Numeric),
                column("plant_name", ColumnKind::Text),
            ],
            vec![vec![
                Value::Text("CA".into()),
                Value::Number(7.0),
                Value::Text("Alpha".into()),
            ]],
            Some(Crs::WGS84),
        );
        let selected = select_features(ds);
        assert_eq!(selected.column_names(), vec!["plant_name", "state"]);
        assert_eq!(
            selected.records[0].values,
            vec![Value::Text("Alpha".into()), Value::Text("CA".into())]
        );
    }

    #[test]
    fn normalize_establishes_all_invariants() {
        let ds = dataset(
            vec![
                column("Plant Code", ColumnKind::Numeric),
                column("Plant.Name", ColumnKind::Text),
                column("Install_MW", ColumnKind::Numeric),
                column("State", ColumnKind::Text),
                column("FID", ColumnKind::Numeric),
            ],
            vec![
                vec![
                    Value::Number(1.0),
                    Value::Text("Alpha".into()),
                    Value::Number(100.0),
                    Value::Text("CA".into()),
                    Value::Number(10.0),
                ],
                vec![
                    Value::Number(2.0),
                    Value::Text("Beta".into()),
                    Value::Null,
                    Value::Null,
                    Value::Number(11.0),
                ],
            ],
            Some(Crs::WGS84),
        );

        let out = normalize(ds).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["plant_code", "plant_name", "state", "install_mw"]
        );
        let state_idx = out.column_index("state").unwrap();
        let mw_idx = out.column_index("install_mw").unwrap();
        assert_eq!(out.records[1].values[state_idx], Value::Text("Unknown".into()));
        assert_eq!(out.records[1].values[mw_idx], Value::Number(0.0));
        assert_eq!(out.crs, Some(Crs::WGS84));
    }
}
