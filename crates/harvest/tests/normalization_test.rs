//! Integration tests for schema inference and normalization.

use serde_json::{Value, json};
use tempfile::tempdir;

use harvest::normalize::{Normalizer, NormalizerConfig};
use harvest::table::{read_path, write_path};
use harvest::{Cell, ColumnKind, Dataset, DelimitedFormat, SchemaInferencer, TypeDescriptor};

fn dataset(name: &str, rows: Vec<Value>) -> Dataset {
    let objects: Vec<_> = rows.iter().map(|r| r.as_object().unwrap()).collect();
    Dataset::from_json_records(name, objects)
}

fn fuel() -> Dataset {
    dataset(
        "fuel",
        vec![
            json!({"vehicle_id": "47001", "fuel_type": "Regular", "city08": 21.1234,
                   "cylDeact": "N", "mpgData": "Yes", "createdOn": "2024-01-05T00:00:00Z"}),
            json!({"vehicle_id": "47002", "fuel_type": "unknown", "city08": 19,
                   "cylDeact": "Y", "mpgData": "No", "createdOn": "2024-01-06T00:00:00Z"}),
            json!({"vehicle_id": "47003", "fuel_type": "Premium", "city08": "18.5",
                   "cylDeact": "N", "mpgData": "", "createdOn": null}),
            json!({"vehicle_id": "47004", "fuel_type": "Not Rated", "city08": null,
                   "cylDeact": "N", "mpgData": "Not Rated", "createdOn": null}),
        ],
    )
}

// =============================================================================
// Schema Inferencer
// =============================================================================

#[test]
fn test_inferred_descriptor_round_trips_through_file() {
    let data = fuel();
    let descriptor = SchemaInferencer::new().infer("fuel", &data);

    assert_eq!(descriptor.kind("vehicle_id"), Some(ColumnKind::Int));
    assert_eq!(descriptor.kind("city08"), Some(ColumnKind::Float));
    assert_eq!(descriptor.kind("cylDeact"), Some(ColumnKind::Boolean));
    assert_eq!(descriptor.kind("mpgData"), Some(ColumnKind::Boolean));
    assert_eq!(descriptor.kind("createdOn"), Some(ColumnKind::Datetime));
    assert_eq!(descriptor.columns["createdOn"].example, json!("2024-01-05T00:00:00Z"));

    let dir = tempdir().unwrap();
    let path = descriptor.path_in(dir.path());
    descriptor.save(&path).unwrap();
    let loaded = TypeDescriptor::load(&path).unwrap();

    assert_eq!(loaded, descriptor);
    assert_eq!(loaded.fingerprint(), descriptor.fingerprint());
    assert!(loaded.drift(&descriptor).is_empty());
}

// =============================================================================
// Normalizer
// =============================================================================

#[test]
fn test_boolean_round_trip() {
    let data = fuel();
    let descriptor = SchemaInferencer::new().infer("fuel", &data);

    let out = Normalizer::new(NormalizerConfig::default().with_id_column("vehicle_id"))
        .normalize(&data, &descriptor);

    let decoded: Vec<&Cell> = (0..4)
        .map(|row| out.table.value(row, "mpgData_bool").unwrap())
        .collect();
    assert_eq!(
        decoded,
        vec![&Cell::Bool(true), &Cell::Bool(false), &Cell::Null, &Cell::Null]
    );
    // source column is kept
    assert_eq!(out.table.value(0, "mpgData"), Some(&Cell::Text("Yes".into())));
}

#[test]
fn test_sentinels_become_null_and_columns_are_typed() {
    let data = fuel();
    let descriptor = SchemaInferencer::new().infer("fuel", &data);

    let out = Normalizer::default().normalize(&data, &descriptor);
    let table = &out.table;

    assert_eq!(table.value(1, "fuelType"), Some(&Cell::Null));
    assert_eq!(table.value(3, "fuelType"), Some(&Cell::Null));
    assert_eq!(table.value(0, "vehicleId"), Some(&Cell::Int(47001)));
    assert_eq!(table.value(0, "city08"), Some(&Cell::Float(21.123)));
    assert_eq!(table.value(2, "city08"), Some(&Cell::Float(18.5)));
    assert!(matches!(table.value(0, "createdOn"), Some(Cell::DateTime(_))));
    assert!(out.report.failed.is_empty());
}

#[test]
fn test_normalization_is_idempotent() {
    let data = fuel();
    let descriptor = SchemaInferencer::new().infer("fuel", &data);
    let normalizer = Normalizer::new(NormalizerConfig::default().with_id_column("vehicle_id"));

    let once = normalizer.normalize(&data, &descriptor);
    let twice = normalizer.normalize(&once.table, &descriptor);

    assert_eq!(twice.table, once.table);
    assert!(twice.derived.is_empty());
    assert_eq!(twice.report.duplicates_removed, 0);
    assert!(twice.report.failed.is_empty());
}

#[test]
fn test_normalizing_a_written_file_keeps_values() {
    let data = fuel();
    let descriptor = SchemaInferencer::new().infer("fuel", &data);
    let normalizer = Normalizer::default();
    let once = normalizer.normalize(&data, &descriptor);

    let dir = tempdir().unwrap();
    let path = dir.path().join("fuel.csv");
    write_path(&path, &once.table, DelimitedFormat::comma()).unwrap();
    let read_back = read_path(&path, DelimitedFormat::comma()).unwrap();

    let twice = normalizer.normalize(&read_back, &descriptor);

    assert_eq!(twice.table.columns, once.table.columns);
    assert!(twice.report.failed.is_empty());
    for column in ["vehicleId", "city08", "createdOn", "fuelType"] {
        assert_eq!(
            twice.table.column_cells(column),
            once.table.column_cells(column),
            "column {}",
            column
        );
    }
}

#[test]
fn test_station_connectors_become_derived_rows() {
    let data = dataset(
        "stations",
        vec![json!({"id": 5, "station_name": "Depot", "connectors": [
            {"id": 10, "type": "A"},
            {"id": 11, "type": "B"}
        ]})],
    );
    let descriptor = SchemaInferencer::new().infer("stations", &data);

    let out = Normalizer::default().normalize(&data, &descriptor);

    assert!(out.table.column_index("connectors").is_none());
    assert_eq!(out.table.columns, vec!["id", "stationName"]);
    assert_eq!(out.derived.len(), 1);

    let connectors = &out.derived[0];
    assert_eq!(connectors.name, "connectors");
    assert_eq!(connectors.columns, vec!["id", "connectorsId", "connectorsType"]);
    assert_eq!(
        connectors.rows,
        vec![
            vec![Cell::Int(5), Cell::Int(10), Cell::Text("A".into())],
            vec![Cell::Int(5), Cell::Int(11), Cell::Text("B".into())],
        ]
    );
}

#[test]
fn test_rename_collision_then_dedupe_collapses_rows() {
    let data = Dataset::with_rows(
        "stations",
        vec!["id".into(), "fuel_type".into(), "fuelType".into()],
        vec![
            vec![Cell::Int(1), Cell::Text("ELEC".into()), Cell::Null],
            vec![Cell::Int(1), Cell::Null, Cell::Text("ELEC".into())],
            vec![Cell::Int(2), Cell::Text("HY".into()), Cell::Null],
        ],
    );

    let out = Normalizer::default().normalize(&data, &TypeDescriptor::new("stations"));

    assert_eq!(out.table.columns, vec!["id", "fuelType"]);
    assert_eq!(
        out.table.rows,
        vec![
            vec![Cell::Int(1), Cell::Text("ELEC".into())],
            vec![Cell::Int(2), Cell::Text("HY".into())],
        ]
    );
    assert_eq!(out.report.duplicates_removed, 1);
}

#[test]
fn test_unconvertible_datetime_column_left_unchanged() {
    let data = dataset(
        "recalls",
        vec![
            json!({"id": 1, "ReportReceivedDate": "2024-03-01"}),
            json!({"id": 2, "ReportReceivedDate": "next week"}),
        ],
    );
    let descriptor = TypeDescriptor::new("recalls")
        .with_column("ReportReceivedDate", ColumnKind::Datetime, json!("2024-03-01"));

    let out = Normalizer::default().normalize(&data, &descriptor);

    assert_eq!(out.report.failed.len(), 1);
    assert_eq!(
        out.table.value(0, "reportReceivedDate"),
        Some(&Cell::Text("2024-03-01".into()))
    );
}
