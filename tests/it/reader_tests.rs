use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sensor_import::{
    Engine, EngineValue, ImportError, NumericArray, ReadOutcome, SourceFormat, TabularReader,
};
use tempfile::TempDir;

use crate::helpers::{indexed_table, write_csv, write_workbook, FakeEngine};

fn reader_with(engine: Arc<FakeEngine>) -> TabularReader {
    let engine: Arc<dyn Engine> = engine;
    TabularReader::new(Some(engine))
}

#[test]
fn csv_with_header_reads_all_data_rows() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "imu.csv", &indexed_table(100, 6));

    let outcome = TabularReader::default().read(&path).unwrap();
    let ReadOutcome::Single(table) = outcome else {
        panic!("expected a single table");
    };
    assert_eq!(table.shape(), (100, 6));
    assert_eq!(table.get(0, 0), Some(0.0));
    assert_eq!(table.get(99, 5), Some(9905.0));
}

#[test]
fn unknown_extension_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "1,2,3\n").unwrap();

    let err = TabularReader::default().read(&path).unwrap_err();
    match err {
        ImportError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "txt"),
        other => panic!("expected UnsupportedFormat, got {other:?}"),
    }
}

#[test]
fn extension_is_matched_case_insensitively() {
    assert_eq!(
        SourceFormat::from_path(Path::new("RUN.XLSX")).unwrap(),
        SourceFormat::Xlsx
    );
    assert!(SourceFormat::from_path(Path::new("no_extension")).is_err());
}

#[test]
fn container_variables_become_tables() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.mat");
    let table = indexed_table(4, 3);
    let mut vars = BTreeMap::new();
    vars.insert(
        "imu".to_string(),
        EngineValue::Numeric(NumericArray::from_table(&table)),
    );
    vars.insert(
        "label".to_string(),
        EngineValue::Other {
            class: "char".to_string(),
        },
    );
    FakeEngine::write_container(&path, &vars);

    let outcome = reader_with(FakeEngine::ready()).read(&path).unwrap();
    assert_eq!(outcome, ReadOutcome::Single(table));
}

#[test]
fn container_with_two_arrays_is_a_collection() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.mat");
    let mut vars = BTreeMap::new();
    vars.insert(
        "a".to_string(),
        EngineValue::Numeric(NumericArray::from_table(&indexed_table(5, 2))),
    );
    vars.insert(
        "b".to_string(),
        EngineValue::Numeric(NumericArray::from_vector(&[1.0, 2.0, 3.0])),
    );
    FakeEngine::write_container(&path, &vars);

    let outcome = reader_with(FakeEngine::ready()).read(&path).unwrap();
    assert!(matches!(outcome, ReadOutcome::Many(_)));
    assert_eq!(outcome.shapes(), vec![(5, 2), (3, 1)]);
}

#[test]
fn container_needs_a_ready_engine() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.mat");
    FakeEngine::write_container(&path, &BTreeMap::new());

    let err = reader_with(FakeEngine::stopped()).read(&path).unwrap_err();
    assert!(matches!(err, ImportError::EngineUnavailable { .. }));
    let err = TabularReader::default().read(&path).unwrap_err();
    assert!(matches!(err, ImportError::EngineUnavailable { .. }));
}

#[test]
fn corrupt_container_is_read_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.mat");
    std::fs::write(&path, b"\x00\x01 not a container").unwrap();

    let err = reader_with(FakeEngine::ready()).read(&path).unwrap_err();
    assert!(matches!(err, ImportError::ReadFailure { .. }));
}

#[test]
fn file_info_reports_shapes() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "imu.csv", &indexed_table(10, 4));

    let info = TabularReader::default().file_info(&path).unwrap();
    assert_eq!(info.format, SourceFormat::Csv);
    assert_eq!(info.shapes, vec![(10, 4)]);
    assert!(info.size_mib > 0.0);
    assert!(info.to_string().contains("10 rows x 4 columns"));
}

// ============================================================================
// Spreadsheets
// ============================================================================

#[test]
fn one_sheet_workbook_is_a_single_table_without_header() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(
        dir.path(),
        "imu.xlsx",
        &[("imu", vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])],
    );

    let outcome = TabularReader::default().read(&path).unwrap();
    let ReadOutcome::Single(table) = outcome else {
        panic!("expected a single table");
    };
    assert_eq!(table.shape(), (2, 3));
    assert_eq!(table.row(0), Some(&[1.0, 2.0, 3.0][..]));
    assert_eq!(table.row(1), Some(&[4.0, 5.0, 6.0][..]));
}

#[test]
fn sheets_are_read_in_workbook_order_and_empty_ones_skipped() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(
        dir.path(),
        "session.xlsx",
        &[
            ("second_run", vec![vec![1.0, 2.0]; 3]),
            ("notes", vec![]),
            ("first_run", vec![vec![7.0, 8.0, 9.0]; 5]),
        ],
    );

    let outcome = TabularReader::default().read(&path).unwrap();
    assert!(matches!(outcome, ReadOutcome::Many(_)));
    assert_eq!(outcome.shapes(), vec![(3, 2), (5, 3)]);
    assert_eq!(outcome.first().unwrap().get(0, 1), Some(2.0));
}

#[test]
fn workbook_with_only_empty_sheets_has_no_tables() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path(), "blank.xlsx", &[("a", vec![]), ("b", vec![])]);

    let outcome = TabularReader::default().read(&path).unwrap();
    assert!(outcome.is_empty());
}

#[test]
fn text_in_a_sheet_is_read_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("labels.xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "acc_x").unwrap();
    sheet.write_number(1, 0, 1.0).unwrap();
    sheet.write_string(2, 0, "saturated").unwrap();
    workbook.save(&path).unwrap();

    let err = TabularReader::default().read(&path).unwrap_err();
    assert!(matches!(err, ImportError::ReadFailure { .. }));
    assert!(err.to_string().contains("saturated"), "{err}");
}

// ============================================================================
// Parquet
// ============================================================================

#[test]
fn parquet_keeps_numeric_columns_and_nulls_become_nan() {
    use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("imu.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("acc_x", DataType::Float64, false),
        Field::new("label", DataType::Utf8, false),
        Field::new("temp", DataType::Int32, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])),
        Arc::new(StringArray::from(vec!["rest", "walk", "run"])),
        Arc::new(Int32Array::from(vec![Some(20), None, Some(22)])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let outcome = TabularReader::default().read(&path).unwrap();
    let ReadOutcome::Single(table) = outcome else {
        panic!("expected a single table");
    };
    assert_eq!(table.shape(), (3, 2));
    assert_eq!(table.column(0), Some(vec![0.5, 1.5, 2.5]));
    assert_eq!(table.get(0, 1), Some(20.0));
    assert!(table.get(1, 1).unwrap().is_nan());
    assert_eq!(table.get(2, 1), Some(22.0));
}
