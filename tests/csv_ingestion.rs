use chrono::NaiveDate;
use epi_series::ingestion::csv::{ingest_csv_from_path, ingest_csv_from_reader};
use epi_series::ingestion::{ingest_raw_csv, raw_schema};
use epi_series::reference::{PopulationSource, PopulationTable};
use epi_series::types::{DataType, Field, Schema, Value};

fn date(s: &str) -> Value {
    Value::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
}

#[test]
fn ingest_raw_csv_keeps_present_columns_only() {
    let ds = ingest_raw_csv("tests/fixtures/raw_cases.csv").unwrap();

    assert_eq!(
        ds.schema.field_names().collect::<Vec<_>>(),
        vec!["date", "location", "new_cases", "total_deaths"]
    );
    assert_eq!(ds.row_count(), 6);
    assert_eq!(
        ds.rows[0],
        vec![
            date("2020-03-01"),
            Value::Utf8("France".to_string()),
            Value::Int64(120),
            Value::Int64(1),
        ]
    );
    // Empty cell is null; "22.0" is accepted as a count.
    assert_eq!(ds.rows[4][2], Value::Null);
    assert_eq!(ds.rows[5][2], Value::Int64(22));
}

#[test]
fn ingest_csv_allows_reordered_columns() {
    let input = "total_deaths,new_deaths,location,date,total_cases,new_cases\n3,1,Chile,2020-04-01,10,2\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let ds = ingest_csv_from_reader(&mut rdr, &raw_schema()).unwrap();
    assert_eq!(ds.row_count(), 1);
    assert_eq!(ds.rows[0][0], date("2020-04-01"));
    assert_eq!(ds.rows[0][1], Value::Utf8("Chile".to_string()));
    assert_eq!(ds.rows[0][5], Value::Int64(3));
}

#[test]
fn ingest_csv_errors_on_missing_required_column() {
    let input = "date,location,new_cases\n2020-04-01,Chile,2\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = ingest_csv_from_reader(&mut rdr, &raw_schema()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("schema mismatch"));
    assert!(msg.contains("missing required column 'new_deaths'"));
}

#[test]
fn ingest_csv_errors_on_bad_date() {
    let schema = Schema::new(vec![
        Field::new("date", DataType::Date),
        Field::new("location", DataType::Utf8),
    ]);
    let input = "date,location\n2020-02-30,Chile\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = ingest_csv_from_reader(&mut rdr, &schema).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("row 2"));
    assert!(msg.contains("column 'date'"));
    assert!(msg.contains("raw='2020-02-30'"));
}

#[test]
fn ingest_csv_errors_on_fractional_count() {
    let input = "date,location,new_cases,new_deaths,total_cases,total_deaths\n2020-04-01,Chile,2.5,0,1,0\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let err = ingest_csv_from_reader(&mut rdr, &raw_schema()).unwrap_err();
    assert!(err.to_string().contains("expected integer"));
}

#[test]
fn ingest_csv_from_path_reports_missing_file() {
    let err = ingest_csv_from_path("tests/fixtures/does_not_exist.csv", &raw_schema()).unwrap_err();
    assert!(err.to_string().starts_with("csv error"));
}

#[test]
fn population_table_from_csv_fixture() {
    let table = PopulationTable::from_csv_path("tests/fixtures/population.csv").unwrap();
    assert_eq!(table.len(), 3);

    let france = table.population("France").unwrap();
    assert_eq!(france.value, 65_273_512.0);
    assert_eq!(france.year, 2020);
    assert!(table.population("Atlantis").is_none());
}
