//! Raw table normalization.
//!
//! The acquisition layer may deliver only one member of each `new_*`/`total_*` pair. The
//! missing member is derived per location in date order, in two steps around the anomaly
//! corrections: daily deltas as the first difference of the totals before they run
//! ([`normalize_raw`]), totals as the running sum of the corrected deltas after
//! ([`fill_totals`]).

use crate::config::Metric;
use crate::error::{PipelineError, PipelineResult};
use crate::execution::ExecutionEngine;
use crate::processing::series::LocationIndex;
use crate::processing::window::{cumsum, diff};
use crate::types::{DataSet, DataType, Field, Value};

/// Key and count columns of a normalized table, in order.
pub const RAW_COLUMNS: [&str; 6] = [
    "date",
    "location",
    "new_cases",
    "new_deaths",
    "total_cases",
    "total_deaths",
];

/// Validate the raw table and derive any missing `new_*` column from its total.
///
/// Fails when a metric has neither column, or on a duplicate `(location, date)`.
pub fn normalize_raw(engine: &ExecutionEngine, table: &mut DataSet) -> PipelineResult<()> {
    let index = LocationIndex::build(table)?;

    for metric in Metric::ALL {
        let new_col = metric.new_column();
        let total_col = metric.total_column();
        match (table.schema.index_of(&new_col), table.schema.index_of(&total_col)) {
            (None, Some(total)) => derive(engine, table, &index, total, &new_col, diff),
            (None, None) => {
                return Err(PipelineError::SchemaMismatch {
                    message: format!("raw table has neither '{new_col}' nor '{total_col}'"),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Derive any missing `total_*` column from its daily deltas and project to
/// [`RAW_COLUMNS`].
pub fn fill_totals(engine: &ExecutionEngine, table: &mut DataSet) -> PipelineResult<()> {
    let index = LocationIndex::build(table)?;

    for metric in Metric::ALL {
        let total_col = metric.total_column();
        if table.schema.index_of(&total_col).is_none() {
            let new = table.schema.require(&metric.new_column())?;
            derive(engine, table, &index, new, &total_col, cumsum);
        }
    }

    *table = table.select(&RAW_COLUMNS)?;
    Ok(())
}

fn derive(
    engine: &ExecutionEngine,
    table: &mut DataSet,
    index: &LocationIndex,
    source: usize,
    target: &str,
    op: fn(&[Option<f64>]) -> Vec<Option<f64>>,
) {
    let view: &DataSet = table;
    let per_series = engine.per_location(index, |series| {
        op(&series.values(view, source))
            .into_iter()
            .map(|v| Value::from_i64(v.map(|x| x.round() as i64)))
            .collect::<Vec<_>>()
    });
    let column = index.scatter(table.row_count(), per_series);
    tracing::debug!(column = target, "derived missing count column");
    table.set_column(Field::new(target, DataType::Int64), column);
}

#[cfg(test)]
mod tests {
    use super::{fill_totals, normalize_raw};
    use crate::execution::{ExecutionEngine, ExecutionOptions};
    use crate::types::{DataSet, DataType, Field, Schema, Value};
    use chrono::NaiveDate;

    fn engine() -> ExecutionEngine {
        ExecutionEngine::new(&ExecutionOptions::sequential()).unwrap()
    }

    fn date(day: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(2020, 3, day).unwrap())
    }

    #[test]
    fn derives_totals_from_daily_and_daily_from_totals() {
        let schema = Schema::new(vec![
            Field::new("location", DataType::Utf8),
            Field::new("date", DataType::Date),
            Field::new("new_cases", DataType::Int64),
            Field::new("total_deaths", DataType::Int64),
        ]);
        // Rows deliberately out of date order.
        let a = || Value::Utf8("A".into());
        let mut ds = DataSet::new(
            schema,
            vec![
                vec![a(), date(3), Value::Int64(50), Value::Int64(4)],
                vec![a(), date(1), Value::Int64(100), Value::Int64(1)],
                vec![a(), date(2), Value::Null, Value::Int64(3)],
            ],
        );

        normalize_raw(&engine(), &mut ds).unwrap();
        assert!(ds.schema.index_of("new_deaths").is_some());
        assert!(ds.schema.index_of("total_cases").is_none());

        fill_totals(&engine(), &mut ds).unwrap();
        assert_eq!(
            ds.schema.field_names().collect::<Vec<_>>(),
            vec!["date", "location", "new_cases", "new_deaths", "total_cases", "total_deaths"]
        );
        let total_cases = ds.schema.index_of("total_cases").unwrap();
        let new_deaths = ds.schema.index_of("new_deaths").unwrap();
        // Row order is untouched: day 3, day 1, day 2.
        assert_eq!(ds.rows[0][total_cases], Value::Int64(150));
        assert_eq!(ds.rows[1][total_cases], Value::Int64(100));
        assert_eq!(ds.rows[2][total_cases], Value::Null);
        assert_eq!(ds.rows[0][new_deaths], Value::Int64(1));
        assert_eq!(ds.rows[1][new_deaths], Value::Null);
        assert_eq!(ds.rows[2][new_deaths], Value::Int64(2));
    }

    #[test]
    fn missing_pair_is_a_schema_error() {
        let schema = Schema::new(vec![
            Field::new("date", DataType::Date),
            Field::new("location", DataType::Utf8),
            Field::new("new_cases", DataType::Int64),
        ]);
        let mut ds = DataSet::new(
            schema,
            vec![vec![date(1), Value::Utf8("A".into()), Value::Int64(1)]],
        );
        let err = normalize_raw(&engine(), &mut ds).unwrap_err();
        assert!(err.to_string().contains("neither 'new_deaths' nor 'total_deaths'"));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let schema = Schema::new(vec![
            Field::new("date", DataType::Date),
            Field::new("location", DataType::Utf8),
            Field::new("new_cases", DataType::Int64),
            Field::new("new_deaths", DataType::Int64),
        ]);
        let row = || vec![date(1), Value::Utf8("A".into()), Value::Int64(1), Value::Int64(0)];
        let mut ds = DataSet::new(schema, vec![row(), row()]);
        let err = normalize_raw(&engine(), &mut ds).unwrap_err();
        assert!(err.to_string().starts_with("duplicate record"));
    }
}
