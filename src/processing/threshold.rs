//! "Days since threshold" indices and doubling-time estimates.

use std::f64::consts::LN_2;

use crate::config::{DoublingSpec, ThresholdSpec};
use crate::error::PipelineResult;
use crate::execution::ExecutionEngine;
use crate::processing::series::LocationIndex;
use crate::processing::window::{pct_change, round_to};
use crate::types::{DataSet, DataType, Field, Value};

/// Add `spec.output_name`: whole days between each row's date and the first date on which
/// the location's `source_column` reached `spec.threshold`.
///
/// Rows before the crossing get negative offsets unless `positive_only` is set, in which case
/// they are null. A location that never crosses is null throughout.
pub fn inject_days_since(engine: &ExecutionEngine, table: &mut DataSet, spec: &ThresholdSpec) -> PipelineResult<()> {
    let index = LocationIndex::build(table)?;
    let source = table.schema.require(&spec.source_column)?;
    let date_idx = index.date_idx();

    let view: &DataSet = table;
    let per_series = engine.per_location(&index, |series| {
        let dates = series.dates(view, date_idx);
        let values = series.values(view, source);
        let crossed = values
            .iter()
            .position(|v| matches!(v, Some(x) if *x >= spec.threshold))
            .map(|i| dates[i]);

        dates
            .iter()
            .map(|date| {
                let Some(reference) = crossed else {
                    return Value::Null;
                };
                let days = (*date - reference).num_days();
                if spec.positive_only && days < 0 {
                    Value::Null
                } else {
                    Value::Int64(days)
                }
            })
            .collect::<Vec<_>>()
    });

    let column = index.scatter(table.row_count(), per_series);
    table.set_column(Field::new(spec.output_name.as_str(), DataType::Int64), column);
    Ok(())
}

/// Add `spec.output_name`: `periods * ln 2 / ln(1 + pct)` with `pct` the change of
/// `source_column` over `periods` rows, rounded to 2 places.
///
/// Exact zeros of the source column are replaced by null in `table` first, and stay null for
/// every later stage. A missing, zero or negative change gives null.
pub fn inject_doubling_days(engine: &ExecutionEngine, table: &mut DataSet, spec: &DoublingSpec) -> PipelineResult<()> {
    let index = LocationIndex::build(table)?;
    let source = table.schema.require(&spec.source_column)?;

    let mut zeros = 0usize;
    for row in &mut table.rows {
        if row[source].as_f64() == Some(0.0) {
            row[source] = Value::Null;
            zeros += 1;
        }
    }
    tracing::debug!(column = %spec.source_column, zeros, "nulled zero totals before doubling");

    let periods = spec.periods;
    let view: &DataSet = table;
    let per_series = engine.per_location(&index, |series| {
        pct_change(&series.values(view, source), periods)
            .into_iter()
            .map(|pct| Value::from_f64(doubling_days(pct, periods)))
            .collect::<Vec<_>>()
    });

    let column = index.scatter(table.row_count(), per_series);
    table.set_column(Field::new(spec.output_name.as_str(), DataType::Float64), column);
    Ok(())
}

fn doubling_days(pct: Option<f64>, periods: usize) -> Option<f64> {
    let pct = pct.filter(|p| *p > 0.0)?;
    Some(round_to(periods as f64 * LN_2 / pct.ln_1p(), 2))
}
