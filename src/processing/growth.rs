//! Growth and rate columns: weekly/biweekly rolling totals and their growth, right-aligned
//! rolling averages and the case-fatality ratio.

use crate::config::{GrowthSpec, Metric, RollingSpec};
use crate::error::PipelineResult;
use crate::execution::ExecutionEngine;
use crate::processing::series::LocationIndex;
use crate::processing::window::{pct_change, rolling_mean, rolling_sum, round_to};
use crate::types::{DataSet, DataType, Field, Value};

/// Add `<prefix>_cases`, `<prefix>_deaths`, `<prefix>_pct_growth_cases` and
/// `<prefix>_pct_growth_deaths`.
///
/// The rolling total needs `period_days - 1` present values. Growth compares it with the
/// total `period_days` rows earlier, rounded to 3 places as a fraction and then scaled to a
/// percentage; infinite or undefined ratios are null. The growth uses the totals as rolled
/// up; only afterwards is a total nulled on rows whose own daily value is null.
pub fn inject_growth(engine: &ExecutionEngine, table: &mut DataSet, spec: &GrowthSpec) -> PipelineResult<()> {
    let index = LocationIndex::build(table)?;
    let period = spec.period_days;

    for metric in Metric::ALL {
        let source = table.schema.require(&metric.new_column())?;
        let view: &DataSet = table;
        let per_series: Vec<(Vec<Value>, Vec<Value>)> = engine.per_location(&index, |series| {
            let daily = series.values(view, source);
            let totals = rolling_sum(&daily, period, period - 1);
            let growth: Vec<Value> = pct_change(&totals, period)
                .into_iter()
                .map(|g| Value::from_f64(g.map(|g| round_to(g, 3) * 100.0)))
                .collect();
            let totals: Vec<Value> = totals
                .iter()
                .zip(&daily)
                .map(|(t, d)| Value::from_f64(d.and(*t)))
                .collect();
            (totals, growth)
        });
        let (totals, growth): (Vec<_>, Vec<_>) = per_series.into_iter().unzip();

        let n = table.row_count();
        table.set_column(
            Field::new(format!("{}_{}", spec.prefix, metric.as_str()), DataType::Float64),
            index.scatter(n, totals),
        );
        table.set_column(
            Field::new(format!("{}_pct_growth_{}", spec.prefix, metric.as_str()), DataType::Float64),
            index.scatter(n, growth),
        );
    }
    Ok(())
}

/// Add a right-aligned rolling mean column, rounded to 3 places.
pub fn inject_rolling_avg(engine: &ExecutionEngine, table: &mut DataSet, spec: &RollingSpec) -> PipelineResult<()> {
    let index = LocationIndex::build(table)?;
    let source = table.schema.require(&spec.source_column)?;
    let view: &DataSet = table;
    let per_series = engine.per_location(&index, |series| {
        rolling_mean(&series.values(view, source), spec.window, spec.min_periods)
            .into_iter()
            .map(|v| Value::from_f64(v.map(|x| round_to(x, 3))))
            .collect::<Vec<_>>()
    });
    let column = index.scatter(table.row_count(), per_series);
    table.set_column(Field::new(spec.output_name.as_str(), DataType::Float64), column);
    Ok(())
}

/// Add `cfr` (deaths per 100 cases, 3 places) and `cfr_100_cases` (the same value only where
/// `total_cases >= min_cases`).
pub fn inject_cfr(table: &mut DataSet, min_cases: f64) -> PipelineResult<()> {
    let cases = table.numeric_column("total_cases")?;
    let deaths = table.numeric_column("total_deaths")?;

    let cfr: Vec<Option<f64>> = cases
        .iter()
        .zip(&deaths)
        .map(|(c, d)| match (c, d) {
            (Some(c), Some(d)) if *c != 0.0 => Some(round_to(d / c * 100.0, 3)),
            _ => None,
        })
        .collect();
    let cfr_100: Vec<Value> = cfr
        .iter()
        .zip(&cases)
        .map(|(r, c)| match c {
            Some(c) if *c >= min_cases => Value::from_f64(*r),
            _ => Value::Null,
        })
        .collect();

    table.set_column(
        Field::new("cfr", DataType::Float64),
        cfr.into_iter().map(Value::from_f64).collect(),
    );
    table.set_column(Field::new("cfr_100_cases", DataType::Float64), cfr_100);
    Ok(())
}
