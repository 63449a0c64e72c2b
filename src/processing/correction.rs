//! Anomaly corrections on the daily deltas.
//!
//! Applied in order:
//!
//! 1. negative `new_cases`/`new_deaths` become null (totals are left alone)
//! 2. the manual correction table nulls individual `(location, date, metric)` deltas
//! 3. a short run of trailing zeros after a large count is treated as reporting lag and
//!    nulled, see [`trailing_lag_start`]

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::config::{CorrectionEntry, Metric, RecentZeroRule};
use crate::error::PipelineResult;
use crate::execution::ExecutionEngine;
use crate::processing::map;
use crate::processing::series::LocationIndex;
use crate::types::{DataSet, Value};

/// Apply all three corrections to `table` in place.
pub fn correct_anomalies(
    engine: &ExecutionEngine,
    table: &mut DataSet,
    corrections: &[CorrectionEntry],
    rule: &RecentZeroRule,
) -> PipelineResult<()> {
    let date_idx = table.schema.require("date")?;
    let loc_idx = table.schema.require("location")?;
    let metric_idxs = Metric::ALL
        .iter()
        .map(|m| Ok((*m, table.schema.require(&m.new_column())?)))
        .collect::<PipelineResult<Vec<_>>>()?;

    let manual: HashSet<(&str, NaiveDate, Metric)> = corrections
        .iter()
        .map(|c| (c.location.as_str(), c.date, c.metric))
        .collect();

    let mut negatives = 0usize;
    let mut overridden = 0usize;
    let corrected = map(table, |row| {
        let mut out = row.to_vec();
        let location = row[loc_idx].as_str().unwrap_or_default();
        let date = row[date_idx].as_date();
        for &(metric, idx) in &metric_idxs {
            if matches!(out[idx].as_f64(), Some(v) if v < 0.0) {
                out[idx] = Value::Null;
                negatives += 1;
            }
            if let Some(date) = date {
                if manual.contains(&(location, date, metric)) {
                    out[idx] = Value::Null;
                    overridden += 1;
                }
            }
        }
        out
    });
    *table = corrected;

    let index = LocationIndex::build(table)?;
    let view: &DataSet = table;
    let to_null: Vec<Vec<(usize, usize)>> = engine.per_location(&index, |series| {
        let dates = series.dates(view, date_idx);
        let mut cells = Vec::new();
        for &(metric, idx) in &metric_idxs {
            let values = series.values(view, idx);
            if let Some(start) =
                trailing_lag_start(&values, &dates, rule.min_last(metric), rule.max_gap_days)
            {
                cells.extend(series.rows[start..].iter().map(|&r| (r, idx)));
            }
        }
        cells
    });

    let mut lagged = 0usize;
    for (r, idx) in to_null.into_iter().flatten() {
        if !table.rows[r][idx].is_null() {
            lagged += 1;
        }
        table.rows[r][idx] = Value::Null;
    }

    tracing::debug!(negatives, overridden, lagged, "nulled anomalous daily deltas");
    Ok(())
}

/// Position (in the ordered series) from which trailing values look like reporting lag.
///
/// Finds the latest strictly positive value. If it is not on the last reported date, is at
/// least `min_last`, and lies fewer than `max_gap_days` days before the last reported date,
/// everything after it is suspect. A series that never goes positive is left alone.
pub fn trailing_lag_start(
    values: &[Option<f64>],
    dates: &[NaiveDate],
    min_last: f64,
    max_gap_days: i64,
) -> Option<usize> {
    let last_date = *dates.last()?;
    let pos = values.iter().rposition(|v| matches!(v, Some(x) if *x > 0.0))?;
    let last_value = values[pos]?;
    let gap = (last_date - dates[pos]).num_days();
    (gap > 0 && last_value >= min_last && gap < max_gap_days).then_some(pos + 1)
}

#[cfg(test)]
mod tests {
    use super::{correct_anomalies, trailing_lag_start};
    use crate::config::{CorrectionEntry, Metric, RecentZeroRule};
    use crate::execution::{ExecutionEngine, ExecutionOptions};
    use crate::types::{DataSet, DataType, Field, Schema, Value};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 4, d).unwrap()
    }

    fn table(location: &str, cases: &[Option<i64>], deaths: &[Option<i64>]) -> DataSet {
        let schema = Schema::new(vec![
            Field::new("date", DataType::Date),
            Field::new("location", DataType::Utf8),
            Field::new("new_cases", DataType::Int64),
            Field::new("new_deaths", DataType::Int64),
        ]);
        let rows = cases
            .iter()
            .zip(deaths)
            .enumerate()
            .map(|(i, (c, d))| {
                vec![
                    Value::Date(day(i as u32 + 1)),
                    Value::Utf8(location.into()),
                    Value::from_i64(*c),
                    Value::from_i64(*d),
                ]
            })
            .collect();
        DataSet::new(schema, rows)
    }

    fn column(ds: &DataSet, name: &str) -> Vec<Option<f64>> {
        ds.numeric_column(name).unwrap()
    }

    fn engine() -> ExecutionEngine {
        ExecutionEngine::new(&ExecutionOptions::sequential()).unwrap()
    }

    #[test]
    fn negative_deltas_become_null() {
        let mut ds = table("A", &[Some(100), Some(-5), Some(50)], &[Some(1), Some(2), Some(-1)]);
        correct_anomalies(&engine(), &mut ds, &[], &RecentZeroRule::default()).unwrap();
        assert_eq!(column(&ds, "new_cases"), vec![Some(100.0), None, Some(50.0)]);
        assert_eq!(column(&ds, "new_deaths"), vec![Some(1.0), Some(2.0), None]);
    }

    #[test]
    fn manual_corrections_match_location_date_and_metric() {
        let mut ds = table("A", &[Some(10), Some(20), Some(30)], &[Some(1), Some(2), Some(3)]);
        let corrections = vec![
            CorrectionEntry::new("A", day(2), Metric::Deaths),
            CorrectionEntry::new("B", day(1), Metric::Cases),
        ];
        correct_anomalies(&engine(), &mut ds, &corrections, &RecentZeroRule::default()).unwrap();
        assert_eq!(column(&ds, "new_cases"), vec![Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(column(&ds, "new_deaths"), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn short_zero_run_after_large_count_is_hidden() {
        let mut ds = table(
            "A",
            &[Some(50), Some(120), Some(0), Some(0)],
            &[Some(3), Some(12), Some(0), Some(4)],
        );
        correct_anomalies(&engine(), &mut ds, &[], &RecentZeroRule::default()).unwrap();
        assert_eq!(column(&ds, "new_cases"), vec![Some(50.0), Some(120.0), None, None]);
        // Deaths end on a positive value, so nothing is hidden.
        assert_eq!(
            column(&ds, "new_deaths"),
            vec![Some(3.0), Some(12.0), Some(0.0), Some(4.0)]
        );
    }

    #[test]
    fn trailing_lag_rules() {
        let dates: Vec<NaiveDate> = (1..=10).map(day).collect();

        // Small last value: trusted.
        let v = [Some(5.0), Some(0.0)];
        assert_eq!(trailing_lag_start(&v, &dates[..2], 100.0, 7), None);

        // Seven or more days of zeros: trusted.
        let mut long = vec![Some(500.0)];
        long.extend(std::iter::repeat_n(Some(0.0), 7));
        assert_eq!(trailing_lag_start(&long, &dates[..8], 100.0, 7), None);

        // Six days: hidden from position 1.
        assert_eq!(trailing_lag_start(&long[..7], &dates[..7], 100.0, 7), Some(1));

        // Never positive: untouched.
        let zeros = [Some(0.0), None, Some(0.0)];
        assert_eq!(trailing_lag_start(&zeros, &dates[..3], 100.0, 7), None);
    }

    #[test]
    fn cases_without_positives_do_not_block_deaths_rule() {
        let mut ds = table("A", &[Some(0), Some(0), Some(0)], &[Some(1), Some(15), Some(0)]);
        correct_anomalies(&engine(), &mut ds, &[], &RecentZeroRule::default()).unwrap();
        assert_eq!(column(&ds, "new_cases"), vec![Some(0.0), Some(0.0), Some(0.0)]);
        assert_eq!(column(&ds, "new_deaths"), vec![Some(1.0), Some(15.0), None]);
    }
}
