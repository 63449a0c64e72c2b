//! Exemplar flags: which countries are comparable on the "days since 100 cases" timeline.

use crate::config::ExemplarRule;
use crate::error::PipelineResult;
use crate::reference::{PopulationSource, ReferenceData};
use crate::types::{DataSet, DataType, Field, Value};

/// Days since 100 cases, kept only for locations above the population floor.
pub const DAYS_SINCE_WITH_POPULATION: &str = "days_since_100_total_cases_and_5m_pop";
/// 1 when a location passes every exemplar gate, else 0.
pub const EXEMPLAR_FLAG: &str = "5m_pop_and_21_days_since_100_cases_and_testing";

/// Add [`DAYS_SINCE_WITH_POPULATION`] and [`EXEMPLAR_FLAG`].
///
/// The flag is never null: a missing population or days-since value fails the gate.
pub fn inject_exemplars(table: &mut DataSet, rule: &ExemplarRule, reference: &ReferenceData) -> PipelineResult<()> {
    let loc_idx = table.schema.require("location")?;
    let days_idx = table.schema.require(&rule.days_since_column)?;

    let (days, flags): (Vec<Value>, Vec<Value>) = table
        .rows
        .iter()
        .map(|row| {
            let location = row[loc_idx].as_str().unwrap_or_default();
            let big_enough = reference
                .population(location)
                .is_some_and(|p| p.value >= rule.min_population);
            let days = row[days_idx].as_f64();

            let kept = if big_enough { row[days_idx].clone() } else { Value::Null };
            let passes = big_enough
                && days.is_some_and(|d| d >= rule.min_days_since as f64)
                && reference.has_testing_data(location);
            (kept, Value::Int64(i64::from(passes)))
        })
        .unzip();

    table.set_column(Field::new(DAYS_SINCE_WITH_POPULATION, DataType::Int64), days);
    table.set_column(Field::new(EXEMPLAR_FLAG, DataType::Int64), flags);
    Ok(())
}
