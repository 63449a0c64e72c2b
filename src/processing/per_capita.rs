//! Per-million normalization against the population reference.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::PipelineResult;
use crate::processing::window::round_to;
use crate::reference::PopulationSource;
use crate::types::{DataSet, DataType, Field, Value};

/// Add `<m>_per_million = m / (population / 1e6)`, rounded to 3 places, for every measure.
///
/// Locations without a positive population get null per-capita values; they are reported
/// once at `warn` level. No population column is added to the table.
pub fn inject_per_million<S>(table: &mut DataSet, measures: &[String], population: &S) -> PipelineResult<()>
where
    S: PopulationSource + ?Sized,
{
    let loc_idx = table.schema.require("location")?;
    let sources = measures
        .iter()
        .map(|m| table.schema.require(m))
        .collect::<PipelineResult<Vec<_>>>()?;

    let mut lookup: BTreeMap<&str, Option<f64>> = BTreeMap::new();
    for row in &table.rows {
        if let Some(location) = row[loc_idx].as_str() {
            lookup.entry(location).or_insert_with(|| {
                population
                    .population(location)
                    .map(|p| p.value)
                    .filter(|v| *v > 0.0)
            });
        }
    }
    let missing: BTreeSet<&str> = lookup
        .iter()
        .filter(|(_, p)| p.is_none())
        .map(|(l, _)| *l)
        .collect();
    if !missing.is_empty() {
        tracing::warn!(
            count = missing.len(),
            locations = ?missing,
            "no population for locations; per-capita values are null"
        );
    }

    let per_row: Vec<Option<f64>> = table
        .rows
        .iter()
        .map(|row| row[loc_idx].as_str().and_then(|l| lookup.get(l).copied().flatten()))
        .collect();

    for (measure, &source) in measures.iter().zip(&sources) {
        let column = table
            .rows
            .iter()
            .zip(&per_row)
            .map(|(row, pop)| {
                let per_million = match (row[source].as_f64(), pop) {
                    (Some(v), Some(p)) => Some(round_to(v / (p / 1e6), 3)),
                    _ => None,
                };
                Value::from_f64(per_million)
            })
            .collect();
        table.set_column(
            Field::new(format!("{measure}_per_million"), DataType::Float64),
            column,
        );
    }
    Ok(())
}
