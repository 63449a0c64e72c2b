//! Synthetic aggregate locations (World, continents, income groups, exclusion sets).

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::config::AggregateSpec;
use crate::error::{PipelineError, PipelineResult};
use crate::processing::{ReduceOp, filter, reduce_rows};
use crate::types::{DataSet, Value};

/// Append one synthetic location per spec, summing every numeric column per date.
///
/// Only the rows present on entry take part: an aggregate never includes another aggregate.
/// Specs are emitted in declaration order, each ordered by date. Dates without any matching
/// location produce no row. A sum over contributors that are all null is null.
pub fn inject_aggregates(table: &mut DataSet, specs: &[AggregateSpec]) -> PipelineResult<()> {
    let date_idx = table.schema.require("date")?;
    let loc_idx = table.schema.require("location")?;

    let real_locations: BTreeSet<&str> = table.rows.iter().filter_map(|r| r[loc_idx].as_str()).collect();
    if let Some(clash) = specs.iter().find(|s| real_locations.contains(s.name.as_str())) {
        return Err(PipelineError::SchemaMismatch {
            message: format!("aggregate '{}' collides with an input location", clash.name),
        });
    }

    let mut appended: Vec<Vec<Value>> = Vec::new();
    for spec in specs {
        let members = filter(table, |row| row[loc_idx].as_str().is_some_and(|l| spec.matches(l)));

        let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (r, row) in members.rows.iter().enumerate() {
            if let Some(date) = row[date_idx].as_date() {
                by_date.entry(date).or_default().push(r);
            }
        }

        for (date, rows) in &by_date {
            let row = members
                .schema
                .fields
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    if i == date_idx {
                        Value::Date(*date)
                    } else if i == loc_idx {
                        Value::Utf8(spec.name.clone())
                    } else if field.data_type.is_numeric() {
                        reduce_rows(&members, rows, &field.name, ReduceOp::Sum).unwrap_or(Value::Null)
                    } else {
                        Value::Null
                    }
                })
                .collect();
            appended.push(row);
        }

        tracing::debug!(
            aggregate = %spec.name,
            locations = members
                .rows
                .iter()
                .filter_map(|r| r[loc_idx].as_str())
                .collect::<BTreeSet<_>>()
                .len(),
            dates = by_date.len(),
            "synthesized aggregate"
        );
    }

    table.rows.extend(appended);
    Ok(())
}
