//! Output layouts for the enriched table.
//!
//! - grapher: fixed, renamed column set with dates as day offsets
//! - full data: long table of the base measures, minor aggregates dropped
//! - pivots: one wide table per measure, one column per location, `World` first
//!
//! [`write_csv`] serializes any of them.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use chrono::NaiveDate;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Count measures carried into the full-data table and pivoted.
pub const BASE_MEASURES: [&str; 8] = [
    "new_cases",
    "new_deaths",
    "total_cases",
    "total_deaths",
    "weekly_cases",
    "weekly_deaths",
    "biweekly_cases",
    "biweekly_deaths",
];

/// Per-million counterparts of [`BASE_MEASURES`], in the same order.
pub const PER_MILLION_MEASURES: [&str; 8] = [
    "new_cases_per_million",
    "new_deaths_per_million",
    "total_cases_per_million",
    "total_deaths_per_million",
    "weekly_cases_per_million",
    "weekly_deaths_per_million",
    "biweekly_cases_per_million",
    "biweekly_deaths_per_million",
];

/// Grapher columns in output order, with their published names. Append-only.
pub const GRAPHER_COLUMNS: [(&str, &str); 34] = [
    ("location", "Country"),
    ("date", "Year"),
    ("new_cases", "Daily new confirmed cases of COVID-19"),
    ("new_deaths", "Daily new confirmed deaths due to COVID-19"),
    ("total_cases", "Total confirmed cases of COVID-19"),
    ("total_deaths", "Total confirmed deaths due to COVID-19"),
    ("new_cases_per_million", "Daily new confirmed cases of COVID-19 per million people"),
    ("new_deaths_per_million", "Daily new confirmed deaths due to COVID-19 per million people"),
    ("total_cases_per_million", "Total confirmed cases of COVID-19 per million people"),
    ("total_deaths_per_million", "Total confirmed deaths due to COVID-19 per million people"),
    ("days_since_100_total_cases", "Days since the total confirmed cases of COVID-19 reached 100"),
    ("days_since_5_total_deaths", "Days since the total confirmed deaths of COVID-19 reached 5"),
    (
        "days_since_1_total_cases_per_million",
        "Days since the total confirmed cases of COVID-19 per million people reached 1",
    ),
    (
        "days_since_0_1_total_deaths_per_million",
        "Days since the total confirmed deaths of COVID-19 per million people reached 0.1",
    ),
    (
        "new_cases_7_day_avg_right",
        "Daily new confirmed cases due to COVID-19 (rolling 7-day average, right-aligned)",
    ),
    (
        "new_deaths_7_day_avg_right",
        "Daily new confirmed deaths due to COVID-19 (rolling 7-day average, right-aligned)",
    ),
    (
        "new_cases_per_million_7_day_avg_right",
        "Daily new confirmed cases of COVID-19 per million people (rolling 7-day average, right-aligned)",
    ),
    (
        "new_deaths_per_million_7_day_avg_right",
        "Daily new confirmed deaths due to COVID-19 per million people (rolling 7-day average, right-aligned)",
    ),
    ("cfr", "Case fatality rate of COVID-19 (%)"),
    ("cfr_100_cases", "Case fatality rate of COVID-19 (%) (Only observations with ≥100 cases)"),
    (
        "days_since_100_total_cases_and_5m_pop",
        "Days since the total confirmed cases of COVID-19 reached 100 (with population ≥ 5M)",
    ),
    (
        "5m_pop_and_21_days_since_100_cases_and_testing",
        "Has population ≥ 5M AND had ≥100 cases ≥21 days ago AND has testing data",
    ),
    ("weekly_cases", "Weekly cases"),
    ("weekly_deaths", "Weekly deaths"),
    ("weekly_pct_growth_cases", "Weekly case growth (%)"),
    ("weekly_pct_growth_deaths", "Weekly death growth (%)"),
    ("biweekly_cases", "Biweekly cases"),
    ("biweekly_deaths", "Biweekly deaths"),
    ("biweekly_pct_growth_cases", "Biweekly case growth (%)"),
    ("biweekly_pct_growth_deaths", "Biweekly death growth (%)"),
    ("weekly_cases_per_million", "Weekly cases per million people"),
    ("weekly_deaths_per_million", "Weekly deaths per million people"),
    ("biweekly_cases_per_million", "Biweekly cases per million people"),
    ("biweekly_deaths_per_million", "Biweekly deaths per million people"),
];

/// Everything one run publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBundle {
    pub grapher: DataSet,
    pub full_data: DataSet,
    /// `(measure, pivot)` for the base measures, then the per-million ones.
    pub pivots: Vec<(String, DataSet)>,
}

/// Build all layouts. Any failure fails the whole bundle.
///
/// `excluded` names aggregate locations left out of the full-data table and the pivots;
/// the grapher table keeps every location.
pub fn export(table: &DataSet, epoch: NaiveDate, excluded: &BTreeSet<String>) -> PipelineResult<ExportBundle> {
    let grapher = grapher_table(table, epoch)?;

    let loc_idx = table.schema.require("location")?;
    let published = table.filter_rows(|row| !row[loc_idx].as_str().is_some_and(|l| excluded.contains(l)));
    let full_data = full_data_table(&published)?;

    let pivots = BASE_MEASURES
        .iter()
        .chain(PER_MILLION_MEASURES.iter())
        .map(|measure| Ok(((*measure).to_owned(), pivot_table(&published, measure)?)))
        .collect::<PipelineResult<Vec<_>>>()?;

    tracing::info!(
        grapher_rows = grapher.row_count(),
        full_data_rows = full_data.row_count(),
        pivots = pivots.len(),
        "export bundle ready"
    );
    Ok(ExportBundle {
        grapher,
        full_data,
        pivots,
    })
}

/// Select and rename [`GRAPHER_COLUMNS`]; `date` becomes whole days since `epoch`.
pub fn grapher_table(table: &DataSet, epoch: NaiveDate) -> PipelineResult<DataSet> {
    let names: Vec<&str> = GRAPHER_COLUMNS.iter().map(|(name, _)| *name).collect();
    let mut out = table.select(&names)?;
    let date_idx = out.schema.require("date")?;

    for row in &mut out.rows {
        row[date_idx] = match row[date_idx].as_date() {
            Some(d) => Value::Int64((d - epoch).num_days()),
            None => Value::Null,
        };
    }
    out.schema.fields[date_idx].data_type = DataType::Int64;
    for (field, (_, renamed)) in out.schema.fields.iter_mut().zip(GRAPHER_COLUMNS.iter()) {
        field.name = (*renamed).to_owned();
    }
    Ok(out)
}

/// `date`, `location` and the base measures, without rows where every measure is null.
pub fn full_data_table(table: &DataSet) -> PipelineResult<DataSet> {
    let mut columns = vec!["date", "location"];
    columns.extend(BASE_MEASURES);
    let projected = table.select(&columns)?;
    Ok(projected.filter_rows(|row| row[2..].iter().any(|v| !v.is_null())))
}

/// Wide table of one measure: one row per date, `date` then `World` then the other
/// locations in sorted order. Every date must have a `World` row.
pub fn pivot_table(table: &DataSet, measure: &str) -> PipelineResult<DataSet> {
    let date_idx = table.schema.require("date")?;
    let loc_idx = table.schema.require("location")?;
    let value_idx = table.schema.require(measure)?;
    let value_type = table.schema.fields[value_idx].data_type;

    let mut cells: BTreeMap<NaiveDate, BTreeMap<&str, &Value>> = BTreeMap::new();
    let mut locations: BTreeSet<&str> = BTreeSet::new();
    for row in &table.rows {
        let (Some(date), Some(location)) = (row[date_idx].as_date(), row[loc_idx].as_str()) else {
            continue;
        };
        cells.entry(date).or_default().insert(location, &row[value_idx]);
        if location != "World" {
            locations.insert(location);
        }
    }

    let mut fields = vec![Field::new("date", DataType::Date), Field::new("World", value_type)];
    fields.extend(locations.iter().map(|l| Field::new(*l, value_type)));

    let mut rows = Vec::with_capacity(cells.len());
    for (date, by_location) in &cells {
        let Some(world) = by_location.get("World") else {
            return Err(PipelineError::MissingWorld {
                measure: measure.to_owned(),
                date: *date,
            });
        };
        let mut row = Vec::with_capacity(fields.len());
        row.push(Value::Date(*date));
        row.push((*world).clone());
        row.extend(
            locations
                .iter()
                .map(|l| by_location.get(l).map_or(Value::Null, |v| (*v).clone())),
        );
        rows.push(row);
    }

    Ok(DataSet::new(Schema::new(fields), rows))
}

/// Write `table` as CSV with a header row. Nulls are empty fields and dates are ISO.
pub fn write_csv<W: Write>(table: &DataSet, writer: W) -> PipelineResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.schema.field_names())?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(ToString::to_string))?;
    }
    wtr.flush()?;
    Ok(())
}
