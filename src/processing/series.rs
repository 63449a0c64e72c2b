//! Per-location partitioning of the table.
//!
//! Every cumulative, diff, rolling, percent-change and threshold computation runs over one
//! [`LocationSeries`] at a time: the row indices of a single location, ordered by date. The
//! results are scattered back into a full-length column by row index, so the physical row
//! order of the table never matters.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, Value};

/// Date-ordered row indices of one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSeries {
    pub location: String,
    pub rows: Vec<usize>,
}

impl LocationSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of column `idx` in date order.
    pub fn values(&self, table: &DataSet, idx: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|&r| table.rows[r][idx].as_f64()).collect()
    }

    /// Dates in order. Rows without a date never enter an index.
    pub fn dates(&self, table: &DataSet, date_idx: usize) -> Vec<NaiveDate> {
        self.rows
            .iter()
            .filter_map(|&r| table.rows[r][date_idx].as_date())
            .collect()
    }
}

/// Location → ordered rows map over a whole table. Locations are kept in sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationIndex {
    series: Vec<LocationSeries>,
    date_idx: usize,
}

impl LocationIndex {
    /// Partition `table` by location and order each partition by date.
    ///
    /// Fails if `date`/`location` are missing or null, or if a `(location, date)` pair occurs
    /// twice.
    pub fn build(table: &DataSet) -> PipelineResult<Self> {
        let date_idx = table.schema.require("date")?;
        let loc_idx = table.schema.require("location")?;

        let mut groups: BTreeMap<&str, Vec<(NaiveDate, usize)>> = BTreeMap::new();
        for (r, row) in table.rows.iter().enumerate() {
            let (Some(location), Some(date)) = (row[loc_idx].as_str(), row[date_idx].as_date())
            else {
                return Err(PipelineError::SchemaMismatch {
                    message: format!("row {r} has no location or date"),
                });
            };
            groups.entry(location).or_default().push((date, r));
        }

        let mut series = Vec::with_capacity(groups.len());
        for (location, mut rows) in groups {
            rows.sort_by_key(|&(date, _)| date);
            if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
                return Err(PipelineError::DuplicateRecord {
                    location: location.to_owned(),
                    date: w[0].0,
                });
            }
            series.push(LocationSeries {
                location: location.to_owned(),
                rows: rows.into_iter().map(|(_, r)| r).collect(),
            });
        }

        Ok(Self { series, date_idx })
    }

    pub fn series(&self) -> &[LocationSeries] {
        &self.series
    }

    pub fn date_idx(&self) -> usize {
        self.date_idx
    }

    pub fn location_count(&self) -> usize {
        self.series.len()
    }

    /// Row indices ordered by location, then date.
    pub fn sorted_rows(&self) -> Vec<usize> {
        self.series.iter().flat_map(|s| s.rows.iter().copied()).collect()
    }

    /// Scatter per-series results (aligned with each series' rows) into a full column.
    pub fn scatter(&self, row_count: usize, per_series: Vec<Vec<Value>>) -> Vec<Value> {
        let mut out = vec![Value::Null; row_count];
        for (series, values) in self.series.iter().zip(per_series) {
            for (&r, v) in series.rows.iter().zip(values) {
                out[r] = v;
            }
        }
        out
    }
}
