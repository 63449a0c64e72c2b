//! Read-only reference inputs: population, EU membership, continents, income groups and the
//! set of locations that publish testing data.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::csv::ingest_csv_from_reader;
use crate::types::{DataSet, DataType, Field, Schema};

/// Population of a location and the year the figure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub value: f64,
    pub year: i32,
}

/// Population lookup by location key.
///
/// Must answer for aggregate pseudo-locations (`World`, `Asia`, ...) as well as countries;
/// `None` makes every per-capita value of that location null.
pub trait PopulationSource: Send + Sync {
    fn population(&self, location: &str) -> Option<Population>;
}

/// In-memory population table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopulationTable {
    entries: BTreeMap<String, Population>,
}

impl PopulationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: impl Into<String>, value: f64, year: i32) {
        self.entries.insert(location.into(), Population { value, year });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read `location,population,year` rows from CSV.
    pub fn from_csv_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> PipelineResult<Self> {
        let schema = Schema::new(vec![
            Field::new("location", DataType::Utf8),
            Field::new("population", DataType::Float64),
            Field::new("year", DataType::Int64),
        ]);
        let ds = ingest_csv_from_reader(rdr, &schema)?;
        Self::from_dataset(&ds)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        Self::from_csv_reader(&mut rdr)
    }

    fn from_dataset(ds: &DataSet) -> PipelineResult<Self> {
        let loc = ds.schema.require("location")?;
        let pop = ds.schema.require("population")?;
        let year = ds.schema.require("year")?;

        let mut table = Self::new();
        for row in &ds.rows {
            let (Some(location), Some(value)) = (row[loc].as_str(), row[pop].as_f64()) else {
                continue;
            };
            let year = match row[year].as_f64() {
                Some(y) => y as i32,
                None => {
                    return Err(PipelineError::SchemaMismatch {
                        message: format!("population for '{location}' has no reference year"),
                    });
                }
            };
            table.insert(location, value, year);
        }
        Ok(table)
    }
}

impl PopulationSource for PopulationTable {
    fn population(&self, location: &str) -> Option<Population> {
        self.entries.get(location).copied()
    }
}

/// Static membership lists plus the population table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    pub population: PopulationTable,
    pub eu_countries: BTreeSet<String>,
    pub continents: BTreeMap<String, BTreeSet<String>>,
    pub income_groups: BTreeMap<String, BTreeSet<String>>,
    /// Locations with published testing data (exemplar gating only).
    pub testing_locations: BTreeSet<String>,
}

impl ReferenceData {
    pub fn from_json_str(s: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn has_testing_data(&self, location: &str) -> bool {
        self.testing_locations.contains(location)
    }
}

impl PopulationSource for ReferenceData {
    fn population(&self, location: &str) -> Option<Population> {
        self.population.population(location)
    }
}
