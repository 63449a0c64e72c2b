//! Pipeline configuration.
//!
//! Every data-driven table the stages iterate over lives here as plain records: aggregate
//! definitions, manual corrections, growth/rolling/doubling/days-since specs and the export
//! whitelist. [`PipelineConfig::default`] reproduces the published dataset; a JSON document
//! can override any subset of fields.
//!
//! ```rust
//! use epi_series::config::PipelineConfig;
//!
//! let cfg = PipelineConfig::from_json_str(r#"{ "cfr_min_cases": 50 }"#).unwrap();
//! assert_eq!(cfg.cfr_min_cases, 50.0);
//! assert_eq!(cfg.days_since.len(), 4);
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::execution::ExecutionOptions;
use crate::reference::ReferenceData;

/// First day of the grapher timeline; exported dates are day offsets from it.
pub const GRAPHER_EPOCH: NaiveDate = ymd(2020, 1, 21);

const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(d) => d,
        None => panic!("invalid calendar date"),
    }
}

/// The two counted quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cases,
    Deaths,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Cases, Metric::Deaths];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cases => "cases",
            Self::Deaths => "deaths",
        }
    }

    /// Daily delta column, e.g. `new_cases`.
    pub fn new_column(self) -> String {
        format!("new_{}", self.as_str())
    }

    /// Cumulative column, e.g. `total_deaths`.
    pub fn total_column(self) -> String {
        format!("total_{}", self.as_str())
    }
}

/// Manual override nulling one day's delta for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub location: String,
    pub date: NaiveDate,
    pub metric: Metric,
}

impl CorrectionEntry {
    pub fn new(location: impl Into<String>, date: NaiveDate, metric: Metric) -> Self {
        Self {
            location: location.into(),
            date,
            metric,
        }
    }
}

// Append-only.
const LARGE_DATA_CORRECTIONS: &[(&str, NaiveDate, Metric)] = &[
    ("Austria", ymd(2022, 4, 21), Metric::Deaths),
    ("Austria", ymd(2022, 4, 22), Metric::Deaths),
    ("Brazil", ymd(2021, 9, 18), Metric::Cases),
    ("Chile", ymd(2020, 7, 17), Metric::Deaths),
    ("Chile", ymd(2022, 3, 21), Metric::Deaths),
    ("China", ymd(2020, 4, 17), Metric::Deaths),
    ("Denmark", ymd(2021, 12, 21), Metric::Deaths),
    ("Ecuador", ymd(2020, 9, 7), Metric::Deaths),
    ("Ecuador", ymd(2021, 7, 20), Metric::Deaths),
    ("Finland", ymd(2022, 3, 7), Metric::Deaths),
    ("Iceland", ymd(2022, 5, 17), Metric::Deaths),
    ("India", ymd(2021, 6, 10), Metric::Deaths),
    ("Mexico", ymd(2020, 10, 5), Metric::Deaths),
    ("Mexico", ymd(2021, 6, 1), Metric::Deaths),
    ("Moldova", ymd(2021, 12, 31), Metric::Deaths),
    ("Norway", ymd(2022, 3, 17), Metric::Deaths),
    ("Oman", ymd(2022, 6, 16), Metric::Deaths),
    ("South Africa", ymd(2021, 11, 23), Metric::Cases),
    ("South Africa", ymd(2022, 1, 6), Metric::Deaths),
    ("Spain", ymd(2020, 6, 19), Metric::Deaths),
    ("Turkey", ymd(2020, 12, 10), Metric::Cases),
    ("United Kingdom", ymd(2022, 1, 31), Metric::Cases),
    ("United Kingdom", ymd(2022, 2, 1), Metric::Deaths),
    ("United Kingdom", ymd(2022, 4, 6), Metric::Deaths),
];

/// Trailing zero-run suppression thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentZeroRule {
    /// Minimum last positive `new_cases` for the trailing run to be treated as lag.
    pub min_last_cases: f64,
    /// Minimum last positive `new_deaths` for the trailing run to be treated as lag.
    pub min_last_deaths: f64,
    /// Runs this long (in days) or longer are trusted as genuine zeros.
    pub max_gap_days: i64,
}

impl Default for RecentZeroRule {
    fn default() -> Self {
        Self {
            min_last_cases: 100.0,
            min_last_deaths: 10.0,
            max_gap_days: 7,
        }
    }
}

impl RecentZeroRule {
    pub fn min_last(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cases => self.min_last_cases,
            Metric::Deaths => self.min_last_deaths,
        }
    }
}

/// Synthetic location summed over a filtered set of real locations.
///
/// Both filters absent means every location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub name: String,
    #[serde(default)]
    pub include: Option<BTreeSet<String>>,
    #[serde(default)]
    pub exclude: Option<BTreeSet<String>>,
}

impl AggregateSpec {
    pub fn all(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            include: None,
            exclude: None,
        }
    }

    pub fn including<I, S>(name: impl Into<String>, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            include: Some(locations.into_iter().map(Into::into).collect()),
            exclude: None,
        }
    }

    pub fn excluding<I, S>(name: impl Into<String>, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            include: None,
            exclude: Some(locations.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether a real location contributes to this aggregate.
    pub fn matches(&self, location: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.contains(location) {
                return false;
            }
        }
        match &self.exclude {
            Some(exclude) => !exclude.contains(location),
            None => true,
        }
    }
}

/// Weekly/biweekly rolling sum + growth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthSpec {
    pub prefix: String,
    pub period_days: usize,
}

impl GrowthSpec {
    pub fn new(prefix: impl Into<String>, period_days: usize) -> Self {
        Self {
            prefix: prefix.into(),
            period_days,
        }
    }
}

/// Right-aligned rolling mean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingSpec {
    pub output_name: String,
    pub source_column: String,
    pub window: usize,
    pub min_periods: usize,
}

impl RollingSpec {
    pub fn seven_day(source_column: &str) -> Self {
        Self {
            output_name: format!("{source_column}_7_day_avg_right"),
            source_column: source_column.to_owned(),
            window: 7,
            min_periods: 6,
        }
    }
}

/// "Days since `source_column` first reached `threshold`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    pub output_name: String,
    pub source_column: String,
    pub threshold: f64,
    #[serde(default)]
    pub positive_only: bool,
}

impl ThresholdSpec {
    pub fn new(output_name: &str, source_column: &str, threshold: f64) -> Self {
        Self {
            output_name: output_name.to_owned(),
            source_column: source_column.to_owned(),
            threshold,
            positive_only: false,
        }
    }
}

/// Doubling time of `source_column` estimated over `periods` days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoublingSpec {
    pub output_name: String,
    pub source_column: String,
    pub periods: usize,
}

impl DoublingSpec {
    pub fn new(source_column: &str, periods: usize) -> Self {
        Self {
            output_name: format!("doubling_days_{source_column}_{periods}_day_period"),
            source_column: source_column.to_owned(),
            periods,
        }
    }
}

/// Gating for the two exemplar columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExemplarRule {
    pub min_population: f64,
    pub min_days_since: i64,
    /// Days-since column the rule reads.
    pub days_since_column: String,
}

impl Default for ExemplarRule {
    fn default() -> Self {
        Self {
            min_population: 5e6,
            min_days_since: 21,
            days_since_column: "days_since_100_total_cases".to_owned(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub corrections: Vec<CorrectionEntry>,
    pub recent_zeros: RecentZeroRule,
    /// Explicit aggregate definitions. `None` derives the standard set from the reference
    /// data (see [`PipelineConfig::aggregate_specs`]).
    pub aggregates: Option<Vec<AggregateSpec>>,
    /// Aggregates kept in the full-data and pivot exports; other aggregates are dropped there.
    pub exported_aggregates: Vec<String>,
    pub growth: Vec<GrowthSpec>,
    pub doubling: Vec<DoublingSpec>,
    pub per_million_measures: Vec<String>,
    pub rolling: Vec<RollingSpec>,
    pub cfr_min_cases: f64,
    pub days_since: Vec<ThresholdSpec>,
    pub exemplar: ExemplarRule,
    pub grapher_epoch: NaiveDate,
    #[serde(skip)]
    pub execution: ExecutionOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corrections: LARGE_DATA_CORRECTIONS
                .iter()
                .map(|&(location, date, metric)| CorrectionEntry::new(location, date, metric))
                .collect(),
            recent_zeros: RecentZeroRule::default(),
            aggregates: None,
            exported_aggregates: [
                "World",
                "North America",
                "South America",
                "Europe",
                "Africa",
                "Asia",
                "Oceania",
                "European Union",
                "High income",
                "Upper middle income",
                "Lower middle income",
                "Low income",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
            growth: vec![GrowthSpec::new("weekly", 7), GrowthSpec::new("biweekly", 14)],
            doubling: vec![
                DoublingSpec::new("total_cases", 3),
                DoublingSpec::new("total_cases", 7),
                DoublingSpec::new("total_deaths", 3),
                DoublingSpec::new("total_deaths", 7),
            ],
            per_million_measures: crate::export::BASE_MEASURES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            rolling: vec![
                RollingSpec::seven_day("new_cases"),
                RollingSpec::seven_day("new_deaths"),
                RollingSpec::seven_day("new_cases_per_million"),
                RollingSpec::seven_day("new_deaths_per_million"),
            ],
            cfr_min_cases: 100.0,
            days_since: vec![
                ThresholdSpec::new("days_since_100_total_cases", "total_cases", 100.0),
                ThresholdSpec::new("days_since_5_total_deaths", "total_deaths", 5.0),
                ThresholdSpec::new(
                    "days_since_1_total_cases_per_million",
                    "total_cases_per_million",
                    1.0,
                ),
                ThresholdSpec::new(
                    "days_since_0_1_total_deaths_per_million",
                    "total_deaths_per_million",
                    0.1,
                ),
            ],
            exemplar: ExemplarRule::default(),
            grapher_epoch: GRAPHER_EPOCH,
            execution: ExecutionOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(s: &str) -> PipelineResult<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject entries no stage could apply.
    pub fn validate(&self) -> PipelineResult<()> {
        if let Some(bad) = self.corrections.iter().find(|c| c.location.trim().is_empty()) {
            return Err(PipelineError::InvalidCorrection {
                message: format!("empty location for {} {}", bad.date, bad.metric.as_str()),
            });
        }
        if let Some(bad) = self.growth.iter().find(|g| g.period_days < 2) {
            return Err(PipelineError::SchemaMismatch {
                message: format!("growth period for '{}' must be at least 2 days", bad.prefix),
            });
        }
        if let Some(bad) = self
            .rolling
            .iter()
            .find(|r| r.window == 0 || r.min_periods == 0 || r.min_periods > r.window)
        {
            return Err(PipelineError::SchemaMismatch {
                message: format!(
                    "rolling spec '{}' needs 0 < min_periods <= window",
                    bad.output_name
                ),
            });
        }
        if let Some(bad) = self.doubling.iter().find(|d| d.periods == 0) {
            return Err(PipelineError::SchemaMismatch {
                message: format!("doubling spec '{}' needs periods > 0", bad.output_name),
            });
        }
        Ok(())
    }

    /// Aggregate definitions in declaration order.
    ///
    /// Uses [`PipelineConfig::aggregates`] when set, otherwise the standard set: World,
    /// three "World excl." variants, the European Union, one per continent, Asia excl.
    /// China and one per income group.
    pub fn aggregate_specs(&self, reference: &ReferenceData) -> Vec<AggregateSpec> {
        if let Some(specs) = &self.aggregates {
            return specs.clone();
        }

        let mut specs = vec![
            AggregateSpec::all("World"),
            AggregateSpec::excluding("World excl. China", ["China"]),
            AggregateSpec::excluding("World excl. China and South Korea", ["China", "South Korea"]),
            AggregateSpec::excluding(
                "World excl. China, South Korea, Japan and Singapore",
                ["China", "South Korea", "Japan", "Singapore"],
            ),
            AggregateSpec::including("European Union", reference.eu_countries.iter().cloned()),
        ];
        specs.extend(
            reference
                .continents
                .iter()
                .map(|(continent, members)| AggregateSpec::including(continent, members.iter().cloned())),
        );
        if let Some(asia) = reference.continents.get("Asia") {
            specs.push(AggregateSpec::including(
                "Asia excl. China",
                asia.iter().filter(|l| l.as_str() != "China").cloned(),
            ));
        }
        specs.extend(
            reference
                .income_groups
                .iter()
                .map(|(group, members)| AggregateSpec::including(group, members.iter().cloned())),
        );
        specs
    }
}
