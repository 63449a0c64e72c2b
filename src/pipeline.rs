//! The batch driver: raw table in, enriched table and export bundle out.
//!
//! Stage order matters because later stages read columns written by earlier ones:
//!
//! 1. normalize the raw table
//! 2. correct anomalous daily deltas
//! 3. derive missing totals from the corrected deltas
//! 4. synthesize aggregate locations
//! 5. weekly/biweekly totals and growth
//! 6. doubling days (nulls zero totals in place)
//! 7. per-million columns
//! 8. rolling averages
//! 9. case-fatality ratios
//! 10. days-since indices
//! 11. exemplar flags
//!
//! The result is sorted by location, then date.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::execution::{ExecutionEngine, ExecutionMetricsSnapshot, TracingExecutionObserver};
use crate::export::{self, ExportBundle};
use crate::processing::aggregate::inject_aggregates;
use crate::processing::correction::correct_anomalies;
use crate::processing::exemplar::inject_exemplars;
use crate::processing::growth::{inject_cfr, inject_growth, inject_rolling_avg};
use crate::processing::per_capita::inject_per_million;
use crate::processing::raw::{fill_totals, normalize_raw};
use crate::processing::series::LocationIndex;
use crate::processing::threshold::{inject_days_since, inject_doubling_days};
use crate::reference::ReferenceData;
use crate::types::DataSet;

/// One configured pipeline. Running it twice on the same input yields identical tables.
pub struct Pipeline {
    config: PipelineConfig,
    reference: ReferenceData,
    engine: ExecutionEngine,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, reference: ReferenceData) -> PipelineResult<Self> {
        config.validate()?;
        let engine = ExecutionEngine::new(&config.execution)?
            .with_observer(Arc::new(TracingExecutionObserver));
        Ok(Self {
            config,
            reference,
            engine,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Counters accumulated over every run of this pipeline.
    pub fn metrics(&self) -> ExecutionMetricsSnapshot {
        self.engine.metrics().snapshot()
    }

    /// Transform a raw table into the enriched long table.
    pub fn run(&self, raw: DataSet) -> PipelineResult<DataSet> {
        let cfg = &self.config;
        let engine = &self.engine;
        let mut table = raw;

        engine.run_stage("normalize", &mut table, |e, t| normalize_raw(e, t))?;
        engine.run_stage("correct", &mut table, |e, t| {
            correct_anomalies(e, t, &cfg.corrections, &cfg.recent_zeros)
        })?;
        engine.run_stage("totals", &mut table, |e, t| fill_totals(e, t))?;

        let aggregates = cfg.aggregate_specs(&self.reference);
        engine.run_stage("aggregates", &mut table, |_, t| inject_aggregates(t, &aggregates))?;

        for spec in &cfg.growth {
            engine.run_stage("growth", &mut table, |e, t| inject_growth(e, t, spec))?;
        }
        for spec in &cfg.doubling {
            engine.run_stage("doubling", &mut table, |e, t| inject_doubling_days(e, t, spec))?;
        }
        engine.run_stage("per_million", &mut table, |_, t| {
            inject_per_million(t, &cfg.per_million_measures, &self.reference)
        })?;
        for spec in &cfg.rolling {
            engine.run_stage("rolling", &mut table, |e, t| inject_rolling_avg(e, t, spec))?;
        }
        engine.run_stage("cfr", &mut table, |_, t| inject_cfr(t, cfg.cfr_min_cases))?;
        for spec in &cfg.days_since {
            engine.run_stage("days_since", &mut table, |e, t| inject_days_since(e, t, spec))?;
        }
        engine.run_stage("exemplars", &mut table, |_, t| {
            inject_exemplars(t, &cfg.exemplar, &self.reference)
        })?;

        let index = LocationIndex::build(&table)?;
        let sorted = table.take_rows(&index.sorted_rows());

        tracing::info!(
            rows = sorted.row_count(),
            locations = index.location_count(),
            columns = sorted.schema.fields.len(),
            "pipeline finished"
        );
        Ok(sorted)
    }

    /// Build the export layouts from an enriched table.
    pub fn export(&self, enriched: &DataSet) -> PipelineResult<ExportBundle> {
        export::export(enriched, self.config.grapher_epoch, &self.excluded_aggregates())
    }

    pub fn run_and_export(&self, raw: DataSet) -> PipelineResult<(DataSet, ExportBundle)> {
        let enriched = self.run(raw)?;
        let bundle = self.export(&enriched)?;
        Ok((enriched, bundle))
    }

    /// Aggregates that are computed but not published in the full-data and pivot tables.
    pub fn excluded_aggregates(&self) -> BTreeSet<String> {
        let published: BTreeSet<&str> = self.config.exported_aggregates.iter().map(String::as_str).collect();
        self.config
            .aggregate_specs(&self.reference)
            .into_iter()
            .map(|spec| spec.name)
            .filter(|name| !published.contains(name.as_str()))
            .collect()
    }
}
