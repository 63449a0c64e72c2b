use std::hint::black_box;

use chrono::{Days, NaiveDate};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use epi_series::config::{AggregateSpec, PipelineConfig};
use epi_series::execution::ExecutionOptions;
use epi_series::pipeline::Pipeline;
use epi_series::reference::ReferenceData;
use epi_series::types::{DataSet, DataType, Field, Schema, Value};

fn synthetic_raw(locations: usize, days: u64) -> DataSet {
    let schema = Schema::new(vec![
        Field::new("date", DataType::Date),
        Field::new("location", DataType::Utf8),
        Field::new("new_cases", DataType::Int64),
        Field::new("new_deaths", DataType::Int64),
    ]);
    let start = NaiveDate::from_ymd_opt(2020, 1, 22).unwrap();
    let mut rows = Vec::with_capacity(locations * days as usize);
    for l in 0..locations {
        for d in 0..days {
            let cases = ((l as i64 * 31 + d as i64 * 17) % 500) - 10;
            rows.push(vec![
                Value::Date(start + Days::new(d)),
                Value::Utf8(format!("L{l:03}")),
                Value::Int64(cases),
                Value::Int64(cases / 40),
            ]);
        }
    }
    DataSet::new(schema, rows)
}

fn reference(locations: usize) -> ReferenceData {
    let mut reference = ReferenceData::default();
    reference.population.insert("World", 7.8e9, 2020);
    for l in 0..locations {
        reference
            .population
            .insert(format!("L{l:03}"), 1e6 + l as f64 * 2.5e5, 2020);
    }
    reference
}

fn bench_pipeline(c: &mut Criterion) {
    let locations = 200;
    let raw = synthetic_raw(locations, 365);

    let mut group = c.benchmark_group("pipeline_run");
    group.sample_size(10);
    for threads in [1usize, 4] {
        let mut config = PipelineConfig::default();
        config.aggregates = Some(vec![
            AggregateSpec::all("World"),
            AggregateSpec::excluding("World excl. L000", ["L000"]),
        ]);
        config.execution = ExecutionOptions {
            num_threads: Some(threads),
        };
        let pipeline = Pipeline::new(config, reference(locations)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(threads), &raw, |b, raw| {
            b.iter(|| {
                let out = pipeline.run_and_export(black_box(raw.clone())).unwrap();
                black_box(out);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
