use log::debug;
use std::collections::HashMap;

use crate::processor::{
    AggregateOp, AggregateResult, FilterPredicate, ProcessorError, Value,
    columnar_processor::ColumnarProcessor, query_builder::QueryResult,
};
use crate::report::ReportError;

/// Key of one aggregated configuration row
pub const GROUP_COLUMNS: [&str; 6] = ["name", "rs", "tm", "batch_size", "threads", "duration"];

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "name",
    "rs",
    "tm",
    "batch_size",
    "threads",
    "duration",
    "exp_time_in_sec",
    "iterations",
];

/// One row per `(name, rs, tm, batch_size, threads, duration)`
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputRow {
    pub name: String,
    pub rs: String,
    pub tm: String,
    pub batch_size: i64,
    pub threads: i64,
    pub duration: f64,
    /// Maximum over repeated trials
    pub exp_time_in_sec: f64,
    /// Sum over repeated trials
    pub iterations: i64,
    /// Elements per second
    pub throughput: f64,
    pub configuration: String,
}

/// Legend label of a series
pub fn configuration_label(name: &str, rs: &str, tm: &str, batch_size: i64) -> String {
    format!("Bench={} RS={} TM={} BS={}", name, rs, tm, batch_size)
}

/// Aggregates the loaded measurements into throughput rows.
///
/// Benchmarks appear in the order their name is first seen; rows of one
/// benchmark are ordered by their group key.
pub fn build_throughput_table(
    processor: &ColumnarProcessor,
) -> Result<Vec<ThroughputRow>, ReportError> {
    processor.require_columns(&REQUIRED_COLUMNS)?;

    let mut table = Vec::new();
    for name in processor.distinct_values("name")? {
        let result = processor
            .query()
            .filter("name", FilterPredicate::Equals(name.clone()))
            .group_by_multi(&GROUP_COLUMNS)
            .aggregate_as("exp_time_in_sec", AggregateOp::Max, "exp_time_in_sec")
            .aggregate_as("iterations", AggregateOp::Sum, "iterations")
            .execute()?;

        let QueryResult::MultiDimensional(cube) = result else {
            return Err(ProcessorError::Parse("expected grouped result".into()).into());
        };
        debug!("benchmark {}: {} configurations", name, cube.data.len());

        for (key, measures) in &cube.data {
            table.push(ThroughputRow::from_group(key, measures)?);
        }
    }

    Ok(table)
}

impl ThroughputRow {
    /// `key` follows [`GROUP_COLUMNS`]
    fn from_group(
        key: &[Value],
        measures: &HashMap<String, AggregateResult>,
    ) -> Result<Self, ReportError> {
        let [name, rs, tm, batch_size, threads, duration] = key else {
            return Err(ProcessorError::Parse(format!(
                "group key has {} values, expected {}",
                key.len(),
                GROUP_COLUMNS.len()
            ))
            .into());
        };

        let batch_size = integer("batch_size", batch_size)?;
        let threads = integer("threads", threads)?;
        let duration = duration.as_f64().ok_or_else(|| ProcessorError::TypeMismatch {
            column: "duration".into(),
            expected: "number",
            found: duration.type_name(),
        })?;

        let exp_time_in_sec = measure(measures, "exp_time_in_sec")?.as_f64();
        let iterations = match measure(measures, "iterations")? {
            AggregateResult::Int(v) => *v,
            AggregateResult::Float(_) => {
                return Err(ProcessorError::TypeMismatch {
                    column: "iterations".into(),
                    expected: "int",
                    found: "float",
                }
                .into());
            }
        };

        let (name, rs, tm) = (name.to_string(), rs.to_string(), tm.to_string());
        let configuration = configuration_label(&name, &rs, &tm, batch_size);

        if exp_time_in_sec == 0.0 {
            return Err(ReportError::ZeroElapsedTime {
                configuration,
                threads,
            });
        }

        Ok(ThroughputRow {
            throughput: iterations as f64 / exp_time_in_sec,
            name,
            rs,
            tm,
            batch_size,
            threads,
            duration,
            exp_time_in_sec,
            iterations,
            configuration,
        })
    }
}

fn integer(column: &str, value: &Value) -> Result<i64, ProcessorError> {
    value.as_i64().ok_or_else(|| ProcessorError::TypeMismatch {
        column: column.to_string(),
        expected: "int",
        found: value.type_name(),
    })
}

fn measure<'a>(
    measures: &'a HashMap<String, AggregateResult>,
    name: &str,
) -> Result<&'a AggregateResult, ProcessorError> {
    measures
        .get(name)
        .ok_or_else(|| ProcessorError::Parse(format!("measure {} not computed", name)))
}

/// Distinct thread counts, ascending
pub fn distinct_threads(rows: &[ThroughputRow]) -> Vec<i64> {
    let mut threads: Vec<i64> = rows.iter().map(|r| r.threads).collect();
    threads.sort_unstable();
    threads.dedup();
    threads
}
