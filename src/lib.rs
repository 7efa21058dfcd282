//! # throughput-report
//!
//! Reads a CSV of benchmark measurements, aggregates throughput per
//! configuration and plots it against the thread count.
//!
//! - Memory-mapped CSV loading with per-column type inference (int, float, string)
//! - Filtering and multi-column group-by with aliased aggregations
//! - Throughput table: `iterations / exp_time_in_sec` per
//!   `(name, rs, tm, batch_size, threads, duration)`
//! - Line/point chart written as PNG and PDF
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use throughput_report::report::{ReportConfig, build_and_render};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = build_and_render(Path::new("results.csv"), &ReportConfig::default())?;
//!     for row in &table {
//!         println!("{} @ {} threads: {:.0} elems/s", row.configuration, row.threads, row.throughput);
//!     }
//!     Ok(())
//! }
//! ```

mod helpers;
pub mod processor;
pub mod report;
