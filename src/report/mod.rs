//! Throughput report: aggregation of benchmark rows and the two-format chart.

use log::{debug, info};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::processor::{ProcessorError, columnar_processor::ColumnarProcessor};

pub mod chart;
pub mod format;
pub mod theme;
pub mod throughput;

pub use chart::render_report;
pub use theme::ChartTheme;
pub use throughput::{ThroughputRow, build_throughput_table};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("exp_time_in_sec is zero for '{configuration}' at {threads} threads")]
    ZeroElapsedTime { configuration: String, threads: i64 },

    #[error("No rows to plot")]
    EmptyTable,

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("PDF conversion failed: {0}")]
    Pdf(String),

    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where and how large the report images are written
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// File name without extension, shared by both images
    pub file_stem: String,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    pub theme: ChartTheme,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_stem: "throughput-log-append".to_string(),
            width_in: 12.0,
            height_in: 5.0,
            dpi: 300,
            theme: ChartTheme::default(),
        }
    }
}

impl ReportConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn png_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.png", self.file_stem))
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", self.file_stem))
    }

    /// Canvas size in pixels at the configured DPI
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f64| (inches * self.dpi as f64).round().max(1.0) as u32;
        (px(self.width_in), px(self.height_in))
    }

    /// Converts a length in points to pixels at the configured DPI
    pub fn pt_to_px(&self, points: f64) -> u32 {
        (points * self.dpi as f64 / 72.0).round().max(1.0) as u32
    }
}

/// Loads `input`, aggregates it and writes both images.
///
/// Nothing is written unless loading, aggregation and both renders succeed.
pub fn build_and_render(
    input: &Path,
    config: &ReportConfig,
) -> Result<Vec<ThroughputRow>, ReportError> {
    let mut processor = ColumnarProcessor::new();
    let summary = processor.load_csv(input)?;
    info!(
        "read {} rows from {}",
        summary.rows_processed,
        input.display()
    );

    let table = build_throughput_table(&processor)?;
    for row in &table {
        debug!(
            "{:<48} threads={:<4} duration={:<6} exp_time_in_sec={:<10} iterations={:<12} throughput={:.3}",
            row.configuration,
            row.threads,
            row.duration,
            row.exp_time_in_sec,
            row.iterations,
            row.throughput
        );
    }

    render_report(&table, config)?;
    info!(
        "wrote {} and {}",
        config.png_path().display(),
        config.pdf_path().display()
    );
    Ok(table)
}
