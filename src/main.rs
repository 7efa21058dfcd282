use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};
use log::info;
use throughput_report::report::{ReportConfig, build_and_render};

const USAGE: &str = "Usage: Give path to CSV results file as first argument";

/// Plots throughput per benchmark configuration from a CSV results file
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// CSV results file
    results: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            println!("{}", USAGE);
            std::process::exit(1);
        }
    };

    let table = build_and_render(&cli.results, &ReportConfig::default())?;
    info!("plotted {} configuration rows", table.len());
    Ok(())
}
