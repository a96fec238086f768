pub mod config;
pub mod error;
pub mod geometry;
pub mod merge;
pub mod names;
pub mod numeric;
pub mod pipeline;
pub mod sources;
pub mod stations;
pub mod table;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the per-municipality dataset CSV
    Build {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Write boundary centroids and hub distances for inspection
    Centroids {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE", default_value = "centroids.csv")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Build { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;

            let merged = pipeline::run(&app_config)?;

            for stage in &merged.report.stages {
                println!(
                    "{:<20} {:>6} rows, {:>6} after join",
                    stage.table, stage.table_rows, stage.rows_after
                );
            }
            if !merged.report.zero_surface.is_empty() {
                println!("Dropped for zero surface: {}", merged.report.zero_surface.join(", "));
            }
            println!(
                "Wrote {} municipalities to {:?}",
                merged.table.len(),
                app_config.output.dataset
            );
        }
        Commands::Centroids { config, output } => {
            let app_config = config::AppConfig::load_from_file(config)?;

            let centroids = pipeline::centroids(&app_config)?;
            geometry::write_centroids(&centroids, output)
                .with_context(|| format!("Failed to write centroids: {:?}", output))?;

            println!("Wrote {} centroids to {:?}", centroids.len(), output);
        }
    }

    Ok(())
}
