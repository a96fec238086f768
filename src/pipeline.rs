use crate::config::AppConfig;
use crate::geometry::{self, CentroidDistance};
use crate::merge::{self, MergedDataset};
use crate::names::NameMapping;
use crate::sources::{income, price, size, surface};
use crate::stations;
use crate::table::Table;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Cleans every source, joins them and writes the dataset CSV.
pub fn run(config: &AppConfig) -> Result<MergedDataset> {
    let merged = build(config)?;
    write_dataset(&merged.table, &config.output.dataset)?;
    Ok(merged)
}

/// Everything but the final write.
pub fn build(config: &AppConfig) -> Result<MergedDataset> {
    let names = NameMapping::new(config.names.clone()).context("Invalid [names] table")?;
    info!(aliases = names.len(), "loaded name mapping");

    let input = &config.input;

    // The sources are independent of each other; only stations need prices.
    let ((prices, surface), (size, (incomes, distances))) = rayon::join(
        || {
            rayon::join(
                || price::clean(&input.prices, &names),
                || surface::clean(&input.surface, &names),
            )
        },
        || {
            rayon::join(
                || size::clean(&input.municipality_size, &names),
                || {
                    rayon::join(
                        || income::clean(&input.incomes, &names, &config.income_fallback),
                        || distance_table(config, &names),
                    )
                },
            )
        },
    );

    let prices = prices.with_context(|| format!("Failed to clean price data: {:?}", input.prices))?;
    let surface = surface.with_context(|| format!("Failed to clean surface data: {:?}", input.surface))?;
    let size = size.with_context(|| {
        format!("Failed to clean municipality size data: {:?}", input.municipality_size)
    })?;
    let incomes = incomes.with_context(|| format!("Failed to clean income data: {:?}", input.incomes))?;
    let distances = distances?;

    let stations = stations::aggregate(&input.stations, prices.municipalities(), &names)
        .with_context(|| format!("Failed to aggregate stations: {:?}", input.stations))?;

    let tables = [prices, surface, size, incomes, distances, stations];
    let merged = merge::merge(&tables, &names, config.merge.on_zero_surface)
        .context("Failed to merge datasets")?;

    Ok(merged)
}

fn distance_table(config: &AppConfig, names: &NameMapping) -> Result<Table> {
    let geometry_config = &config.geometry;
    let boundaries = geometry::load_boundaries(&config.input.boundaries, &geometry_config.name_property, names)
        .with_context(|| format!("Failed to load boundaries: {:?}", config.input.boundaries))?;
    Ok(geometry::process(
        &boundaries,
        &geometry_config.hubs,
        &geometry_config.distance_column,
    ))
}

/// Centroid and nearest-hub distance for every boundary feature.
pub fn centroids(config: &AppConfig) -> Result<Vec<CentroidDistance>> {
    let names = NameMapping::new(config.names.clone()).context("Invalid [names] table")?;
    let boundaries = geometry::load_boundaries(&config.input.boundaries, &config.geometry.name_property, &names)
        .with_context(|| format!("Failed to load boundaries: {:?}", config.input.boundaries))?;
    Ok(geometry::centroid_distances(&boundaries, &config.geometry.hubs))
}

pub fn write_dataset(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    table
        .write_csv(path)
        .with_context(|| format!("Failed to write dataset: {:?}", path))?;
    info!(rows = table.len(), path = ?path, "wrote dataset");
    Ok(())
}
