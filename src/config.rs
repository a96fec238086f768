use std::collections::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    /// Alternate spelling -> canonical municipality name.
    #[serde(default)]
    pub names: HashMap<String, String>,
    /// Income used when the incomes extract suppresses a municipality's value.
    #[serde(default)]
    pub income_fallback: HashMap<String, f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub prices: PathBuf,
    pub surface: PathBuf,
    pub municipality_size: PathBuf,
    pub incomes: PathBuf,
    pub boundaries: PathBuf, // .geojson/.json or .shp
    pub stations: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dataset: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeometryConfig {
    #[serde(default = "default_name_property")]
    pub name_property: String,
    #[serde(default = "default_distance_column")]
    pub distance_column: String,
    #[serde(default = "default_hubs")]
    pub hubs: Vec<Hub>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            name_property: default_name_property(),
            distance_column: default_distance_column(),
            hubs: default_hubs(),
        }
    }
}

/// A named urban hub distances are measured to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Hub {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MergeConfig {
    #[serde(default)]
    pub on_zero_surface: ZeroSurfacePolicy,
}

/// What the merger does with a row whose `avg_surface` is zero.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ZeroSurfacePolicy {
    /// Remove the row and report it.
    #[default]
    Drop,
    /// Abort the run.
    Fail,
}

fn default_name_property() -> String {
    "statnaam".to_string()
}

fn default_distance_column() -> String {
    "distance_to_urban_center".to_string()
}

fn default_hubs() -> Vec<Hub> {
    vec![Hub {
        name: "Schiphol".to_string(),
        lat: 52.3158,
        lon: 4.7480,
    }]
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        anyhow::ensure!(!config.geometry.hubs.is_empty(), "At least one hub must be configured");
        Ok(config)
    }
}
