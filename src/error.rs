use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("unexpected layout in {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed GeoJSON in {path:?}: {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },
    #[error("malformed Shapefile {path:?}: {source}")]
    Shapefile {
        path: PathBuf,
        #[source]
        source: shapefile::Error,
    },
    #[error("no centroid for {municipality}: {reason}")]
    Geometry { municipality: String, reason: String },
    #[error("avg_surface is zero for {municipality}")]
    DivisionByZero { municipality: String },
    #[error("column '{column}' is present in more than one table")]
    DuplicateColumn { column: String },
    #[error("column '{column}' is required but no table provides it")]
    MissingColumn { column: String },
    #[error("invalid name mapping: {0}")]
    InvalidNameMapping(String),
}

impl PipelineError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
