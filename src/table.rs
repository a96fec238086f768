//! Per-municipality tables.
//!
//! Every stage hands its result to the next as a [`Table`]: one row per
//! canonical municipality name, a fixed list of named metric columns.

use crate::error::{PipelineError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const KEY_COLUMN: &str = "municipality";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Float(f64),
    Count(u64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Float(v) => v,
            Value::Count(n) => n as f64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Count(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub municipality: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Appends a row. Returns `false`, leaving the table untouched, when the
    /// municipality already has a row.
    pub fn insert(&mut self, municipality: impl Into<String>, values: Vec<Value>) -> bool {
        debug_assert_eq!(values.len(), self.columns.len());
        let municipality = municipality.into();
        if self.index.contains_key(&municipality) {
            return false;
        }
        self.index.insert(municipality.clone(), self.rows.len());
        self.rows.push(Row { municipality, values });
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, municipality: &str) -> Option<&Row> {
        self.index.get(municipality).map(|&i| &self.rows[i])
    }

    pub fn contains(&self, municipality: &str) -> bool {
        self.index.contains_key(municipality)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of `column` for `municipality`, if both exist.
    pub fn value(&self, municipality: &str, column: &str) -> Option<Value> {
        let col = self.column_index(column)?;
        self.get(municipality).map(|row| row.values[col])
    }

    pub fn municipalities(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.municipality.as_str())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let csv_err = |source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(KEY_COLUMN.to_string());
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header).map_err(csv_err)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(row.values.len() + 1);
            record.push(row.municipality.clone());
            record.extend(row.values.iter().map(Value::to_string));
            writer.write_record(&record).map_err(csv_err)?;
        }

        writer.flush().map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
