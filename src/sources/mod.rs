//! Cleaners for the semicolon-separated CBS extracts.
//!
//! Each extract opens with a fixed number of title/metadata lines, then a
//! header line, then one line per municipality. [`read_sheet`] handles the
//! shared part; the submodules map a sheet onto a canonical [`Table`].

pub mod income;
pub mod price;
pub mod size;
pub mod surface;

use crate::error::{PipelineError, Result};
use crate::names::NameMapping;
use crate::table::{Table, Value};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A CBS extract with its metadata lines removed.
#[derive(Debug)]
pub struct SourceSheet {
    pub path: PathBuf,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn read_sheet(path: &Path, delimiter: u8, skip_lines: usize) -> Result<SourceSheet> {
    let bytes = fs::read(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode(&bytes);
    // Metadata lines are counted raw, blank ones included.
    let body = skip_lines_of(&text, skip_lines);

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = rdr.records();

    let header = match records.next() {
        Some(record) => {
            let record = record.map_err(|source| PipelineError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            mangle_header(record.iter())
        }
        None => {
            return Err(PipelineError::parse(
                path,
                format!("no header line after skipping {} lines", skip_lines),
            ))
        }
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(SourceSheet {
        path: path.to_path_buf(),
        header,
        rows,
    })
}

fn skip_lines_of(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

/// UTF-8 (with or without BOM), otherwise Latin-1.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Blank names become `Unnamed: <i>`, repeats get `.1`, `.2`, ...
fn mangle_header<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .enumerate()
        .map(|(i, cell)| {
            let cell = cell.trim();
            let base = if cell.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                cell.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

impl SourceSheet {
    pub fn column(&self, name: &str) -> Result<usize> {
        self.header.iter().position(|h| h == name).ok_or_else(|| {
            PipelineError::parse(
                &self.path,
                format!("column '{}' not found in header {:?}", name, self.header),
            )
        })
    }

    pub fn expect_width(&self, expected: usize) -> Result<()> {
        if self.header.len() == expected {
            return Ok(());
        }
        Err(PipelineError::parse(
            &self.path,
            format!(
                "expected {} columns, found {} ({:?}); wrong delimiter or upstream layout change",
                expected,
                self.header.len(),
                self.header
            ),
        ))
    }

    /// Trimmed cell, empty when the row is short.
    pub fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(|s| s.trim()).unwrap_or("")
    }
}

/// Inserts under the canonical name, keeping the first row on collisions.
pub(crate) fn insert_canonical(
    table: &mut Table,
    names: &NameMapping,
    raw_name: &str,
    values: Vec<Value>,
) {
    let canonical = names.canonicalize(raw_name);
    if !table.insert(canonical, values) {
        warn!(
            table = table.name(),
            municipality = canonical,
            raw = raw_name,
            "duplicate municipality after reconciliation, keeping first row"
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn write_source(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn skips_metadata_and_reads_header() {
        let f = write_source(b"Title\nSubtitle;;\nName;Value\nA;1\nB;2\n");
        let sheet = read_sheet(f.path(), b';', 2).unwrap();
        assert_eq!(sheet.header, vec!["Name", "Value"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(SourceSheet::cell(&sheet.rows[1], 1), "2");
        assert_eq!(SourceSheet::cell(&sheet.rows[1], 5), "");
    }

    #[test]
    fn blank_metadata_lines_count_towards_skip() {
        let f = write_source(b"Title\n\n\nName;Value\nA;1\n");
        let sheet = read_sheet(f.path(), b';', 3).unwrap();
        assert_eq!(sheet.header, vec!["Name", "Value"]);
        assert_eq!(sheet.rows.len(), 1);
    }

    #[test]
    fn header_mangling() {
        let header = mangle_header(vec!["", "Totaal", "Totaal", " x ", "Totaal"].into_iter());
        assert_eq!(header, vec!["Unnamed: 0", "Totaal", "Totaal.1", "x", "Totaal.2"]);
    }

    #[test]
    fn bom_and_latin1_are_decoded() {
        assert_eq!(decode(b"\xEF\xBB\xBFabc"), "abc");
        // "Súdwest" in Latin-1
        assert_eq!(decode(b"S\xFAdwest"), "Súdwest");
    }

    #[test]
    fn missing_header_is_parse_error() {
        let f = write_source(b"only\n");
        let err = read_sheet(f.path(), b';', 3).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[test]
    fn width_mismatch_is_parse_error() {
        let f = write_source(b"a,b,c\n1,2,3\n");
        let sheet = read_sheet(f.path(), b';', 0).unwrap();
        assert!(matches!(sheet.expect_width(3), Err(PipelineError::Parse { .. })));
        assert!(matches!(sheet.column("b"), Err(PipelineError::Parse { .. })));
    }
}
