//! Population, density and land area per municipality.

use super::{insert_canonical, read_sheet, SourceSheet};
use crate::error::Result;
use crate::names::NameMapping;
use crate::numeric::{coerce, NumberFormat};
use crate::table::{Table, Value};
use std::path::Path;
use tracing::info;

pub const POPULATION: &str = "population";
pub const POP_DENSITY: &str = "pop_density";
pub const SIZE: &str = "size";

const SKIP_LINES: usize = 4;
// municipality, year, population, pop_density, size
const WIDTH: usize = 5;

pub fn clean(path: &Path, names: &NameMapping) -> Result<Table> {
    let sheet = read_sheet(path, b';', SKIP_LINES)?;
    sheet.expect_width(WIDTH)?;

    let mut table = Table::new(
        "municipality_size",
        vec![POPULATION.to_string(), POP_DENSITY.to_string(), SIZE.to_string()],
    );
    let mut dropped = 0;

    for row in &sheet.rows {
        let municipality = SourceSheet::cell(row, 0);
        let metrics: Option<Vec<Value>> = (2..WIDTH)
            .map(|i| coerce(SourceSheet::cell(row, i), NumberFormat::Thousands).map(Value::Float))
            .collect();

        match metrics {
            Some(values) if !municipality.is_empty() => {
                insert_canonical(&mut table, names, municipality, values);
            }
            _ => dropped += 1,
        }
    }

    info!(rows = table.len(), dropped, "cleaned municipality size data");
    Ok(table)
}
