//! Average disposable income per municipality.
//!
//! CBS suppresses the figure for some municipalities; those are filled from
//! the configured fallback table before the missing-value drop.

use super::{insert_canonical, read_sheet, SourceSheet};
use crate::error::Result;
use crate::names::NameMapping;
use crate::numeric::{coerce, NumberFormat};
use crate::table::{Table, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub const AVG_INCOME: &str = "avg_income";

const SKIP_LINES: usize = 6;
// municipality, avg_income
const WIDTH: usize = 2;

pub fn clean(path: &Path, names: &NameMapping, fallback: &HashMap<String, f64>) -> Result<Table> {
    let sheet = read_sheet(path, b';', SKIP_LINES)?;
    sheet.expect_width(WIDTH)?;

    let mut table = Table::new("incomes", vec![AVG_INCOME.to_string()]);
    let mut filled = 0;
    let mut dropped = 0;

    for row in &sheet.rows {
        let municipality = SourceSheet::cell(row, 0);
        if municipality.is_empty() {
            dropped += 1;
            continue;
        }
        let canonical = names.canonicalize(municipality);

        let income = match coerce(SourceSheet::cell(row, 1), NumberFormat::DecimalComma) {
            Some(income) => Some(income),
            None => {
                let fill = fallback
                    .get(municipality)
                    .or_else(|| fallback.get(canonical))
                    .copied();
                if fill.is_some() {
                    debug!(municipality, "income filled from fallback table");
                    filled += 1;
                }
                fill
            }
        };

        match income {
            Some(income) => {
                insert_canonical(&mut table, names, municipality, vec![Value::Float(income)]);
            }
            None => dropped += 1,
        }
    }

    info!(rows = table.len(), filled, dropped, "cleaned income data");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::write_source;

    const INCOMES: &str = "\
Inkomen van huishoudens
Gemiddeld besteedbaar inkomen
Perioden: 2021
Eenheid: 1 000 euro


Regio's;Gemiddeld inkomen
Amsterdam;\"47,9\"
Utrecht;.
Rozendaal;
Groningen (gemeente);\"41,3\"
";

    fn fallback() -> HashMap<String, f64> {
        [("Utrecht".to_string(), 45.2)].into_iter().collect()
    }

    #[test]
    fn decimal_comma_is_parsed() {
        let f = write_source(INCOMES.as_bytes());
        let names = NameMapping::new(
            [("Groningen (gemeente)".to_string(), "Groningen".to_string())].into_iter().collect(),
        )
        .unwrap();
        let table = clean(f.path(), &names, &fallback()).unwrap();

        assert_eq!(table.value("Amsterdam", AVG_INCOME), Some(Value::Float(47.9)));
        assert_eq!(table.value("Groningen", AVG_INCOME), Some(Value::Float(41.3)));
    }

    #[test]
    fn missing_income_is_filled_from_fallback() {
        let f = write_source(INCOMES.as_bytes());
        let table = clean(f.path(), &NameMapping::default(), &fallback()).unwrap();
        assert_eq!(table.value("Utrecht", AVG_INCOME), Some(Value::Float(45.2)));
    }

    #[test]
    fn fallback_miss_is_dropped() {
        let f = write_source(INCOMES.as_bytes());
        let table = clean(f.path(), &NameMapping::default(), &fallback()).unwrap();
        assert!(!table.contains("Rozendaal"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn fallback_keyed_by_canonical_name() {
        let f = write_source(b"1\n2\n3\n4\n5\n6\nRegio's;Inkomen\nUtrecht (gemeente);.\n");
        let names = NameMapping::new(
            [("Utrecht (gemeente)".to_string(), "Utrecht".to_string())].into_iter().collect(),
        )
        .unwrap();
        let table = clean(f.path(), &names, &fallback()).unwrap();
        assert_eq!(table.value("Utrecht", AVG_INCOME), Some(Value::Float(45.2)));
    }
}
