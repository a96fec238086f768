//! Average floor area per municipality.

use super::{insert_canonical, read_sheet, SourceSheet};
use crate::error::Result;
use crate::names::NameMapping;
use crate::numeric::{coerce, NumberFormat};
use crate::table::{Table, Value};
use std::path::Path;
use tracing::info;

pub const AVG_SURFACE: &str = "avg_surface";

const SKIP_LINES: usize = 4;
const NAME_COLUMN: &str = "Unnamed: 0";
// second "Totaal" block holds the average surface
const SURFACE_COLUMN: &str = "Totaal.1";

pub fn clean(path: &Path, names: &NameMapping) -> Result<Table> {
    let sheet = read_sheet(path, b';', SKIP_LINES)?;
    let name_idx = sheet.column(NAME_COLUMN)?;
    let surface_idx = sheet.column(SURFACE_COLUMN)?;

    let complete: Vec<(&str, &str)> = sheet
        .rows
        .iter()
        .map(|row| {
            (
                SourceSheet::cell(row, name_idx),
                SourceSheet::cell(row, surface_idx),
            )
        })
        .filter(|(name, surface)| !name.is_empty() && !surface.is_empty())
        .collect();

    let mut table = Table::new("surface", vec![AVG_SURFACE.to_string()]);
    let mut dropped = 0;

    // The first complete row is an upstream artifact (the national total).
    for (municipality, raw) in complete.iter().skip(1) {
        match coerce(raw, NumberFormat::Plain) {
            Some(surface) => {
                insert_canonical(&mut table, names, municipality, vec![Value::Float(surface)]);
            }
            None => dropped += 1,
        }
    }

    info!(rows = table.len(), dropped, "cleaned surface data");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::sources::tests::write_source;

    const SURFACE: &str = "\
Woningvoorraad naar oppervlakte
Peildatum: 1 januari
;Aantal;;Gemiddelde oppervlakte;
;;;;
;Totaal;Koop;Totaal;Koop
Nederland;8000000;4500000;120;135
Amsterdam;450000;140000;76;90
Ede;50000;30000;131;150
Groningen (gemeente);110000;50000;98;120
";

    #[test]
    fn first_data_row_is_discarded() {
        let f = write_source(SURFACE.as_bytes());
        let table = clean(f.path(), &NameMapping::default()).unwrap();

        // four parsed rows, one discarded
        assert_eq!(table.len(), 3);
        assert!(!table.contains("Nederland"));
        assert_eq!(table.value("Amsterdam", AVG_SURFACE), Some(Value::Float(76.0)));
        assert_eq!(table.value("Ede", AVG_SURFACE), Some(Value::Float(131.0)));
    }

    #[test]
    fn discarded_row_does_not_depend_on_content() {
        let text = SURFACE.replace("Nederland;8000000;4500000;120;135", "Aa en Hunze;1;1;140;150");
        let f = write_source(text.as_bytes());
        let table = clean(f.path(), &NameMapping::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(!table.contains("Aa en Hunze"));
    }

    #[test]
    fn missing_surface_block_is_parse_error() {
        let f = write_source(b"a\nb\nc\nd\n;Totaal;Koop\nAmsterdam;1;2\n");
        let err = clean(f.path(), &NameMapping::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }
}
