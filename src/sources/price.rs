//! Average sale price per municipality.

use super::{insert_canonical, read_sheet, SourceSheet};
use crate::error::Result;
use crate::names::NameMapping;
use crate::numeric::{coerce, NumberFormat};
use crate::table::{Table, Value};
use std::path::Path;
use tracing::info;

pub const AVG_PRICE: &str = "avg_price";

const SKIP_LINES: usize = 2;
// municipality, subject, currency, avg_price
const WIDTH: usize = 4;

pub fn clean(path: &Path, names: &NameMapping) -> Result<Table> {
    let sheet = read_sheet(path, b';', SKIP_LINES)?;
    sheet.expect_width(WIDTH)?;

    let mut table = Table::new("prices", vec![AVG_PRICE.to_string()]);
    let mut dropped = 0;

    for row in &sheet.rows {
        let municipality = SourceSheet::cell(row, 0);
        let price = coerce(SourceSheet::cell(row, 3), NumberFormat::Plain);

        match price {
            Some(price) if !municipality.is_empty() => {
                insert_canonical(&mut table, names, municipality, vec![Value::Float(price)]);
            }
            _ => dropped += 1,
        }
    }

    info!(rows = table.len(), dropped, "cleaned price data");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::sources::tests::write_source;

    const PRICES: &str = "\
Bestaande koopwoningen; gemiddelde verkoopprijs
Perioden: 2022
Regio's;Onderwerp;Eenheid;Gemiddelde verkoopprijs
Amsterdam;Gemiddelde verkoopprijs;euro;612345
Utrecht (gemeente);Gemiddelde verkoopprijs;euro; 498765
Vlieland;Gemiddelde verkoopprijs;euro;.
Bron: CBS;;;
";

    #[test]
    fn keeps_numeric_rows_and_canonicalizes() {
        let f = write_source(PRICES.as_bytes());
        let names = NameMapping::new(
            [("Utrecht (gemeente)".to_string(), "Utrecht".to_string())].into_iter().collect(),
        )
        .unwrap();

        let table = clean(f.path(), &names).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.value("Amsterdam", AVG_PRICE), Some(Value::Float(612345.0)));
        assert_eq!(table.value("Utrecht", AVG_PRICE), Some(Value::Float(498765.0)));
        assert!(!table.contains("Vlieland"));
    }

    #[test]
    fn reconciled_spellings_keep_first_row() {
        let f = write_source(
            "a\nb\nRegio's;Onderwerp;Eenheid;Prijs\n\
             Utrecht (gemeente);x;euro;498765\n\
             Utrecht;x;euro;1\n\
             Ede;x;euro;380000\n"
                .as_bytes(),
        );
        let names = NameMapping::new(
            [("Utrecht (gemeente)".to_string(), "Utrecht".to_string())].into_iter().collect(),
        )
        .unwrap();

        let table = clean(f.path(), &names).unwrap();

        assert_eq!(table.municipalities().collect::<Vec<_>>(), vec!["Utrecht", "Ede"]);
        assert_eq!(table.value("Utrecht", AVG_PRICE), Some(Value::Float(498765.0)));
    }

    #[test]
    fn comma_delimited_file_is_rejected() {
        let f = write_source(b"a\nb\nRegio,Onderwerp,Eenheid,Prijs\nAmsterdam,x,euro,1\n");
        let err = clean(f.path(), &NameMapping::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }
}
