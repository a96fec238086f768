//! Numeric coercion for CBS cells.
//!
//! Coercion never fails loudly: anything that does not read as a finite
//! number becomes `None` and is left to the cleaner's missing-value rule.

/// How a source writes its numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// `1234.5`, surrounding whitespace allowed.
    Plain,
    /// `1,234 km²` / `12,345 aantal`: comma thousands separator, unit suffix.
    Thousands,
    /// `45,2`: comma decimal separator.
    DecimalComma,
}

pub fn coerce(raw: &str, format: NumberFormat) -> Option<f64> {
    let cleaned: String = match format {
        NumberFormat::Plain => raw.trim().to_string(),
        NumberFormat::Thousands => {
            let compact = strip_whitespace(raw).replace(',', "");
            compact.replace("km²", "").replace("aantal", "")
        }
        NumberFormat::DecimalComma => strip_whitespace(raw).replace(',', "."),
    };

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn strip_whitespace(raw: &str) -> String {
    // CBS exports pad with non-breaking spaces as well
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
