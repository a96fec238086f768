//! Municipality name reconciliation.
//!
//! Sources spell some municipalities differently (`"Utrecht (gemeente)"` in CBS
//! tables, `"Utrecht"` in the boundary file). A [`NameMapping`] maps every known
//! alias straight to its canonical name so that lookups never chain.

use crate::error::{PipelineError, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct NameMapping {
    aliases: HashMap<String, String>,
}

impl NameMapping {
    /// Builds a mapping, collapsing chains such as `a -> b, b -> c` into
    /// `a -> c, b -> c`. Cycles are rejected.
    pub fn new(raw: HashMap<String, String>) -> Result<Self> {
        let mut aliases = HashMap::with_capacity(raw.len());

        for alias in raw.keys() {
            let mut seen = HashSet::new();
            seen.insert(alias.as_str());
            let mut current = alias.as_str();

            while let Some(next) = raw.get(current) {
                if next == current {
                    break;
                }
                if !seen.insert(next.as_str()) {
                    return Err(PipelineError::InvalidNameMapping(format!(
                        "alias cycle through '{}'",
                        alias
                    )));
                }
                current = next;
            }

            if current != alias {
                aliases.insert(alias.clone(), current.to_string());
            }
        }

        Ok(Self { aliases })
    }

    /// Canonical spelling of `name`; unknown names are already canonical.
    pub fn canonicalize<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
