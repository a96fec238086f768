//! Rail stations rolled up to municipalities.

use crate::error::{PipelineError, Result};
use crate::names::NameMapping;
use crate::numeric::{coerce, NumberFormat};
use crate::table::{Table, Value};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

pub const STATION_COUNT: &str = "station_count";
pub const TOTAL_TRAFFIC: &str = "total_traffic";

const REQUIRED_COLUMNS: [&str; 3] = ["municipality", "type", "traffic_count"];

#[derive(Debug, Deserialize)]
struct StationRecord {
    municipality: String,
    #[serde(rename = "type")]
    kind: String,
    traffic_count: String,
}

/// One station, with its municipality already reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub municipality: String,
    pub kind: String,
    pub traffic: f64,
}

pub fn load_stations(path: &Path, names: &NameMapping) -> Result<Vec<Station>> {
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = ReaderBuilder::new().from_path(path).map_err(csv_err)?;

    let headers = rdr.headers().map_err(csv_err)?.clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == required) {
            return Err(PipelineError::parse(
                path,
                format!("column '{}' not found in header {:?}", required, headers),
            ));
        }
    }

    let mut stations = Vec::new();
    let mut bad_traffic = 0;

    for result in rdr.deserialize() {
        let record: StationRecord = result.map_err(csv_err)?;
        let municipality = record.municipality.trim();
        if municipality.is_empty() {
            debug!(kind = %record.kind, "station without municipality, skipping");
            continue;
        }

        let traffic = match coerce(&record.traffic_count, NumberFormat::Plain) {
            Some(t) if t >= 0.0 => t,
            _ => {
                bad_traffic += 1;
                0.0
            }
        };

        stations.push(Station {
            municipality: names.canonicalize(municipality).to_string(),
            kind: record.kind.trim().to_string(),
            traffic,
        });
    }

    if bad_traffic > 0 {
        warn!(stations = bad_traffic, "missing or negative traffic counted as 0");
    }
    info!(stations = stations.len(), "loaded stations");
    Ok(stations)
}

/// One row per distinct canonical reference municipality, in first-seen
/// order; municipalities without stations get zeros everywhere.
pub fn aggregate_stations<'a>(
    stations: &[Station],
    reference: impl IntoIterator<Item = &'a str>,
    names: &NameMapping,
) -> Result<Table> {
    let mut station_count: HashMap<&str, u64> = HashMap::new();
    let mut kind_count: HashMap<(&str, &str), u64> = HashMap::new();
    let mut traffic: HashMap<&str, f64> = HashMap::new();
    let mut kinds: BTreeSet<&str> = BTreeSet::new();

    for station in stations {
        let municipality = station.municipality.as_str();
        *station_count.entry(municipality).or_insert(0) += 1;
        *traffic.entry(municipality).or_insert(0.0) += station.traffic;
        // untyped stations still count towards the totals
        if !station.kind.is_empty() {
            kinds.insert(station.kind.as_str());
            *kind_count.entry((municipality, station.kind.as_str())).or_insert(0) += 1;
        }
    }

    let mut columns = vec![STATION_COUNT.to_string()];
    for kind in &kinds {
        let column = format!("{}_count", kind);
        if column == STATION_COUNT {
            return Err(PipelineError::DuplicateColumn { column });
        }
        columns.push(column);
    }
    columns.push(TOTAL_TRAFFIC.to_string());

    let mut table = Table::new("stations", columns);
    let mut seen = HashSet::new();

    for raw in reference {
        let municipality = names.canonicalize(raw);
        if !seen.insert(municipality) {
            continue;
        }

        let mut values = Vec::with_capacity(kinds.len() + 2);
        values.push(Value::Count(station_count.get(municipality).copied().unwrap_or(0)));
        for kind in &kinds {
            let n = kind_count.get(&(municipality, *kind)).copied().unwrap_or(0);
            values.push(Value::Count(n));
        }
        // summed first, truncated once
        let total = traffic.get(municipality).copied().unwrap_or(0.0);
        values.push(Value::Count(total as u64));

        table.insert(municipality, values);
    }

    let unmatched = station_count.keys().filter(|m| !seen.contains(*m)).count();
    if unmatched > 0 {
        info!(municipalities = unmatched, "stations in municipalities outside the reference list ignored");
    }
    info!(rows = table.len(), categories = kinds.len(), "aggregated stations");
    Ok(table)
}

pub fn aggregate<'a>(
    path: &Path,
    reference: impl IntoIterator<Item = &'a str>,
    names: &NameMapping,
) -> Result<Table> {
    let stations = load_stations(path, names)?;
    aggregate_stations(&stations, reference, names)
}
