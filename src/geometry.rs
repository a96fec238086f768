//! Municipal boundaries, their centroids and the distance to the nearest hub.
//!
//! Centroids are taken in Web Mercator (EPSG:3857) and projected back to
//! WGS84; averaging raw lat/lon pulls centroids south on tall polygons.

use crate::config::Hub;
use crate::error::{PipelineError, Result};
use crate::names::NameMapping;
use crate::table::{Table, Value};
use geo::{Centroid, Coord, CoordsIter, MapCoords, MultiPolygon};
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

const EARTH_RADIUS_KM: f64 = 6371.0;
// WGS84 semi-major axis, the EPSG:3857 sphere
const MERCATOR_RADIUS_M: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// A municipality's boundary in EPSG:4326 (x = lon, y = lat).
#[derive(Debug, Clone)]
pub struct Boundary {
    pub municipality: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CentroidDistance {
    pub municipality: String,
    pub lat: f64,
    pub lon: f64,
    pub nearest_hub: String,
    pub distance_km: f64,
}

pub fn load_boundaries(path: &Path, name_property: &str, names: &NameMapping) -> Result<Vec<Boundary>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| PipelineError::parse(path, "boundary file has no extension"))?;

    let boundaries = match extension.as_str() {
        "shp" => load_shapefile(path, name_property, names)?,
        "json" | "geojson" => load_geojson(path, name_property, names)?,
        other => {
            return Err(PipelineError::parse(
                path,
                format!("unsupported geometry format: {}", other),
            ))
        }
    };

    info!(features = boundaries.len(), "loaded municipal boundaries");
    Ok(boundaries)
}

fn load_geojson(path: &Path, name_property: &str, names: &NameMapping) -> Result<Vec<Boundary>> {
    use geojson::GeoJson;

    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).map_err(|source| {
        PipelineError::GeoJson {
            path: path.to_path_buf(),
            source: geojson::Error::MalformedJson(source),
        }
    })?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(PipelineError::parse(path, "GeoJSON must be a FeatureCollection")),
    };

    let mut boundaries = Vec::new();

    for (i, feature) in collection.features.into_iter().enumerate() {
        let name = match feature.properties.as_ref().and_then(|p| p.get(name_property)) {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            _ => {
                warn!(feature = i, property = name_property, "feature has no name, skipping");
                continue;
            }
        };
        let municipality = names.canonicalize(&name).to_string();

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: std::result::Result<geo::Geometry<f64>, _> = geom.value.try_into();
                match converted {
                    Ok(geo::Geometry::MultiPolygon(mp)) => mp,
                    Ok(geo::Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
                    Ok(_) => {
                        warn!(%municipality, "geometry is not a polygon, skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!(%municipality, error = ?e, "failed to convert geometry, skipping");
                        continue;
                    }
                }
            }
            None => {
                warn!(%municipality, "feature has no geometry, skipping");
                continue;
            }
        };

        boundaries.push(Boundary { municipality, geometry });
    }

    Ok(boundaries)
}

fn load_shapefile(path: &Path, name_property: &str, names: &NameMapping) -> Result<Vec<Boundary>> {
    use shapefile::dbase::FieldValue;
    use shapefile::Shape;

    let shp_err = |source| PipelineError::Shapefile {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = shapefile::Reader::from_path(path).map_err(shp_err)?;

    let mut boundaries = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.map_err(shp_err)?;

        let name = match record.get(name_property) {
            Some(FieldValue::Character(Some(s))) => s.trim().to_string(),
            _ => {
                warn!(property = name_property, "shape record has no name, skipping");
                continue;
            }
        };
        let municipality = names.canonicalize(&name).to_string();

        let converted: std::result::Result<MultiPolygon<f64>, _> = match shape {
            Shape::Polygon(polygon) => polygon.try_into(),
            Shape::PolygonM(polygon) => polygon.try_into(),
            Shape::PolygonZ(polygon) => polygon.try_into(),
            _ => {
                warn!(%municipality, "shape is not a polygon, skipping");
                continue;
            }
        };

        match converted {
            Ok(geometry) => boundaries.push(Boundary { municipality, geometry }),
            Err(e) => warn!(%municipality, error = ?e, "failed to convert polygon, skipping"),
        }
    }

    Ok(boundaries)
}

/// Great-circle distance in kilometres.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

fn to_web_mercator(c: Coord<f64>) -> Coord<f64> {
    let lat_rad = c.y.to_radians();
    Coord {
        x: MERCATOR_RADIUS_M * c.x.to_radians(),
        y: MERCATOR_RADIUS_M * (lat_rad.tan() + (1.0 / lat_rad.cos())).ln(),
    }
}

fn from_web_mercator(c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (c.x / MERCATOR_RADIUS_M).to_degrees(),
        y: (2.0 * (c.y / MERCATOR_RADIUS_M).exp().atan() - PI / 2.0).to_degrees(),
    }
}

/// Centroid as (lat, lon), computed in the projected plane.
pub fn projected_centroid(geometry: &MultiPolygon<f64>) -> std::result::Result<(f64, f64), String> {
    if let Some(c) = geometry
        .coords_iter()
        .find(|c| !c.x.is_finite() || !c.y.is_finite() || c.x.abs() > 180.0 || c.y.abs() > MAX_MERCATOR_LAT)
    {
        return Err(format!("coordinate ({}, {}) outside projection bounds", c.x, c.y));
    }

    let projected = geometry.map_coords(to_web_mercator);
    let centroid = projected
        .centroid()
        .ok_or_else(|| "empty geometry".to_string())?;
    let back = from_web_mercator(centroid.0);

    if back.x.is_finite() && back.y.is_finite() {
        Ok((back.y, back.x))
    } else {
        Err("projection produced a non-finite centroid".to_string())
    }
}

pub fn centroid_distance(boundary: &Boundary, hubs: &[Hub]) -> Result<CentroidDistance> {
    let geometry_err = |reason: String| PipelineError::Geometry {
        municipality: boundary.municipality.clone(),
        reason,
    };

    let (lat, lon) = projected_centroid(&boundary.geometry).map_err(geometry_err)?;

    let (hub, distance_km) = hubs
        .iter()
        .map(|hub| (hub, haversine(lat, lon, hub.lat, hub.lon)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| geometry_err("no hubs configured".to_string()))?;

    Ok(CentroidDistance {
        municipality: boundary.municipality.clone(),
        lat,
        lon,
        nearest_hub: hub.name.clone(),
        distance_km,
    })
}

/// Centroid distances for every boundary that has one, in input order.
/// Failing features are logged and left out.
pub fn centroid_distances(boundaries: &[Boundary], hubs: &[Hub]) -> Vec<CentroidDistance> {
    let results: Vec<Result<CentroidDistance>> = boundaries
        .par_iter()
        .map(|b| centroid_distance(b, hubs))
        .collect();

    let mut distances = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(d) => distances.push(d),
            Err(e) => warn!(error = %e, "dropping feature from geometry table"),
        }
    }
    distances
}

pub fn process(boundaries: &[Boundary], hubs: &[Hub], distance_column: &str) -> Table {
    let mut table = Table::new("geometry", vec![distance_column.to_string()]);

    for d in centroid_distances(boundaries, hubs) {
        if !table.insert(d.municipality.clone(), vec![Value::Float(d.distance_km)]) {
            warn!(municipality = %d.municipality, "duplicate boundary feature, keeping first");
        }
    }

    info!(rows = table.len(), dropped = boundaries.len() - table.len(), "computed hub distances");
    table
}

pub fn write_centroids(distances: &[CentroidDistance], path: &Path) -> Result<()> {
    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for d in distances {
        writer.serialize(d).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}
