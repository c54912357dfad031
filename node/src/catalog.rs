// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Read-only route and stop data.
//!
//! Both files are maintained by hand outside the server and are re-read on
//! every request, so edits show up without a restart.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub approximate: bool,
    /// Columns beyond the known ones, passed through as text.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub trait CatalogSource: Send + Sync {
    /// Route geometry document, verbatim. Empty array when unavailable.
    fn routes(&self) -> Value;
    fn stops(&self) -> Vec<Stop>;
}

pub struct FileCatalog {
    routes_path: PathBuf,
    stops_path: PathBuf,
}

impl FileCatalog {
    pub fn new(routes_path: impl Into<PathBuf>, stops_path: impl Into<PathBuf>) -> Self {
        Self {
            routes_path: routes_path.into(),
            stops_path: stops_path.into(),
        }
    }
}

impl CatalogSource for FileCatalog {
    fn routes(&self) -> Value {
        load_routes(&self.routes_path)
    }

    fn stops(&self) -> Vec<Stop> {
        match std::fs::read_to_string(&self.stops_path) {
            Ok(text) => parse_stops(&text),
            Err(e) => {
                tracing::debug!("no stops at {:?}: {}", self.stops_path, e);
                Vec::new()
            }
        }
    }
}

fn load_routes(path: &Path) -> Value {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("no routes at {:?}: {}", path, e);
            return Value::Array(Vec::new());
        }
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!("ignoring unparsable routes file {:?}: {}", path, e);
        Value::Array(Vec::new())
    })
}

/// Parses the stops sheet: a header row then comma-separated rows, no quoting.
pub fn parse_stops(text: &str) -> Vec<Stop> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();

    let mut stops = Vec::new();
    for (row, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        match parse_row(&columns, &cells) {
            Some(stop) => stops.push(stop),
            None => tracing::warn!("skipping stops row {}: bad coordinates in {:?}", row + 2, line),
        }
    }
    stops
}

fn parse_row(columns: &[&str], cells: &[&str]) -> Option<Stop> {
    let mut stop = Stop {
        id: String::new(),
        name: String::new(),
        lat: f64::NAN,
        lon: f64::NAN,
        approximate: false,
        extra: Map::new(),
    };

    for (i, column) in columns.iter().enumerate() {
        let cell = cells.get(i).copied().unwrap_or("");
        match *column {
            "id" | "stop_id" => stop.id = cell.to_string(),
            "name" | "stop_name" => stop.name = cell.to_string(),
            "lat" | "latitude" => stop.lat = cell.parse().ok()?,
            "lon" | "longitude" => stop.lon = cell.parse().ok()?,
            "approximate" => stop.approximate = matches!(cell, "1" | "true" | "True"),
            other => {
                stop.extra.insert(other.to_string(), Value::String(cell.to_string()));
            }
        }
    }

    (stop.lat.is_finite() && stop.lon.is_finite()).then_some(stop)
}

/// Fixed catalog held in memory.
#[derive(Default)]
pub struct StaticCatalog {
    pub routes: Value,
    pub stops: Vec<Stop>,
}

impl CatalogSource for StaticCatalog {
    fn routes(&self) -> Value {
        self.routes.clone()
    }

    fn stops(&self) -> Vec<Stop> {
        self.stops.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_stops() {
        let text = "id,name,lat,lon,approximate,zone\n\
                    s1,Depot,17.6601,78.3102,0,A\n\
                    s2,Market,17.7000,78.4000,True,B\n\
                    s3,Broken,north,78.4,1,C\n\
                    \n\
                    s4,Ridge,17.71,78.41,true\n";
        let stops = parse_stops(text);

        assert_eq!(stops.len(), 3);
        assert_eq!(stops[0].id, "s1");
        assert_eq!(stops[0].lat, 17.6601);
        assert!(!stops[0].approximate);
        assert!(stops[1].approximate);
        assert_eq!(stops[1].extra.get("zone"), Some(&json!("B")));
        assert_eq!(stops[2].name, "Ridge");
        assert!(stops[2].approximate);
    }

    #[test]
    fn test_missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FileCatalog::new(dir.path().join("routes.json"), dir.path().join("stops.csv"));
        assert_eq!(catalog.routes(), json!([]));
        assert!(catalog.stops().is_empty());
    }

    #[test]
    fn test_files_reread_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let routes = dir.path().join("routes.json");
        let catalog = FileCatalog::new(&routes, dir.path().join("stops.csv"));

        std::fs::write(&routes, "{ not json").unwrap();
        assert_eq!(catalog.routes(), json!([]));

        std::fs::write(&routes, r#"[{"name":"Loop","points":[[17.66,78.31]]}]"#).unwrap();
        assert_eq!(catalog.routes()[0]["name"], json!("Loop"));
    }
}
