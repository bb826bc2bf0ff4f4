//! GeoJSON ingestion: turns a `FeatureCollection` of LineString/MultiLineString
//! features into the flat way list the graph builder consumes.
//!
//! Malformed geometry is skipped and counted rather than aborting the whole
//! ingest; only an empty result is a hard failure (surfaced by the graph
//! builder, not here).

use std::fs;
use std::path::Path;

use geojson::{GeoJson, Geometry, Value};
use tracing::warn;

use crate::geo::Coordinate;

/// One contiguous line of road, with an optional classification tag (e.g.
/// the source's `highway` property) preserved for the caller but unused by
/// the router itself.
#[derive(Debug, Clone)]
pub struct Way {
    pub coords: Vec<Coordinate>,
    pub classification: Option<String>,
}

/// Counters surfaced to the caller after ingestion, regardless of outcome.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IngestDiagnostics {
    pub features_seen: usize,
    pub features_skipped: usize,
    pub ways_built: usize,
}

/// Which feature property to read as the way's classification tag.
pub const DEFAULT_CLASSIFICATION_KEY: &str = "highway";

pub fn ingest_file<P: AsRef<Path>>(
    path: P,
    classification_key: &str,
) -> (Vec<Way>, IngestDiagnostics) {
    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, path = %path.as_ref().display(), "failed to read graph source file");
            return (Vec::new(), IngestDiagnostics::default());
        }
    };
    ingest_str(&text, classification_key)
}

pub fn ingest_str(text: &str, classification_key: &str) -> (Vec<Way>, IngestDiagnostics) {
    let mut diagnostics = IngestDiagnostics::default();

    let geojson: GeoJson = match text.parse() {
        Ok(g) => g,
        Err(e) => {
            warn!(error = %e, "failed to parse GeoJSON");
            return (Vec::new(), diagnostics);
        }
    };

    let mut ways = Vec::new();

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                diagnostics.features_seen += 1;
                let Some(geometry) = feature.geometry.as_ref() else {
                    diagnostics.features_skipped += 1;
                    continue;
                };
                let classification = feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(classification_key))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                push_ways(geometry, classification, &mut ways, &mut diagnostics);
            }
        }
        GeoJson::Feature(feature) => {
            diagnostics.features_seen += 1;
            if let Some(geometry) = feature.geometry.as_ref() {
                let classification = feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(classification_key))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                push_ways(geometry, classification, &mut ways, &mut diagnostics);
            } else {
                diagnostics.features_skipped += 1;
            }
        }
        GeoJson::Geometry(geometry) => {
            diagnostics.features_seen += 1;
            push_ways(&geometry, None, &mut ways, &mut diagnostics);
        }
    }

    diagnostics.ways_built = ways.len();
    (ways, diagnostics)
}

fn push_ways(
    geometry: &Geometry,
    classification: Option<String>,
    ways: &mut Vec<Way>,
    diagnostics: &mut IngestDiagnostics,
) {
    let extracted = extract_lines(geometry);
    if extracted.is_empty() {
        diagnostics.features_skipped += 1;
        return;
    }
    for coords in extracted {
        ways.push(Way {
            coords,
            classification: classification.clone(),
        });
    }
}

/// Pulls one or more coordinate rings out of a LineString/MultiLineString
/// geometry. Rings with fewer than 2 points or non-finite coordinates are
/// dropped (each ring is validated independently, so a malformed ring in a
/// MultiLineString does not poison its siblings).
fn extract_lines(geometry: &Geometry) -> Vec<Vec<Coordinate>> {
    match &geometry.value {
        Value::LineString(line) => to_coords(line).map(|c| vec![c]).unwrap_or_default(),
        Value::MultiLineString(lines) => lines.iter().filter_map(|l| to_coords(l)).collect(),
        _ => Vec::new(),
    }
}

fn to_coords(raw: &[Vec<f64>]) -> Option<Vec<Coordinate>> {
    if raw.len() < 2 {
        return None;
    }
    let mut coords = Vec::with_capacity(raw.len());
    for point in raw {
        let &[lon, lat, ..] = point.as_slice() else {
            return None;
        };
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        coords.push(Coordinate::new(lat, lon));
    }
    Some(coords)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"highway": "residential"},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[11.58, 48.13], [11.581, 48.131], [11.582, 48.132]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[11.58, 48.13]]
                }
            },
            {
                "type": "Feature",
                "properties": {"highway": "track"},
                "geometry": {
                    "type": "MultiLineString",
                    "coordinates": [
                        [[11.6, 48.1], [11.601, 48.101]],
                        [[11.7, 48.2]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_valid_ways_and_skips_malformed() {
        let (ways, diag) = ingest_str(SAMPLE, DEFAULT_CLASSIFICATION_KEY);
        // one 3-point LineString + one valid ring from the MultiLineString
        assert_eq!(ways.len(), 2);
        assert_eq!(diag.features_seen, 3);
        assert_eq!(diag.features_skipped, 1); // the 1-point LineString feature
        assert_eq!(ways[0].classification.as_deref(), Some("residential"));
        assert_eq!(ways[1].classification.as_deref(), Some("track"));
    }

    #[test]
    fn empty_collection_yields_no_ways() {
        let (ways, diag) = ingest_str(r#"{"type":"FeatureCollection","features":[]}"#, "highway");
        assert!(ways.is_empty());
        assert_eq!(diag.features_seen, 0);
    }
}
