//! `shaperoute` CLI: build a street graph from a GeoJSON file, then run
//! shape-constrained routing requests against it.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::RouteOptions;
use crate::geo::Coordinate;
use crate::graph::{build_graph, RouterConfig, StreetGraph};
use crate::ingest::ingest_file;
use crate::shapes::ShapeType;
use crate::spatial::SpatialIndex;

#[derive(Parser)]
#[command(name = "shaperoute")]
#[command(about = "Shape-constrained on-street router", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a GeoJSON road network and report graph diagnostics.
    Build {
        /// Input GeoJSON FeatureCollection
        input: PathBuf,

        /// Load build-time tunables (merge_threshold_m, min_largest_component,
        /// classification_key) from a TOML file; explicit flags below still
        /// override whatever it sets.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Endpoint merge threshold, in meters
        #[arg(long)]
        merge_threshold: Option<f64>,

        /// Minimum size of the largest connected component
        #[arg(long)]
        min_component: Option<usize>,

        /// Cache the built graph as a bincode file for faster `route` runs
        #[arg(long)]
        cache: Option<PathBuf>,
    },
    /// Run one shape-constrained routing request.
    Route {
        /// Bincode-cached graph (from `build --cache`) or a raw GeoJSON file
        graph: PathBuf,

        #[arg(long, value_enum)]
        shape: ShapeArg,

        /// Shape center as "lat,lon"
        #[arg(long)]
        center: String,

        /// Target loop distance, in kilometers
        #[arg(long = "distance-km")]
        distance_km: f64,

        #[arg(long)]
        corridor_width: Option<f64>,

        #[arg(long)]
        direction_penalty: Option<f64>,

        #[arg(long)]
        waypoints: Option<usize>,

        #[arg(long)]
        no_close_loop: bool,

        /// Write the resulting route as a GeoJSON LineString feature
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum ShapeArg {
    Heart,
    Circle,
    Star,
    Square,
}

impl From<ShapeArg> for ShapeType {
    fn from(value: ShapeArg) -> Self {
        match value {
            ShapeArg::Heart => ShapeType::Heart,
            ShapeArg::Circle => ShapeType::Circle,
            ShapeArg::Star => ShapeType::Star,
            ShapeArg::Square => ShapeType::Square,
        }
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Build {
                input,
                config,
                merge_threshold,
                min_component,
                cache,
            } => run_build(input, config, merge_threshold, min_component, cache),
            Commands::Route {
                graph,
                shape,
                center,
                distance_km,
                corridor_width,
                direction_penalty,
                waypoints,
                no_close_loop,
                out,
            } => run_route(
                graph,
                shape.into(),
                &center,
                distance_km,
                corridor_width,
                direction_penalty,
                waypoints,
                no_close_loop,
                out,
            ),
        }
    }
}

fn run_build(
    input: PathBuf,
    config_path: Option<PathBuf>,
    merge_threshold: Option<f64>,
    min_component: Option<usize>,
    cache: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => load_router_config(&path)?,
        None => RouterConfig::default(),
    };
    if let Some(m) = merge_threshold {
        config.merge_threshold_m = m;
    }
    if let Some(n) = min_component {
        config.min_largest_component = n;
    }

    let (ways, ingest_diag) = ingest_file(&input, &config.classification_key);
    println!(
        "ingested {} ways ({} features seen, {} skipped)",
        ingest_diag.ways_built, ingest_diag.features_seen, ingest_diag.features_skipped
    );

    let (graph, _components, diag) =
        build_graph(&ways, &config).context("failed to build street graph")?;

    println!("nodes: {}", diag.nodes);
    println!("edges: {}", diag.edges);
    println!("largest component: {}", diag.largest_component_size);
    println!("ways skipped: {}", diag.ways_skipped);

    if let Some(cache_path) = cache {
        let bytes = bincode::serialize(&graph).context("failed to serialize graph")?;
        fs::write(&cache_path, bytes)
            .with_context(|| format!("failed to write {}", cache_path.display()))?;
        println!("cached graph to {}", cache_path.display());
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_route(
    graph_path: PathBuf,
    shape: ShapeType,
    center: &str,
    distance_km: f64,
    corridor_width: Option<f64>,
    direction_penalty: Option<f64>,
    waypoints: Option<usize>,
    no_close_loop: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let center = parse_center(center)?;
    let graph = load_graph(&graph_path)?;

    let radius_m = crate::shapes::radius_for_distance(shape, distance_km);

    let mut options = RouteOptions::for_radius(radius_m);
    if let Some(w) = corridor_width {
        options.corridor_width_m = w;
    }
    if let Some(p) = direction_penalty {
        options.direction_penalty = p;
    }
    if let Some(n) = waypoints {
        options.waypoint_count = n;
    }
    if no_close_loop {
        options.close_loop = false;
    }

    let components = crate::graph::recompute_components(&graph);
    let index = SpatialIndex::build(&graph, &components, true);

    let route = crate::router::route(&graph, &index, center, shape, radius_m, &options)
        .context("routing request failed")?;

    println!("segments: {}", route.segments.len());
    println!("total length: {:.0}m", route.total_length_m);
    println!("closed: {}", route.diagnostics.closed);
    println!("skipped pairs: {}", route.diagnostics.skipped_pairs);
    println!("corridor relaxations used: {}", route.diagnostics.corridor_relaxations);

    if let Some(out_path) = out {
        write_geojson(&route, &out_path)?;
        println!("wrote route to {}", out_path.display());
    }

    Ok(())
}

fn parse_center(s: &str) -> Result<Coordinate> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        bail!("center must be in format 'lat,lon'");
    }
    let lat = parts[0].trim().parse::<f64>().context("invalid latitude")?;
    let lon = parts[1].trim().parse::<f64>().context("invalid longitude")?;
    Ok(Coordinate::new(lat, lon))
}

/// Loads a [`RouterConfig`] from a TOML file (e.g. `merge_threshold_m = 5.0`),
/// falling back to `Default` for any field the file omits.
fn load_router_config(path: &PathBuf) -> Result<RouterConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    #[derive(serde::Deserialize, Default)]
    struct PartialConfig {
        merge_threshold_m: Option<f64>,
        min_largest_component: Option<usize>,
        classification_key: Option<String>,
    }
    let partial: PartialConfig =
        toml::from_str(&text).with_context(|| format!("invalid TOML in {}", path.display()))?;
    let defaults = RouterConfig::default();
    Ok(RouterConfig {
        merge_threshold_m: partial.merge_threshold_m.unwrap_or(defaults.merge_threshold_m),
        min_largest_component: partial
            .min_largest_component
            .unwrap_or(defaults.min_largest_component),
        classification_key: partial
            .classification_key
            .unwrap_or(defaults.classification_key),
    })
}

fn load_graph(path: &PathBuf) -> Result<StreetGraph> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if let Ok(graph) = bincode::deserialize::<StreetGraph>(&bytes) {
        return Ok(graph);
    }
    let config = RouterConfig::default();
    let (ways, _diag) = ingest_file(path, &config.classification_key);
    let (graph, _components, _diag) =
        build_graph(&ways, &config).context("failed to build street graph from GeoJSON")?;
    Ok(graph)
}

fn write_geojson(route: &crate::assemble::Route, path: &PathBuf) -> Result<()> {
    let coordinates: Vec<Vec<f64>> = route
        .segments
        .iter()
        .flat_map(|s| s.polyline.iter())
        .map(|c| vec![c.lon, c.lat])
        .collect();

    let geometry = geojson::Geometry::new(geojson::Value::LineString(coordinates));
    let mut properties = geojson::JsonObject::new();
    properties.insert(
        "total_length_m".to_string(),
        serde_json::json!(route.total_length_m),
    );
    properties.insert("closed".to_string(), serde_json::json!(route.diagnostics.closed));

    let feature = geojson::Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };
    let doc = geojson::GeoJson::Feature(feature);

    fs::write(path, doc.to_string())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_center_accepts_lat_lon() {
        let c = parse_center("48.1351, 11.5820").unwrap();
        assert!((c.lat - 48.1351).abs() < 1e-9);
        assert!((c.lon - 11.5820).abs() < 1e-9);
    }

    #[test]
    fn parse_center_rejects_malformed_input() {
        assert!(parse_center("48.1351").is_err());
        assert!(parse_center("not,numbers").is_err());
    }

    #[test]
    fn router_config_loads_partial_toml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        fs::write(&path, "merge_threshold_m = 8.0\n").unwrap();

        let config = load_router_config(&path).unwrap();
        assert_eq!(config.merge_threshold_m, 8.0);
        assert_eq!(
            config.min_largest_component,
            RouterConfig::default().min_largest_component
        );
        assert_eq!(
            config.classification_key,
            RouterConfig::default().classification_key
        );
    }
}
