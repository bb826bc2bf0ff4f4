//! Router facade: the process-wide lazy singleton over a built street graph
//! and spatial index, plus the top-level `route` entry point that ties the
//! shape generator, corridor model and route assembler together.

use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::info_span;

use crate::assemble::{assemble_route, Route};
use crate::config::RouteOptions;
use crate::corridor::CorridorModel;
use crate::error::Result;
use crate::geo::Coordinate;
use crate::graph::{GraphBuildDiagnostics, RouterConfig, StreetGraph};
use crate::shapes::{generate_outline, ShapeType};
use crate::spatial::SpatialIndex;

/// Process-wide, read-only graph and spatial index, shared across requests.
pub struct RouterHandle {
    pub graph: Arc<StreetGraph>,
    pub index: Arc<SpatialIndex>,
    pub diagnostics: GraphBuildDiagnostics,
}

static HANDLE: OnceLock<Arc<RouterHandle>> = OnceLock::new();
// Serializes concurrent build attempts. `HANDLE` itself is only ever set on
// success, so a failed build never poisons it and a later caller can retry
// the full ingest+build pipeline — a bare `OnceLock<Result<..>>` can't do
// that, since once set (even to an `Err`) it can never be reset.
static BUILD_LOCK: Mutex<()> = Mutex::new(());

impl RouterHandle {
    /// Returns the process-wide handle, building it from `path` on first
    /// call. Concurrent first callers block on the same build; once it
    /// succeeds every later call is a lock-free read. A failed build leaves
    /// the singleton uninitialized so the next call retries from scratch.
    pub fn get_or_init<P: AsRef<Path>>(
        path: P,
        config: &RouterConfig,
    ) -> Result<&'static RouterHandle> {
        if let Some(handle) = HANDLE.get() {
            return Ok(handle);
        }

        let _guard = BUILD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = HANDLE.get() {
            return Ok(handle);
        }

        let span = info_span!("build_graph", path = %path.as_ref().display());
        let _enter = span.enter();

        let (ways, _ingest_diag) = crate::ingest::ingest_file(&path, &config.classification_key);
        let (graph, components, diagnostics) = crate::graph::build_graph(&ways, config)?;
        let index = SpatialIndex::build(&graph, &components, true);

        let handle = Arc::new(RouterHandle {
            graph: Arc::new(graph),
            index: Arc::new(index),
            diagnostics,
        });
        // We hold `BUILD_LOCK` and just rechecked, so this is always the
        // first successful `set`.
        let _ = HANDLE.set(handle);
        Ok(HANDLE.get().expect("just set"))
    }
}

/// Produces a closed, corridor-constrained route of shape `shape` centered
/// on `center` with the given `radius_m`, using the process's street graph
/// and spatial index.
pub fn route(
    graph: &StreetGraph,
    index: &SpatialIndex,
    center: Coordinate,
    shape: ShapeType,
    radius_m: f64,
    options: &RouteOptions,
) -> Result<Route> {
    let span = info_span!(
        "route_request",
        ?shape,
        radius_m,
        corridor_width_m = options.corridor_width_m,
        direction_penalty = options.direction_penalty
    );
    let _enter = span.enter();

    let outline = generate_outline(shape, center, radius_m, options.waypoint_count);
    let corridor = CorridorModel::new(outline.dense, options.corridor_width_m);

    assemble_route(graph, index, &corridor, &outline.sparse, options)
}
