//! Route assembly: snaps shape waypoints to graph nodes and stitches
//! constrained A* legs between them into one closed (or best-effort) route.

use tracing::{info, warn};

use crate::astar::{find_path, PathStep};
use crate::config::{CancelToken, RouteOptions};
use crate::corridor::CorridorModel;
use crate::error::{Result, RouterError};
use crate::geo::Coordinate;
use crate::graph::{NodeId, StreetGraph};
use crate::spatial::SpatialIndex;

/// One directed traversal of a graph edge within an assembled route.
#[derive(Debug, Clone)]
pub struct RouteSegment {
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub polyline: Vec<Coordinate>,
    pub length_m: f64,
}

/// Per-request counters surfaced alongside a [`Route`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RouteDiagnostics {
    pub waypoint_pairs: usize,
    pub corridor_relaxations: usize,
    pub skipped_pairs: usize,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub segments: Vec<RouteSegment>,
    pub total_length_m: f64,
    pub diagnostics: RouteDiagnostics,
}

const FALLBACK_K: usize = 5;
const CORRIDOR_RELAXATION: f64 = 1.25;

/// Snaps `sparse` waypoints onto `graph` and stitches constrained A* legs
/// between consecutive pairs (plus the wraparound leg when `options.close_loop`).
pub fn assemble_route(
    graph: &StreetGraph,
    index: &SpatialIndex,
    corridor: &CorridorModel,
    sparse: &[Coordinate],
    options: &RouteOptions,
) -> Result<Route> {
    let mut snapped = Vec::with_capacity(sparse.len());
    for coord in sparse {
        let Some(node) = index.find_nearest(*coord) else {
            return Err(RouterError::GraphBuildFailed {
                reason: "spatial index is empty, nothing to snap waypoints onto".to_string(),
            });
        };
        snapped.push(node);
    }
    snapped.dedup();

    if options.close_loop && snapped.len() > 1 && snapped.first() == snapped.last() {
        // already closed by snapping; avoid a zero-length final leg
        snapped.pop();
    }

    let mut targets: Vec<NodeId> = snapped.iter().skip(1).copied().collect();
    if options.close_loop && snapped.len() > 1 {
        targets.push(snapped[0]);
    }

    let mut diagnostics = RouteDiagnostics {
        waypoint_pairs: targets.len(),
        ..Default::default()
    };

    let mut segments: Vec<RouteSegment> = Vec::new();
    let mut closed = options.close_loop;
    let total_legs = targets.len();
    // The node actually reached so far; a leg always starts here, not at the
    // originally snapped waypoint, so a fallback that lands on an alternate
    // node never breaks contiguity with the leg that follows it.
    let mut current = snapped[0];

    for (i, target) in targets.into_iter().enumerate() {
        check_cancelled(&options.cancel)?;

        if current == target {
            continue;
        }

        match resolve_leg(graph, index, corridor, current, target, options, &mut diagnostics)? {
            Some((steps, reached)) => {
                for step in steps {
                    let polyline = graph
                        .edge(step.edge)
                        .map(|e| graph.oriented_polyline(e, step.from))
                        .unwrap_or_default();
                    segments.push(RouteSegment {
                        from_node: step.from,
                        to_node: step.to,
                        polyline,
                        length_m: step.length_m,
                    });
                }
                current = reached;
            }
            None => {
                diagnostics.skipped_pairs += 1;
                // Non-fatal here: the route continues, so the error is only
                // constructed for its `Display` message, never returned.
                let no_path = RouterError::NoPath { from: current.0, to: target.0 };
                let is_final_wraparound = options.close_loop && i == total_legs - 1;
                if is_final_wraparound {
                    closed = false;
                    warn!(%no_path, "wraparound leg failed, emitting open route");
                } else {
                    warn!(%no_path, "waypoint pair has no admissible path, skipping");
                }
            }
        }
    }

    if segments.is_empty() {
        return Err(RouterError::RouteEmpty);
    }

    diagnostics.closed = closed
        && segments.first().map(|s| s.from_node) == segments.last().map(|s| s.to_node);

    let total_length_m: f64 = segments.iter().map(|s| s.length_m).sum();

    info!(
        segments = segments.len(),
        total_length_m,
        closed = diagnostics.closed,
        skipped_pairs = diagnostics.skipped_pairs,
        "assembled route"
    );

    Ok(Route {
        segments,
        total_length_m,
        diagnostics,
    })
}

fn check_cancelled(cancel: &Option<CancelToken>) -> Result<()> {
    if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
        return Err(RouterError::Cancelled);
    }
    Ok(())
}

/// Attempts A* from the fixed `from` node (wherever the route actually is)
/// to `to`, then through the fallback tiers described in the router's
/// design: k-nearest alternative endpoints for `to` only — `from` can't
/// move without breaking contiguity with the leg that already reached it —
/// then a relaxed corridor. Returns the steps plus the node actually
/// reached, which becomes the next leg's `from`.
fn resolve_leg(
    graph: &StreetGraph,
    index: &SpatialIndex,
    corridor: &CorridorModel,
    from: NodeId,
    to: NodeId,
    options: &RouteOptions,
    diagnostics: &mut RouteDiagnostics,
) -> Result<Option<(Vec<PathStep>, NodeId)>> {
    let cancel = options.cancel.as_ref();

    if let Some(path) = find_path(graph, corridor, from, to, options.direction_penalty, cancel)? {
        return Ok(Some((path, to)));
    }

    let Some(to_node) = graph.node(to) else {
        return Ok(None);
    };
    let to_coord = to_node.coord;
    for alt_to in index.find_nearest_k(to_coord, FALLBACK_K) {
        if alt_to == from {
            continue;
        }
        if let Some(path) = find_path(graph, corridor, from, alt_to, options.direction_penalty, cancel)? {
            return Ok(Some((path, alt_to)));
        }
    }

    diagnostics.corridor_relaxations += 1;
    let relaxed = CorridorModel::new(
        corridor.dense_samples().to_vec(),
        corridor.width_m() * CORRIDOR_RELAXATION,
    );
    Ok(find_path(graph, &relaxed, from, to, options.direction_penalty, cancel)?.map(|path| (path, to)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, ConnectedComponents, RouterConfig};
    use crate::ingest::Way;
    use crate::shapes::{generate_outline, ShapeType};

    fn grid(n: usize, spacing_m: f64) -> (StreetGraph, ConnectedComponents, Coordinate) {
        let origin = Coordinate::new(48.0, 11.0);
        let mut ways = Vec::new();
        for row in 0..n {
            let coords = (0..n)
                .map(|col| crate::geo::unproject(col as f64 * spacing_m, row as f64 * spacing_m, origin))
                .collect();
            ways.push(Way { coords, classification: None });
        }
        for col in 0..n {
            let coords = (0..n)
                .map(|row| crate::geo::unproject(col as f64 * spacing_m, row as f64 * spacing_m, origin))
                .collect();
            ways.push(Way { coords, classification: None });
        }
        let config = RouterConfig { min_largest_component: 1, ..Default::default() };
        let (graph, components, _diag) = build_graph(&ways, &config).unwrap();
        (graph, components, origin)
    }

    #[test]
    fn assembles_a_closed_square_route() {
        let (graph, components, origin) = grid(10, 20.0);
        let index = SpatialIndex::build(&graph, &components, true);
        let outline = generate_outline(ShapeType::Square, origin, 90.0, 8);
        let corridor = CorridorModel::new(outline.dense.clone(), 40.0);
        let options = RouteOptions {
            direction_penalty: 0.0,
            ..RouteOptions::for_radius(90.0)
        };

        let route = assemble_route(&graph, &index, &corridor, &outline.sparse, &options).unwrap();
        assert!(!route.segments.is_empty());
        assert!(route.total_length_m > 0.0);
        for w in route.segments.windows(2) {
            assert_eq!(w[0].to_node, w[1].from_node);
        }
    }

    #[test]
    fn empty_route_is_an_error() {
        let (graph, components, origin) = grid(3, 1.0);
        let index = SpatialIndex::build(&graph, &components, true);
        // a corridor far from the graph admits nothing
        let far = Coordinate::new(origin.lat + 5.0, origin.lon + 5.0);
        let corridor = CorridorModel::new(vec![far], 1.0);
        let options = RouteOptions::for_radius(10.0);
        let sparse = vec![
            graph.node(NodeId(0)).unwrap().coord,
            graph.node(NodeId(1)).unwrap().coord,
        ];
        let err = assemble_route(&graph, &index, &corridor, &sparse, &options).unwrap_err();
        assert!(matches!(err, RouterError::RouteEmpty));
    }

    #[test]
    fn cancellation_short_circuits_assembly() {
        let (graph, components, origin) = grid(5, 10.0);
        let index = SpatialIndex::build(&graph, &components, true);
        let outline = generate_outline(ShapeType::Circle, origin, 30.0, 6);
        let corridor = CorridorModel::new(outline.dense.clone(), 40.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = RouteOptions::for_radius(30.0).with_cancel(cancel);
        let err = assemble_route(&graph, &index, &corridor, &outline.sparse, &options).unwrap_err();
        assert!(matches!(err, RouterError::Cancelled));
    }
}
