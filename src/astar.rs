//! Constrained A* over a [`StreetGraph`]: corridor-gated, direction-biased
//! shortest path between two nodes.
//!
//! Grounded in the teacher's bidirectional CCH query (`step9/query.rs`),
//! which keys its open set with `priority_queue::PriorityQueue<u32,
//! Reverse<u32>>`; here the priority is `f = g + h` over `f64` costs instead
//! of precomputed integer weights.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use priority_queue::PriorityQueue;

use crate::config::CancelToken;
use crate::corridor::CorridorModel;
use crate::error::{Result, RouterError};
use crate::geo::{angle_diff, bearing, haversine_distance};
use crate::graph::{NodeId, StreetGraph};

/// One traversed edge in a resolved path, in travel direction.
#[derive(Debug, Clone)]
pub struct PathStep {
    pub from: NodeId,
    pub to: NodeId,
    pub edge: crate::graph::EdgeId,
    pub length_m: f64,
}

/// Total cost wrapper with a full order (`f64::total_cmp`), so it can back a
/// priority queue key. Lower cost sorts first via the `Reverse` the caller
/// wraps it in.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Search key combining `f = g + h` with tie-breakers so the result is
/// reproducible regardless of hash-map iteration order: lower `f`, then
/// lower `h` (closer to the goal), then lower node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Priority {
    f: Cost,
    h: Cost,
    node: NodeId,
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that wrapping in `std::cmp::Reverse` yields a min-heap
        // on (f, h, node) through the max-heap PriorityQueue exposes.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Finds a corridor-admissible, direction-biased shortest path from `start`
/// to `goal`. Returns `Ok(None)` if the open set empties before reaching
/// `goal`; checks `cancel` at each pop boundary and returns
/// `Err(RouterError::Cancelled)` immediately if it has been tripped.
pub fn find_path(
    graph: &StreetGraph,
    corridor: &CorridorModel,
    start: NodeId,
    goal: NodeId,
    direction_penalty: f64,
    cancel: Option<&CancelToken>,
) -> Result<Option<Vec<PathStep>>> {
    if start == goal {
        return Ok(Some(Vec::new()));
    }

    let Some(goal_node) = graph.node(goal) else {
        return Ok(None);
    };
    let goal_coord = goal_node.coord;
    let heuristic_scale = (1.0 - direction_penalty).max(0.0);

    let mut open: PriorityQueue<NodeId, Priority> = PriorityQueue::new();
    let mut g_score: HashMap<NodeId, f64> = HashMap::new();
    let mut came_from: HashMap<NodeId, (NodeId, crate::graph::EdgeId, f64)> = HashMap::new();
    let mut closed: HashSet<NodeId> = HashSet::new();

    let Some(start_node) = graph.node(start) else {
        return Ok(None);
    };
    let start_coord = start_node.coord;
    let h0 = haversine_distance(start_coord, goal_coord) * heuristic_scale;
    g_score.insert(start, 0.0);
    open.push(
        start,
        Priority {
            f: Cost(h0),
            h: Cost(h0),
            node: start,
        },
    );

    while let Some((current, _)) = open.pop() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(RouterError::Cancelled);
        }
        if current == goal {
            return Ok(Some(reconstruct(graph, &came_from, start, goal)));
        }
        if closed.contains(&current) {
            continue;
        }
        closed.insert(current);

        let current_g = *g_score.get(&current).unwrap_or(&f64::INFINITY);
        let current_coord = match graph.node(current) {
            Some(n) => n.coord,
            None => continue,
        };

        for &(neighbor, edge_id) in graph.neighbors(current) {
            let edge = match graph.edge(edge_id) {
                Some(e) => e,
                None => continue,
            };
            let neighbor_coord = match graph.node(neighbor) {
                Some(n) => n.coord,
                None => continue,
            };

            if !edge_usable(corridor, current_coord, neighbor_coord) {
                continue;
            }

            let step_cost = directional_cost(
                corridor,
                current_coord,
                neighbor_coord,
                edge.length_m,
                direction_penalty,
            );
            let tentative_g = current_g + step_cost;

            let better = tentative_g < *g_score.get(&neighbor).unwrap_or(&f64::INFINITY);
            if better {
                g_score.insert(neighbor, tentative_g);
                came_from.insert(neighbor, (current, edge_id, step_cost));
                let h = haversine_distance(neighbor_coord, goal_coord) * heuristic_scale;
                let f = tentative_g + h;
                open.push_increase(
                    neighbor,
                    Priority {
                        f: Cost(f),
                        h: Cost(h),
                        node: neighbor,
                    },
                );
            }
        }
    }

    Ok(None)
}

fn edge_usable(
    corridor: &CorridorModel,
    from: crate::geo::Coordinate,
    to: crate::geo::Coordinate,
) -> bool {
    if !corridor.is_admissible(from) || !corridor.is_admissible(to) {
        return false;
    }
    let mid = crate::geo::Coordinate::new((from.lat + to.lat) / 2.0, (from.lon + to.lon) / 2.0);
    corridor.is_admissible(mid)
}

fn directional_cost(
    corridor: &CorridorModel,
    from: crate::geo::Coordinate,
    to: crate::geo::Coordinate,
    length_m: f64,
    direction_penalty: f64,
) -> f64 {
    let mid = crate::geo::Coordinate::new((from.lat + to.lat) / 2.0, (from.lon + to.lon) / 2.0);
    let edge_bearing = bearing(from, to);
    let tangent = corridor.tangent_bearing(mid);
    let theta = angle_diff(edge_bearing, tangent);
    length_m * (1.0 + direction_penalty * (1.0 - theta.cos()))
}

fn reconstruct(
    graph: &StreetGraph,
    came_from: &HashMap<NodeId, (NodeId, crate::graph::EdgeId, f64)>,
    start: NodeId,
    goal: NodeId,
) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut current = goal;
    while current != start {
        let (prev, edge, _cost) = came_from[&current];
        let length_m = graph.edge(edge).map(|e| e.length_m).unwrap_or(0.0);
        steps.push(PathStep {
            from: prev,
            to: current,
            edge,
            length_m,
        });
        current = prev;
    }
    steps.reverse();
    steps
}
