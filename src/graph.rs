//! Street graph: an undirected weighted graph built from ingested ways, with
//! co-located-endpoint merging and a largest-connected-component filter.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;
use tracing::{info, warn};

use crate::error::{Result, RouterError};
use crate::geo::{haversine_distance, Coordinate};
use crate::ingest::Way;

/// Stable integer id for a merged graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub u64);

/// Stable integer id for a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct EdgeId(pub u64);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub coord: Coordinate,
    pub degree: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Edge {
    pub u: NodeId,
    pub v: NodeId,
    pub polyline: Vec<Coordinate>,
    pub length_m: f64,
    pub classification: Option<String>,
}

/// Build-time tunables for the street graph, separate from per-request
/// [`crate::config::RouteOptions`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RouterConfig {
    /// Endpoints within this distance (meters) are merged into one node.
    pub merge_threshold_m: f64,
    /// Minimum size of the largest connected component; smaller is a fatal
    /// build error (misconfigured or too-small input).
    pub min_largest_component: usize,
    /// GeoJSON feature property read as each way's classification tag.
    pub classification_key: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            merge_threshold_m: 5.0,
            min_largest_component: 100,
            classification_key: crate::ingest::DEFAULT_CLASSIFICATION_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GraphBuildDiagnostics {
    pub ways_seen: usize,
    pub ways_skipped: usize,
    pub nodes: usize,
    pub edges: usize,
    pub largest_component_size: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StreetGraph {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    adjacency: HashMap<NodeId, Vec<(NodeId, EdgeId)>>,
    next_edge_id: u64,
}

impl StreetGraph {
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    pub fn size(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&EdgeId, &Edge)> {
        self.edges.iter()
    }

    pub fn neighbors(&self, id: NodeId) -> &[(NodeId, EdgeId)] {
        self.adjacency
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The other endpoint of `edge` relative to `from`.
    pub fn other_end(&self, edge: &Edge, from: NodeId) -> NodeId {
        if edge.u == from {
            edge.v
        } else {
            edge.u
        }
    }

    /// Polyline for `edge` oriented so it starts at `from`.
    pub fn oriented_polyline(&self, edge: &Edge, from: NodeId) -> Vec<Coordinate> {
        if edge.u == from {
            edge.polyline.clone()
        } else {
            let mut rev = edge.polyline.clone();
            rev.reverse();
            rev
        }
    }
}

/// Disjoint-set partitioning of graph nodes; the router only operates
/// within the largest component.
pub struct ConnectedComponents {
    node_index: HashMap<NodeId, usize>,
    labels: Vec<u32>,
    pub largest_label: u32,
    pub largest_size: usize,
}

impl ConnectedComponents {
    pub fn label_of(&self, id: NodeId) -> Option<u32> {
        self.node_index.get(&id).map(|&i| self.labels[i])
    }

    pub fn in_largest(&self, id: NodeId) -> bool {
        self.label_of(id) == Some(self.largest_label)
    }
}

/// Builds a [`StreetGraph`] and its [`ConnectedComponents`] labeling from a
/// list of ingested ways.
pub fn build_graph(
    ways: &[Way],
    config: &RouterConfig,
) -> Result<(StreetGraph, ConnectedComponents, GraphBuildDiagnostics)> {
    let mut diagnostics = GraphBuildDiagnostics {
        ways_seen: ways.len(),
        ..Default::default()
    };

    let mut merger = EndpointMerger::new(config.merge_threshold_m);
    let mut nodes: HashMap<NodeId, Node> = HashMap::new();
    let mut edges: HashMap<EdgeId, Edge> = HashMap::new();
    let mut adjacency: HashMap<NodeId, Vec<(NodeId, EdgeId)>> = HashMap::new();
    let mut next_edge_id = 0u64;

    for way in ways {
        if way.coords.len() < 2 {
            diagnostics.ways_skipped += 1;
            continue;
        }

        for window in way.coords.windows(2) {
            let (a, b) = (window[0], window[1]);
            let u = merger.canonicalize(a, &mut nodes);
            let v = merger.canonicalize(b, &mut nodes);

            if u == v {
                // self-loop after merging; discarded
                continue;
            }

            let length_m = haversine_distance(a, b);
            if length_m <= 0.0 {
                continue;
            }

            let id = EdgeId(next_edge_id);
            next_edge_id += 1;
            edges.insert(
                id,
                Edge {
                    u,
                    v,
                    polyline: vec![a, b],
                    length_m,
                    classification: way.classification.clone(),
                },
            );
            adjacency.entry(u).or_default().push((v, id));
            adjacency.entry(v).or_default().push((u, id));
        }
    }

    if edges.is_empty() {
        return Err(RouterError::GraphBuildFailed {
            reason: "no edges survived ingestion (empty or entirely malformed input)".to_string(),
        });
    }

    for (&id, neighbors) in &adjacency {
        if let Some(node) = nodes.get_mut(&id) {
            node.degree = neighbors.len();
        }
    }

    diagnostics.nodes = nodes.len();
    diagnostics.edges = edges.len();

    let components = compute_components(&nodes, &edges);
    diagnostics.largest_component_size = components.largest_size;

    info!(
        nodes = diagnostics.nodes,
        edges = diagnostics.edges,
        largest_component = diagnostics.largest_component_size,
        ways_skipped = diagnostics.ways_skipped,
        "built street graph"
    );

    if components.largest_size < config.min_largest_component {
        warn!(
            found = components.largest_size,
            required = config.min_largest_component,
            "largest connected component below minimum"
        );
        return Err(RouterError::EmptyLargestComponent {
            found: components.largest_size,
            required: config.min_largest_component,
        });
    }

    let graph = StreetGraph {
        nodes,
        edges,
        adjacency,
        next_edge_id,
    };

    Ok((graph, components, diagnostics))
}

/// Recomputes connected-component labels for a graph loaded without its
/// original build-time labeling (e.g. a cached graph deserialized on its
/// own). Cheap relative to a full rebuild: no re-ingestion or re-merging.
pub fn recompute_components(graph: &StreetGraph) -> ConnectedComponents {
    let mut node_index = HashMap::with_capacity(graph.order());
    for (i, (&id, _)) in graph.nodes().enumerate() {
        node_index.insert(id, i);
    }

    let mut uf = UnionFind::new(graph.order());
    for (_, edge) in graph.edges() {
        if let (Some(&iu), Some(&iv)) = (node_index.get(&edge.u), node_index.get(&edge.v)) {
            uf.union(iu, iv);
        }
    }

    let labels = uf.into_labeling();
    let mut sizes: HashMap<u32, usize> = HashMap::new();
    for &label in &labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    let (largest_label, largest_size) = sizes
        .into_iter()
        .max_by_key(|&(_, size)| size)
        .unwrap_or((0, 0));

    ConnectedComponents {
        node_index,
        labels,
        largest_label,
        largest_size,
    }
}

fn compute_components(
    nodes: &HashMap<NodeId, Node>,
    edges: &HashMap<EdgeId, Edge>,
) -> ConnectedComponents {
    let mut node_index = HashMap::with_capacity(nodes.len());
    for (i, &id) in nodes.keys().enumerate() {
        node_index.insert(id, i);
    }

    let mut uf = UnionFind::new(nodes.len());
    for edge in edges.values() {
        let (Some(&iu), Some(&iv)) = (node_index.get(&edge.u), node_index.get(&edge.v)) else {
            continue;
        };
        uf.union(iu, iv);
    }

    let labels = uf.into_labeling();
    let mut sizes: HashMap<u32, usize> = HashMap::new();
    for &label in &labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    let (largest_label, largest_size) = sizes
        .into_iter()
        .max_by_key(|&(_, size)| size)
        .unwrap_or((0, 0));

    ConnectedComponents {
        node_index,
        labels,
        largest_label,
        largest_size,
    }
}

/// Snaps coordinates to node ids by hashing into a grid sized to the merge
/// threshold; co-located endpoints collapse onto the same id. Only the final
/// endpoints of each segment are merged — intermediate polyline vertices
/// (there are none at this granularity, since ways are split at every source
/// vertex) are never touched.
struct EndpointMerger {
    threshold_m: f64,
    lat_cell_size_deg: f64,
    cells: HashMap<(i64, i64), Vec<(Coordinate, NodeId)>>,
    next_id: u64,
}

impl EndpointMerger {
    fn new(threshold_m: f64) -> Self {
        // 111_000 m/degree of latitude is constant enough everywhere to size
        // the lat axis directly; distance math itself still uses haversine.
        let lat_cell_size_deg = (threshold_m / 111_000.0).max(1e-7);
        Self {
            threshold_m,
            lat_cell_size_deg,
            cells: HashMap::new(),
            next_id: 0,
        }
    }

    /// Meters-per-degree of longitude shrinks by `cos(lat)` away from the
    /// equator, so the longitude cell must widen in degrees to keep spanning
    /// `threshold_m` — sizing it the same as the latitude cell would make it
    /// narrower than the merge threshold at any non-equatorial latitude.
    fn lon_cell_size_deg(&self, lat_deg: f64) -> f64 {
        let cos_lat = lat_deg.to_radians().cos().abs().max(1e-6);
        (self.threshold_m / (111_000.0 * cos_lat)).max(1e-7)
    }

    fn cell_of(&self, c: Coordinate) -> (i64, i64) {
        (
            (c.lat / self.lat_cell_size_deg).floor() as i64,
            (c.lon / self.lon_cell_size_deg(c.lat)).floor() as i64,
        )
    }

    fn canonicalize(&mut self, c: Coordinate, nodes: &mut HashMap<NodeId, Node>) -> NodeId {
        let (cy, cx) = self.cell_of(c);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cy + dy, cx + dx)) {
                    for &(existing, id) in bucket {
                        if haversine_distance(c, existing) <= self.threshold_m {
                            return id;
                        }
                    }
                }
            }
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;
        nodes.insert(id, Node { coord: c, degree: 0 });
        self.cells.entry((cy, cx)).or_default().push((c, id));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Way;

    fn grid_ways(n: usize, spacing_m: f64) -> Vec<Way> {
        // A spacing_m x spacing_m meter grid of n x n nodes, expressed as
        // horizontal and vertical unit ways, projected from a fixed origin.
        let origin = Coordinate::new(48.0, 11.0);
        let mut ways = Vec::new();
        for row in 0..n {
            let mut coords = Vec::new();
            for col in 0..n {
                coords.push(crate::geo::unproject(
                    col as f64 * spacing_m,
                    row as f64 * spacing_m,
                    origin,
                ));
            }
            ways.push(Way {
                coords,
                classification: None,
            });
        }
        for col in 0..n {
            let mut coords = Vec::new();
            for row in 0..n {
                coords.push(crate::geo::unproject(
                    col as f64 * spacing_m,
                    row as f64 * spacing_m,
                    origin,
                ));
            }
            ways.push(Way {
                coords,
                classification: None,
            });
        }
        ways
    }

    #[test]
    fn builds_symmetric_grid() {
        let ways = grid_ways(10, 1.0);
        let config = RouterConfig {
            min_largest_component: 1,
            ..Default::default()
        };
        let (graph, components, diag) = build_graph(&ways, &config).unwrap();
        assert_eq!(diag.nodes, 100);
        assert_eq!(components.largest_size, 100);

        for (id, _) in graph.nodes() {
            for &(neighbor, edge_id) in graph.neighbors(*id) {
                let edge = graph.edge(edge_id).unwrap();
                let other = graph.other_end(edge, *id);
                assert_eq!(other, neighbor);
                let back = graph
                    .neighbors(neighbor)
                    .iter()
                    .any(|&(n, e)| n == *id && e == edge_id);
                assert!(back, "adjacency must be symmetric");
            }
        }
    }

    #[test]
    fn edge_length_matches_polyline_haversine() {
        let ways = grid_ways(3, 5.0);
        let config = RouterConfig {
            min_largest_component: 1,
            ..Default::default()
        };
        let (graph, _components, _diag) = build_graph(&ways, &config).unwrap();
        for edge in graph.edges.values() {
            let mut total = 0.0;
            for w in edge.polyline.windows(2) {
                total += haversine_distance(w[0], w[1]);
            }
            let rel_err = (total - edge.length_m).abs() / total.max(1e-9);
            assert!(rel_err < 1e-6);
        }
    }

    #[test]
    fn empty_input_is_graph_build_failed() {
        let config = RouterConfig::default();
        let err = build_graph(&[], &config).unwrap_err();
        assert!(matches!(err, RouterError::GraphBuildFailed { .. }));
    }

    #[test]
    fn tiny_component_is_rejected() {
        let ways = grid_ways(3, 1.0);
        let config = RouterConfig {
            min_largest_component: 1000,
            ..Default::default()
        };
        let err = build_graph(&ways, &config).unwrap_err();
        assert!(matches!(err, RouterError::EmptyLargestComponent { .. }));
    }

    #[test]
    fn disconnected_row_splits_components() {
        // A second, unconnected cluster of points far away must not merge
        // into the main grid's component.
        let mut ways = grid_ways(3, 1.0);
        let far_origin = Coordinate::new(10.0, 10.0);
        for col in 0..3 {
            let mut coords = Vec::new();
            for row in 0..3 {
                coords.push(crate::geo::unproject(
                    col as f64,
                    row as f64,
                    far_origin,
                ));
            }
            ways.push(Way {
                coords,
                classification: None,
            });
        }
        let config = RouterConfig {
            min_largest_component: 1,
            ..Default::default()
        };
        let (_graph, components, diag) = build_graph(&ways, &config).unwrap();
        assert_eq!(diag.nodes, 18);
        assert_eq!(components.largest_size, 9);
    }

    #[test]
    fn merges_endpoints_offset_east_west_at_a_real_latitude() {
        // Two ways whose near endpoints sit ~4m apart purely in the east/west
        // direction at lat 48 (not the equator, where a longitude cell sized
        // identically to the latitude cell is narrower than the merge
        // threshold and, at this particular phase, lands the two endpoints
        // two cells apart instead of one).
        let origin = Coordinate::new(48.1351, 11.5820);
        let a_end = crate::geo::unproject(1.35, 0.0, origin);
        let b_end = crate::geo::unproject(5.35, 0.0, origin);

        let ways = vec![
            Way {
                coords: vec![crate::geo::unproject(-50.0, 0.0, origin), a_end],
                classification: None,
            },
            Way {
                coords: vec![b_end, crate::geo::unproject(50.0, 0.0, origin)],
                classification: None,
            },
        ];
        let config = RouterConfig {
            min_largest_component: 1,
            ..Default::default()
        };
        let (graph, _components, diag) = build_graph(&ways, &config).unwrap();
        // 3 endpoints instead of 4: the two ~4m-apart near endpoints merge
        // into a single node under the default 5m threshold.
        assert_eq!(diag.nodes, 3);
        assert_eq!(graph.size(), 2);
    }
}
