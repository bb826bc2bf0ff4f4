//! R-tree spatial index over graph nodes: nearest-node, nearest-k and
//! radius queries, with an optional filter to the largest connected
//! component.

use rstar::{primitives::GeomWithData, RTree};

use crate::geo::{haversine_distance, Coordinate};
use crate::graph::{ConnectedComponents, NodeId, StreetGraph};

type IndexedNode = GeomWithData<[f64; 2], NodeId>;

/// Read-only, thread-safe after construction.
pub struct SpatialIndex {
    tree: RTree<IndexedNode>,
}

impl SpatialIndex {
    /// Builds an index over `graph`'s nodes. When `filter_to_largest_component`
    /// is set, only nodes in `components`'s largest component are indexed.
    pub fn build(
        graph: &StreetGraph,
        components: &ConnectedComponents,
        filter_to_largest_component: bool,
    ) -> Self {
        let points: Vec<IndexedNode> = graph
            .nodes()
            .filter(|(&id, _)| !filter_to_largest_component || components.in_largest(id))
            .map(|(&id, node)| GeomWithData::new([node.coord.lon, node.coord.lat], id))
            .collect();

        Self {
            tree: RTree::bulk_load(points),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Single nearest node to `coord`, or `None` if the index is empty.
    pub fn find_nearest(&self, coord: Coordinate) -> Option<NodeId> {
        self.tree
            .nearest_neighbor(&[coord.lon, coord.lat])
            .map(|p| p.data)
    }

    /// Up to `k` nearest nodes to `coord`, nearest first.
    pub fn find_nearest_k(&self, coord: Coordinate, k: usize) -> Vec<NodeId> {
        self.tree
            .nearest_neighbor_iter(&[coord.lon, coord.lat])
            .take(k)
            .map(|p| p.data)
            .collect()
    }

    /// All nodes within `radius_m` meters of `coord`. The R-tree itself
    /// indexes in degrees, so candidates are pulled from a widened envelope
    /// and then filtered by true haversine distance.
    pub fn find_within_radius(&self, coord: Coordinate, radius_m: f64) -> Vec<NodeId> {
        // ~1 degree latitude is ~111km; pad generously since this is only a
        // coarse pre-filter before the exact haversine check below.
        let pad_deg = (radius_m / 75_000.0).max(1e-6);
        let envelope = rstar::AABB::from_corners(
            [coord.lon - pad_deg, coord.lat - pad_deg],
            [coord.lon + pad_deg, coord.lat + pad_deg],
        );
        self.tree
            .locate_in_envelope(&envelope)
            .filter(|p| {
                let candidate = Coordinate::new(p.geom()[1], p.geom()[0]);
                haversine_distance(coord, candidate) <= radius_m
            })
            .map(|p| p.data)
            .collect()
    }
}
