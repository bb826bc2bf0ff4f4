//! Spatial corridor around a shape outline: admissibility gating and tangent
//! bearing lookup for the directional cost term in [`crate::astar`].

use rstar::{primitives::GeomWithData, RTree};

use crate::geo::{bearing, haversine_distance, Coordinate};

type IndexedSample = GeomWithData<[f64; 2], usize>;

/// Precomputed from a shape's dense sample ring: answers "is this point
/// inside the corridor" and "what's the shape's tangent direction near this
/// point" without re-walking the whole ring per query.
pub struct CorridorModel {
    samples: Vec<Coordinate>,
    tree: RTree<IndexedSample>,
    width_m: f64,
}

impl CorridorModel {
    pub fn new(dense_samples: Vec<Coordinate>, corridor_width_m: f64) -> Self {
        let points: Vec<IndexedSample> = dense_samples
            .iter()
            .enumerate()
            .map(|(i, c)| GeomWithData::new([c.lon, c.lat], i))
            .collect();
        Self {
            samples: dense_samples,
            tree: RTree::bulk_load(points),
            width_m: corridor_width_m,
        }
    }

    /// True if `coord` lies within `corridor_width_m` of the nearest dense
    /// sample on the outline.
    pub fn is_admissible(&self, coord: Coordinate) -> bool {
        self.distance_to_outline(coord) <= self.width_m
    }

    /// Distance in meters from `coord` to the nearest point on the outline.
    pub fn distance_to_outline(&self, coord: Coordinate) -> f64 {
        match self.nearest_index(coord) {
            Some(i) => haversine_distance(coord, self.samples[i]),
            None => f64::INFINITY,
        }
    }

    /// Local tangent bearing (radians, east-of-north) of the outline nearest
    /// to `coord`, approximated from the dense samples straddling the
    /// closest one.
    pub fn tangent_bearing(&self, coord: Coordinate) -> f64 {
        let i = match self.nearest_index(coord) {
            Some(i) => i,
            None => return 0.0,
        };
        let n = self.samples.len();
        let prev = self.samples[(i + n - 1) % n];
        let next = self.samples[(i + 1) % n];
        bearing(prev, next)
    }

    /// The dense ring this model was built from, exposed so a caller can
    /// rebuild a relaxed copy (see the A* fallback's corridor-widening tier).
    pub fn dense_samples(&self) -> &[Coordinate] {
        &self.samples
    }

    /// The corridor width this model was constructed with.
    pub fn width_m(&self) -> f64 {
        self.width_m
    }

    fn nearest_index(&self, coord: Coordinate) -> Option<usize> {
        self.tree
            .nearest_neighbor(&[coord.lon, coord.lat])
            .map(|p| p.data)
    }
}
