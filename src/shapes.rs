//! Parametric shape outlines. Each [`ShapeType`] traces a closed curve in a
//! unit frame via [`Shape::point_at`]; the waypoint generator scales,
//! rotates and projects that curve into lat/lon around a center point.

use std::f64::consts::TAU;

use crate::geo::Coordinate;

/// A closed curve parameterized by `t` in `[0, 1)`, in a unit frame centered
/// on the origin with `x` east and `y` north. `point_at(0.0)` and the limit
/// as `t -> 1.0` must coincide (the curve is a loop).
pub trait Shape {
    fn point_at(&self, t: f64) -> (f64, f64);

    /// Ratio applied to the caller-supplied target radius to convert it into
    /// this shape's unit-frame scale factor. Shapes whose natural extent
    /// isn't a unit circle (the heart, mainly) override this so that
    /// "radius" still means "roughly half the shape's bounding span".
    fn radius_ratio(&self) -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ShapeType {
    Heart,
    Circle,
    Star,
    Square,
}

impl ShapeType {
    fn as_shape(self) -> Box<dyn Shape> {
        match self {
            ShapeType::Heart => Box::new(Heart),
            ShapeType::Circle => Box::new(Circle),
            ShapeType::Star => Box::new(Star::default()),
            ShapeType::Square => Box::new(Square),
        }
    }
}

struct Circle;

impl Shape for Circle {
    fn point_at(&self, t: f64) -> (f64, f64) {
        let theta = t * TAU;
        (theta.sin(), theta.cos())
    }
}

struct Square;

impl Shape for Square {
    fn point_at(&self, t: f64) -> (f64, f64) {
        // Walk the perimeter of a unit square (corners at +-1) at constant
        // arc-length speed, starting at (-1,-1) and going
        // (-1,-1) -> (1,-1) -> (1,1) -> (-1,1) -> (-1,-1).
        let perimeter_t = t.rem_euclid(1.0);
        let side = (perimeter_t * 4.0).floor() as i32;
        let frac = perimeter_t * 4.0 - side as f64;
        let (x, y) = match side {
            0 => (-1.0 + 2.0 * frac, -1.0),
            1 => (1.0, -1.0 + 2.0 * frac),
            2 => (1.0 - 2.0 * frac, 1.0),
            _ => (-1.0, 1.0 - 2.0 * frac),
        };
        (x, y)
    }
}

/// Five-pointed star traced as alternating outer/inner vertices with linear
/// interpolation between them, outer radius 1.0 and inner radius `ratio`.
struct Star {
    inner_ratio: f64,
}

impl Default for Star {
    fn default() -> Self {
        Self { inner_ratio: 0.4 }
    }
}

impl Shape for Star {
    fn point_at(&self, t: f64) -> (f64, f64) {
        let points = 5;
        let segment = (t * (points * 2) as f64).rem_euclid((points * 2) as f64);
        let idx = segment.floor() as i32;
        let frac = segment - idx as f64;

        let vertex_angle = |i: i32| -> f64 { std::f64::consts::FRAC_PI_2 - (i as f64) * std::f64::consts::PI / points as f64 };
        let radius_for = |i: i32| -> f64 {
            if i % 2 == 0 {
                1.0
            } else {
                self.inner_ratio
            }
        };

        let a0 = vertex_angle(idx);
        let r0 = radius_for(idx);
        let a1 = vertex_angle(idx + 1);
        let r1 = radius_for(idx + 1);

        let x0 = r0 * a0.cos();
        let y0 = r0 * a0.sin();
        let x1 = r1 * a1.cos();
        let y1 = r1 * a1.sin();

        (x0 + (x1 - x0) * frac, y0 + (y1 - y0) * frac)
    }
}

/// Classic cardioid-like heart curve, rotated 90 degrees so the cusp points
/// down (the conventional "heart" orientation) and normalized to a unit
/// vertical extent.
struct Heart;

impl Shape for Heart {
    fn point_at(&self, t: f64) -> (f64, f64) {
        let theta = t * TAU;
        let x = 16.0 * theta.sin().powi(3);
        let y = 13.0 * theta.cos() - 5.0 * (2.0 * theta).cos() - 2.0 * (3.0 * theta).cos()
            - (4.0 * theta).cos();
        // Raw curve spans roughly [-16, 16] x [-17, 12.5]; normalize by the
        // larger half-extent so "radius" means "half the shape's height".
        (x / 17.0, y / 17.0)
    }

    fn radius_ratio(&self) -> f64 {
        1.0
    }
}

/// A shape outline projected into lat/lon: a dense ring for corridor
/// membership and tangent lookups, and a sparse ring for A* waypoints.
pub struct ShapeOutline {
    pub dense: Vec<Coordinate>,
    pub sparse: Vec<Coordinate>,
}

const DENSE_SAMPLES: usize = 200;

/// Traces `shape_type` around `center`, scaled so its half-extent is
/// `radius_m`, and returns both a dense sampling (for the corridor model)
/// and a sparse one of `waypoint_count` points (for A* waypoints). Both
/// sequences start at t=0 and are explicitly closed: the last point repeats
/// the first exactly, rather than leaving the loop implicit.
pub fn generate_outline(
    shape_type: ShapeType,
    center: Coordinate,
    radius_m: f64,
    waypoint_count: usize,
) -> ShapeOutline {
    let shape = shape_type.as_shape();
    let scale = radius_m * shape.radius_ratio();

    let dense = (0..=DENSE_SAMPLES)
        .map(|i| sample(shape.as_ref(), i as f64 / DENSE_SAMPLES as f64, scale, center))
        .collect();

    let waypoint_count = waypoint_count.max(3);
    let sparse = (0..=waypoint_count)
        .map(|i| sample(shape.as_ref(), i as f64 / waypoint_count as f64, scale, center))
        .collect();

    ShapeOutline { dense, sparse }
}

fn sample(shape: &dyn Shape, t: f64, scale: f64, center: Coordinate) -> Coordinate {
    let (x, y) = shape.point_at(t);
    crate::geo::unproject(x * scale, y * scale, center)
}

/// Caller-side convenience: turns a target loop distance into the radius to
/// pass to [`generate_outline`], using a per-shape empirical ratio between a
/// shape's half-extent and the on-street distance a loop around it tends to
/// cover. Not used internally by the router itself.
pub fn radius_for_distance(shape_type: ShapeType, target_distance_km: f64) -> f64 {
    let (ratio, min_radius) = match shape_type {
        ShapeType::Circle => (6.5, 400.0),
        ShapeType::Heart => (8.2, 800.0),
        ShapeType::Star => (7.0, 600.0),
        ShapeType::Square => (5.5, 400.0),
    };
    (target_distance_km * 1000.0 / ratio).max(min_radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_radial_deviation(points: &[Coordinate], center: Coordinate, radius_m: f64) -> f64 {
        points
            .iter()
            .map(|p| (crate::geo::haversine_distance(*p, center) - radius_m).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn circle_dense_samples_are_equidistant_from_center() {
        let center = Coordinate::new(48.0, 11.0);
        let outline = generate_outline(ShapeType::Circle, center, 500.0, 40);
        let dev = max_radial_deviation(&outline.dense, center, 500.0);
        assert!(dev < 2.0, "circle samples should sit on the radius, dev={}", dev);
    }

    #[test]
    fn all_shapes_close_the_loop() {
        for shape_type in [ShapeType::Heart, ShapeType::Circle, ShapeType::Star, ShapeType::Square] {
            let center = Coordinate::new(48.0, 11.0);
            let outline = generate_outline(shape_type, center, 500.0, 40);
            let first = outline.dense.first().unwrap();
            let last = outline.dense.last().unwrap();
            let gap = crate::geo::haversine_distance(*first, *last);
            // the sequence is explicitly closed: the last sample repeats
            // t=0 exactly, so the gap should be floating-point noise only.
            assert!(gap < 1e-6, "{:?} loop gap too large: {}", shape_type, gap);
        }
    }

    #[test]
    fn sparse_waypoint_count_is_respected() {
        let center = Coordinate::new(48.0, 11.0);
        let outline = generate_outline(ShapeType::Square, center, 300.0, 24);
        // explicitly closed: one more point than requested, repeating the first.
        assert_eq!(outline.sparse.len(), 25);
    }

    #[test]
    fn square_vertices_land_on_the_four_corners_in_order() {
        let center = Coordinate::new(48.0, 11.0);
        let outline = generate_outline(ShapeType::Square, center, 1000.0, 4);
        // (-1,-1) -> (1,-1) -> (1,1) -> (-1,1) -> (-1,-1), plus a closing 5th
        // point that repeats the first corner.
        assert_eq!(outline.sparse.len(), 5);
        assert_eq!(outline.sparse.first(), outline.sparse.last());

        let (east, north): (Vec<f64>, Vec<f64>) = outline
            .sparse
            .iter()
            .map(|c| crate::geo::project(*c, center))
            .unzip();
        let expected_signs = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0)];
        for (i, &(sx, sy)) in expected_signs.iter().enumerate() {
            assert!(east[i].signum() == sx || east[i].abs() < 1e-6);
            assert!(north[i].signum() == sy || north[i].abs() < 1e-6);
        }
    }

    #[test]
    fn radius_for_distance_respects_minimums() {
        let r = radius_for_distance(ShapeType::Circle, 1.0);
        assert_eq!(r, 400.0, "1km target should clamp to the circle minimum");
        let r2 = radius_for_distance(ShapeType::Heart, 10.0);
        assert!((r2 - 10_000.0 / 8.2).abs() < 1e-6);
    }
}
