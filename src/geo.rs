//! Pure geometric primitives: great-circle distance/bearing and a local
//! equirectangular projection used anywhere the router needs a metric frame
//! (shape generation, corridor distances, edge bearings).

use geo::{HaversineBearing, HaversineDistance, Point};

/// WGS-84 mean radius in meters, matching `geo`'s own haversine constant.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    fn as_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// Great-circle distance between two coordinates, in meters.
pub fn haversine_distance(p: Coordinate, q: Coordinate) -> f64 {
    p.as_point().haversine_distance(&q.as_point())
}

/// Initial great-circle bearing from `p` to `q`, in radians east-of-north.
pub fn bearing(p: Coordinate, q: Coordinate) -> f64 {
    p.as_point().haversine_bearing(q.as_point()).to_radians()
}

/// Equirectangular projection of `p` into a local metric frame centered on
/// `origin`: (east_m, north_m). Adequate for city-scale corridors; not valid
/// across large distances or near the poles.
pub fn project(p: Coordinate, origin: Coordinate) -> (f64, f64) {
    let lat0 = origin.lat.to_radians();
    let east = (p.lon - origin.lon).to_radians() * EARTH_RADIUS_M * lat0.cos();
    let north = (p.lat - origin.lat).to_radians() * EARTH_RADIUS_M;
    (east, north)
}

/// Inverse of [`project`]: recovers a coordinate from a local metric offset.
pub fn unproject(east_m: f64, north_m: f64, origin: Coordinate) -> Coordinate {
    let lat0 = origin.lat.to_radians();
    let lon = origin.lon + (east_m / (EARTH_RADIUS_M * lat0.cos())).to_degrees();
    let lat = origin.lat + (north_m / EARTH_RADIUS_M).to_degrees();
    Coordinate::new(lat, lon)
}

/// Normalize an angle difference into (-pi, pi].
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let mut d = (a - b) % two_pi;
    if d > std::f64::consts::PI {
        d -= two_pi;
    } else if d <= -std::f64::consts::PI {
        d += two_pi;
    }
    d
}
