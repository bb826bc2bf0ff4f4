//! Shape-constrained on-street router: fits closed cycling loops to
//! parametric outlines (heart, circle, star, square) over a real street
//! graph.

pub mod assemble;
pub mod astar;
pub mod cli;
pub mod config;
pub mod corridor;
pub mod error;
pub mod geo;
pub mod graph;
pub mod ingest;
pub mod router;
pub mod shapes;
pub mod spatial;

pub use assemble::{Route, RouteDiagnostics, RouteSegment};
pub use config::{CancelToken, RouteOptions};
pub use corridor::CorridorModel;
pub use error::{Result, RouterError};
pub use geo::Coordinate;
pub use graph::{EdgeId, GraphBuildDiagnostics, NodeId, RouterConfig, StreetGraph};
pub use ingest::{IngestDiagnostics, Way};
pub use router::{route, RouterHandle};
pub use shapes::{radius_for_distance, ShapeType};
pub use spatial::SpatialIndex;
