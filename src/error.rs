//! Typed failure taxonomy for the router library.
//!
//! Library code returns `RouterError`; the CLI binary wraps these in
//! `anyhow::Result` at the process boundary (see `main.rs`).

use thiserror::Error;

/// Everything that can go wrong building a graph or answering a route request.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("graph build failed: {reason}")]
    GraphBuildFailed { reason: String },

    #[error(
        "largest connected component has {found} nodes, below the minimum of {required}"
    )]
    EmptyLargestComponent { found: usize, required: usize },

    #[error("no path between waypoints after all fallbacks (from node {from:?} to node {to:?})")]
    NoPath { from: u64, to: u64 },

    #[error("route has no segments")]
    RouteEmpty,

    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, RouterError>;
