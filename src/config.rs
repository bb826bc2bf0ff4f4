//! Per-request and per-process configuration, plus the cooperative
//! cancellation primitive shared between them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap, cloneable flag checked at A* pop boundaries and between waypoint
/// pairs. Tripping it from any clone is visible to all others.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-request tunables for [`crate::router::route`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RouteOptions {
    pub corridor_width_m: f64,
    pub direction_penalty: f64,
    pub waypoint_count: usize,
    pub close_loop: bool,
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl RouteOptions {
    /// Defaults documented in the router's external interface: corridor
    /// width 20% of `radius_m`, direction penalty 0.6, 40 waypoints, a
    /// closed loop.
    pub fn for_radius(radius_m: f64) -> Self {
        Self {
            corridor_width_m: radius_m * 0.2,
            direction_penalty: 0.6,
            waypoint_count: 40,
            close_loop: true,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_documented_ratios() {
        let opts = RouteOptions::for_radius(1000.0);
        assert_eq!(opts.corridor_width_m, 200.0);
        assert_eq!(opts.direction_penalty, 0.6);
        assert_eq!(opts.waypoint_count, 40);
        assert!(opts.close_loop);
    }

    #[test]
    fn cancel_token_is_visible_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
