//! Courses: a named route with its checkpoints.

use crate::racing::checkpoint::{evenly_spaced, Checkpoint};
use crate::world::route::Route;

/// Checkpoints a course gets unless told otherwise.
pub const DEFAULT_CHECKPOINT_COUNT: usize = 1;

/// A route prepared for racing
#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub route: Route,
    pub checkpoints: Vec<Checkpoint>,
}

impl Course {
    /// Course with a single checkpoint at the midpoint.
    pub fn new(id: impl Into<String>, name: impl Into<String>, route: Route) -> Self {
        Self::with_checkpoint_count(id, name, route, DEFAULT_CHECKPOINT_COUNT)
    }

    /// Course with `count` evenly spaced checkpoints.
    pub fn with_checkpoint_count(
        id: impl Into<String>,
        name: impl Into<String>,
        route: Route,
        count: usize,
    ) -> Self {
        let checkpoints = evenly_spaced(route.total_distance(), count);
        Self {
            id: id.into(),
            name: name.into(),
            route,
            checkpoints,
        }
    }

    /// Total distance in miles
    pub fn total_distance(&self) -> f64 {
        self.route.total_distance()
    }
}
