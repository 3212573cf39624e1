//! Virtual course model
//!
//! Routes, the courses built on them, route import, and the physics that
//! turns rider power into progress along a route.

pub mod course;
pub mod import;
pub mod physics;
pub mod route;

pub use course::Course;
pub use import::{import_gpx, import_gpx_file, ImportError, ImportedRoute};
pub use physics::{lbs_to_kg, mps_to_mph, power_from_speed, speed_from_power, PhysicsEngine};
pub use route::{Route, RouteError, RouteSegment, TrackPoint};
