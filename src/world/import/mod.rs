//! Course import from GPS track files.
//!
//! Track points are read from a GPX file, points lacking elevation are
//! dropped, and the rest are segmented into a [`Route`].

pub mod gpx;

use crate::world::route::{Route, RouteError, TrackPoint};
use std::path::Path;
use thiserror::Error;

/// Minimum number of elevation-bearing points for a usable route.
pub const MIN_TRACK_POINTS: usize = 2;

/// Errors that can occur during course import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No track points carry elevation data")]
    NoElevation,

    #[error("Need at least {MIN_TRACK_POINTS} track points with elevation, found {count}")]
    TooFewPoints { count: usize },

    #[error("Invalid route: {0}")]
    Route(#[from] RouteError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A route read from a file, with the track name when the file has one.
#[derive(Debug, Clone)]
pub struct ImportedRoute {
    pub name: Option<String>,
    pub route: Route,
}

/// Build a route from GPX content.
pub fn import_gpx(content: &[u8]) -> Result<ImportedRoute, ImportError> {
    let parsed = gpx::parse_gpx(content)?;
    let route = route_from_points(&parsed.points)?;

    tracing::info!(
        "Imported GPX route {:?}: {} points, {:.2} miles",
        parsed.name,
        parsed.points.len(),
        route.total_distance()
    );

    Ok(ImportedRoute {
        name: parsed.name,
        route,
    })
}

/// Read and import a GPX file from disk.
pub fn import_gpx_file(path: &Path) -> Result<ImportedRoute, ImportError> {
    let content = std::fs::read(path)?;
    import_gpx(&content)
}

fn route_from_points(points: &[TrackPoint]) -> Result<Route, ImportError> {
    if points.len() < MIN_TRACK_POINTS {
        return Err(ImportError::TooFewPoints {
            count: points.len(),
        });
    }
    Ok(Route::from_track_points(points)?)
}
