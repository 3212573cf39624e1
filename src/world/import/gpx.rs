//! GPX file parser for course import.

use super::ImportError;
use crate::world::route::TrackPoint;

/// Track points and name read from a GPX document
#[derive(Debug, Clone)]
pub struct ParsedGpx {
    pub name: Option<String>,
    pub points: Vec<TrackPoint>,
}

/// Parse GPX content into elevation-bearing track points.
///
/// Points without an `<ele>` element are skipped. A document whose track
/// points all lack elevation is rejected.
pub fn parse_gpx(content: &[u8]) -> Result<ParsedGpx, ImportError> {
    let gpx_data: gpx::Gpx = gpx::read(content)
        .map_err(|e| ImportError::ParseError(format!("GPX parse error: {}", e)))?;

    let mut points = Vec::new();
    let mut seen = 0usize;

    for track in &gpx_data.tracks {
        for segment in &track.segments {
            for point in &segment.points {
                seen += 1;
                if let Some(elevation) = point.elevation {
                    points.push(TrackPoint {
                        latitude: point.point().y(),
                        longitude: point.point().x(),
                        elevation_m: elevation,
                    });
                }
            }
        }
    }

    if seen == 0 {
        return Err(ImportError::ParseError(
            "No track points found in GPX file".to_string(),
        ));
    }

    if points.is_empty() {
        return Err(ImportError::NoElevation);
    }

    let skipped = seen - points.len();
    if skipped > 0 {
        tracing::debug!("Skipped {} track points without elevation", skipped);
    }

    let name = gpx_data
        .tracks
        .first()
        .and_then(|t| t.name.clone())
        .or_else(|| gpx_data.metadata.and_then(|m| m.name));

    Ok(ParsedGpx { name, points })
}
