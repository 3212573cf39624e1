//! Route model
//!
//! A route is an ordered run of segments measured in miles. Each segment
//! starts where the previous one ends, and the last one is a zero-length
//! terminal marker sitting at the finish.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const KM_TO_MILES: f64 = 0.621371;

/// Slack allowed when checking that segments join end to start.
const CONTINUITY_TOLERANCE_MILES: f64 = 1e-6;

/// One stretch of road with a constant gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSegment {
    /// Distance from route start in miles
    pub start_distance: f64,
    /// Length of this segment in miles
    #[serde(alias = "distance")]
    pub segment_length: f64,
    /// Gradient as a percentage
    pub gradient: f64,
    /// Elevation at segment start in meters
    #[serde(alias = "ele")]
    pub elevation: f64,
}

/// A track point with elevation, as produced by a route file parser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
}

/// Errors building a route
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouteError {
    #[error("Route has no segments")]
    Empty,

    #[error("Segment {index} does not start where the previous one ends")]
    NonMonotonic { index: usize },

    #[error("Segment {index} has an invalid length or gradient")]
    InvalidSegment { index: usize },

    #[error("Route starts at {start} miles instead of 0")]
    OffsetStart { start: f64 },
}

/// Validated, immutable route.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    segments: Vec<RouteSegment>,
    total_distance: f64,
}

impl Route {
    /// Build a route, checking that segments are contiguous and well-formed.
    pub fn new(segments: Vec<RouteSegment>) -> Result<Self, RouteError> {
        let first = segments.first().ok_or(RouteError::Empty)?;
        // Lookups cover 0..=total
        if !(first.start_distance.abs() <= CONTINUITY_TOLERANCE_MILES) {
            return Err(RouteError::OffsetStart {
                start: first.start_distance,
            });
        }

        for (index, segment) in segments.iter().enumerate() {
            if !segment.segment_length.is_finite()
                || segment.segment_length < 0.0
                || !segment.gradient.is_finite()
            {
                return Err(RouteError::InvalidSegment { index });
            }
        }

        for (index, pair) in segments.windows(2).enumerate() {
            let expected = pair[0].start_distance + pair[0].segment_length;
            if (pair[1].start_distance - expected).abs() > CONTINUITY_TOLERANCE_MILES {
                return Err(RouteError::NonMonotonic { index: index + 1 });
            }
        }

        let total_distance = segments
            .last()
            .map(|s| s.start_distance + s.segment_length)
            .unwrap_or(0.0);

        Ok(Self {
            segments,
            total_distance,
        })
    }

    /// Segment a sequence of track points by great-circle distance.
    ///
    /// Gradient is elevation change over horizontal distance, zero for
    /// coincident points. A zero-length terminal segment closes the route.
    pub fn from_track_points(points: &[TrackPoint]) -> Result<Self, RouteError> {
        let last = points.last().ok_or(RouteError::Empty)?;

        let mut segments = Vec::with_capacity(points.len());
        let mut total_km = 0.0;

        for pair in points.windows(2) {
            let (p1, p2) = (pair[0], pair[1]);
            let distance_km = haversine_km(p1.latitude, p1.longitude, p2.latitude, p2.longitude);
            let gradient = if distance_km > 0.0 {
                (p2.elevation_m - p1.elevation_m) / (distance_km * 1000.0) * 100.0
            } else {
                0.0
            };

            segments.push(RouteSegment {
                start_distance: total_km * KM_TO_MILES,
                segment_length: distance_km * KM_TO_MILES,
                gradient: if gradient.is_finite() { gradient } else { 0.0 },
                elevation: p1.elevation_m,
            });
            total_km += distance_km;
        }

        segments.push(RouteSegment {
            start_distance: total_km * KM_TO_MILES,
            segment_length: 0.0,
            gradient: 0.0,
            elevation: last.elevation_m,
        });

        // Rounding in the running sum can drift past the continuity tolerance
        // on very long tracks, so chain starts from lengths.
        for i in 1..segments.len() {
            segments[i].start_distance =
                segments[i - 1].start_distance + segments[i - 1].segment_length;
        }

        Self::new(segments)
    }

    /// Total route distance in miles
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    fn segment_index_at(&self, distance: f64) -> Option<usize> {
        if !(0.0..=self.total_distance).contains(&distance) {
            return None;
        }

        // Last segment starting at or before the distance; zero-length
        // segments are skipped over by whichever shares their start.
        self.segments
            .partition_point(|s| s.start_distance <= distance)
            .checked_sub(1)
    }

    /// Segment containing `distance`, or `None` outside the route.
    pub fn segment_at(&self, distance: f64) -> Option<&RouteSegment> {
        self.segment_index_at(distance)
            .and_then(|idx| self.segments.get(idx))
    }

    /// Gradient at a distance, `None` past the route extent.
    pub fn gradient_at(&self, distance: f64) -> Option<f64> {
        self.segment_at(distance).map(|s| s.gradient)
    }

    /// Elevation at a distance, interpolated along the segment.
    pub fn elevation_at(&self, distance: f64) -> Option<f64> {
        let idx = self.segment_index_at(distance)?;
        let segment = self.segments.get(idx)?;

        match self.segments.get(idx + 1) {
            Some(next) if segment.segment_length > 0.0 => {
                let t = (distance - segment.start_distance) / segment.segment_length;
                Some(segment.elevation + (next.elevation - segment.elevation) * t)
            }
            _ => Some(segment.elevation),
        }
    }
}

/// Great-circle distance in kilometres (haversine formula)
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
