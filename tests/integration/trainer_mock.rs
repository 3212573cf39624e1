//! Mock trainer control point and course fixtures.

use futures::future::BoxFuture;
use kickr_racer::sensors::trainer::ControlPoint;
use kickr_racer::sensors::types::TransmitError;
use kickr_racer::world::course::Course;
use kickr_racer::world::route::{Route, RouteSegment};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Control point that records every write, optionally rejecting them.
#[derive(Default)]
pub struct MockControlPoint {
    pub writes: Mutex<Vec<Vec<u8>>>,
    pub fail: AtomicBool,
}

impl MockControlPoint {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    /// Writes whose first byte is `opcode`.
    pub fn writes_with_opcode(&self, opcode: u8) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|w| w.first() == Some(&opcode))
            .collect()
    }
}

impl ControlPoint for MockControlPoint {
    fn write<'a>(&'a self, command: &'a [u8]) -> BoxFuture<'a, Result<(), TransmitError>> {
        Box::pin(async move {
            self.writes.lock().unwrap().push(command.to_vec());
            if self.fail.load(Ordering::SeqCst) {
                Err(TransmitError::WriteFailed("mock rejected write".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

/// Single-gradient route of `miles` with its terminal segment.
pub fn steady_route(miles: f64, gradient: f64) -> Route {
    Route::new(vec![
        RouteSegment {
            start_distance: 0.0,
            segment_length: miles,
            gradient,
            elevation: 50.0,
        },
        RouteSegment {
            start_distance: miles,
            segment_length: 0.0,
            gradient: 0.0,
            elevation: 50.0 + miles * 1609.344 * gradient / 100.0,
        },
    ])
    .unwrap()
}

pub fn steady_course(id: &str, miles: f64, gradient: f64) -> Course {
    Course::new(id, format!("{} course", id), steady_route(miles, gradient))
}
