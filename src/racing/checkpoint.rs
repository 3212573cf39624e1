//! Course checkpoints and in-order crossing.

use serde::{Deserialize, Serialize};

/// A fixed distance marker along a course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Position as a fraction of the route, 0..=1
    pub percent: f64,
    /// Absolute position in miles
    pub distance: f64,
    #[serde(default)]
    pub crossed: bool,
}

impl Checkpoint {
    pub fn at_percent(percent: f64, total_distance: f64) -> Self {
        Self {
            percent,
            distance: percent * total_distance,
            crossed: false,
        }
    }
}

/// `count` checkpoints spread evenly between start and finish.
///
/// One checkpoint lands on the midpoint.
pub fn evenly_spaced(total_distance: f64, count: usize) -> Vec<Checkpoint> {
    (1..=count)
        .map(|i| Checkpoint::at_percent(i as f64 / (count + 1) as f64, total_distance))
        .collect()
}

/// Time at which a checkpoint was reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointTime {
    pub percent: f64,
    /// Seconds since lap start
    pub time: f64,
    /// Miles from lap start
    pub distance: f64,
}

/// Marks checkpoints crossed strictly in order and records their times.
#[derive(Debug, Clone)]
pub struct CheckpointTracker {
    checkpoints: Vec<Checkpoint>,
    next_index: usize,
    times: Vec<CheckpointTime>,
}

impl CheckpointTracker {
    pub fn new(mut checkpoints: Vec<Checkpoint>) -> Self {
        checkpoints.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        for cp in &mut checkpoints {
            cp.crossed = false;
        }

        Self {
            checkpoints,
            next_index: 0,
            times: Vec::new(),
        }
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn times(&self) -> &[CheckpointTime] {
        &self.times
    }

    /// Cross every pending checkpoint at or behind `distance`.
    ///
    /// Returns how many were crossed by this call.
    pub fn advance(&mut self, distance: f64, elapsed: f64) -> usize {
        let mut crossed = 0;

        while let Some(cp) = self.checkpoints.get_mut(self.next_index) {
            if distance < cp.distance {
                break;
            }

            cp.crossed = true;
            self.times.push(CheckpointTime {
                percent: cp.percent,
                time: elapsed,
                distance: cp.distance,
            });
            tracing::debug!(
                "Checkpoint {} ({:.0}%) crossed at {:.1}s",
                self.next_index,
                cp.percent * 100.0,
                elapsed
            );

            self.next_index += 1;
            crossed += 1;
        }

        crossed
    }

    /// Clear crossings for a new lap, returning the times recorded so far.
    pub fn reset(&mut self) -> Vec<CheckpointTime> {
        for cp in &mut self.checkpoints {
            cp.crossed = false;
        }
        self.next_index = 0;
        std::mem::take(&mut self.times)
    }
}
