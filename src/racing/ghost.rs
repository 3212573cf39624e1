//! Ghost replay of a recorded run.
//!
//! The ghost is positioned by linear interpolation between the recorded
//! checkpoint times, starting from an implicit `(time 0, distance 0)` anchor.

use serde::{Deserialize, Serialize};

use super::checkpoint::CheckpointTime;

/// The reference run a ghost replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRun {
    pub runner_name: String,
    /// Seconds
    pub total_time: f64,
    pub checkpoint_times: Vec<CheckpointTime>,
}

/// Checkpoint time as found in stored records.
///
/// Older records have no `distance`; they carry the route fraction under
/// `mile` instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredCheckpointTime {
    #[serde(default)]
    pub percent: Option<f64>,
    pub time: f64,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub mile: Option<f64>,
}

/// Record run as found in storage, before migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecordRun {
    pub runner_name: String,
    pub total_time: f64,
    #[serde(default)]
    pub checkpoint_times: Vec<StoredCheckpointTime>,
}

impl StoredRecordRun {
    /// Fill in missing distances as `fraction × total_distance`.
    pub fn migrate(self, total_distance: f64) -> RecordRun {
        let checkpoint_times = self
            .checkpoint_times
            .into_iter()
            .map(|cp| {
                let fraction = cp.percent.or(cp.mile);
                let distance = cp
                    .distance
                    .or_else(|| fraction.map(|f| f * total_distance))
                    .unwrap_or(0.0);
                let percent = fraction.unwrap_or_else(|| {
                    if total_distance > 0.0 {
                        distance / total_distance
                    } else {
                        0.0
                    }
                });

                CheckpointTime {
                    percent,
                    time: cp.time,
                    distance,
                }
            })
            .collect();

        RecordRun {
            runner_name: self.runner_name,
            total_time: self.total_time,
            checkpoint_times,
        }
    }
}

/// Where the ghost is at a moment in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostPosition {
    /// Miles from lap start
    pub distance: f64,
    pub finished: bool,
}

/// Interpolating replay of a [`RecordRun`].
#[derive(Debug, Clone)]
pub struct Ghost {
    runner_name: String,
    total_distance: f64,
    points: Vec<CheckpointTime>,
}

impl Ghost {
    /// Build a ghost over a route of `total_distance` miles.
    ///
    /// When the record stops short of the finish, its total time is added as
    /// the finish point so the ghost keeps moving after the last checkpoint.
    pub fn new(record: &RecordRun, total_distance: f64) -> Self {
        let mut points = Vec::with_capacity(record.checkpoint_times.len() + 2);
        points.push(CheckpointTime {
            percent: 0.0,
            time: 0.0,
            distance: 0.0,
        });

        let mut recorded: Vec<CheckpointTime> = record
            .checkpoint_times
            .iter()
            .copied()
            .filter(|cp| cp.time.is_finite() && cp.distance.is_finite())
            .collect();
        recorded.sort_by(|a, b| a.time.total_cmp(&b.time));
        points.extend(recorded);

        let last = points[points.len() - 1];
        if last.distance < total_distance && record.total_time > last.time {
            points.push(CheckpointTime {
                percent: 1.0,
                time: record.total_time,
                distance: total_distance,
            });
        }

        Self {
            runner_name: record.runner_name.clone(),
            total_distance,
            points,
        }
    }

    pub fn runner_name(&self) -> &str {
        &self.runner_name
    }

    /// Time of the last known point.
    pub fn finish_time(&self) -> f64 {
        self.points.last().map(|p| p.time).unwrap_or(0.0)
    }

    fn bracket(&self, elapsed: f64) -> Option<(CheckpointTime, CheckpointTime)> {
        // First point strictly after `elapsed`
        let next = self.points.partition_point(|p| p.time <= elapsed);
        if next == 0 || next >= self.points.len() {
            return None;
        }
        Some((self.points[next - 1], self.points[next]))
    }

    /// Ghost position after `elapsed` seconds.
    pub fn position_at(&self, elapsed: f64) -> GhostPosition {
        match self.bracket(elapsed.max(0.0)) {
            Some((prev, next)) => {
                let duration = next.time - prev.time;
                let distance = if duration > 0.0 {
                    prev.distance + (elapsed - prev.time) / duration * (next.distance - prev.distance)
                } else {
                    prev.distance
                };
                GhostPosition {
                    distance: distance.clamp(0.0, self.total_distance),
                    finished: false,
                }
            }
            None => GhostPosition {
                distance: self.total_distance,
                finished: true,
            },
        }
    }

    /// Average ghost speed over the segment it is on at `elapsed`, in mph.
    pub fn segment_speed_mph(&self, elapsed: f64) -> Option<f64> {
        let (prev, next) = self.bracket(elapsed.max(0.0))?;
        let duration = next.time - prev.time;
        if duration <= 0.0 {
            return None;
        }
        Some((next.distance - prev.distance) / duration * 3600.0)
    }
}
