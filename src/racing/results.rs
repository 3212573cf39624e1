//! Race results, record comparison and pace scoring.

use serde::{Deserialize, Serialize};

use super::checkpoint::CheckpointTime;
use super::ghost::RecordRun;

/// Points per second for riding exactly on the ghost's pace.
pub const PACE_POINTS_PER_SECOND: f64 = 10.0;

/// One lap of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapResult {
    pub lap_number: u32,
    /// Seconds from lap start to lap end (or to session end if incomplete)
    pub lap_time: f64,
    pub checkpoint_times: Vec<CheckpointTime>,
    pub completed: bool,
}

/// Everything a finished session hands to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSubmission {
    pub runner_name: String,
    /// Seconds from race start to rider finish
    pub total_time: f64,
    pub laps: Vec<LapResult>,
}

impl RunSubmission {
    /// Fastest lap that was ridden to the end; partial laps never qualify.
    pub fn fastest_completed_lap(&self) -> Option<&LapResult> {
        self.laps
            .iter()
            .filter(|lap| lap.completed && lap.lap_time.is_finite())
            .min_by(|a, b| a.lap_time.total_cmp(&b.lap_time))
    }

    /// The record candidate built from the fastest completed lap.
    pub fn record_candidate(&self) -> Option<RecordRun> {
        self.fastest_completed_lap().map(|lap| RecordRun {
            runner_name: self.runner_name.clone(),
            total_time: lap.lap_time,
            checkpoint_times: lap.checkpoint_times.clone(),
        })
    }
}

/// A run beats the record only when strictly faster; ties keep the holder.
pub fn is_new_record(candidate_time: f64, current: Option<&RecordRun>) -> bool {
    match current {
        Some(record) => candidate_time < record.total_time,
        None => true,
    }
}

/// High score entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScore {
    pub name: String,
    pub points: u32,
}

/// Points for holding the power needed to match the ghost.
#[derive(Debug, Clone, Default)]
pub struct PaceScore {
    points: f64,
}

impl PaceScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> f64 {
        self.points
    }

    /// How close `power` is to `required`, from 0 (far off) to 1 (exact).
    pub fn closeness(power: f64, required: f64) -> f64 {
        let scale = required.max(1.0);
        (1.0 - (power - required).abs() / scale).clamp(0.0, 1.0)
    }

    /// Accrue points for `dt` seconds at the given power.
    pub fn accrue(&mut self, power: f64, required: f64, dt: f64) -> f64 {
        let gained = PACE_POINTS_PER_SECOND * Self::closeness(power, required) * dt;
        self.points += gained;
        gained
    }

    /// Final score, `None` when nothing was earned.
    pub fn to_high_score(&self, name: &str) -> Option<HighScore> {
        let points = self.points.round();
        if points > 0.0 {
            Some(HighScore {
                name: name.to_string(),
                points: points.min(u32::MAX as f64) as u32,
            })
        } else {
            None
        }
    }
}
