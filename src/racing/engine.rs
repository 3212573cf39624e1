//! Race engine.
//!
//! Owns the rider's progress, the ghost replay and the gradient pushed to
//! the trainer. Everything here is driven by `tick`, which must not be
//! called concurrently; callers serialize ticks by owning the engine.
//!
//! Phases only move forward:
//! `PreRace -> Countdown -> InProgress -> RiderFinishedWaitingGhost -> Complete`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::checkpoint::{Checkpoint, CheckpointTime, CheckpointTracker};
use super::countdown::{Countdown, CountdownEvent};
use super::ghost::{Ghost, RecordRun};
use super::gradient::{apply_difficulty, GradientSmoother, GradientThrottle};
use super::results::{HighScore, LapResult, PaceScore, RunSubmission};
use crate::storage::config::AppConfig;
use crate::world::course::Course;
use crate::world::physics::{PhysicsEngine, MPS_TO_MPH};
use crate::world::route::Route;

/// Below this rider speed the ghost gap is not meaningful.
const MIN_GAP_SPEED_MPH: f64 = 1.0;

/// Race lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RacePhase {
    /// Course loaded, waiting for the rider
    PreRace,
    /// Counting down to the start
    Countdown,
    /// Rider on course
    InProgress,
    /// Rider done, ghost still riding
    RiderFinishedWaitingGhost,
    /// Rider and ghost both done
    Complete,
}

impl RacePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RacePhase::PreRace => "pre_race",
            RacePhase::Countdown => "countdown",
            RacePhase::InProgress => "in_progress",
            RacePhase::RiderFinishedWaitingGhost => "rider_finished_waiting_ghost",
            RacePhase::Complete => "complete",
        }
    }
}

impl std::fmt::Display for RacePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Race errors. Only construction and misuse are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    #[error("Route has no distance to race")]
    EmptyRoute,

    #[error("Cannot {action} while {from}")]
    InvalidTransition {
        from: RacePhase,
        action: &'static str,
    },
}

/// Race tuning.
#[derive(Debug, Clone)]
pub struct RaceConfig {
    pub runner_name: String,
    pub rider_weight_lbs: f64,
    pub laps: u32,
    pub countdown_secs: u32,
    pub smoothing_factor: f64,
    pub gradient_interval_secs: f64,
    pub gradient_deadband: f64,
    pub difficulty: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RaceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            runner_name: config.rider.name.clone(),
            rider_weight_lbs: config.rider.weight_lbs,
            laps: config.race.laps.max(1),
            countdown_secs: config.race.countdown_secs,
            smoothing_factor: config.race.smoothing_factor,
            gradient_interval_secs: config.race.gradient_interval_secs,
            gradient_deadband: config.race.gradient_deadband,
            difficulty: config.race.difficulty,
        }
    }
}

/// Snapshot of the race, mutated only by [`RaceEngine`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceState {
    /// Seconds since the start, frozen once the rider finishes
    pub elapsed_time: f64,
    /// Miles into the current lap
    pub distance_covered: f64,
    pub speed_mph: f64,
    /// Smoothed gradient the physics runs on
    pub current_gradient: f64,
    /// Route gradient after difficulty scaling
    pub target_gradient: f64,
    pub next_checkpoint_index: usize,
    /// Checkpoint times of the current lap
    pub checkpoint_times: Vec<CheckpointTime>,
    /// Ghost miles into the current lap
    pub ghost_distance_covered: f64,
    pub rider_finished: bool,
    pub ghost_finished: bool,
    pub race_finished: bool,
    /// Last known rider power
    pub power_watts: f64,
    /// Current lap, from 1
    pub lap: u32,
    /// Miles across all laps
    pub total_distance_ridden: f64,
    /// Seconds the rider trails the ghost (negative when ahead)
    pub ghost_gap_seconds: f64,
    /// Pace points
    pub points: f64,
}

/// What one tick produced for the caller to act on.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub phase: RacePhase,
    pub countdown: Option<CountdownEvent>,
    /// Averaged gradient due for the trainer
    pub gradient_command: Option<f64>,
    pub lap_completed: Option<LapResult>,
    /// Set on the tick the rider crosses the final finish line
    pub finished: Option<RunSubmission>,
}

impl TickOutcome {
    fn idle(phase: RacePhase) -> Self {
        Self {
            phase,
            countdown: None,
            gradient_command: None,
            lap_completed: None,
            finished: None,
        }
    }
}

/// Race engine state machine.
pub struct RaceEngine {
    config: RaceConfig,
    route: Route,
    physics: PhysicsEngine,
    checkpoints: CheckpointTracker,
    ghost: Option<Ghost>,
    record: Option<RecordRun>,
    phase: RacePhase,
    state: RaceState,
    countdown: Countdown,
    smoother: GradientSmoother,
    throttle: GradientThrottle,
    /// Race clock; keeps running for the ghost after the rider finishes
    clock: f64,
    lap_start: f64,
    laps: Vec<LapResult>,
    pace: PaceScore,
}

impl RaceEngine {
    /// Create an engine for a route, its checkpoints and an optional record to race.
    pub fn new(
        route: Route,
        checkpoints: Vec<Checkpoint>,
        record: Option<RecordRun>,
        config: RaceConfig,
    ) -> Result<Self, RaceError> {
        let total = route.total_distance();
        if !(total > 0.0) {
            return Err(RaceError::EmptyRoute);
        }

        let ghost = record.as_ref().map(|r| Ghost::new(r, total));
        let physics = PhysicsEngine::from_weight_lbs(config.rider_weight_lbs);
        let countdown = Countdown::new(config.countdown_secs);
        let smoother = GradientSmoother::new(config.smoothing_factor);
        let throttle = GradientThrottle::new(config.gradient_interval_secs, config.gradient_deadband);

        Ok(Self {
            route,
            physics,
            checkpoints: CheckpointTracker::new(checkpoints),
            ghost,
            record,
            phase: RacePhase::PreRace,
            state: RaceState {
                lap: 1,
                ..Default::default()
            },
            countdown,
            smoother,
            throttle,
            clock: 0.0,
            lap_start: 0.0,
            laps: Vec::new(),
            pace: PaceScore::new(),
            config,
        })
    }

    /// Create an engine for a stored course.
    pub fn from_course(
        course: &Course,
        record: Option<RecordRun>,
        config: RaceConfig,
    ) -> Result<Self, RaceError> {
        Self::new(course.route.clone(), course.checkpoints.clone(), record, config)
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn state(&self) -> &RaceState {
        &self.state
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        self.checkpoints.checkpoints()
    }

    pub fn record(&self) -> Option<&RecordRun> {
        self.record.as_ref()
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Begin the pre-race countdown.
    pub fn start_countdown(&mut self) -> Result<CountdownEvent, RaceError> {
        if self.phase != RacePhase::PreRace {
            return Err(RaceError::InvalidTransition {
                from: self.phase,
                action: "start countdown",
            });
        }

        self.phase = RacePhase::Countdown;
        tracing::info!(
            "Countdown started ({}s, {} lap(s), {:.2} miles)",
            self.config.countdown_secs,
            self.config.laps,
            self.route.total_distance()
        );
        Ok(self.countdown.start())
    }

    /// Latest rider power. Missing readings never reset it.
    pub fn update_power(&mut self, watts: f64) {
        if watts.is_finite() {
            self.state.power_watts = watts;
        }
    }

    /// The trainer accepted a gradient write.
    pub fn gradient_sent(&mut self, value: f64) {
        self.throttle.confirm_sent(value);
    }

    pub fn last_sent_gradient(&self) -> Option<f64> {
        self.throttle.last_sent()
    }

    /// Pace high score earned so far, if any.
    pub fn high_score(&self) -> Option<HighScore> {
        self.pace.to_high_score(&self.config.runner_name)
    }

    /// Laps closed so far plus the one in progress, marked incomplete.
    pub fn partial_submission(&self) -> RunSubmission {
        let mut laps = self.laps.clone();
        if !self.state.rider_finished && self.phase == RacePhase::InProgress {
            laps.push(LapResult {
                lap_number: self.state.lap,
                lap_time: self.clock - self.lap_start,
                checkpoint_times: self.checkpoints.times().to_vec(),
                completed: false,
            });
        }

        RunSubmission {
            runner_name: self.config.runner_name.clone(),
            total_time: self.state.elapsed_time,
            laps,
        }
    }

    /// Advance the race by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickOutcome {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        match self.phase {
            RacePhase::PreRace | RacePhase::Complete => TickOutcome::idle(self.phase),
            RacePhase::Countdown => self.tick_countdown(dt),
            RacePhase::InProgress => self.tick_racing(dt),
            RacePhase::RiderFinishedWaitingGhost => self.tick_waiting(dt),
        }
    }

    fn tick_countdown(&mut self, dt: f64) -> TickOutcome {
        let event = self.countdown.tick(dt);
        if event == Some(CountdownEvent::RaceStart) {
            self.phase = RacePhase::InProgress;
            tracing::info!("Race started");
        }

        TickOutcome {
            countdown: event,
            ..TickOutcome::idle(self.phase)
        }
    }

    fn tick_racing(&mut self, dt: f64) -> TickOutcome {
        let mut outcome = TickOutcome::idle(self.phase);
        let total = self.route.total_distance();

        // Speed from power on the gradient the rider currently feels
        let power = self.state.power_watts;
        let speed_mps = self
            .physics
            .speed_from_power(power, self.state.current_gradient);
        self.state.speed_mph = speed_mps * MPS_TO_MPH;

        let previous = self.state.distance_covered;
        let advanced = previous + self.state.speed_mph / 3600.0 * dt;
        self.state.distance_covered = advanced.min(total).max(previous);
        self.state.total_distance_ridden += self.state.distance_covered - previous;

        self.state.elapsed_time += dt;
        self.clock += dt;
        let lap_elapsed = self.clock - self.lap_start;

        if self
            .checkpoints
            .advance(self.state.distance_covered, lap_elapsed)
            > 0
        {
            self.state.next_checkpoint_index = self.checkpoints.next_index();
            self.state.checkpoint_times = self.checkpoints.times().to_vec();
        }

        self.update_ghost(lap_elapsed);
        self.accrue_pace(power, lap_elapsed, dt);

        // Past the route end the last target is held
        if let Some(gradient) = self.route.gradient_at(self.state.distance_covered) {
            self.state.target_gradient = apply_difficulty(gradient, self.config.difficulty);
        }
        self.state.current_gradient = self.smoother.update(self.state.target_gradient);
        outcome.gradient_command = self.throttle.push(self.state.current_gradient, dt);

        if self.state.distance_covered >= total {
            self.finish_lap(lap_elapsed, &mut outcome);
        }

        outcome.phase = self.phase;
        outcome
    }

    fn tick_waiting(&mut self, dt: f64) -> TickOutcome {
        self.clock += dt;
        self.update_ghost(self.clock - self.lap_start);

        if self.state.ghost_finished {
            self.complete();
        }

        TickOutcome::idle(self.phase)
    }

    fn update_ghost(&mut self, lap_elapsed: f64) {
        let Some(ghost) = &self.ghost else {
            return;
        };

        let position = ghost.position_at(lap_elapsed);
        self.state.ghost_distance_covered = position.distance;
        self.state.ghost_finished = position.finished;

        if !self.state.rider_finished {
            self.state.ghost_gap_seconds = if self.state.speed_mph > MIN_GAP_SPEED_MPH {
                (position.distance - self.state.distance_covered) / self.state.speed_mph * 3600.0
            } else {
                0.0
            };
        }
    }

    fn accrue_pace(&mut self, power: f64, lap_elapsed: f64, dt: f64) {
        let Some(target_mph) = self
            .ghost
            .as_ref()
            .and_then(|g| g.segment_speed_mph(lap_elapsed))
        else {
            return;
        };

        let required = self
            .physics
            .power_required(target_mph / MPS_TO_MPH, self.state.current_gradient);
        self.pace.accrue(power, required.max(0.0), dt);
        self.state.points = self.pace.points();
    }

    fn finish_lap(&mut self, lap_elapsed: f64, outcome: &mut TickOutcome) {
        let lap = LapResult {
            lap_number: self.state.lap,
            lap_time: lap_elapsed,
            checkpoint_times: self.checkpoints.reset(),
            completed: true,
        };
        self.laps.push(lap.clone());
        outcome.lap_completed = Some(lap);

        if self.state.lap < self.config.laps {
            tracing::info!(
                "Lap {} of {} complete in {:.1}s",
                self.state.lap,
                self.config.laps,
                lap_elapsed
            );
            self.state.lap += 1;
            self.lap_start = self.clock;
            self.state.distance_covered = 0.0;
            self.state.next_checkpoint_index = 0;
            self.state.checkpoint_times.clear();
            self.state.ghost_distance_covered = 0.0;
            self.state.ghost_finished = false;
            return;
        }

        self.state.rider_finished = true;
        self.state.ghost_gap_seconds = 0.0;
        tracing::info!(
            "Rider finished in {:.1}s over {} lap(s)",
            self.state.elapsed_time,
            self.laps.len()
        );

        outcome.finished = Some(RunSubmission {
            runner_name: self.config.runner_name.clone(),
            total_time: self.state.elapsed_time,
            laps: self.laps.clone(),
        });

        if self.ghost.is_none() || self.state.ghost_finished {
            self.complete();
        } else {
            self.phase = RacePhase::RiderFinishedWaitingGhost;
        }
    }

    fn complete(&mut self) {
        self.phase = RacePhase::Complete;
        self.state.race_finished = true;
        tracing::info!("Race complete");
    }
}
