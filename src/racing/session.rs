//! Race session driver.
//!
//! Runs the [`RaceEngine`] on a fixed tokio interval. Telemetry is drained
//! from the trainer channel before each tick, and trainer writes are spawned
//! without blocking the tick. Their acknowledgements come back over a
//! channel and are applied at the start of a later tick.

use crossbeam::channel::{Receiver, Sender, TryRecvError};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::countdown::CountdownEvent;
use super::engine::{RaceEngine, RaceError, RacePhase, RaceState, TickOutcome};
use super::results::{HighScore, RunSubmission};
use crate::sensors::simulator::PowerSimulator;
use crate::sensors::trainer::{ControlPoint, TrainerController};
use crate::sensors::types::{ConnectionState, SensorEvent, TransmitError};
use crate::storage::database::CourseStore;

/// ERG targets are written at most this often.
pub const ERG_SEND_INTERVAL_SECS: f64 = 1.0;

/// Where rider power comes from.
pub enum PowerSource {
    /// Live telemetry from a connected trainer
    Trainer(Receiver<SensorEvent>),
    /// Manually adjusted simulated power
    Simulator(PowerSimulator),
}

/// Commands accepted while a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    IncreasePower,
    DecreasePower,
    SetPower(u16),
    SetErgTarget(u16),
}

/// Session options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tick_interval: Duration,
    /// Hold this power in ERG mode instead of simulating the route
    pub erg_watts: Option<u16>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            erg_watts: None,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub submission: RunSubmission,
    /// `None` when the run was not saved
    pub new_record: Option<bool>,
    pub high_score: Option<HighScore>,
    pub state: RaceState,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ack {
    Gradient(f64),
    Erg(u16),
}

/// Paces ERG writes: at most once per interval, only when not yet confirmed.
#[derive(Debug, Clone)]
struct ErgPacer {
    target: u16,
    confirmed: Option<u16>,
    since_send: f64,
}

impl ErgPacer {
    fn new(target: u16) -> Self {
        Self {
            target,
            confirmed: None,
            // First write goes out on the first tick
            since_send: ERG_SEND_INTERVAL_SECS,
        }
    }

    fn due(&mut self, dt: f64) -> Option<u16> {
        self.since_send += dt;
        if self.since_send < ERG_SEND_INTERVAL_SECS || self.confirmed == Some(self.target) {
            return None;
        }
        self.since_send = 0.0;
        Some(self.target)
    }
}

/// A race against the clock and the course record.
pub struct RaceSession<C: ControlPoint, S: CourseStore> {
    course_id: String,
    engine: RaceEngine,
    store: S,
    controller: Option<Arc<TrainerController<C>>>,
    power: PowerSource,
    options: SessionOptions,
    commands: Option<Receiver<SessionCommand>>,
    ack_tx: Sender<Ack>,
    ack_rx: Receiver<Ack>,
    erg: Option<ErgPacer>,
    trainer_lost: bool,
    no_runtime_warned: bool,
    saved: Option<(RunSubmission, Option<bool>, Option<HighScore>)>,
}

impl<C: ControlPoint, S: CourseStore> RaceSession<C, S> {
    pub fn new(
        course_id: impl Into<String>,
        engine: RaceEngine,
        store: S,
        controller: Option<Arc<TrainerController<C>>>,
        power: PowerSource,
        options: SessionOptions,
    ) -> Self {
        let (ack_tx, ack_rx) = crossbeam::channel::unbounded();
        let erg = options.erg_watts.map(ErgPacer::new);

        Self {
            course_id: course_id.into(),
            engine,
            store,
            controller,
            power,
            options,
            commands: None,
            ack_tx,
            ack_rx,
            erg,
            trainer_lost: false,
            no_runtime_warned: false,
            saved: None,
        }
    }

    /// Accept [`SessionCommand`]s from another thread.
    pub fn with_commands(mut self, commands: Receiver<SessionCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn engine(&self) -> &RaceEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn simulator_mut(&mut self) -> Option<&mut PowerSimulator> {
        match &mut self.power {
            PowerSource::Simulator(sim) => Some(sim),
            PowerSource::Trainer(_) => None,
        }
    }

    /// Leave the pre-race phase.
    pub fn start(&mut self) -> Result<(), RaceError> {
        self.engine.start_countdown()?;
        Ok(())
    }

    /// Run one tick of `dt` seconds.
    ///
    /// Trainer writes are spawned on the current tokio runtime. Without one,
    /// writes are skipped and retried on a later tick.
    pub fn step(&mut self, dt: f64) -> TickOutcome {
        self.apply_commands();
        self.apply_acks();
        self.read_power();

        let outcome = self.engine.tick(dt);

        if let Some(CountdownEvent::CountdownTick { seconds }) = outcome.countdown {
            tracing::info!("Starting in {}", seconds);
        }

        if self.engine.phase() == RacePhase::InProgress || outcome.finished.is_some() {
            self.drive_trainer(&outcome, dt);
        }

        if let Some(lap) = &outcome.lap_completed {
            tracing::debug!("Lap {} closed at {:.1}s", lap.lap_number, lap.lap_time);
        }

        if let Some(submission) = &outcome.finished {
            self.persist(submission.clone());
        }

        outcome
    }

    /// Run to completion on the tick interval.
    pub async fn run(self) -> Result<SessionResult, RaceError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until the race completes or `stop` resolves.
    pub async fn run_until<F: Future>(mut self, stop: F) -> Result<SessionResult, RaceError> {
        if self.engine.phase() == RacePhase::PreRace {
            self.start()?;
        }

        let mut interval = tokio::time::interval(self.options.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last = Instant::now();

        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64();
                    last = now;

                    if self.step(dt).phase == RacePhase::Complete {
                        break;
                    }
                }
                _ = &mut stop => {
                    tracing::info!("Session stopped in {}", self.engine.phase());
                    break;
                }
            }
        }

        Ok(self.into_result())
    }

    fn into_result(self) -> SessionResult {
        let completed = self.engine.phase() == RacePhase::Complete;
        let state = self.engine.state().clone();

        match self.saved {
            Some((submission, new_record, high_score)) => SessionResult {
                submission,
                new_record,
                high_score,
                state,
                completed,
            },
            None => SessionResult {
                submission: self.engine.partial_submission(),
                new_record: None,
                high_score: None,
                state,
                completed,
            },
        }
    }

    fn apply_commands(&mut self) {
        let Some(commands) = &self.commands else {
            return;
        };
        let pending: Vec<SessionCommand> = commands.try_iter().collect();

        for command in pending {
            match (command, &mut self.power) {
                (SessionCommand::IncreasePower, PowerSource::Simulator(sim)) => {
                    let watts = sim.increase();
                    tracing::info!("Simulated power {}W", watts);
                }
                (SessionCommand::DecreasePower, PowerSource::Simulator(sim)) => {
                    let watts = sim.decrease();
                    tracing::info!("Simulated power {}W", watts);
                }
                (SessionCommand::SetPower(watts), PowerSource::Simulator(sim)) => {
                    sim.set(watts);
                    tracing::info!("Simulated power {}W", watts);
                }
                (SessionCommand::SetErgTarget(watts), _) => match &mut self.erg {
                    Some(erg) => erg.target = watts,
                    None => self.erg = Some(ErgPacer::new(watts)),
                },
                (command, PowerSource::Trainer(_)) => {
                    tracing::debug!("Ignoring {:?}: power comes from the trainer", command);
                }
            }
        }
    }

    fn apply_acks(&mut self) {
        for ack in self.ack_rx.try_iter() {
            match ack {
                Ack::Gradient(grade) => self.engine.gradient_sent(grade),
                Ack::Erg(watts) => {
                    if let Some(erg) = &mut self.erg {
                        erg.confirmed = Some(watts);
                    }
                }
            }
        }
    }

    fn read_power(&mut self) {
        match &mut self.power {
            PowerSource::Simulator(sim) => {
                self.engine.update_power(f64::from(sim.power_watts()));
            }
            PowerSource::Trainer(events) => loop {
                match events.try_recv() {
                    Ok(SensorEvent::Telemetry { reading, .. }) => {
                        self.engine
                            .update_power(f64::from(reading.instantaneous_power_watts));
                    }
                    Ok(SensorEvent::ConnectionChanged { device_id, state }) => {
                        if state == ConnectionState::Disconnected {
                            tracing::warn!(
                                "Trainer {} disconnected; holding {:.0}W",
                                device_id,
                                self.engine.state().power_watts
                            );
                        } else {
                            tracing::info!("Trainer {} {}", device_id, state);
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !self.trainer_lost {
                            self.trainer_lost = true;
                            tracing::warn!("Telemetry channel closed; holding last power");
                        }
                        break;
                    }
                }
            },
        }
    }

    fn drive_trainer(&mut self, outcome: &TickOutcome, dt: f64) {
        let Some(controller) = self.controller.clone() else {
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                if !self.no_runtime_warned {
                    self.no_runtime_warned = true;
                    tracing::warn!("No tokio runtime; trainer writes skipped");
                }
                return;
            }
        };

        if let Some(erg) = &mut self.erg {
            if let Some(watts) = erg.due(dt) {
                if controller.is_setting_erg() {
                    tracing::debug!("ERG write in flight, skipping {}W", watts);
                    return;
                }
                let tx = self.ack_tx.clone();
                runtime.spawn(async move {
                    match controller.set_target_power(watts).await {
                        Ok(()) => {
                            let _ = tx.send(Ack::Erg(watts));
                        }
                        Err(TransmitError::Busy) => {
                            tracing::debug!("ERG write in flight, skipped {}W", watts)
                        }
                        Err(e) => tracing::warn!("Failed to set ERG target: {}", e),
                    }
                });
            }
            return;
        }

        let Some(grade) = outcome.gradient_command else {
            return;
        };
        if controller.is_setting_gradient() {
            tracing::debug!("Gradient write in flight, skipping {:.2}%", grade);
            return;
        }

        let tx = self.ack_tx.clone();
        runtime.spawn(async move {
            match controller.set_gradient(grade).await {
                Ok(()) => {
                    let _ = tx.send(Ack::Gradient(grade));
                }
                Err(TransmitError::Busy) => {
                    tracing::debug!("Gradient write in flight, skipped {:.2}%", grade)
                }
                Err(e) => tracing::warn!("Failed to set gradient: {}", e),
            }
        });
    }

    /// Save the run and any high score. Failures leave the finish standing.
    fn persist(&mut self, submission: RunSubmission) {
        let new_record = match self.store.save_run(&self.course_id, &submission) {
            Ok(is_record) => {
                if is_record {
                    tracing::info!("New course record for {}", submission.runner_name);
                } else {
                    tracing::info!("Run saved; record stands");
                }
                Some(is_record)
            }
            Err(e) => {
                tracing::warn!("Failed to save run: {}", e);
                None
            }
        };

        let high_score = self.engine.high_score();
        if let Some(score) = &high_score {
            if let Err(e) = self.store.save_high_score(&self.course_id, score) {
                tracing::warn!("Failed to save high score: {}", e);
            }
        }

        self.saved = Some((submission, new_record, high_score));
    }
}
