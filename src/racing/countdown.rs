//! Pre-race countdown.
//!
//! Driven by the same tick as the race so that start time is measured in
//! simulated seconds.

/// Countdown event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Countdown started.
    CountdownStarted { seconds: u32 },
    /// Whole seconds remaining changed.
    CountdownTick { seconds: u32 },
    /// Race started.
    RaceStart,
}

/// Tick-driven countdown to race start.
#[derive(Debug, Clone)]
pub struct Countdown {
    seconds: u32,
    remaining: f64,
    last_announced: u32,
    started: bool,
    complete: bool,
}

impl Countdown {
    pub fn new(seconds: u32) -> Self {
        Self {
            seconds,
            remaining: seconds as f64,
            last_announced: seconds,
            started: false,
            complete: false,
        }
    }

    /// Arm the countdown from its full length.
    pub fn start(&mut self) -> CountdownEvent {
        self.remaining = self.seconds as f64;
        self.last_announced = self.seconds;
        self.started = true;
        self.complete = false;
        CountdownEvent::CountdownStarted {
            seconds: self.seconds,
        }
    }

    /// Whole seconds left, rounded up.
    pub fn remaining_secs(&self) -> u32 {
        self.remaining.max(0.0).ceil() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Advance by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> Option<CountdownEvent> {
        if !self.started || self.complete {
            return None;
        }

        self.remaining -= dt;

        if self.remaining <= 0.0 {
            self.complete = true;
            return Some(CountdownEvent::RaceStart);
        }

        let seconds = self.remaining_secs();
        if seconds != self.last_announced {
            self.last_announced = seconds;
            return Some(CountdownEvent::CountdownTick { seconds });
        }

        None
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(3)
    }
}
