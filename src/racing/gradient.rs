//! Gradient smoothing and trainer write throttling.
//!
//! Two cadences run over the same signal: the smoothed gradient follows the
//! route every tick, while the trainer only receives an averaged value every
//! few seconds, and only when it moved past a deadband.

/// Per-tick exponential smoothing factor.
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.05;

/// Seconds between averaged gradient writes.
pub const DEFAULT_SEND_INTERVAL_SECS: f64 = 5.0;

/// Allowed range for the write interval. Trainers must not see a write per tick.
pub const MIN_SEND_INTERVAL_SECS: f64 = 5.0;
pub const MAX_SEND_INTERVAL_SECS: f64 = 10.0;

/// Smallest change in percent worth sending.
pub const DEFAULT_DEADBAND_PERCENT: f64 = 0.1;

/// Difficulty scaling range, as a fraction of the route gradient.
pub const MIN_DIFFICULTY: f64 = 0.5;
pub const MAX_DIFFICULTY: f64 = 1.5;

/// Scale a route gradient by the rider's difficulty setting.
pub fn apply_difficulty(gradient: f64, difficulty: f64) -> f64 {
    gradient * difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Exponential filter easing the current gradient toward its target.
#[derive(Debug, Clone)]
pub struct GradientSmoother {
    factor: f64,
    current: f64,
}

impl GradientSmoother {
    pub fn new(factor: f64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            current: 0.0,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Move one step toward `target` and return the new value.
    pub fn update(&mut self, target: f64) -> f64 {
        self.current += (target - self.current) * self.factor;
        self.current
    }

    pub fn reset(&mut self, value: f64) {
        self.current = value;
    }
}

impl Default for GradientSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

/// Averages gradient samples and releases one at a bounded rate.
#[derive(Debug, Clone)]
pub struct GradientThrottle {
    interval_secs: f64,
    deadband: f64,
    sample_sum: f64,
    sample_count: u32,
    since_flush: f64,
    last_sent: Option<f64>,
}

impl GradientThrottle {
    /// `interval_secs` is clamped to 5..=10 seconds.
    pub fn new(interval_secs: f64, deadband: f64) -> Self {
        let interval_secs = if interval_secs.is_nan() {
            DEFAULT_SEND_INTERVAL_SECS
        } else {
            interval_secs.clamp(MIN_SEND_INTERVAL_SECS, MAX_SEND_INTERVAL_SECS)
        };

        Self {
            interval_secs,
            deadband,
            sample_sum: 0.0,
            sample_count: 0,
            since_flush: 0.0,
            last_sent: None,
        }
    }

    /// Last value the trainer acknowledged.
    pub fn last_sent(&self) -> Option<f64> {
        self.last_sent
    }

    /// Add a sample covering `dt` seconds.
    ///
    /// Once per interval the buffered samples are averaged and cleared. The
    /// average is returned if it differs from the last sent value by more
    /// than the deadband, or if nothing has been sent yet.
    pub fn push(&mut self, sample: f64, dt: f64) -> Option<f64> {
        self.sample_sum += sample;
        self.sample_count += 1;
        self.since_flush += dt;

        if self.since_flush < self.interval_secs {
            return None;
        }

        let average = self.sample_sum / self.sample_count as f64;
        self.sample_sum = 0.0;
        self.sample_count = 0;
        self.since_flush = 0.0;

        match self.last_sent {
            Some(last) if (average - last).abs() <= self.deadband => None,
            _ => Some(average),
        }
    }

    /// Record a value the trainer accepted.
    ///
    /// Failed or skipped writes are never confirmed, so the next flush retries.
    pub fn confirm_sent(&mut self, value: f64) {
        self.last_sent = Some(value);
    }
}

impl Default for GradientThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_INTERVAL_SECS, DEFAULT_DEADBAND_PERCENT)
    }
}
