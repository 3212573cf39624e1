//! Manual power source used when no trainer is connected.

/// Watts added or removed per step.
pub const POWER_STEP_WATTS: u16 = 10;

/// Simulated rider power, adjusted up and down by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSimulator {
    power_watts: u16,
}

impl PowerSimulator {
    /// Create a simulator holding the given power.
    pub fn new(power_watts: u16) -> Self {
        Self { power_watts }
    }

    /// Current simulated power.
    pub fn power_watts(&self) -> u16 {
        self.power_watts
    }

    /// Step power up.
    pub fn increase(&mut self) -> u16 {
        self.power_watts = self.power_watts.saturating_add(POWER_STEP_WATTS);
        self.power_watts
    }

    /// Step power down, never below zero.
    pub fn decrease(&mut self) -> u16 {
        self.power_watts = self.power_watts.saturating_sub(POWER_STEP_WATTS);
        self.power_watts
    }

    /// Jump straight to a wattage.
    pub fn set(&mut self, power_watts: u16) {
        self.power_watts = power_watts;
    }
}

impl Default for PowerSimulator {
    fn default() -> Self {
        Self::new(100)
    }
}
