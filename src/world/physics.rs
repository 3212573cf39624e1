//! Physics engine for power-to-speed calculation
//!
//! Steady-state balance of rider power against gravity, rolling resistance
//! and aerodynamic drag:
//!
//! `P = (F_gravity + F_rolling) * v + 0.5 * rho * CdA * v^3`
//!
//! The cubic is solved for `v` by bisection, which always converges in a
//! fixed number of steps.

/// Physics constants
pub const AIR_DENSITY: f64 = 1.225; // kg/m³ at sea level
pub const GRAVITY: f64 = 9.81; // m/s²
pub const DEFAULT_CDA: f64 = 0.32; // m² (hoods position)
pub const DEFAULT_CRR: f64 = 0.005;
pub const BIKE_MASS_KG: f64 = 9.0;

/// Upper bound of the speed search; power beyond this saturates here.
pub const MAX_SOLVER_SPEED_MPS: f64 = 50.0;

/// Bisection steps. 30 halvings of 50 m/s leave a bracket under 1e-7 m/s.
pub const SOLVER_ITERATIONS: u32 = 30;

/// Power at or below this is treated as coasting to a stop.
pub const NEGLIGIBLE_POWER_WATTS: f64 = 1e-3;

/// Unit conversions
pub const MPS_TO_MPH: f64 = 2.23694;
pub const LBS_TO_KG: f64 = 0.453592;

/// Physics engine for calculating virtual speed from power
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    /// Rider mass in kilograms
    pub rider_mass_kg: f64,
    /// Bike mass in kilograms
    pub bike_mass_kg: f64,
    /// Drag coefficient times frontal area (CdA)
    pub cda: f64,
    /// Rolling resistance coefficient
    pub crr: f64,
    /// Upper bound of the bisection search in m/s
    pub max_speed_mps: f64,
    /// Number of bisection steps
    pub iterations: u32,
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self {
            rider_mass_kg: 75.0,
            bike_mass_kg: BIKE_MASS_KG,
            cda: DEFAULT_CDA,
            crr: DEFAULT_CRR,
            max_speed_mps: MAX_SOLVER_SPEED_MPS,
            iterations: SOLVER_ITERATIONS,
        }
    }
}

impl PhysicsEngine {
    /// Create a new physics engine with specified rider mass
    pub fn new(rider_mass_kg: f64) -> Self {
        Self {
            rider_mass_kg,
            ..Default::default()
        }
    }

    /// Create a physics engine for a rider weight given in pounds
    pub fn from_weight_lbs(weight_lbs: f64) -> Self {
        Self::new(lbs_to_kg(weight_lbs))
    }

    /// Total system mass (rider + bike)
    pub fn total_mass(&self) -> f64 {
        self.rider_mass_kg + self.bike_mass_kg
    }

    /// Power in watts needed to hold `speed_mps` on a road of `gradient_percent`.
    ///
    /// Negative on descents steep enough that gravity outweighs rolling and air drag.
    pub fn power_required(&self, speed_mps: f64, gradient_percent: f64) -> f64 {
        let mass = self.total_mass();
        let angle = (gradient_percent / 100.0).atan();

        let f_gravity = mass * GRAVITY * angle.sin();
        let f_rolling = mass * GRAVITY * angle.cos() * self.crr;
        let drag = 0.5 * AIR_DENSITY * self.cda;

        (f_gravity + f_rolling) * speed_mps + drag * speed_mps.powi(3)
    }

    /// Calculate speed from power and gradient
    ///
    /// # Arguments
    /// * `power_watts` - Current power output in watts
    /// * `gradient_percent` - Virtual road gradient as a percentage
    ///
    /// # Returns
    /// Speed in meters per second, in `[0, max_speed_mps]`
    pub fn speed_from_power(&self, power_watts: f64, gradient_percent: f64) -> f64 {
        if !(power_watts > NEGLIGIBLE_POWER_WATTS) {
            return 0.0;
        }

        if self.power_required(self.max_speed_mps, gradient_percent) < power_watts {
            return self.max_speed_mps;
        }

        // power_required(0) = 0 < P and power_required(max) >= P, and there is a
        // single crossing of P above zero even when descents dip negative first.
        let mut lo = 0.0;
        let mut hi = self.max_speed_mps;
        for _ in 0..self.iterations {
            let mid = 0.5 * (lo + hi);
            if self.power_required(mid, gradient_percent) < power_watts {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        0.5 * (lo + hi)
    }
}

/// Speed in m/s for a rider of `rider_mass_kg` producing `power_watts`.
pub fn speed_from_power(power_watts: f64, gradient_percent: f64, rider_mass_kg: f64) -> f64 {
    PhysicsEngine::new(rider_mass_kg).speed_from_power(power_watts, gradient_percent)
}

/// Watts a rider of `rider_mass_kg` needs to hold `speed_mps`.
pub fn power_from_speed(speed_mps: f64, gradient_percent: f64, rider_mass_kg: f64) -> f64 {
    PhysicsEngine::new(rider_mass_kg).power_required(speed_mps, gradient_percent)
}

pub fn mps_to_mph(speed_mps: f64) -> f64 {
    speed_mps * MPS_TO_MPH
}

pub fn lbs_to_kg(weight_lbs: f64) -> f64 {
    weight_lbs * LBS_TO_KG
}
