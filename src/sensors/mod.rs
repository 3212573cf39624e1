//! Sensor module: FTMS codec, trainer link and simulated power.

pub mod ftms;
pub mod simulator;
pub mod trainer;
pub mod types;

pub use ftms::{
    decode_rider_telemetry, encode_reset, encode_set_gradient, encode_set_target_power,
};
pub use simulator::PowerSimulator;
pub use trainer::{connect_trainer, ControlPoint, TrainerController, TrainerLink};
pub use types::{
    ConnectionState, DecodeError, RiderTelemetry, SensorError, SensorEvent, TransmitError,
};
