//! Sensor types, telemetry readings and error enums for the trainer link.

use std::time::Instant;
use thiserror::Error;

/// Live rider metrics decoded from one Indoor Bike Data notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiderTelemetry {
    /// Instantaneous power in watts (signed on the wire)
    pub instantaneous_power_watts: i16,
    /// Instantaneous cadence in RPM, if the trainer reports it
    pub cadence_rpm: Option<u16>,
}

/// Connection state of the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Active connection
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Events pushed from the trainer link to the race session.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    /// Trainer connection state changed
    ConnectionChanged {
        device_id: String,
        state: ConnectionState,
    },
    /// A notification decoded into fresh telemetry
    Telemetry {
        reading: RiderTelemetry,
        received_at: Instant,
    },
}

/// Failure to decode a telemetry notification.
///
/// Never fatal: the caller keeps the last known power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Buffer ends before a field announced by the flags
    #[error("notification too short: need {needed} bytes, got {len}")]
    TooShort { needed: usize, len: usize },

    /// Instantaneous power flag (bit 6) is not set, or its bytes are cut off
    #[error("instantaneous power field missing")]
    FieldMissing,
}

/// Failure to write a command to the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransmitError {
    /// Another command of the same kind is still in flight; this one was dropped
    #[error("control point busy")]
    Busy,

    /// The trainer does not expose a control point characteristic
    #[error("control point not available")]
    NoControlPoint,

    /// The BLE write itself failed
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// Errors while discovering or connecting to the trainer.
#[derive(Debug, Error)]
pub enum SensorError {
    /// BLE adapter not found or unavailable
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// Failed to start BLE scanning
    #[error("Failed to start scanning: {0}")]
    ScanFailed(String),

    /// No FTMS trainer showed up before the discovery timeout
    #[error("No trainer found within {0}s")]
    TrainerNotFound(u64),

    /// Connection to the trainer failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timed out
    #[error("Connection timed out")]
    ConnectionTimeout,

    /// Failed to subscribe to notifications
    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    /// Generic BLE error
    #[error("BLE error: {0}")]
    BleError(String),
}
