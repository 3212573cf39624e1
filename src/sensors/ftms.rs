//! FTMS (Fitness Machine Service) telemetry codec.
//!
//! Decodes Indoor Bike Data (0x2AD2) notifications into [`RiderTelemetry`] and
//! builds Fitness Machine Control Point (0x2AD9) commands. All multi-byte
//! integers are little-endian.

use crate::sensors::types::{DecodeError, RiderTelemetry};
use uuid::Uuid;

/// FTMS Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Indoor Bike Data Characteristic UUID (0x2AD2)
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad9_0000_1000_8000_0080_5f9b_34fb);

/// Lowest grade the trainer accepts, in percent.
pub const MIN_GRADE_PERCENT: f64 = -10.0;

/// Highest grade the trainer accepts, in percent.
pub const MAX_GRADE_PERCENT: f64 = 20.0;

/// Flags (2) + instantaneous speed (2), always present.
const FIXED_HEADER_LEN: usize = 4;

/// Indoor Bike Data flag bits.
pub const AVG_SPEED: u16 = 1 << 1;
pub const INST_CADENCE: u16 = 1 << 2;
pub const AVG_CADENCE: u16 = 1 << 3;
pub const TOTAL_DISTANCE: u16 = 1 << 4;
pub const RESISTANCE_LEVEL: u16 = 1 << 5;
pub const INST_POWER: u16 = 1 << 6;
pub const AVG_POWER: u16 = 1 << 7;
pub const EXPENDED_ENERGY: u16 = 1 << 8;
pub const HEART_RATE: u16 = 1 << 9;
pub const METABOLIC_EQUIVALENT: u16 = 1 << 10;
pub const ELAPSED_TIME: u16 = 1 << 11;
pub const REMAINING_TIME: u16 = 1 << 12;

/// Optional Indoor Bike Data fields in wire order with their byte widths.
///
/// Total distance is a uint24: 3 bytes, not 4.
const OPTIONAL_FIELDS: [(u16, usize); 12] = [
    (AVG_SPEED, 2),
    (INST_CADENCE, 2),
    (AVG_CADENCE, 2),
    (TOTAL_DISTANCE, 3),
    (RESISTANCE_LEVEL, 2),
    (INST_POWER, 2),
    (AVG_POWER, 2),
    (EXPENDED_ENERGY, 5),
    (HEART_RATE, 1),
    (METABOLIC_EQUIVALENT, 1),
    (ELAPSED_TIME, 2),
    (REMAINING_TIME, 2),
];

/// Byte offset of `field` inside a notification carrying `flags`.
///
/// Walks the flags in ascending bit order, summing the widths of every
/// present field that precedes `field`. Returns `None` when `field` is absent.
pub fn field_offset(flags: u16, field: u16) -> Option<usize> {
    if flags & field == 0 {
        return None;
    }

    let mut offset = FIXED_HEADER_LEN;
    for &(mask, width) in OPTIONAL_FIELDS.iter() {
        if mask == field {
            return Some(offset);
        }
        if flags & mask != 0 {
            offset += width;
        }
    }

    None
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Decode an Indoor Bike Data notification into rider telemetry.
///
/// Power is mandatory; cadence is reported when its flag is set and its
/// bytes are in the buffer. No plausibility clamping is applied.
pub fn decode_rider_telemetry(data: &[u8]) -> Result<RiderTelemetry, DecodeError> {
    if data.len() < FIXED_HEADER_LEN {
        return Err(DecodeError::TooShort {
            needed: FIXED_HEADER_LEN,
            len: data.len(),
        });
    }

    let flags = u16::from_le_bytes([data[0], data[1]]);

    let power_offset = field_offset(flags, INST_POWER).ok_or(DecodeError::FieldMissing)?;
    let power_raw = read_u16(data, power_offset).ok_or(DecodeError::FieldMissing)?;

    // Cadence is in 0.5 RPM units
    let cadence_rpm = field_offset(flags, INST_CADENCE)
        .and_then(|offset| read_u16(data, offset))
        .map(|raw| raw / 2);

    Ok(RiderTelemetry {
        instantaneous_power_watts: power_raw as i16,
        cadence_rpm,
    })
}

/// FTMS Control Point opcodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtmsControlOpcode {
    /// Request control of the fitness machine
    RequestControl = 0x00,
    /// Reset the fitness machine
    Reset = 0x01,
    /// Set target power (ERG mode)
    SetTargetPower = 0x05,
    /// Set indoor bike simulation parameters
    SetIndoorBikeSimulation = 0x11,
}

/// Build a control point command to request control.
pub fn encode_request_control() -> [u8; 1] {
    [FtmsControlOpcode::RequestControl as u8]
}

/// Build a control point command to reset the trainer.
pub fn encode_reset() -> [u8; 1] {
    [FtmsControlOpcode::Reset as u8]
}

/// Build a control point command to set target power (ERG mode).
///
/// The value is sent as-is; bounding it is the caller's job.
pub fn encode_set_target_power(target_watts: u16) -> [u8; 3] {
    let watts = target_watts.to_le_bytes();
    [FtmsControlOpcode::SetTargetPower as u8, watts[0], watts[1]]
}

/// Build a simulation parameters command carrying a road grade.
///
/// Layout: opcode, wind speed (int16, always 0), grade (int16, 0.01 %).
/// Grades outside what trainers accept saturate to [-10, 20] %.
pub fn encode_set_gradient(grade_percent: f64) -> [u8; 5] {
    let grade = grade_percent.clamp(MIN_GRADE_PERCENT, MAX_GRADE_PERCENT);
    let grade_bytes = ((grade * 100.0).round() as i16).to_le_bytes();
    let wind_bytes = 0i16.to_le_bytes();

    [
        FtmsControlOpcode::SetIndoorBikeSimulation as u8,
        wind_bytes[0],
        wind_bytes[1],
        grade_bytes[0],
        grade_bytes[1],
    ]
}
