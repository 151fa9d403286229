//! # VESC Protocol Constants
//!
//! Core packet definitions for the VESC UART protocol.
//!
//! ```text
//! short: 0x02 | len (u8)  | payload | crc16 (BE) | 0x03
//! long:  0x03 | len (u16) | payload | crc16 (BE) | 0x03
//! ```

/// Start byte for packets with payload up to 255 bytes
pub const VESC_START_SHORT: u8 = 0x02;

/// Start byte for packets with payload up to 65535 bytes
pub const VESC_START_LONG: u8 = 0x03;

/// Stop byte terminating every packet
pub const VESC_STOP_BYTE: u8 = 0x03;

/// Largest payload that fits a short frame
pub const VESC_MAX_SHORT_PAYLOAD: usize = 255;

/// Framing overhead of a short packet: start + len + crc(2) + stop
pub const VESC_SHORT_FRAME_OVERHEAD: usize = 5;

/// `COMM_SET_DUTY` command id
pub const COMM_SET_DUTY: u8 = 5;

/// Duty cycle is transmitted as `duty * 100000` in a big-endian i32
pub const VESC_DUTY_SCALE: f32 = 100_000.0;

/// Highest duty cycle the VESC firmware accepts by default (l_max_duty)
pub const VESC_MAX_SAFE_DUTY: f32 = 0.95;

/// Size of a `COMM_SET_DUTY` payload: id + i32
pub const VESC_SET_DUTY_PAYLOAD_SIZE: usize = 5;

/// Size of a complete `COMM_SET_DUTY` frame
pub const VESC_SET_DUTY_FRAME_SIZE: usize = VESC_SET_DUTY_PAYLOAD_SIZE + VESC_SHORT_FRAME_OVERHEAD;
