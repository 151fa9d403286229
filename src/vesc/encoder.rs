//! # VESC Packet Encoder
//!
//! Encodes motor commands into framed VESC packets.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::crc16;
use super::protocol::*;

/// Wrap a payload in a complete VESC frame
///
/// Payloads up to 255 bytes use the short frame, longer ones the long frame.
///
/// # Examples
///
/// ```
/// use joydrive::vesc::encoder::encode_frame;
///
/// let frame = encode_frame(&[0x05, 0x00, 0x00, 0x00, 0x00]);
/// assert_eq!(frame[0], 0x02);
/// assert_eq!(frame[frame.len() - 1], 0x03);
/// ```
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(payload.len() + VESC_SHORT_FRAME_OVERHEAD + 1);

    if payload.len() <= VESC_MAX_SHORT_PAYLOAD {
        frame.put_u8(VESC_START_SHORT);
        frame.put_u8(payload.len() as u8);
    } else {
        frame.put_u8(VESC_START_LONG);
        frame.put_u16(payload.len() as u16);
    }

    frame.put_slice(payload);
    frame.put_u16(crc16(payload));
    frame.put_u8(VESC_STOP_BYTE);

    frame.freeze()
}

/// Encode a `COMM_SET_DUTY` payload
///
/// The duty is clamped to ±[`VESC_MAX_SAFE_DUTY`]; NaN encodes as zero.
pub fn encode_set_duty_payload(duty: f32) -> [u8; VESC_SET_DUTY_PAYLOAD_SIZE] {
    let scaled = (clamp_duty(duty) * VESC_DUTY_SCALE).round() as i32;
    let value = scaled.to_be_bytes();
    [COMM_SET_DUTY, value[0], value[1], value[2], value[3]]
}

/// Encode a complete `COMM_SET_DUTY` frame
///
/// # Examples
///
/// ```
/// use joydrive::vesc::encoder::encode_set_duty_frame;
///
/// let frame = encode_set_duty_frame(0.5);
/// assert_eq!(frame.len(), 10);
/// ```
pub fn encode_set_duty_frame(duty: f32) -> Bytes {
    encode_frame(&encode_set_duty_payload(duty))
}

/// Clamp a duty cycle to the range the VESC accepts
pub fn clamp_duty(duty: f32) -> f32 {
    if duty.is_nan() {
        return 0.0;
    }
    duty.clamp(-VESC_MAX_SAFE_DUTY, VESC_MAX_SAFE_DUTY)
}
