//! # VESC Protocol Module
//!
//! Implementation of the VESC UART packet protocol used to command motor
//! controllers over their USB-serial port.
//!
//! This module handles:
//! - Packet framing (short and long start bytes, length, CRC, stop byte)
//! - CRC-16/XMODEM checksum calculation
//! - Duty-cycle command encoding

pub mod protocol;
pub mod encoder;
pub mod crc;
