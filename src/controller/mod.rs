//! # Controller Module
//!
//! Xbox-style controller input handling.
//!
//! This module handles:
//! - Gamepad detection and connection via evdev
//! - Folding stick and button events into controller state
//! - Normalizing stick values and applying the deadzone

pub mod calibration;
pub mod gamepad;
pub mod mapper;
