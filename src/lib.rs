//! # Joydrive Library
//!
//! Drive a two-wheeled robot from an Xbox controller on a Raspberry Pi.
//!
//! This library reads the controller's left stick through evdev, mixes it into
//! left/right duty cycles, and sends them to two VESC motor controllers over
//! USB serial, behind an emergency-stop interlock. A terminal view shows the
//! stick, the wheel duties and the interlock state.

pub mod app;
pub mod config;
pub mod controller;
pub mod drive;
pub mod error;
pub mod motor;
pub mod render;
pub mod serial;
pub mod vesc;
