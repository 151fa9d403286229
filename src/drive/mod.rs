//! # Drive Module
//!
//! Differential-drive mixing and the emergency-stop interlock.
//!
//! This module handles:
//! - Converting a forward/turn pair into left/right duty cycles
//! - The shared RUNNING/STOPPED latch that gates every motor write

pub mod mixer;
pub mod safety;
