//! # Safety Interlock Module
//!
//! The emergency-stop latch shared between the tick loop and the motor worker.
//!
//! ## States
//!
//! ```text
//!            engage(reason)
//!   RUNNING ────────────────▶ STOPPED(reason)
//!      ▲                           │
//!      └───────── release() ───────┘   (refused after Shutdown)
//! ```
//!
//! The latch holds a single atomic byte, so any number of clones can read
//! and write it without locking. [`SafetyLatch::gate`] is the only place a
//! wheel command meets the latch; the motor worker calls it immediately
//! before each per-link write, so an `engage` that lands between the two
//! writes still zeroes the second one.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::mixer::WheelCommand;

const RUNNING: u8 = 0;

/// Why the latch was engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// B or Guide on the controller
    Button = 1,
    /// Space on the keyboard
    Key = 2,
    /// Controller disconnected while connected
    ControllerLost = 3,
    /// A motor link write failed
    LinkFault = 4,
    /// Process is exiting; cannot be released
    Shutdown = 5,
}

impl StopReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Button),
            2 => Some(Self::Key),
            3 => Some(Self::ControllerLost),
            4 => Some(Self::LinkFault),
            5 => Some(Self::Shutdown),
            _ => None,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Button => "controller button",
            Self::Key => "keyboard",
            Self::ControllerLost => "controller lost",
            Self::LinkFault => "motor link fault",
            Self::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

/// Observable latch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    Running,
    Stopped(StopReason),
}

impl LatchState {
    fn from_u8(value: u8) -> Self {
        if value == RUNNING {
            return Self::Running;
        }
        // Unknown values read as stopped
        Self::Stopped(StopReason::from_u8(value).unwrap_or(StopReason::Shutdown))
    }

    /// Stop reason, if stopped
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        match self {
            Self::Running => None,
            Self::Stopped(reason) => Some(*reason),
        }
    }
}

/// Shared RUNNING/STOPPED interlock.
#[derive(Debug, Clone)]
pub struct SafetyLatch {
    state: Arc<AtomicU8>,
}

impl Default for SafetyLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyLatch {
    /// Creates a latch in the RUNNING state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(RUNNING)),
        }
    }

    /// Creates a latch already stopped for `reason`.
    #[must_use]
    pub fn stopped(reason: StopReason) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(reason as u8)),
        }
    }

    #[must_use]
    pub fn state(&self) -> LatchState {
        LatchState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state() != LatchState::Running
    }

    /// Engages the stop.
    ///
    /// The first reason sticks until release; [`StopReason::Shutdown`]
    /// overrides any earlier one. Returns `true` if this call moved the latch
    /// out of RUNNING.
    pub fn engage(&self, reason: StopReason) -> bool {
        let previous = if reason == StopReason::Shutdown {
            self.state.swap(reason as u8, Ordering::SeqCst)
        } else {
            match self.state.compare_exchange(
                RUNNING,
                reason as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(previous) | Err(previous) => previous,
            }
        };

        let engaged = previous == RUNNING;
        if engaged {
            warn!("Emergency stop engaged: {}", reason);
        }
        engaged
    }

    /// Releases the stop.
    ///
    /// Returns `true` if the latch moved to RUNNING. A shutdown stop is
    /// permanent.
    pub fn release(&self) -> bool {
        let result = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if current == RUNNING || current == StopReason::Shutdown as u8 {
                    None
                } else {
                    Some(RUNNING)
                }
            });

        match result {
            Ok(previous) => {
                if let Some(reason) = StopReason::from_u8(previous) {
                    info!("Emergency stop released (was: {})", reason);
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Passes `command` through when RUNNING, otherwise returns a stop.
    #[must_use]
    pub fn gate(&self, command: WheelCommand) -> WheelCommand {
        if self.is_stopped() {
            WheelCommand::STOP
        } else {
            command
        }
    }
}
