//! # Motor Module
//!
//! Owns everything between a mixed [`WheelCommand`](crate::drive::mixer::WheelCommand)
//! and the two VESC serial ports.
//!
//! This module handles:
//! - The [`MotorLink`] seam over a single motor controller
//! - A latest-value command channel from the tick loop
//! - The background worker that gates, writes, and recovers the links

pub mod channel;
pub mod vesc_link;
pub mod worker;

use async_trait::async_trait;

use crate::error::Result;

/// One motor controller that accepts duty-cycle commands.
#[async_trait]
pub trait MotorLink: Send {
    /// Short name used in logs ("left", "right")
    fn name(&self) -> &str;

    /// Whether the underlying port is currently open
    fn is_connected(&self) -> bool;

    /// Send a duty cycle in -1.0 to 1.0.
    ///
    /// A failed write leaves the link disconnected until [`reconnect`](Self::reconnect)
    /// succeeds.
    async fn set_duty(&mut self, duty: f32) -> Result<()>;

    /// Reopen the port if it is closed. No-op when connected.
    async fn reconnect(&mut self) -> Result<()>;
}
