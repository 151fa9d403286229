//! # Serial Communication Module
//!
//! Handles the USB-serial connection to a VESC motor controller.
//!
//! This module handles:
//! - Opening a serial port (8N1, no flow control) at the configured baud rate
//! - Writing framed packets and flushing them to the device
//!
//! Packet contents are built by [`crate::vesc`]; retries and failure policy
//! live in [`crate::motor`].

pub mod port_trait;

use crate::error::{JoydriveError, Result};
use port_trait::{SerialPortIO, TokioSerialPort};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

/// Default VESC USB baud rate
pub const VESC_BAUD_RATE: u32 = 115_200;

/// Serial port handle for one VESC
pub struct VescSerial {
    /// Serial port handle
    port: Box<dyn SerialPortIO>,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
}

impl std::fmt::Debug for VescSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VescSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl VescSerial {
    /// Open the VESC at `path`
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::Serial`] if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joydrive::serial::{VescSerial, VESC_BAUD_RATE};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = VescSerial::open("/dev/ttyACM0", VESC_BAUD_RATE)?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Trying to open serial port: {}", path);
        let port = Self::open_port(path, baud_rate)?;
        info!("Opened VESC serial port at {} ({} baud)", path, baud_rate);

        Ok(Self {
            port: Box::new(TokioSerialPort::new(port)),
            device_path: path.to_string(),
        })
    }

    /// Wrap an already-open port
    pub fn from_port(port: Box<dyn SerialPortIO>, device_path: impl Into<String>) -> Self {
        Self {
            port,
            device_path: device_path.into(),
        }
    }

    /// Open a specific serial port with VESC settings (8N1)
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| JoydriveError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Send a complete VESC packet and flush it
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::Serial`] if the write or flush fails
    pub async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port.write_all(packet).await.map_err(|e| {
            JoydriveError::Serial(format!("Failed to write packet to {}: {}", self.device_path, e))
        })?;

        self.port.flush().await.map_err(|e| {
            JoydriveError::Serial(format!("Failed to flush {}: {}", self.device_path, e))
        })?;

        debug!("Sent VESC packet ({} bytes) to {}", packet.len(), self.device_path);
        Ok(())
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}
