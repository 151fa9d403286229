//! # VESC Motor Link
//!
//! A [`MotorLink`] backed by a VESC over USB serial.
//!
//! Each write is bounded by `write_timeout_ms`. Any failure closes the port;
//! the worker reopens it on its reconnect schedule.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info};

use super::MotorLink;
use crate::config::MotorsConfig;
use crate::drive::mixer::Side;
use crate::error::{JoydriveError, Result};
use crate::serial::VescSerial;
use crate::vesc::encoder::encode_set_duty_frame;

/// Per-link serial settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    pub device_path: String,
    pub baud_rate: u32,
    pub write_timeout: Duration,
    /// Negate duty before encoding, for a motor mounted backwards
    pub reversed: bool,
}

impl LinkSettings {
    /// Settings for one side of the `[motors]` section.
    #[must_use]
    pub fn from_config(config: &MotorsConfig, side: Side) -> Self {
        let (device_path, reversed) = match side {
            Side::Left => (&config.left_port, config.left_reversed),
            Side::Right => (&config.right_port, config.right_reversed),
        };

        Self {
            device_path: device_path.clone(),
            baud_rate: config.baud_rate,
            write_timeout: Duration::from_millis(config.write_timeout_ms),
            reversed,
        }
    }
}

/// VESC motor controller on one side of the robot.
#[derive(Debug)]
pub struct VescLink {
    side: Side,
    settings: LinkSettings,
    serial: Option<VescSerial>,
}

impl VescLink {
    /// Opens the serial port for `side`.
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::MotorLink`] if the port cannot be opened
    pub fn open(side: Side, settings: LinkSettings) -> Result<Self> {
        let serial = VescSerial::open(&settings.device_path, settings.baud_rate)
            .map_err(|e| link_error(side, e))?;
        info!("{} motor link ready on {}", side.name(), settings.device_path);

        Ok(Self::from_serial(side, settings, serial))
    }

    /// Wraps an already-open port
    pub fn from_serial(side: Side, settings: LinkSettings, serial: VescSerial) -> Self {
        Self {
            side,
            settings,
            serial: Some(serial),
        }
    }
}

#[async_trait]
impl MotorLink for VescLink {
    fn name(&self) -> &str {
        self.side.name()
    }

    fn is_connected(&self) -> bool {
        self.serial.is_some()
    }

    async fn set_duty(&mut self, duty: f32) -> Result<()> {
        let duty = if self.settings.reversed { -duty } else { duty };
        let frame = encode_set_duty_frame(duty);

        let Some(serial) = self.serial.as_mut() else {
            return Err(link_error(self.side, "not connected"));
        };

        let result = match timeout(self.settings.write_timeout, serial.send_packet(&frame)).await {
            Ok(result) => result,
            Err(_) => Err(JoydriveError::Serial(format!(
                "write to {} timed out after {:?}",
                self.settings.device_path, self.settings.write_timeout
            ))),
        };

        if let Err(e) = result {
            self.serial = None;
            return Err(link_error(self.side, e));
        }

        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        if self.serial.is_some() {
            return Ok(());
        }

        debug!("Reopening {} motor link at {}", self.side.name(), self.settings.device_path);
        let serial = VescSerial::open(&self.settings.device_path, self.settings.baud_rate)
            .map_err(|e| link_error(self.side, e))?;
        self.serial = Some(serial);
        info!("{} motor link reconnected", self.side.name());

        Ok(())
    }
}

fn link_error(side: Side, reason: impl ToString) -> JoydriveError {
    JoydriveError::MotorLink {
        link: side.name().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::MockSerialPortIO;
    use std::io;

    fn settings(reversed: bool) -> LinkSettings {
        LinkSettings {
            device_path: "/dev/mock0".to_string(),
            baud_rate: 115_200,
            write_timeout: Duration::from_millis(100),
            reversed,
        }
    }

    fn link_expecting(frame: Vec<u8>, reversed: bool) -> VescLink {
        let mut port = MockSerialPortIO::new();
        port.expect_write_all()
            .withf(move |data: &[u8]| data == frame.as_slice())
            .times(1)
            .returning(|_| Ok(()));
        port.expect_flush().times(1).returning(|| Ok(()));

        let serial = VescSerial::from_port(Box::new(port), "/dev/mock0");
        VescLink::from_serial(Side::Left, settings(reversed), serial)
    }

    #[test]
    fn test_settings_from_config() {
        let config = MotorsConfig {
            right_reversed: true,
            ..MotorsConfig::default()
        };

        let left = LinkSettings::from_config(&config, Side::Left);
        let right = LinkSettings::from_config(&config, Side::Right);

        assert_eq!(left.device_path, "/dev/ttyACM0");
        assert_eq!(right.device_path, "/dev/ttyACM1");
        assert!(!left.reversed);
        assert!(right.reversed);
        assert_eq!(left.write_timeout, Duration::from_millis(config.write_timeout_ms));
    }

    #[tokio::test]
    async fn test_set_duty_writes_encoded_frame() {
        let mut link = link_expecting(encode_set_duty_frame(0.5).to_vec(), false);

        tokio_test::assert_ok!(link.set_duty(0.5).await);
        assert!(link.is_connected());
        assert_eq!(link.name(), "left");
    }

    #[tokio::test]
    async fn test_reversed_link_negates_duty() {
        let mut link = link_expecting(encode_set_duty_frame(-0.5).to_vec(), true);
        tokio_test::assert_ok!(link.set_duty(0.5).await);
    }

    #[tokio::test]
    async fn test_write_failure_disconnects() {
        let mut port = MockSerialPortIO::new();
        port.expect_write_all()
            .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));

        let serial = VescSerial::from_port(Box::new(port), "/dev/mock0");
        let mut link = VescLink::from_serial(Side::Right, settings(false), serial);

        match link.set_duty(0.2).await.unwrap_err() {
            JoydriveError::MotorLink { link: name, reason } => {
                assert_eq!(name, "right");
                assert!(reason.contains("unplugged"));
            }
            other => panic!("Expected MotorLink error, got: {:?}", other),
        }
        assert!(!link.is_connected());

        // Subsequent writes fail fast without touching the port
        assert!(link.set_duty(0.0).await.is_err());
    }

    #[tokio::test]
    async fn test_reconnect_to_missing_port_fails() {
        let mut port = MockSerialPortIO::new();
        port.expect_write_all()
            .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));

        let serial = VescSerial::from_port(Box::new(port), "/dev/nonexistent_vesc_12345");
        let mut link = VescLink::from_serial(
            Side::Left,
            LinkSettings {
                device_path: "/dev/nonexistent_vesc_12345".to_string(),
                ..settings(false)
            },
            serial,
        );
        let _ = link.set_duty(0.1).await;

        let result = link.reconnect().await;
        assert!(matches!(result, Err(JoydriveError::MotorLink { .. })));
        assert!(!link.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_when_connected_is_noop() {
        let port = MockSerialPortIO::new();
        let serial = VescSerial::from_port(Box::new(port), "/dev/mock0");
        let mut link = VescLink::from_serial(Side::Left, settings(false), serial);

        tokio_test::assert_ok!(link.reconnect().await);
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let result = VescLink::open(
            Side::Left,
            LinkSettings {
                device_path: "/dev/nonexistent_vesc_12345".to_string(),
                ..settings(false)
            },
        );
        assert!(matches!(result, Err(JoydriveError::MotorLink { .. })));
    }
}
