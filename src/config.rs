//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field is optional; an empty file yields the same
//! values as [`Config::default()`]. Configuration is read once at startup.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{JoydriveError, Result};
use crate::serial::VESC_BAUD_RATE;
use crate::vesc::protocol::VESC_MAX_SAFE_DUTY;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub controller: ControllerConfig,
    pub drive: DriveConfig,
    pub motors: MotorsConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Explicit `/dev/input/eventN` path, empty for auto-detect
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_axis_min")]
    pub axis_min: i32,

    #[serde(default = "default_axis_max")]
    pub axis_max: i32,

    /// Invert the vertical axis so that stick-up drives forward
    #[serde(default = "default_invert_y")]
    pub invert_y: bool,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Drive mixer configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DriveConfig {
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,

    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f32,
}

/// Motor link configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MotorsConfig {
    #[serde(default = "default_motors_enabled")]
    pub enabled: bool,

    #[serde(default = "default_left_port")]
    pub left_port: String,

    #[serde(default = "default_right_port")]
    pub right_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_keepalive_ms")]
    pub keepalive_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default)]
    pub left_reversed: bool,

    #[serde(default)]
    pub right_reversed: bool,
}

/// Display configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DisplayConfig {
    /// Drawing area width in terminal cells
    #[serde(default = "default_width")]
    pub width: u16,

    /// Drawing area height in terminal cells
    #[serde(default = "default_height")]
    pub height: u16,

    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Default value functions
fn default_deadzone() -> f32 { 0.15 }
fn default_axis_min() -> i32 { -32768 }
fn default_axis_max() -> i32 { 32767 }
fn default_invert_y() -> bool { true }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_max_speed() -> f32 { 0.8 }
fn default_speed_multiplier() -> f32 { 1.0 }

fn default_motors_enabled() -> bool { true }
fn default_left_port() -> String { "/dev/ttyACM0".to_string() }
fn default_right_port() -> String { "/dev/ttyACM1".to_string() }
fn default_baud_rate() -> u32 { VESC_BAUD_RATE }
fn default_write_timeout_ms() -> u64 { 100 }
fn default_keepalive_ms() -> u64 { 50 }

fn default_width() -> u16 { 80 }
fn default_height() -> u16 { 30 }
fn default_tick_rate_hz() -> u32 { 60 }

fn default_log_dir() -> String { "./logs".to_string() }

/// Baud rates accepted for the VESC USB/UART port
const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600, 1000000];

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            deadzone: default_deadzone(),
            axis_min: default_axis_min(),
            axis_max: default_axis_max(),
            invert_y: default_invert_y(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            speed_multiplier: default_speed_multiplier(),
        }
    }
}

impl Default for MotorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_motors_enabled(),
            left_port: default_left_port(),
            right_port: default_right_port(),
            baud_rate: default_baud_rate(),
            write_timeout_ms: default_write_timeout_ms(),
            keepalive_ms: default_keepalive_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            left_reversed: false,
            right_reversed: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            tick_rate_hz: default_tick_rate_hz(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joydrive::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::InvalidConfig`] naming the first field that is
    /// out of its valid range.
    pub fn validate(&self) -> Result<()> {
        // Deadzone must leave a non-empty live range, otherwise the rescale divides by zero
        let deadzone = self.controller.deadzone;
        if !(0.0..1.0).contains(&deadzone) {
            return Err(JoydriveError::invalid_config(format!(
                "deadzone must be in [0.0, 1.0), got {}",
                deadzone
            )));
        }

        if self.controller.axis_min >= self.controller.axis_max {
            return Err(JoydriveError::invalid_config(
                "axis_min must be less than axis_max",
            ));
        }

        if self.controller.reconnect_interval_ms == 0 || self.controller.reconnect_interval_ms > 60000 {
            return Err(JoydriveError::invalid_config(
                "controller reconnect_interval_ms must be between 1 and 60000",
            ));
        }

        // Validate drive limits
        let max_speed = self.drive.max_speed;
        if !(max_speed > 0.0 && max_speed <= VESC_MAX_SAFE_DUTY) {
            return Err(JoydriveError::invalid_config(format!(
                "max_speed must be in (0.0, {}], got {}",
                VESC_MAX_SAFE_DUTY, max_speed
            )));
        }

        let multiplier = self.drive.speed_multiplier;
        if !(multiplier > 0.0 && multiplier <= 1.0) {
            return Err(JoydriveError::invalid_config(format!(
                "speed_multiplier must be in (0.0, 1.0], got {}",
                multiplier
            )));
        }

        // Validate motor links
        if self.motors.left_port.is_empty() || self.motors.right_port.is_empty() {
            return Err(JoydriveError::invalid_config("motor ports cannot be empty"));
        }

        if self.motors.left_port == self.motors.right_port {
            return Err(JoydriveError::invalid_config(
                "left_port and right_port must be different devices",
            ));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.motors.baud_rate) {
            return Err(JoydriveError::invalid_config(format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            )));
        }

        if self.motors.write_timeout_ms == 0 || self.motors.write_timeout_ms > 10000 {
            return Err(JoydriveError::invalid_config(
                "write_timeout_ms must be between 1 and 10000",
            ));
        }

        if self.motors.keepalive_ms == 0 || self.motors.keepalive_ms > 1000 {
            return Err(JoydriveError::invalid_config(
                "keepalive_ms must be between 1 and 1000",
            ));
        }

        if self.motors.reconnect_interval_ms == 0 || self.motors.reconnect_interval_ms > 60000 {
            return Err(JoydriveError::invalid_config(
                "motors reconnect_interval_ms must be between 1 and 60000",
            ));
        }

        // Validate display
        if !(20..=500).contains(&self.display.width) {
            return Err(JoydriveError::invalid_config("width must be between 20 and 500"));
        }

        if !(10..=200).contains(&self.display.height) {
            return Err(JoydriveError::invalid_config("height must be between 10 and 200"));
        }

        if self.display.tick_rate_hz == 0 || self.display.tick_rate_hz > 240 {
            return Err(JoydriveError::invalid_config(
                "tick_rate_hz must be between 1 and 240",
            ));
        }

        if self.logging.log_dir.is_empty() {
            return Err(JoydriveError::invalid_config("log_dir cannot be empty"));
        }

        Ok(())
    }
}
