//! # Error Types
//!
//! Custom error types for Joydrive using `thiserror`.

use thiserror::Error;

/// Main error type for Joydrive
#[derive(Debug, Error)]
pub enum JoydriveError {
    /// TOML parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Controller I/O errors (device vanished, read failures)
    #[error("Controller error: {0}")]
    Controller(String),

    /// No gamepad found while scanning input devices
    #[error("No game controller found")]
    ControllerNotFound,

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// A motor link rejected or timed out a command
    #[error("Motor link '{link}' failed: {reason}")]
    MotorLink { link: String, reason: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JoydriveError {
    /// Shorthand for an [`JoydriveError::InvalidConfig`] with a message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type alias for Joydrive
pub type Result<T> = std::result::Result<T, JoydriveError>;
