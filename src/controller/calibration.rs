//! # Calibration Module
//!
//! Turns raw stick readings into a filtered [`AxisVector`].
//!
//! ## Normalization
//!
//! Raw evdev values are mapped linearly from the device range (`axis_min` to
//! `axis_max`, the Xbox default is -32768 to 32767) onto -1.0 to 1.0.
//!
//! ## Deadzone
//!
//! A deadzone eliminates small stick movements near center to absorb drift.
//! Values strictly inside the deadzone are mapped to 0.0, while values outside
//! are rescaled so the output grows continuously from 0.0 at the deadzone
//! edge to ±1.0 at full deflection:
//!
//! `output = sign(v) * (|v| - d) / (1 - d)`
//!
//! ## Usage
//!
//! ```
//! use joydrive::controller::calibration::Deadzone;
//!
//! let deadzone = Deadzone::new(0.15)?;
//!
//! // Input near center (within deadzone)
//! assert_eq!(deadzone.apply(0.10), 0.0);
//!
//! // Halfway between the deadzone edge and full deflection
//! assert!((deadzone.apply(0.575) - 0.5).abs() < 1e-6);
//! # Ok::<(), joydrive::error::JoydriveError>(())
//! ```

use crate::config::ControllerConfig;
use crate::error::{JoydriveError, Result};

/// Filtered stick position, both components in -1.0 to 1.0.
///
/// `x` is positive to the right, `y` is positive forward (stick pushed up).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisVector {
    pub x: f32,
    pub y: f32,
}

impl AxisVector {
    /// Stick at rest
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length; up to √2 on the diagonals of a square gate
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Direction in degrees, counter-clockwise from stick-right, in (-180, 180]
    ///
    /// Zero when the stick is at rest.
    #[must_use]
    pub fn angle_degrees(&self) -> f32 {
        if self.magnitude() > 0.0 {
            self.y.atan2(self.x).to_degrees()
        } else {
            0.0
        }
    }
}

/// Deadzone filter with a threshold in [0.0, 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzone {
    threshold: f32,
}

impl Deadzone {
    /// Creates a deadzone filter.
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::InvalidConfig`] if `threshold` is negative,
    /// NaN, or 1.0 and above (no live range left to rescale into).
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&threshold) {
            return Err(JoydriveError::invalid_config(format!(
                "deadzone must be in [0.0, 1.0), got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    /// Returns the configured threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Applies the deadzone to a normalized axis value.
    ///
    /// Input is clamped to -1.0 to 1.0 first; NaN reads as centered.
    #[must_use]
    pub fn apply(&self, value: f32) -> f32 {
        if value.is_nan() {
            return 0.0;
        }

        let value = value.clamp(-1.0, 1.0);
        let magnitude = value.abs();

        if magnitude < self.threshold {
            0.0
        } else {
            value.signum() * (magnitude - self.threshold) / (1.0 - self.threshold)
        }
    }
}

/// Raw axis range reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    min: i32,
    max: i32,
}

impl AxisRange {
    /// Xbox controllers report sticks as signed 16-bit values
    pub const XBOX: Self = Self { min: -32768, max: 32767 };

    /// # Errors
    ///
    /// Returns [`JoydriveError::InvalidConfig`] unless `min < max`.
    pub fn new(min: i32, max: i32) -> Result<Self> {
        if min >= max {
            return Err(JoydriveError::invalid_config("axis_min must be less than axis_max"));
        }
        Ok(Self { min, max })
    }

    /// Raw value of a centered stick
    #[must_use]
    pub fn center(&self) -> i32 {
        ((self.min as i64 + self.max as i64) / 2) as i32
    }

    /// Converts a raw value to -1.0 to 1.0; values outside the range are clamped.
    ///
    /// ```
    /// use joydrive::controller::calibration::AxisRange;
    ///
    /// let range = AxisRange::new(0, 255)?;
    /// assert!((range.normalize(0) + 1.0).abs() < 1e-6);
    /// assert!((range.normalize(255) - 1.0).abs() < 1e-6);
    /// # Ok::<(), joydrive::error::JoydriveError>(())
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: i32) -> f32 {
        let span = (self.max as f64) - (self.min as f64);
        let offset = (raw as f64) - (self.min as f64);
        ((2.0 * offset / span) - 1.0).clamp(-1.0, 1.0) as f32
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::XBOX
    }
}

/// Full stick pipeline: normalize, orient, filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickCalibration {
    range: AxisRange,
    deadzone: Deadzone,
    invert_y: bool,
}

impl StickCalibration {
    #[must_use]
    pub fn new(range: AxisRange, deadzone: Deadzone, invert_y: bool) -> Self {
        Self {
            range,
            deadzone,
            invert_y,
        }
    }

    /// Builds the stick pipeline from the `[controller]` section.
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::InvalidConfig`] for a bad deadzone or axis range.
    pub fn from_config(config: &ControllerConfig) -> Result<Self> {
        Ok(Self::new(
            AxisRange::new(config.axis_min, config.axis_max)?,
            Deadzone::new(config.deadzone)?,
            config.invert_y,
        ))
    }

    #[must_use]
    pub fn range(&self) -> AxisRange {
        self.range
    }

    #[must_use]
    pub fn deadzone(&self) -> Deadzone {
        self.deadzone
    }

    /// Converts raw stick readings into a filtered vector.
    ///
    /// evdev reports Y growing downwards; with `invert_y` set, pushing the
    /// stick up yields a positive `y`.
    #[must_use]
    pub fn apply(&self, raw_x: i32, raw_y: i32) -> AxisVector {
        let x = self.range.normalize(raw_x);
        let mut y = self.range.normalize(raw_y);
        if self.invert_y {
            y = -y;
        }

        AxisVector::new(self.deadzone.apply(x), self.deadzone.apply(y))
    }
}
