//! # Drive Mixer Module
//!
//! Maps a forward/turn pair onto left and right wheel duty cycles.
//!
//! ## Formula
//!
//! ```text
//! left  = clamp(forward + turn, -1, 1) * max_speed * speed_multiplier
//! right = clamp(forward - turn, -1, 1) * max_speed * speed_multiplier
//! ```
//!
//! ## Sign Convention
//!
//! | Input | Meaning |
//! |-------|---------|
//! | forward > 0 | Stick pushed up, robot drives forward |
//! | turn > 0 | Stick pushed right, robot turns right (clockwise) |
//!
//! A right turn speeds up the left wheel and slows the right one; full right
//! with no forward input spins in place.
//!
//! ## Usage
//!
//! ```
//! use joydrive::drive::mixer::DriveMixer;
//!
//! let mixer = DriveMixer::new(0.8, 1.0)?;
//! let command = mixer.mix(0.0, 1.0);
//!
//! assert!((command.left - 0.8).abs() < 1e-6);
//! assert!((command.right + 0.8).abs() < 1e-6);
//! # Ok::<(), joydrive::error::JoydriveError>(())
//! ```

use crate::config::DriveConfig;
use crate::controller::calibration::AxisVector;
use crate::error::{JoydriveError, Result};
use crate::vesc::protocol::VESC_MAX_SAFE_DUTY;

/// One side of the drivetrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Duty cycle pair for the two wheels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelCommand {
    pub left: f32,
    pub right: f32,
}

impl WheelCommand {
    /// Both wheels at zero duty
    pub const STOP: Self = Self { left: 0.0, right: 0.0 };

    #[must_use]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Duty for one side
    #[must_use]
    pub fn side(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Differential-drive mixer with validated speed limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveMixer {
    max_speed: f32,
    speed_multiplier: f32,
}

impl DriveMixer {
    /// Creates a mixer.
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::InvalidConfig`] unless `max_speed` is in
    /// (0.0, [`VESC_MAX_SAFE_DUTY`]] and `speed_multiplier` is in (0.0, 1.0].
    pub fn new(max_speed: f32, speed_multiplier: f32) -> Result<Self> {
        if !(max_speed > 0.0 && max_speed <= VESC_MAX_SAFE_DUTY) {
            return Err(JoydriveError::invalid_config(format!(
                "max_speed must be in (0.0, {}], got {}",
                VESC_MAX_SAFE_DUTY, max_speed
            )));
        }

        if !(speed_multiplier > 0.0 && speed_multiplier <= 1.0) {
            return Err(JoydriveError::invalid_config(format!(
                "speed_multiplier must be in (0.0, 1.0], got {}",
                speed_multiplier
            )));
        }

        Ok(Self {
            max_speed,
            speed_multiplier,
        })
    }

    /// Creates a mixer from the `[drive]` section.
    pub fn from_config(config: &DriveConfig) -> Result<Self> {
        Self::new(config.max_speed, config.speed_multiplier)
    }

    #[must_use]
    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    /// Largest duty magnitude this mixer can produce
    #[must_use]
    pub fn output_limit(&self) -> f32 {
        self.max_speed * self.speed_multiplier
    }

    /// Mixes forward and turn inputs into wheel duty cycles.
    ///
    /// Inputs outside -1.0 to 1.0 are clamped and NaN reads as zero, so the
    /// output never leaves ±[`output_limit`](Self::output_limit).
    #[must_use]
    pub fn mix(&self, forward: f32, turn: f32) -> WheelCommand {
        let forward = sanitize(forward);
        let turn = sanitize(turn);
        let scale = self.output_limit();

        WheelCommand {
            left: (forward + turn).clamp(-1.0, 1.0) * scale,
            right: (forward - turn).clamp(-1.0, 1.0) * scale,
        }
    }

    /// Mixes a stick vector: `y` drives forward, `x` turns.
    #[must_use]
    pub fn mix_axes(&self, axes: AxisVector) -> WheelCommand {
        self.mix(axes.y, axes.x)
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn mixer() -> DriveMixer {
        DriveMixer::new(0.8, 1.0).unwrap()
    }

    fn assert_command(command: WheelCommand, left: f32, right: f32) {
        assert!(
            (command.left - left).abs() < EPSILON && (command.right - right).abs() < EPSILON,
            "expected ({}, {}), got {:?}",
            left,
            right,
            command
        );
    }

    #[test]
    fn test_full_forward() {
        assert_command(mixer().mix(1.0, 0.0), 0.8, 0.8);
    }

    #[test]
    fn test_full_reverse() {
        assert_command(mixer().mix(-1.0, 0.0), -0.8, -0.8);
    }

    #[test]
    fn test_pure_right_turn_spins_in_place() {
        assert_command(mixer().mix(0.0, 1.0), 0.8, -0.8);
    }

    #[test]
    fn test_pure_left_turn_spins_in_place() {
        assert_command(mixer().mix(0.0, -1.0), -0.8, 0.8);
    }

    #[test]
    fn test_centered_is_stop() {
        assert!(mixer().mix(0.0, 0.0).is_stop());
    }

    #[test]
    fn test_forward_right_saturates_left() {
        // f + t = 1.5 clamps to 1.0, f - t = 0.5
        assert_command(mixer().mix(1.0, 0.5), 0.8, 0.4);
    }

    #[test]
    fn test_output_bounded_over_input_grid() {
        let mixer = mixer();
        for fi in -10..=10 {
            for ti in -10..=10 {
                let command = mixer.mix(fi as f32 / 10.0, ti as f32 / 10.0);
                assert!(command.left.abs() <= 0.8 + EPSILON, "{:?}", command);
                assert!(command.right.abs() <= 0.8 + EPSILON, "{:?}", command);
            }
        }
    }

    #[test]
    fn test_out_of_range_inputs_clamped() {
        assert_command(mixer().mix(5.0, 0.0), 0.8, 0.8);
        assert_command(mixer().mix(0.0, -7.0), -0.8, 0.8);
    }

    #[test]
    fn test_nan_inputs_read_as_zero() {
        assert!(mixer().mix(f32::NAN, f32::NAN).is_stop());
        assert_command(mixer().mix(1.0, f32::NAN), 0.8, 0.8);
    }

    #[test]
    fn test_speed_multiplier_scales_output() {
        let mixer = DriveMixer::new(0.8, 0.5).unwrap();
        assert!((mixer.output_limit() - 0.4).abs() < EPSILON);
        assert_command(mixer.mix(1.0, 0.0), 0.4, 0.4);
    }

    #[test]
    fn test_mix_axes_uses_y_as_forward() {
        let command = mixer().mix_axes(AxisVector::new(0.0, 0.5));
        assert_command(command, 0.4, 0.4);

        let command = mixer().mix_axes(AxisVector::new(0.5, 0.0));
        assert_command(command, 0.4, -0.4);
    }

    #[test]
    fn test_rejects_bad_limits() {
        assert!(DriveMixer::new(0.0, 1.0).is_err());
        assert!(DriveMixer::new(-0.2, 1.0).is_err());
        assert!(DriveMixer::new(1.0, 1.0).is_err());
        assert!(DriveMixer::new(f32::NAN, 1.0).is_err());
        assert!(DriveMixer::new(0.8, 0.0).is_err());
        assert!(DriveMixer::new(0.8, 1.5).is_err());
        assert!(DriveMixer::new(VESC_MAX_SAFE_DUTY, 1.0).is_ok());
    }

    #[test]
    fn test_from_config_defaults() {
        let mixer = DriveMixer::from_config(&DriveConfig::default()).unwrap();
        assert!((mixer.max_speed() - 0.8).abs() < EPSILON);
    }

    #[test]
    fn test_wheel_command_side_access() {
        let command = WheelCommand::new(0.3, -0.2);
        assert_eq!(command.side(Side::Left), 0.3);
        assert_eq!(command.side(Side::Right), -0.2);
        assert_eq!(Side::Left.name(), "left");
        assert_eq!(Side::Right.name(), "right");
    }
}
