//! # Controller Input Mapper Module
//!
//! This module folds raw evdev events from an Xbox-style controller into a
//! structured [`GamepadState`] and surfaces the safety buttons as
//! [`ControlEvent`]s.
//!
//! ## Axis Codes (EV_ABS)
//!
//! | Axis | evdev Code | Use |
//! |------|------------|-----|
//! | Left Stick X | ABS_X | Turn |
//! | Left Stick Y | ABS_Y | Forward (inverted) |
//!
//! ## Button Codes (EV_KEY)
//!
//! | Button | evdev Code | Function |
//! |--------|------------|----------|
//! | A | BTN_SOUTH | - |
//! | B | BTN_EAST | Emergency stop |
//! | X | BTN_WEST / BTN_NORTH | - |
//! | Y | BTN_NORTH / BTN_WEST | - |
//! | Guide | BTN_MODE | Emergency stop |
//! | Start | BTN_START | Release stop |
//! | Back | BTN_SELECT | - |
//!
//! The xpad driver swaps the codes reported for X and Y depending on kernel
//! version, so neither carries a function here.
//!
//! ## Usage
//!
//! ```no_run
//! use joydrive::controller::gamepad::Gamepad;
//! use joydrive::controller::mapper::EventMapper;
//!
//! # async fn run() -> joydrive::error::Result<()> {
//! let mut gamepad = Gamepad::open("")?;
//! let mut mapper = EventMapper::new();
//!
//! loop {
//!     let event = gamepad.next_event().await?;
//!     if let Some(control) = mapper.process_event(&event) {
//!         println!("{:?}", control);
//!     }
//!     let state = mapper.state();
//!     // Use state for drive mixing...
//! }
//! # }
//! ```

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};
use tracing::debug;

/// evdev key value for a press (0 = release, 2 = autorepeat)
const KEY_PRESSED: i32 = 1;

/// Safety actions requested from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// B or Guide pressed
    EmergencyStop,
    /// Start pressed
    Release,
}

/// Current state of the controller inputs the drive uses.
///
/// Stick values are raw evdev values; normalization happens in
/// [`calibration`](super::calibration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadState {
    /// Left stick X axis, raw. Larger is further right.
    pub left_stick_x: i32,
    /// Left stick Y axis, raw. Larger is further down.
    pub left_stick_y: i32,

    /// B button - BTN_EAST.
    pub btn_b: bool,
    /// Guide button - BTN_MODE.
    pub btn_guide: bool,
    /// Start button - BTN_START.
    pub btn_start: bool,
}

impl GamepadState {
    /// State with both stick axes at `center` and all buttons released.
    #[must_use]
    pub fn centered(center: i32) -> Self {
        Self {
            left_stick_x: center,
            left_stick_y: center,
            btn_b: false,
            btn_guide: false,
            btn_start: false,
        }
    }
}

impl Default for GamepadState {
    /// Centered for controllers with a signed axis range.
    fn default() -> Self {
        Self::centered(0)
    }
}

/// Parses raw evdev events and maintains controller state.
///
/// Not thread-safe; owned by the tick loop.
#[derive(Debug)]
pub struct EventMapper {
    state: GamepadState,
    center: i32,
}

impl Default for EventMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl EventMapper {
    /// Creates a mapper for a signed axis range (center 0).
    #[must_use]
    pub fn new() -> Self {
        Self::with_center(0)
    }

    /// Creates a mapper whose sticks rest at `center`.
    #[must_use]
    pub fn with_center(center: i32) -> Self {
        Self {
            state: GamepadState::centered(center),
            center,
        }
    }

    /// Returns a reference to the current controller state.
    #[must_use]
    pub fn state(&self) -> &GamepadState {
        &self.state
    }

    /// Processes a single evdev input event and updates internal state.
    ///
    /// Returns a [`ControlEvent`] when the event is a fresh press of a safety
    /// button. Autorepeat and release events never produce one.
    pub fn process_event(&mut self, event: &InputEvent) -> Option<ControlEvent> {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => {
                self.process_axis_event(axis, event.value());
                None
            }
            InputEventKind::Key(key) => self.process_key_event(key, event.value()),
            // Sync and misc events carry nothing we track
            _ => None,
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        match axis {
            AbsoluteAxisType::ABS_X => self.state.left_stick_x = value,
            AbsoluteAxisType::ABS_Y => self.state.left_stick_y = value,
            _ => {}
        }
    }

    fn process_key_event(&mut self, key: Key, value: i32) -> Option<ControlEvent> {
        let held = value != 0;
        let fresh_press = value == KEY_PRESSED;

        if fresh_press {
            debug!("Button {:?} pressed", key);
        }

        match key {
            Key::BTN_EAST => {
                self.state.btn_b = held;
                if fresh_press {
                    return Some(ControlEvent::EmergencyStop);
                }
            }
            Key::BTN_MODE => {
                self.state.btn_guide = held;
                if fresh_press {
                    return Some(ControlEvent::EmergencyStop);
                }
            }
            Key::BTN_START => {
                self.state.btn_start = held;
                if fresh_press {
                    return Some(ControlEvent::Release);
                }
            }
            _ => {}
        }

        None
    }

    /// Resets all state to centered sticks and released buttons.
    ///
    /// Called when the controller disappears so a stale deflection cannot
    /// outlive the device.
    pub fn reset(&mut self) {
        self.state = GamepadState::centered(self.center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    fn make_key_event(key: Key, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), value)
    }

    #[test]
    fn test_state_default_is_centered() {
        let state = GamepadState::default();
        assert_eq!(state.left_stick_x, 0);
        assert_eq!(state.left_stick_y, 0);
        assert!(!state.btn_b && !state.btn_guide && !state.btn_start);
    }

    #[test]
    fn test_process_left_stick() {
        let mut mapper = EventMapper::new();

        assert_eq!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, -32768)), None);
        assert_eq!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 12000)), None);

        assert_eq!(mapper.state().left_stick_x, -32768);
        assert_eq!(mapper.state().left_stick_y, 12000);
    }

    #[test]
    fn test_right_stick_and_triggers_ignored() {
        let mut mapper = EventMapper::new();

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RX, 30000));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Z, 255));

        assert_eq!(*mapper.state(), GamepadState::default());
    }

    #[test]
    fn test_b_press_is_emergency_stop() {
        let mut mapper = EventMapper::new();

        let control = mapper.process_event(&make_key_event(Key::BTN_EAST, 1));
        assert_eq!(control, Some(ControlEvent::EmergencyStop));
        assert!(mapper.state().btn_b);

        let control = mapper.process_event(&make_key_event(Key::BTN_EAST, 0));
        assert_eq!(control, None);
        assert!(!mapper.state().btn_b);
    }

    #[test]
    fn test_guide_press_is_emergency_stop() {
        let mut mapper = EventMapper::new();
        let control = mapper.process_event(&make_key_event(Key::BTN_MODE, 1));
        assert_eq!(control, Some(ControlEvent::EmergencyStop));
    }

    #[test]
    fn test_start_press_is_release() {
        let mut mapper = EventMapper::new();
        let control = mapper.process_event(&make_key_event(Key::BTN_START, 1));
        assert_eq!(control, Some(ControlEvent::Release));
        assert!(mapper.state().btn_start);
    }

    #[test]
    fn test_autorepeat_does_not_retrigger() {
        let mut mapper = EventMapper::new();
        mapper.process_event(&make_key_event(Key::BTN_START, 1));

        let control = mapper.process_event(&make_key_event(Key::BTN_START, 2));
        assert_eq!(control, None);
        assert!(mapper.state().btn_start);
    }

    #[test]
    fn test_other_buttons_have_no_control_event() {
        let mut mapper = EventMapper::new();

        assert_eq!(mapper.process_event(&make_key_event(Key::BTN_SOUTH, 1)), None);
        assert_eq!(mapper.process_event(&make_key_event(Key::BTN_SELECT, 1)), None);
        assert_eq!(mapper.process_event(&make_key_event(Key::BTN_NORTH, 1)), None);

        assert_eq!(*mapper.state(), GamepadState::default());
    }

    #[test]
    fn test_sync_events_ignored() {
        let mut mapper = EventMapper::new();
        let event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);

        assert_eq!(mapper.process_event(&event), None);
        assert_eq!(*mapper.state(), GamepadState::default());
    }

    #[test]
    fn test_reset_returns_to_configured_center() {
        let mut mapper = EventMapper::with_center(127);
        assert_eq!(mapper.state().left_stick_x, 127);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 255));
        mapper.process_event(&make_key_event(Key::BTN_EAST, 1));
        mapper.reset();

        assert_eq!(*mapper.state(), GamepadState::centered(127));
    }

    #[test]
    fn test_state_persistence_across_events() {
        let mut mapper = EventMapper::new();

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 100));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 150));
        mapper.process_event(&make_key_event(Key::BTN_START, 1));
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 200));

        let state = mapper.state();
        assert_eq!(state.left_stick_x, 200);
        assert_eq!(state.left_stick_y, 150);
        assert!(state.btn_start);
    }
}
