//! # Gamepad Module
//!
//! Detects, opens and reads an Xbox-style game controller through the Linux
//! evdev interface.
//!
//! ## Controller Detection
//!
//! With no explicit device path, every `/dev/input/event*` node is probed and
//! the first one that looks like a gamepad is used. A device counts as a
//! gamepad when it reports:
//! - absolute axes ABS_X and ABS_Y (left stick)
//! - the BTN_SOUTH key (A button)
//!
//! Devices from Microsoft (vendor ID 0x045e) win over other gamepads.

use evdev::{AbsoluteAxisType, Device, EventStream, InputEvent, Key};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{JoydriveError, Result};

/// Microsoft vendor ID (Xbox controllers)
const MICROSOFT_VENDOR_ID: u16 = 0x045e;

/// Directory scanned for input devices
const INPUT_DIR: &str = "/dev/input";

/// An open game controller delivering events asynchronously.
pub struct Gamepad {
    stream: EventStream,
    device_path: String,
    name: String,
}

impl std::fmt::Debug for Gamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gamepad")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Gamepad {
    /// Open the controller at `device_path`, or auto-detect when it is empty
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: auto-detection found no gamepad
    /// - `Controller`: the device could not be opened or registered
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joydrive::controller::gamepad::Gamepad;
    ///
    /// # async fn run() -> joydrive::error::Result<()> {
    /// let gamepad = Gamepad::open("")?;
    /// println!("Connected to {} at {}", gamepad.name(), gamepad.device_path());
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(device_path: &str) -> Result<Self> {
        let path = if device_path.is_empty() {
            Self::detect()?
        } else {
            PathBuf::from(device_path)
        };

        Self::open_path(&path)
    }

    /// Open a specific event device
    pub fn open_path(path: &Path) -> Result<Self> {
        let device = Device::open(path).map_err(|e| {
            JoydriveError::Controller(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let name = device.name().unwrap_or("Unknown controller").to_string();
        let device_path = path.to_string_lossy().to_string();

        let stream = device.into_event_stream().map_err(|e| {
            JoydriveError::Controller(format!("Failed to stream events from {}: {}", device_path, e))
        })?;

        info!("Controller connected: {} at {}", name, device_path);

        Ok(Self {
            stream,
            device_path,
            name,
        })
    }

    /// Scan `/dev/input` for the best gamepad candidate
    fn detect() -> Result<PathBuf> {
        let input_dir = Path::new(INPUT_DIR);

        if !input_dir.exists() {
            return Err(JoydriveError::Controller(format!(
                "{} directory not found",
                INPUT_DIR
            )));
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(input_dir)
            .map_err(|e| JoydriveError::Controller(format!("Failed to read {}: {}", INPUT_DIR, e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().starts_with("event"))
                    .unwrap_or(false)
            })
            .collect();

        // Deterministic choice when several controllers are connected
        entries.sort();

        let mut fallback = None;

        for path in entries {
            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );

                    if !is_gamepad(&device) {
                        continue;
                    }

                    if id.vendor() == MICROSOFT_VENDOR_ID {
                        return Ok(path);
                    }

                    if fallback.is_none() {
                        fallback = Some(path);
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        fallback.ok_or(JoydriveError::ControllerNotFound)
    }

    /// Wait for the next input event
    ///
    /// Cancel-safe: events already read from the device stay buffered in the
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns `Controller` when reading fails, typically because the
    /// controller was unplugged or powered off.
    pub async fn next_event(&mut self) -> Result<InputEvent> {
        self.stream.next_event().await.map_err(|e| {
            JoydriveError::Controller(format!("Failed to read {}: {}", self.device_path, e))
        })
    }

    /// Get the device path of this controller
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Human-readable device name, e.g. "Microsoft X-Box One S pad"
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Whether a device exposes a left stick and an A button
fn is_gamepad(device: &Device) -> bool {
    let has_stick = device
        .supported_absolute_axes()
        .map(|axes| axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y))
        .unwrap_or(false);

    let has_button = device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_SOUTH))
        .unwrap_or(false);

    has_stick && has_button
}
