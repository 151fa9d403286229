//! # Application Loop
//!
//! Fixed-tick scheduler tying the controller, mixer, interlock, motor worker
//! and renderer together.
//!
//! ## Tick
//!
//! ```text
//! keyboard → gamepad state → calibration → mixer → publish → render
//! ```
//!
//! Controller events and reconnect attempts are serviced between ticks by the
//! same `select!`, so all state lives on one task and needs no locking. Only
//! the [`SafetyLatch`] and the command slot are shared with the motor worker.

use std::future::Future;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use evdev::InputEvent;
use ratatui::backend::Backend;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::{Config, MotorsConfig};
use crate::controller::calibration::{AxisVector, StickCalibration};
use crate::controller::gamepad::Gamepad;
use crate::controller::mapper::{ControlEvent, EventMapper};
use crate::drive::mixer::{DriveMixer, Side, WheelCommand};
use crate::drive::safety::{SafetyLatch, StopReason};
use crate::error::{JoydriveError, Result};
use crate::motor::vesc_link::{LinkSettings, VescLink};
use crate::motor::worker::{MotorWorker, MotorWorkerHandle, WorkerTiming};
use crate::motor::MotorLink;
use crate::render::{LinkMode, RenderView, Renderer};

/// Number of ticks between status log lines (5 seconds at 60 Hz)
pub const LOG_INTERVAL_TICKS: u64 = 300;

/// What a key press asks the application to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    EmergencyStop,
    Release,
    Quit,
}

/// Maps a terminal key press to an action.
///
/// Space stops, `r` releases, and `q`, Esc or Ctrl+C quit.
#[must_use]
pub fn key_action(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Char(' ') => Some(KeyAction::EmergencyStop),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(KeyAction::Release),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(KeyAction::Quit),
        _ => None,
    }
}

pub struct App {
    config: Config,
    calibration: StickCalibration,
    mixer: DriveMixer,
    latch: SafetyLatch,
    mapper: EventMapper,
    gamepad: Option<Gamepad>,
    motors: Option<MotorWorkerHandle>,
    tick_count: u64,
    quit: bool,
}

impl App {
    /// Builds the input and drive pipeline without touching any device.
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let calibration = StickCalibration::from_config(&config.controller)?;
        let mixer = DriveMixer::from_config(&config.drive)?;

        Ok(Self {
            mapper: EventMapper::with_center(calibration.range().center()),
            calibration,
            mixer,
            latch: SafetyLatch::new(),
            gamepad: None,
            motors: None,
            tick_count: 0,
            quit: false,
            config,
        })
    }

    /// Builds the app, opens the motor links and looks for a controller.
    ///
    /// Missing hardware degrades instead of failing: without both motor links
    /// the app runs visualization-only, and without a controller it keeps
    /// retrying from the run loop.
    pub async fn connect(config: Config, visualize_only: bool) -> Result<Self> {
        let mut app = Self::new(config)?;

        if visualize_only || !app.config.motors.enabled {
            info!("Motor output disabled, running visualization only");
        } else if let Some((left, right)) = open_links(&app.config.motors).await {
            app.attach_motors(left, right);
        }

        if !app.try_connect_controller() {
            info!(
                "Waiting for controller (retrying every {} ms)",
                app.config.controller.reconnect_interval_ms
            );
        }

        Ok(app)
    }

    /// Hands both links to a new motor worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach_motors(&mut self, left: Box<dyn MotorLink>, right: Box<dyn MotorLink>) {
        let timing = WorkerTiming::from_config(&self.config.motors);
        self.motors = Some(MotorWorker::spawn(left, right, self.latch.clone(), timing));
    }

    #[must_use]
    pub fn latch(&self) -> &SafetyLatch {
        &self.latch
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Runs one tick and returns what to draw.
    ///
    /// In visualization-only mode the mixer output goes no further than the
    /// returned view.
    pub fn tick(&mut self) -> RenderView {
        self.tick_count += 1;

        let state = self.mapper.state();
        let axes = self.calibration.apply(state.left_stick_x, state.left_stick_y);
        let command = self.mixer.mix_axes(axes);

        if let Some(motors) = &self.motors {
            motors.publish(command);
        }

        trace!(
            "Left stick - X: {:6.3}, Y: {:6.3}, Magnitude: {:6.3}, Angle: {:6.1}°",
            axes.x,
            axes.y,
            axes.magnitude(),
            axes.angle_degrees()
        );

        if self.tick_count % LOG_INTERVAL_TICKS == 0 {
            info!(
                "Tick {}: stick ({:.3}, {:.3}), duty L {:+.3} R {:+.3}, interlock {:?}",
                self.tick_count,
                axes.x,
                axes.y,
                command.left,
                command.right,
                self.latch.state()
            );
        }

        self.view(axes, command)
    }

    fn view(&self, axes: AxisVector, command: WheelCommand) -> RenderView {
        RenderView {
            axes,
            command,
            max_speed: self.mixer.max_speed(),
            latch: self.latch.state(),
            link: match &self.motors {
                Some(motors) => LinkMode::Drive(motors.link_state()),
                None => LinkMode::VisualizationOnly,
            },
            controller: self.gamepad.as_ref().map(|gamepad| gamepad.name().to_string()),
        }
    }

    /// Folds one controller event into the stick state.
    pub fn handle_controller_event(&mut self, event: &InputEvent) {
        match self.mapper.process_event(event) {
            Some(ControlEvent::EmergencyStop) => {
                self.latch.engage(StopReason::Button);
            }
            Some(ControlEvent::Release) => {
                self.latch.release();
            }
            None => {}
        }
    }

    /// Stops the motors and forgets the controller after a read failure.
    pub fn handle_controller_lost(&mut self, error: JoydriveError) {
        warn!("Controller lost: {}", error);
        self.latch.engage(StopReason::ControllerLost);
        self.gamepad = None;
        self.mapper.reset();
    }

    pub fn handle_key(&mut self, action: KeyAction) {
        match action {
            KeyAction::EmergencyStop => {
                self.latch.engage(StopReason::Key);
            }
            KeyAction::Release => {
                self.latch.release();
            }
            KeyAction::Quit => {
                info!("Quit requested");
                self.quit = true;
            }
        }
    }

    /// Tries to open the configured controller. Returns `true` on success.
    ///
    /// A reconnect never releases the interlock.
    pub fn try_connect_controller(&mut self) -> bool {
        match Gamepad::open(&self.config.controller.device_path) {
            Ok(gamepad) => {
                self.mapper.reset();
                self.gamepad = Some(gamepad);
                true
            }
            Err(e) => {
                debug!("Controller not available: {}", e);
                false
            }
        }
    }

    /// Runs until the user quits or SIGINT, SIGTERM or SIGHUP arrives, then
    /// stops the motors.
    pub async fn run<B: Backend>(&mut self, renderer: &mut Renderer<B>) -> Result<()> {
        match ShutdownSignals::new() {
            Ok(mut signals) => self.run_until(renderer, signals.recv()).await,
            Err(e) => {
                self.shutdown().await;
                Err(e)
            }
        }
    }

    /// Runs until the user quits or `stop` resolves with the name of what
    /// stopped it.
    ///
    /// The final zero-duty write happens on every exit path, including a
    /// rendering or keyboard error.
    pub async fn run_until<B, F>(&mut self, renderer: &mut Renderer<B>, stop: F) -> Result<()>
    where
        B: Backend,
        F: Future<Output = &'static str>,
    {
        let result = self.run_loop(renderer, stop).await;
        self.shutdown().await;
        result
    }

    async fn run_loop<B, F>(&mut self, renderer: &mut Renderer<B>, stop: F) -> Result<()>
    where
        B: Backend,
        F: Future<Output = &'static str>,
    {
        let tick_rate_hz = self.config.display.tick_rate_hz;
        let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(tick_rate_hz)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut reconnect =
            interval(Duration::from_millis(self.config.controller.reconnect_interval_ms));
        reconnect.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; connect already tried once
        reconnect.tick().await;

        tokio::pin!(stop);

        info!("Starting control loop at {}Hz", tick_rate_hz);

        while !self.quit {
            let waiting_for_controller = self.gamepad.is_none();

            tokio::select! {
                biased;

                name = &mut stop => {
                    info!("Received {}, shutting down...", name);
                    break;
                }

                _ = ticker.tick() => {
                    self.poll_keyboard()?;
                    let view = self.tick();
                    renderer.draw(&view)?;
                }

                event = next_input(&mut self.gamepad) => match event {
                    Ok(event) => self.handle_controller_event(&event),
                    Err(e) => self.handle_controller_lost(e),
                },

                _ = reconnect.tick(), if waiting_for_controller => {
                    self.try_connect_controller();
                }
            }
        }

        Ok(())
    }

    fn poll_keyboard(&mut self) -> Result<()> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = key_action(&key) {
                    self.handle_key(action);
                }
            }
        }
        Ok(())
    }

    /// Latches the stop for good and waits for the worker to zero the motors.
    pub async fn shutdown(&mut self) {
        self.latch.engage(StopReason::Shutdown);

        if let Some(motors) = self.motors.take() {
            motors.shutdown().await;
        }

        info!("Stopped after {} ticks", self.tick_count);
    }
}

/// Termination signals that end the program through [`App::shutdown`].
///
/// Raw mode swallows Ctrl+C as a key, so SIGINT usually comes from `kill`.
/// SIGHUP arrives when the SSH session drops.
pub struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
    hangup: Signal,
}

impl ShutdownSignals {
    /// Installs the handlers. From here on these signals no longer kill the
    /// process.
    pub fn new() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Waits for the next signal and returns its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
        }
    }
}

/// Resolves with the next controller event, or never without a controller.
async fn next_input(gamepad: &mut Option<Gamepad>) -> Result<InputEvent> {
    match gamepad {
        Some(gamepad) => gamepad.next_event().await,
        None => std::future::pending().await,
    }
}

/// Opens both VESC links, or neither.
///
/// If only one side opens it is sent a zero duty and closed again.
async fn open_links(config: &MotorsConfig) -> Option<(Box<dyn MotorLink>, Box<dyn MotorLink>)> {
    let left = VescLink::open(Side::Left, LinkSettings::from_config(config, Side::Left));
    let right = VescLink::open(Side::Right, LinkSettings::from_config(config, Side::Right));

    match (left, right) {
        (Ok(left), Ok(right)) => Some((Box::new(left), Box::new(right))),
        (left, right) => {
            for result in [left, right] {
                match result {
                    Ok(mut link) => {
                        if let Err(e) = link.set_duty(0.0).await {
                            warn!("{}", e);
                        }
                        info!("Closed {} motor link", link.name());
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            warn!("Motor links unavailable, running visualization only");
            None
        }
    }
}
