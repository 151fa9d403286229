//! # Render Module
//!
//! Terminal view of the stick, the wheel duties and the interlock.
//!
//! The renderer only ever sees a [`RenderView`] snapshot built by the tick
//! loop; it never touches motor I/O.
//!
//! ## Layout
//!
//! ```text
//! ┌ title ──────────────────────────────────────────────┐
//! │ ┌ Left stick ──────────────┐ ┌ Readouts ───────────┐ │
//! │ │        circle +          │ │ X / Y / magnitude   │ │
//! │ │     crosshair + arrow    │ │ controller / motors │ │
//! │ │                          │ │ interlock           │ │
//! │ │                          │ ├ Left ───────────────┤ │
//! │ │                          │ ├ Right ──────────────┤ │
//! │ └──────────────────────────┘ └─────────────────────┘ │
//! └ key help ───────────────────────────────────────────┘
//! ```

pub mod arrow;

use std::io::{self, Stdout};

use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine};
use ratatui::widgets::{Block, Gauge, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::debug;

use crate::config::DisplayConfig;
use crate::controller::calibration::AxisVector;
use crate::drive::mixer::WheelCommand;
use crate::drive::safety::LatchState;
use crate::error::Result;
use crate::motor::worker::LinkState;
use arrow::{arrow_geometry, canvas_bounds, ARROW_MAX_LENGTH};

const PANEL_WIDTH: u16 = 36;
const ARROW_COLOR: Color = Color::LightRed;
const GUIDE_COLOR: Color = Color::DarkGray;
const KEY_HELP: &str = "Space/B/Guide: stop   r/Start: release   q/Esc: quit";

/// Whether duty commands reach the motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    VisualizationOnly,
    Drive(LinkState),
}

/// Snapshot of everything one frame draws.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    pub axes: AxisVector,
    /// Mixer output, before the interlock
    pub command: WheelCommand,
    pub max_speed: f32,
    pub latch: LatchState,
    pub link: LinkMode,
    /// Connected controller name
    pub controller: Option<String>,
}

impl RenderView {
    fn stopped(&self) -> bool {
        self.latch != LatchState::Running
    }
}

/// Fill ratio for a duty gauge, always within 0.0 to 1.0.
#[must_use]
pub fn duty_ratio(duty: f32, max_speed: f32) -> f64 {
    if !duty.is_finite() || max_speed.is_nan() || max_speed <= 0.0 {
        return 0.0;
    }
    f64::from(duty.abs() / max_speed).clamp(0.0, 1.0)
}

/// Gauge colour: green forward, red reverse, grey while stopped.
#[must_use]
pub fn duty_color(duty: f32, stopped: bool) -> Color {
    if stopped {
        Color::DarkGray
    } else if duty < 0.0 {
        Color::Red
    } else {
        Color::Green
    }
}

/// Restores the terminal when dropped, including during a panic unwind.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self;
        execute!(io::stdout(), EnterAlternateScreen, Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
    }
}

/// Draws [`RenderView`]s into a ratatui terminal.
pub struct Renderer<B: Backend> {
    terminal: Terminal<B>,
    max_width: u16,
    max_height: u16,
    // Dropped after the terminal
    _guard: Option<TerminalGuard>,
}

impl Renderer<CrosstermBackend<Stdout>> {
    /// Switches stdout to raw mode and the alternate screen.
    ///
    /// # Errors
    ///
    /// Returns [`JoydriveError::Io`](crate::error::JoydriveError::Io) if the
    /// terminal cannot be set up; any partial setup is undone.
    pub fn new_terminal(display_config: &DisplayConfig) -> Result<Self> {
        let guard = TerminalGuard::enter()?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        let (max_width, max_height) = (display_config.width, display_config.height);
        debug!("Terminal renderer ready ({}x{} cells)", max_width, max_height);

        Ok(Self {
            terminal,
            max_width,
            max_height,
            _guard: Some(guard),
        })
    }
}

impl<B: Backend> Renderer<B> {
    /// Renderer over any backend, leaving terminal modes untouched.
    pub fn with_backend(backend: B, display_config: &DisplayConfig) -> Result<Self> {
        Ok(Self {
            terminal: Terminal::new(backend)?,
            max_width: display_config.width,
            max_height: display_config.height,
            _guard: None,
        })
    }

    pub fn draw(&mut self, view: &RenderView) -> Result<()> {
        let (max_width, max_height) = (self.max_width, self.max_height);
        self.terminal.draw(|frame| {
            let area = frame.area();
            let area = Rect::new(
                area.x,
                area.y,
                area.width.min(max_width),
                area.height.min(max_height),
            );
            draw_view(frame, area, view);
        })?;
        Ok(())
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

fn draw_view(frame: &mut Frame, area: Rect, view: &RenderView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    frame.render_widget(title(view), rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(PANEL_WIDTH)])
        .split(rows[1]);

    draw_stick(frame, columns[0], view.axes);
    draw_panel(frame, columns[1], view);

    frame.render_widget(
        Paragraph::new(KEY_HELP).style(Style::default().fg(Color::Gray)),
        rows[2],
    );
}

fn title(view: &RenderView) -> Paragraph<'static> {
    let mode = match view.link {
        LinkMode::VisualizationOnly => "visualization",
        LinkMode::Drive(_) => "drive",
    };
    Paragraph::new(format!("Joydrive - Xbox left stick [{}]", mode))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
}

fn draw_stick(frame: &mut Frame, area: Rect, axes: AxisVector) {
    let (x_bounds, y_bounds) = canvas_bounds(area);
    let arrow = arrow_geometry(axes);

    let canvas = Canvas::default()
        .block(Block::bordered().title("Left stick"))
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(move |ctx| {
            ctx.draw(&Circle {
                x: 0.0,
                y: 0.0,
                radius: ARROW_MAX_LENGTH,
                color: GUIDE_COLOR,
            });
            ctx.draw(&CanvasLine {
                x1: -ARROW_MAX_LENGTH,
                y1: 0.0,
                x2: ARROW_MAX_LENGTH,
                y2: 0.0,
                color: GUIDE_COLOR,
            });
            ctx.draw(&CanvasLine {
                x1: 0.0,
                y1: -ARROW_MAX_LENGTH,
                x2: 0.0,
                y2: ARROW_MAX_LENGTH,
                color: GUIDE_COLOR,
            });

            if let Some(arrow) = arrow {
                let segments = [
                    ((0.0, 0.0), arrow.tip),
                    (arrow.tip, arrow.head_left),
                    (arrow.tip, arrow.head_right),
                    (arrow.head_left, arrow.head_right),
                ];
                for ((x1, y1), (x2, y2)) in segments {
                    ctx.draw(&CanvasLine {
                        x1,
                        y1,
                        x2,
                        y2,
                        color: ARROW_COLOR,
                    });
                }
            }
        });

    frame.render_widget(canvas, area);
}

fn draw_panel(frame: &mut Frame, area: Rect, view: &RenderView) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new(readouts(view)).block(Block::bordered().title("Readouts")),
        sections[0],
    );

    let stopped = view.stopped();
    frame.render_widget(
        duty_gauge("Left", view.command.left, view.max_speed, stopped),
        sections[1],
    );
    frame.render_widget(
        duty_gauge("Right", view.command.right, view.max_speed, stopped),
        sections[2],
    );
}

fn readouts(view: &RenderView) -> Vec<Line<'static>> {
    let axes = view.axes;
    let mut lines = vec![
        Line::from(format!("X:         {:>7.3}", axes.x)),
        Line::from(format!("Y:         {:>7.3}", axes.y)),
        Line::from(format!("Magnitude: {:>7.3}", axes.magnitude())),
        Line::from(format!("Angle:     {:>7.1}°", axes.angle_degrees())),
    ];

    lines.push(match &view.controller {
        Some(name) => Line::from(format!("Controller: {}", name)),
        None => Line::from(vec![
            Span::raw("Controller: "),
            Span::styled("searching...", Style::default().fg(Color::Yellow)),
        ]),
    });

    let (link_text, link_color) = match view.link {
        LinkMode::VisualizationOnly => ("VISUALIZATION ONLY", Color::Yellow),
        LinkMode::Drive(LinkState::Healthy) => ("DRIVE", Color::Green),
        LinkMode::Drive(LinkState::Faulted) => ("DRIVE (link fault)", Color::Red),
    };
    lines.push(Line::from(vec![
        Span::raw("Motors: "),
        Span::styled(link_text, Style::default().fg(link_color)),
    ]));

    match view.latch {
        LatchState::Running => lines.push(Line::from(vec![
            Span::raw("Interlock: "),
            Span::styled("RUNNING", Style::default().fg(Color::Green)),
        ])),
        LatchState::Stopped(reason) => {
            lines.push(Line::from(vec![
                Span::raw("Interlock: "),
                Span::styled(
                    "STOPPED",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::from(format!("  reason: {}", reason)));
        }
    }

    lines
}

fn duty_gauge(title: &'static str, duty: f32, max_speed: f32, stopped: bool) -> Gauge<'static> {
    let label = if stopped {
        format!("{:+.2} (stopped)", duty)
    } else {
        format!("{:+.2}", duty)
    };

    Gauge::default()
        .block(Block::bordered().title(title))
        .gauge_style(Style::default().fg(duty_color(duty, stopped)))
        .ratio(duty_ratio(duty, max_speed))
        .label(label)
}
