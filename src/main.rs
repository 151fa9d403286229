//! # Joydrive
//!
//! Drive a two-wheeled VESC robot with an Xbox controller, or just watch the
//! stick with `--visualize-only`.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load the configuration
//!    - Start file logging (the terminal belongs to the renderer)
//!    - Switch the terminal to the alternate screen
//!    - Open both motor links and look for a controller
//!
//! 2. **Main Loop** (`tick_rate_hz`, 60Hz by default)
//!    - Read keyboard and controller input
//!    - Deadzone, mix and publish the wheel command
//!    - Redraw the view
//!
//! 3. **Graceful Shutdown**
//!    - Latch the emergency stop
//!    - Send zero duty to both motors and wait for the worker
//!    - Restore the terminal
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- --config config/default.toml
//! cargo run --release -- --visualize-only
//! RUST_LOG=debug cargo run --release
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use joydrive::app::App;
use joydrive::config::Config;
use joydrive::render::Renderer;

/// Configuration file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside the log directory
const LOG_FILE_NAME: &str = "joydrive.log";

#[derive(Parser, Debug)]
#[command(version, about = "Drive a VESC robot with an Xbox controller")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Never open the motor links
    #[arg(long)]
    visualize_only: bool,

    /// Directory for log files (overrides [logging] log_dir)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(log_dir) = &args.log_dir {
        config.logging.log_dir = log_dir.to_string_lossy().to_string();
    }

    // Initialize logging; the guard flushes the file writer on exit
    let file_appender = tracing_appender::rolling::daily(&config.logging.log_dir, LOG_FILE_NAME);
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Joydrive v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut renderer =
        Renderer::new_terminal(&config.display).context("Failed to set up the terminal")?;

    let mut app = App::connect(config, args.visualize_only)
        .await
        .context("Failed to start")?;

    app.run(&mut renderer).await.context("Control loop failed")?;

    info!("Joydrive stopped");
    Ok(())
}

/// Loads `path`, falling back to built-in defaults when the default file is missing
fn load_config(path: &Path) -> Result<Config> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    Config::load(path).with_context(|| format!("Failed to load {}", path.display()))
}
