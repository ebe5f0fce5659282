use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use clap::Parser;
use console_grid::demo::{GameStatus, SnakeDemo};
use console_grid::input::{GameInput, poll_input};
use console_grid::terminal_runtime::{TerminalSession, install_panic_hook};
use console_grid::{Engine, EngineConfig, EngineError};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_TICK_INTERVAL_MS: u64 = 150;
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(version, about = "Snake on a minimal terminal-grid engine")]
struct Cli {
    /// Map width in cells; overrides the config file.
    #[arg(long)]
    width: Option<u16>,

    /// Map height in cells; overrides the config file.
    #[arg(long)]
    height: Option<u16>,

    /// Border thickness in cells; overrides the config file.
    #[arg(long)]
    border: Option<u16>,

    /// Window title; overrides the config file.
    #[arg(long)]
    title: Option<String>,

    /// Path to a JSON config file (defaults to the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file; the terminal itself is never logged to.
    #[arg(long)]
    log: Option<PathBuf>,

    /// Seed for food placement.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Milliseconds between snake steps.
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    tick_ms: u64,
}

fn main() -> Result<(), EngineError> {
    let cli = Cli::parse();
    if let Some(path) = cli.log.as_deref() {
        init_logging(path)?;
    }

    let config = build_config(&cli)?;
    install_panic_hook();

    let score = run(config, &cli)?;
    println!("Final score: {score}");
    Ok(())
}

fn run(config: EngineConfig, cli: &Cli) -> Result<u32, EngineError> {
    let session = TerminalSession::enter(config.title.as_deref())?;
    let engine = Engine::init(config, session.surface())?;
    let mut demo = SnakeDemo::new_with_seed(engine.render_loop(), cli.seed)?;

    engine.start()?;

    let tick_interval = Duration::from_millis(cli.tick_ms.max(1));
    let mut last_tick = Instant::now();
    loop {
        if let Some(input) = poll_input(INPUT_POLL_INTERVAL)? {
            if input == GameInput::Quit {
                break;
            }
            demo.apply_input(input);
        }

        if last_tick.elapsed() >= tick_interval {
            demo.tick()?;
            last_tick = Instant::now();
        }

        if matches!(demo.status, GameStatus::GameOver | GameStatus::Victory) {
            info!(score = demo.score, status = ?demo.status, "session finished");
            break;
        }
    }

    let score = demo.score;
    drop(demo);
    engine.stop(true)?;
    drop(session);

    Ok(score)
}

fn build_config(cli: &Cli) -> Result<EngineConfig, EngineError> {
    let mut config = match cli.config.as_deref() {
        Some(path) => EngineConfig::load_from_path(path)?,
        None => EngineConfig::load()?,
    };

    if cli.width.is_some() || cli.height.is_some() {
        let width = cli.width.unwrap_or(config.grid.width);
        let height = cli.height.unwrap_or(config.grid.height);
        config = config.with_grid(width, height)?;
    }
    if let Some(border) = cli.border {
        config = config.with_border(border);
    }
    if let Some(title) = cli.title.as_deref() {
        config = config.with_title(title);
    }

    Ok(config)
}

fn init_logging(path: &Path) -> Result<(), EngineError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
