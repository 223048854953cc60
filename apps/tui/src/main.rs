use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imagegen::{BackendFactory, Enhancer};
use jobs::JobsRuntime;
use media_io::SlideshowOptions;
use project::{AssetStore, Config, ProjectRegistry};

mod app;
mod splash;
mod theme;
mod ui;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "reelsmith")]
#[command(about = "Terminal studio for prompt-to-video slideshows")]
#[command(version)]
struct Args {
    /// Skip the startup screen.
    #[arg(long)]
    no_splash: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

/// Restores the terminal on every exit path, including panics that
/// unwind through main.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen)
            .context("failed to enter alternate screen")?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::from_env()?;
    init_logging(&config, args.verbose)?;

    let registry = ProjectRegistry::builtin();
    let store = AssetStore::from_config(&config);

    // A missing credential for the selected backend is fatal here,
    // before the terminal is taken over; the shell sees the message
    // and a non-zero exit.
    let backend = BackendFactory::create(&config, &store)?;
    let enhancer = Enhancer::from_config(&config);
    info!(backend = %backend.name(), enhancer = enhancer.is_some(), "starting");

    let handle = JobsRuntime::start(backend, enhancer, SlideshowOptions::default());
    let mut app = App::new(registry, store, handle, !args.no_splash);

    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).context("failed to init terminal")?;
    terminal.clear()?;

    app.run(&mut terminal)?;
    Ok(())
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {:?}", config.data_dir))?;
    let log_path = config.data_dir.join("reelsmith.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {log_path:?}"))?;

    let default = if verbose || config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
