use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use serde_json::json;
use std::{
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
    sync::mpsc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tickadoro::{
    Config, CsvStore, PhaseEngine, alarm,
    app::{self, App, Notice},
    config::data_dir,
    duration, ui,
    writer::SnapshotWriter,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(author, version, about = "🍅 tickadoro - a terminal Pomodoro timer")]
struct Args {
    /// Config file (default: ~/.tickadoro.toml, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Snapshot log (default: <cache dir>/tickadoro/snapshots.csv)
    #[arg(long)]
    store: Option<PathBuf>,
    /// Log file (default: <cache dir>/tickadoro/tickadoro.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(short, long, value_parser = duration::parse_std)]
    focus: Option<Duration>,
    #[arg(short, long, value_parser = duration::parse_std)]
    short_break: Option<Duration>,
    #[arg(short, long, value_parser = duration::parse_std)]
    long_break: Option<Duration>,
    #[arg(long)]
    no_sound: bool,
    /// Ignore today's saved progress and start from the first focus phase
    #[arg(long)]
    fresh: bool,
    /// Print the state that would be resumed as JSON and exit
    #[arg(long)]
    status: bool,
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(path: &Path) -> Result<WorkerGuard> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let file_name = path.file_name().unwrap_or(OsStr::new("tickadoro.log"));

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TICKADORO_LOG").unwrap_or_else(|_| "tickadoro=info".into()),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// Load, override and validate the config. Nothing here is fatal: problems
/// come back as notices to show once the UI is up.
fn load_config(args: &Args) -> (Config, Vec<Notice>) {
    let mut notices = Vec::new();
    let (mut config, source, err) = Config::load_or_default(args.config.as_deref());
    match (source, err) {
        (_, Some(err)) => {
            error!("{err}, using defaults");
            notices.push(app::config_error_notice(&err));
        }
        (Some(path), None) => info!(path = %path.display(), "config loaded"),
        (None, None) => info!("no config file found, using defaults"),
    }

    // CLI overrides
    if let Some(d) = args.focus { config.durations.focus = d; }
    if let Some(d) = args.short_break { config.durations.short_break = d; }
    if let Some(d) = args.long_break { config.durations.long_break = d; }
    if args.no_sound { config.sound = false; }

    let issues = config.validate();
    for issue in &issues {
        warn!("{issue}");
    }
    notices.extend(app::validation_notice(&issues));
    (config, notices)
}

fn print_status(engine: &PhaseEngine, restore_error: Option<String>) -> Result<()> {
    let state = engine.state();
    let status = json!({
        "phase": state.phase,
        "n": state.n,
        "running": state.running,
        "remaining": duration::format(state.remaining),
        "paused": duration::format(state.paused),
        "progress": engine.progress(),
        "resumed": restore_error.is_none(),
        "restore_error": restore_error,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args.log_file.clone().unwrap_or_else(|| data_dir().join("tickadoro.log")))?;
    let (config, mut notices) = load_config(&args);

    let store = CsvStore::new(args.store.clone().unwrap_or_else(CsvStore::default_path));
    let (engine, restore_error) = if args.fresh {
        (PhaseEngine::new(&config), None)
    } else {
        PhaseEngine::initialize(&config, &store, Local::now())
    };
    match &restore_error {
        None if !args.fresh => info!(n = engine.state().n, phase = %engine.state().phase, "resumed today's progress"),
        None => info!("starting fresh"),
        Some(err) => warn!("not resuming: {err}"),
    }

    if args.status {
        return print_status(&engine, restore_error.as_ref().map(ToString::to_string));
    }

    notices.extend(restore_error.as_ref().map(app::restore_notice));
    let (failures_tx, failures_rx) = mpsc::channel();
    let writer = SnapshotWriter::spawn(Box::new(store), failures_tx)
        .context("starting snapshot writer")?;
    let alarm = alarm::spawn(config.sound).context("starting alarm worker")?;
    let mut app = App::new(engine, config, writer, alarm, failures_rx);
    for notice in notices {
        app.notify(notice);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, &mut app);
    let restored = restore_terminal(&mut terminal);

    let saved = app.shutdown().context("saving progress on exit");
    res?;
    restored?;
    saved
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = app.config().tick_duration;
    app.resize(terminal.size()?.width);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if app.handle_key(key) {
                        info!("quit requested");
                        return Ok(());
                    }
                }
                Event::Resize(width, _) => app.resize(width),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
            app.on_tick(last_tick);
        }
    }
}
