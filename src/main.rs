use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Sender, unbounded};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use pipescope::cache::DataCache;
use pipescope::cli::{CliArgs, Command};
use pipescope::config::{Config, default_log_path, expand_path};
use pipescope::coordinator::{Coordinator, CoordinatorOptions};
use pipescope::fetch::FanOut;
use pipescope::service::PipelineService;
use pipescope::source::{PipelineSource, RecordingSource, ReplaySource, demo};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Logs go to a file so they never tear the screen
fn init_logging(args: &CliArgs) -> Result<()> {
    if !args.debug && std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }

    let path = args
        .log_file
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(default_log_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn build_source(args: &CliArgs, config: &Config) -> Result<Arc<dyn PipelineSource>> {
    let latency = config.replay.latency;
    let replay = match &args.replay {
        Some(dir) => {
            let dir = expand_path(dir);
            info!("replaying {}", dir.display());
            ReplaySource::from_dir(&dir)
                .with_context(|| format!("Failed to load recording from {}", dir.display()))?
        }
        None => {
            info!("no recording given, serving the demo data");
            ReplaySource::new(demo::recording())
        }
    }
    .with_latency(latency);

    match &args.record {
        Some(dir) => {
            let dir = expand_path(dir);
            info!("recording into {}", dir.display());
            Ok(Arc::new(record_into(replay, &dir)?))
        }
        None => Ok(Arc::new(replay)),
    }
}

fn record_into<S: PipelineSource>(inner: S, dir: &Path) -> Result<RecordingSource<S>> {
    RecordingSource::new(inner, dir)
        .with_context(|| format!("Failed to prepare recording in {}", dir.display()))
}

/// Forward terminal events until the receiving side hangs up
fn spawn_input(tx: Sender<Event>) -> Result<()> {
    thread::Builder::new()
        .name("input".to_string())
        .spawn(move || {
            loop {
                match event::read() {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        error!("reading terminal input failed: {}", err);
                        break;
                    }
                }
            }
        })
        .context("Failed to start input thread")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(&args)?;

    let config = Config::load(args.config.clone())?;

    if let Some(Command::Profiles) = &args.command {
        for name in config.profiles.keys() {
            println!("{name}");
        }
        return Ok(());
    }

    let selection = config.selection(args.command.as_ref())?;
    info!("Starting pipescope with filter {:?}", selection.filter);

    let source = build_source(&args, &config)?;
    let backoff = config.fetch.backoff();
    let fanout = FanOut::new(config.fetch.concurrency, backoff.clone())?;
    let service = Arc::new(PipelineService::new(
        source,
        backoff,
        fanout,
        selection.filter,
    ));
    let mut coordinator = Coordinator::new(
        service,
        Arc::new(DataCache::new()),
        CoordinatorOptions {
            refresh_delay: config.fetch.previous_refresh_delay,
            full_help: config.ui.show_help,
            extra_filter: selection.extra_filter,
        },
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (input_tx, input_rx) = unbounded();
    let res = spawn_input(input_tx).and_then(|()| coordinator.run(&mut terminal, input_rx));

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {}", err);
        println!("Error: {}", err);
    }

    info!("pipescope shut down cleanly");
    Ok(())
}
