//! alarmd - periodic alarm registry daemon.
//!
//! Reads commands from an interactive prompt, maintains a shared registry of
//! periodic message jobs, and runs one worker thread per job. Alarm output
//! goes to stdout (human lines, or JSON lines with `--json`); diagnostics go
//! to stderr via `tracing`.
//!
//! Resource exhaustion (failing to spawn a worker thread) is fatal: there is
//! no supervisory restart, the process exits with an error.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use alarmd_core::{AlarmdConfig, AlarmService, EventSink};
use alarmd_daemon::dispatcher::{Dispatcher, DispatcherConfig};
use alarmd_daemon::parse;
use alarmd_daemon::sink::{ConsoleSink, JsonSink};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// alarmd - periodic alarm registry daemon
#[derive(Parser, Debug)]
#[command(name = "alarmd-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "alarmd.toml")]
    config: PathBuf,

    /// Dispatcher poll interval in milliseconds (overrides config)
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error; overrides config)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit events as JSON lines instead of human-readable text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration; a missing file means defaults, a broken file is a
    // startup error.
    let config = if args.config.exists() {
        AlarmdConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        AlarmdConfig::default()
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.level.clone());
    let filter = EnvFilter::try_new(&level).context("invalid log level")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let sink: Arc<dyn EventSink> = if args.json {
        Arc::new(JsonSink::new())
    } else {
        Arc::new(ConsoleSink::new())
    };
    let service = Arc::new(AlarmService::new(sink));

    let poll_interval = Duration::from_millis(
        args.poll_interval_ms
            .unwrap_or(config.dispatcher.poll_interval_ms),
    );
    let dispatcher = Dispatcher::new(
        Arc::clone(&service),
        DispatcherConfig::new().with_poll_interval(poll_interval),
    );
    let shutdown = dispatcher.shutdown_handle();
    let dispatcher_thread = thread::Builder::new()
        .name("alarm-dispatcher".to_string())
        .spawn(move || {
            if let Err(err) = dispatcher.run() {
                // Resource exhaustion: no restart policy, terminate.
                error!(error = %err, "dispatcher failed; terminating");
                std::process::exit(1);
            }
        })
        .context("failed to spawn dispatcher thread")?;

    info!("alarmd started");
    run_prompt(&service)?;

    shutdown.store(true, Ordering::SeqCst);
    if dispatcher_thread.join().is_err() {
        anyhow::bail!("dispatcher thread panicked");
    }
    info!("alarmd exiting");
    Ok(())
}

/// The producer loop: prompt, read, parse, submit, report. Returns on EOF.
fn run_prompt(service: &AlarmService) -> Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("alarm> ");
        io::stdout().flush().ok();

        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read input")?;
        if read == 0 {
            // EOF: leave the prompt loop and shut down.
            return Ok(());
        }

        match parse::parse_line(&line) {
            Ok(None) => {},
            Ok(Some(request)) => {
                if let Err(err) = service.submit(&request) {
                    warn!(id = request.id(), error = %err, "request rejected");
                    eprintln!("error: {err}");
                }
            },
            Err(err) => {
                eprintln!("error: bad command: {err}");
            },
        }
    }
}
