//! Headless SaveGuard runner.
//!
//! Loads the configuration (path from the first argument, else the per-user
//! config directory), starts the engine and writes every engine event to
//! stdout as one JSON object per line. SIGINT or SIGTERM stops it.

use log::{error, info, warn};
use saveguard_lib::worker::Worker;
use saveguard_lib::{platform, AppError, EngineConfig, EngineEvent, SaveGuardEngine, Subscription};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// How often the output loop checks for a stop request
const OUTPUT_POLL: Duration = Duration::from_millis(200);

fn write_event(out: &mut impl Write, event: &EngineEvent) -> Result<(), AppError> {
    serde_json::to_writer(&mut *out, event)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn spawn_output(events: Subscription) -> io::Result<Worker> {
    Worker::spawn("output", move |stop| {
        let stdout = io::stdout();
        while !stop.is_stopped() {
            let Some(event) = events.recv_timeout(OUTPUT_POLL) else {
                continue;
            };
            if let Err(e) = write_event(&mut stdout.lock(), &event) {
                warn!("Could not write event: {e}");
            }
        }
    })
}

#[cfg(unix)]
fn wait_for_shutdown() -> io::Result<()> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
    if let Some(signal) = signals.forever().next() {
        info!("Received signal {signal}, shutting down");
    }
    signals.handle().close();
    Ok(())
}

// Without signal support, closing stdin stops the runner
#[cfg(not(unix))]
fn wait_for_shutdown() -> io::Result<()> {
    let mut sink = String::new();
    while io::stdin().read_line(&mut sink)? > 0 {
        sink.clear();
    }
    info!("stdin closed, shutting down");
    Ok(())
}

fn run(config: &EngineConfig) -> Result<bool, AppError> {
    let engine = SaveGuardEngine::new(config, platform::native())?;
    let output = spawn_output(engine.subscribe())?;

    engine.start()?;
    let waited = wait_for_shutdown();

    let clean = engine.shutdown();
    // Give the output loop a chance to flush what the shutdown produced
    let output_clean = output.shutdown(config.shutdown_timeout());
    waited?;
    Ok(clean && output_clean)
}

fn main() -> ExitCode {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match EngineConfig::load_or_default(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();
    info!("Starting SaveGuard");

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            warn!("Some background loops did not stop in time");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("SaveGuard failed: {e}");
            ExitCode::FAILURE
        }
    }
}
