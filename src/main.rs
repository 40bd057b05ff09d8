//! Kiosk Orchestrator - headless host
//! Plays an orchestration and reports every step on stdout. Type "next" (or
//! an empty line) to skip ahead and "end" to stop after the current action.
//! When there is nothing valid to play the host idles until "restart", and
//! with a URL source it also retries on the polling interval.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;

use clap::Parser;

use kiosk_orchestrator::api::RemoteClient;
use kiosk_orchestrator::config::KioskConfig;
use kiosk_orchestrator::definition;
use kiosk_orchestrator::models::OrchestrationSource;
use kiosk_orchestrator::orchestrator::runner::{self, Control};
use kiosk_orchestrator::orchestrator::{ActionRoutes, CancelReason, Orchestrator, OrchestratorEvent};
use kiosk_orchestrator::poller::{PollOutcome, UpdatePoller};
use kiosk_orchestrator::store::{JsonFileStore, Store, CURRENT_SLOT, SOURCE_SETTING, URI_SETTING};
use kiosk_orchestrator::{KioskError, Result};

/// Exit code for --poll-once when no URL source is configured
const EXIT_NOT_CONFIGURED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "kiosk_orchestrator", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Fetch the orchestration from this URL and poll it for updates
    #[arg(long, env = "KIOSK_URL", conflicts_with = "file")]
    url: Option<String>,

    /// Import a local definition and play it
    #[arg(long)]
    file: Option<PathBuf>,

    /// Store directory for settings and cached definitions
    #[arg(long, env = "KIOSK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Fetch and stage one update, then exit
    #[arg(long)]
    poll_once: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => KioskConfig::load_from(path),
        None => KioskConfig::load(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    match run(cli, config) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("kiosk_orchestrator: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, mut config: KioskConfig) -> Result<ExitCode> {
    if let Some(url) = &cli.url {
        config.source = OrchestrationSource::Url;
        config.orchestration_uri = url.clone();
    }
    if cli.file.is_some() {
        config.source = OrchestrationSource::File;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.display().to_string();
    }

    let store = Arc::new(JsonFileStore::open(&config.store_dir())?);
    log::info!("Store at {}", store.dir().display());
    seed_settings(store.as_ref(), &config)?;
    if let Some(path) = &cli.file {
        import_definition(store.as_ref(), path)?;
    }

    let remote = Arc::new(RemoteClient::new(config.http()));

    if cli.poll_once {
        let outcome = UpdatePoller::new(store.clone(), remote.clone()).poll_once();
        println!("{}", timestamped(&format!("poll: {:?}", outcome)));
        return Ok(match outcome {
            PollOutcome::Staged => ExitCode::SUCCESS,
            PollOutcome::NotConfigured => ExitCode::from(EXIT_NOT_CONFIGURED),
            PollOutcome::Failed(_) => ExitCode::FAILURE,
        });
    }

    let url_source = config.source == OrchestrationSource::Url;
    let poller = url_source.then(|| UpdatePoller::new(store.clone(), remote.clone()).spawn());
    let retry = url_source.then(|| UpdatePoller::new(store.clone(), remote.clone()));

    let (tx, events) = mpsc::channel();
    let handle = runner::spawn(Orchestrator::new(store, remote, ActionRoutes::standard(), tx));
    spawn_console(handle.control());
    handle.start();

    let mut idle = false;
    // Ends once the orchestrator thread drops its sender
    loop {
        let next = match &retry {
            Some(retry) if idle => events.recv_timeout(retry.interval()),
            _ => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok(event) => {
                report(&event);
                match &event {
                    OrchestratorEvent::Started => idle = false,
                    OrchestratorEvent::Cancelled(reason) => match after_stop(*reason) {
                        AfterStop::Exit => handle.shutdown(),
                        AfterStop::WaitForRestart => {
                            log::info!("Nothing to play, waiting for restart");
                            idle = true;
                        }
                    },
                    _ => {}
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::info!("Retrying playback");
                handle.start();
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(poller) = poller {
        poller.stop();
    }
    handle.join()?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterStop {
    Exit,
    /// Stay up so the operator or the next poll can bring content back
    WaitForRestart,
}

fn after_stop(reason: CancelReason) -> AfterStop {
    match reason {
        CancelReason::Finished | CancelReason::EndRequested => AfterStop::Exit,
        CancelReason::NoValidOrchestration | CancelReason::ValidationFailed | CancelReason::Empty => {
            AfterStop::WaitForRestart
        }
    }
}

fn seed_settings(store: &JsonFileStore, config: &KioskConfig) -> Result<()> {
    store.set_setting(SOURCE_SETTING, &config.source.to_string())?;
    if !config.orchestration_uri.trim().is_empty() {
        store.set_setting(URI_SETTING, config.orchestration_uri.trim())?;
    }
    Ok(())
}

/// Copy a local definition into the current slot after checking it parses
fn import_definition(store: &JsonFileStore, path: &Path) -> Result<()> {
    let content = fs::read_to_string(path)?;
    if definition::load_orchestration(&content, OrchestrationSource::File).is_none() {
        return Err(KioskError::Unparseable);
    }
    store.save_file(CURRENT_SLOT, &content)?;
    log::info!("Imported {}", path.display());
    Ok(())
}

/// Operator input on stdin
fn spawn_console(control: Control) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "" | "next" => control.advance(),
                "end" => control.request_end(),
                "restart" => control.start(),
                other => eprintln!("unknown command '{}' (next, end, restart)", other),
            }
        }
    });
}

/// Print one event
fn report(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::Started => println!("{}", timestamped("playback started")),
        OrchestratorEvent::Loaded(orchestration) => println!(
            "{}",
            timestamped(&format!(
                "loaded '{}' ({} actions, {:?}, {:?})",
                orchestration.label(),
                orchestration.actions.len(),
                orchestration.lifecycle,
                orchestration.order
            ))
        ),
        OrchestratorEvent::ValidationComplete(orchestration) => {
            if let Some(tree) = &orchestration.validation {
                println!("{}", timestamped(&format!("validation: {}", tree.summary())));
                for leaf in tree.leaves(false) {
                    println!("    {}: {} {}", leaf.identifier(), leaf.message(), leaf.guidance());
                }
            }
        }
        OrchestratorEvent::Status(status) => println!("{}", timestamped(status)),
        OrchestratorEvent::NextAction { action, route } => {
            let shown_for = match action.duration() {
                Some(secs) if secs > 0 => format!("{}s", secs),
                _ => "until advanced".to_string(),
            };
            println!(
                "{}",
                timestamped(&format!("[{}] {} ({})", route, action.label(), shown_for))
            );
        }
        OrchestratorEvent::Cancelled(reason) => {
            println!("{}", timestamped(&format!("stopped: {:?}", reason)));
        }
    }
}

fn timestamped(message: &str) -> String {
    format!("{} {}", chrono::Local::now().format("%H:%M:%S"), message)
}
