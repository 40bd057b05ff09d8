//! Background thread driving an orchestrator against the wall clock

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use super::{CancellationToken, Orchestrator};
use crate::api::{Fetcher, UriProbe};
use crate::error::{KioskError, Result};
use crate::store::Store;

/// Requests from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    /// Skip to the next action; also how untimed actions end
    Advance,
    Shutdown,
}

/// Cloneable remote control for a spawned orchestrator
#[derive(Debug, Clone)]
pub struct Control {
    commands: Sender<Command>,
    cancel: CancellationToken,
}

impl Control {
    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    pub fn advance(&self) {
        let _ = self.commands.send(Command::Advance);
    }

    /// Ask playback to end at the next advance step
    pub fn request_end(&self) {
        self.cancel.request();
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

pub struct OrchestratorHandle {
    control: Control,
    thread: JoinHandle<Result<()>>,
}

impl OrchestratorHandle {
    pub fn control(&self) -> Control {
        self.control.clone()
    }

    pub fn start(&self) {
        self.control.start();
    }

    pub fn advance(&self) {
        self.control.advance();
    }

    pub fn request_end(&self) {
        self.control.request_end();
    }

    pub fn shutdown(&self) {
        self.control.shutdown();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the thread. A fatal orchestrator error comes back here.
    pub fn join(self) -> Result<()> {
        drop(self.control);
        self.thread
            .join()
            .map_err(|_| KioskError::ThreadPanicked("orchestrator"))?
    }
}

/// Move the orchestrator onto its own thread. Nothing plays until
/// [`OrchestratorHandle::start`].
pub fn spawn<S, R>(orchestrator: Orchestrator<S, R>) -> OrchestratorHandle
where
    S: Store + 'static,
    R: Fetcher + UriProbe + 'static,
{
    let (tx, rx) = mpsc::channel();
    let cancel = orchestrator.cancellation();

    let thread = thread::spawn(move || {
        let result = run(orchestrator, rx);
        if let Err(ref e) = result {
            log::error!("Orchestrator stopped: {}", e);
        }
        result
    });

    OrchestratorHandle {
        control: Control {
            commands: tx,
            cancel,
        },
        thread,
    }
}

fn run<S, R>(mut orchestrator: Orchestrator<S, R>, commands: Receiver<Command>) -> Result<()>
where
    S: Store,
    R: Fetcher + UriProbe,
{
    loop {
        let waited = Instant::now();
        let command = match orchestrator.time_remaining() {
            Some(wait) => match commands.recv_timeout(wait) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            },
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => return Ok(()),
            },
        };

        // Start and Advance both rearm the timer, so only a timeout consumes it
        match command {
            None => orchestrator.elapse(waited.elapsed())?,
            Some(Command::Start) => orchestrator.start()?,
            Some(Command::Advance) => orchestrator.advance()?,
            Some(Command::Shutdown) => return Ok(()),
        }
    }
}
