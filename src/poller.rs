//! Background polling for orchestration updates
//!
//! The poller only stages what it fetches in the next slot. Adoption happens
//! in the orchestrator at a loop boundary, so a running pass is never
//! disturbed.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::api::Fetcher;
use crate::models::{OrchestrationSource, MIN_POLLING_INTERVAL_MINUTES};
use crate::store::{Store, NEXT_SLOT, POLLING_INTERVAL_SETTING, SOURCE_SETTING, URI_SETTING};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Source is not URL, or no URI is set
    NotConfigured,
    /// Fetched body written to the next slot
    Staged,
    Failed(String),
}

pub struct UpdatePoller<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
}

impl<S: Store, F: Fetcher> UpdatePoller<S, F> {
    pub fn new(store: Arc<S>, fetcher: Arc<F>) -> Self {
        Self { store, fetcher }
    }

    /// One fetch. Anything other than a 200 leaves the next slot untouched.
    pub fn poll_once(&self) -> PollOutcome {
        let source: OrchestrationSource = self.store.setting(SOURCE_SETTING).unwrap_or_default();
        if source != OrchestrationSource::Url {
            return PollOutcome::NotConfigured;
        }
        let Some(uri) = self
            .store
            .get_setting(URI_SETTING)
            .filter(|uri| !uri.trim().is_empty())
        else {
            return PollOutcome::NotConfigured;
        };

        let response = match self.fetcher.fetch(&uri) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Update poll of {} failed: {}", uri, e);
                return PollOutcome::Failed(e.to_string());
            }
        };
        if !response.is_ok() {
            log::warn!("Update poll of {} answered HTTP {}", uri, response.status);
            return PollOutcome::Failed(format!("HTTP error: {}", response.status));
        }

        match self.store.save_file(NEXT_SLOT, &response.body) {
            Ok(()) => {
                log::debug!("Staged {} bytes from {}", response.body.len(), uri);
                PollOutcome::Staged
            }
            Err(e) => {
                log::warn!("Could not stage update: {}", e);
                PollOutcome::Failed(e.to_string())
            }
        }
    }

    /// Wait between polls: the stored interval, never under the minimum
    pub fn interval(&self) -> Duration {
        let minutes = self
            .store
            .setting::<i64>(POLLING_INTERVAL_SETTING)
            .unwrap_or(MIN_POLLING_INTERVAL_MINUTES)
            .max(MIN_POLLING_INTERVAL_MINUTES);
        Duration::from_secs((minutes as u64).saturating_mul(60))
    }
}

pub struct PollerHandle {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.thread.join();
    }
}

impl<S, F> UpdatePoller<S, F>
where
    S: Store + 'static,
    F: Fetcher + 'static,
{
    /// Poll on a thread until stopped. The interval is re-read before every
    /// wait so a newly adopted orchestration changes the schedule.
    pub fn spawn(self) -> PollerHandle {
        let (stop, stopped) = mpsc::channel();

        let thread = thread::spawn(move || loop {
            match stopped.recv_timeout(self.interval()) {
                Err(RecvTimeoutError::Timeout) => {
                    self.poll_once();
                }
                _ => break,
            }
        });

        PollerHandle { stop, thread }
    }
}
