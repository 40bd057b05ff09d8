//! Playback state machine
//!
//! The orchestrator loads a definition from the store, validates it, builds a
//! play sequence and hands actions to the host one at a time. Time only moves
//! through [`Orchestrator::elapse`], so the machine itself never sleeps; the
//! [`runner`] drives it from a thread against the wall clock.

pub mod events;
pub mod runner;
pub mod sequence;

use std::collections::VecDeque;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

pub use events::{ActionRoutes, CancelReason, CancellationToken, OrchestratorEvent};

use crate::action::Action;
use crate::api::{Fetcher, UriProbe};
use crate::definition;
use crate::error::{KioskError, Result};
use crate::models::{LifecycleBehavior, Orchestration, OrchestrationSource};
use crate::store::{Store, CURRENT_SLOT, NEXT_SLOT, POLLING_INTERVAL_SETTING, SOURCE_SETTING, URI_SETTING};
use crate::validation;

/// Status text sent when a staged definition replaces the current one
pub const UPDATE_ADOPTED: &str = "Orchestration update adopted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Loading,
    Validating,
    /// Validation failed; nothing plays until the next start
    Invalid,
    Ready,
    Playing,
    Terminated,
}

pub struct Orchestrator<S, R> {
    store: Arc<S>,
    remote: Arc<R>,
    routes: ActionRoutes,
    events: Sender<OrchestratorEvent>,
    cancel: CancellationToken,
    state: OrchestratorState,
    current: Option<Orchestration>,
    sequence: VecDeque<Action>,
    now_playing: Option<Action>,
    /// Time left on the current action's timer, if one is armed
    remaining: Option<Duration>,
}

impl<S: Store, R: Fetcher + UriProbe> Orchestrator<S, R> {
    pub fn new(
        store: Arc<S>,
        remote: Arc<R>,
        routes: ActionRoutes,
        events: Sender<OrchestratorEvent>,
    ) -> Self {
        Self {
            store,
            remote,
            routes,
            events,
            cancel: CancellationToken::new(),
            state: OrchestratorState::Idle,
            current: None,
            sequence: VecDeque::new(),
            now_playing: None,
            remaining: None,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// The orchestration in play (or the last one that failed validation)
    pub fn current(&self) -> Option<&Orchestration> {
        self.current.as_ref()
    }

    pub fn now_playing(&self) -> Option<&Action> {
        self.now_playing.as_ref()
    }

    /// Actions left in this pass, not counting the one on screen
    pub fn pending(&self) -> usize {
        self.sequence.len()
    }

    pub fn time_remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// Handle for requesting an end from another thread
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Begin (or restart) a run. A stale end request is discarded.
    pub fn start(&mut self) -> Result<()> {
        log::info!("Starting orchestration");
        self.cancel.reset();
        self.clear_playback();
        self.load(true)
    }

    /// Move to the next action. Called by the timer, or by the host for
    /// actions without a duration.
    pub fn advance(&mut self) -> Result<()> {
        if self.state != OrchestratorState::Playing {
            log::debug!("Ignoring advance while {:?}", self.state);
            return Ok(());
        }

        if self.cancel.take() {
            log::info!("End requested, stopping playback");
            self.terminate(CancelReason::EndRequested);
            return Ok(());
        }

        let Some(action) = self.sequence.pop_front() else {
            return self.finish_pass();
        };

        let Some(route) = self.routes.route(action.kind()).map(str::to_string) else {
            log::error!("No route for {} ({})", action.label(), action.kind());
            self.clear_playback();
            self.set_state(OrchestratorState::Terminated);
            return Err(KioskError::UnmappedAction(action.kind()));
        };

        self.remaining = action
            .duration()
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64));

        log::info!(
            "Showing {} on '{}' ({} left in pass)",
            action.label(),
            route,
            self.sequence.len()
        );
        self.now_playing = Some(action.clone());
        self.emit(OrchestratorEvent::NextAction { action, route });
        Ok(())
    }

    /// Let time pass. When the armed timer runs out the orchestrator advances.
    pub fn elapse(&mut self, dt: Duration) -> Result<()> {
        let Some(remaining) = self.remaining else {
            return Ok(());
        };

        if dt >= remaining {
            self.remaining = None;
            self.advance()
        } else {
            self.remaining = Some(remaining - dt);
            Ok(())
        }
    }

    fn load(&mut self, fresh: bool) -> Result<()> {
        self.set_state(OrchestratorState::Loading);

        let source: OrchestrationSource = self.store.setting(SOURCE_SETTING).unwrap_or_default();
        let loaded = match source {
            OrchestrationSource::File => self.load_cached(OrchestrationSource::File),
            OrchestrationSource::Url if fresh => self.load_remote(),
            OrchestrationSource::Url => self.load_staged(),
        };

        let Some(mut orchestration) = loaded else {
            log::warn!("No usable orchestration from {} source", source);
            self.terminate(CancelReason::NoValidOrchestration);
            return Ok(());
        };

        log::info!(
            "Loaded '{}' with {} actions",
            orchestration.label(),
            orchestration.actions.len()
        );
        self.emit(OrchestratorEvent::Loaded(orchestration.clone()));

        self.set_state(OrchestratorState::Validating);
        let result = validation::validate_orchestration(&mut orchestration, self.remote.as_ref());
        self.emit(OrchestratorEvent::ValidationComplete(orchestration.clone()));

        if !result.is_valid() {
            let status = format!("Orchestration is invalid: {}", result.summary());
            log::warn!("{}", status);
            for leaf in result.leaves(false) {
                log::warn!("  {}: {}", leaf.identifier(), leaf.message());
            }
            self.emit(OrchestratorEvent::Status(status));
            self.current = Some(orchestration);
            self.set_state(OrchestratorState::Invalid);
            self.emit(OrchestratorEvent::Cancelled(CancelReason::ValidationFailed));
            return Ok(());
        }

        self.set_state(OrchestratorState::Ready);
        self.play(orchestration)
    }

    fn play(&mut self, orchestration: Orchestration) -> Result<()> {
        if orchestration.actions.is_empty() {
            log::warn!("'{}' has no actions", orchestration.label());
            self.current = Some(orchestration);
            self.terminate(CancelReason::Empty);
            return Ok(());
        }

        self.sequence = sequence::build_sequence(
            &orchestration.actions,
            orchestration.order,
            &mut rand::thread_rng(),
        );

        if orchestration.source == OrchestrationSource::Url {
            let minutes = orchestration.polling_interval_minutes.to_string();
            if let Err(e) = self.store.set_setting(POLLING_INTERVAL_SETTING, &minutes) {
                log::warn!("Could not store polling interval: {}", e);
            }
        }

        self.current = Some(orchestration);
        self.set_state(OrchestratorState::Playing);
        self.emit(OrchestratorEvent::Started);
        self.advance()
    }

    fn finish_pass(&mut self) -> Result<()> {
        self.remaining = None;
        self.now_playing = None;

        let lifecycle = self
            .current
            .as_ref()
            .map(|o| o.lifecycle)
            .unwrap_or_default();

        match lifecycle {
            LifecycleBehavior::ContinuousLoop => {
                log::info!("Pass complete, reloading");
                self.load(false)
            }
            LifecycleBehavior::SingleRun => {
                log::info!("Single run complete");
                self.terminate(CancelReason::Finished);
                Ok(())
            }
        }
    }

    /// Fresh URL start: fetch the definition, keep it on success, otherwise
    /// fall back to the cached copy
    fn load_remote(&mut self) -> Option<Orchestration> {
        let uri = self
            .store
            .get_setting(URI_SETTING)
            .filter(|uri| !uri.trim().is_empty());

        match uri {
            Some(uri) => match self.remote.fetch(&uri) {
                Ok(response) if response.is_ok() => {
                    match definition::load_orchestration(&response.body, OrchestrationSource::Url) {
                        Some(orchestration) => {
                            // Both slots get the fetched body so an older staged
                            // copy can never be adopted over it
                            for slot in [CURRENT_SLOT, NEXT_SLOT] {
                                if let Err(e) = self.store.save_file(slot, &response.body) {
                                    log::warn!("Could not cache definition in {}: {}", slot, e);
                                }
                            }
                            return Some(orchestration);
                        }
                        None => log::warn!("{} is not an orchestration", uri),
                    }
                }
                Ok(response) => log::warn!("{} answered HTTP {}", uri, response.status),
                Err(e) => log::warn!("Fetching {} failed: {}", uri, e),
            },
            None => log::warn!("URL source selected but no URI configured"),
        }

        log::info!("Falling back to cached definition");
        self.load_cached(OrchestrationSource::Url)
    }

    /// Loop boundary for URL sources: adopt the staged definition when it
    /// differs from the current one
    fn load_staged(&mut self) -> Option<Orchestration> {
        let current = self.load_cached(OrchestrationSource::Url);
        let Some(text) = self.store.get_file(NEXT_SLOT) else {
            return current;
        };
        let Some(staged) = definition::load_orchestration(&text, OrchestrationSource::Url) else {
            log::debug!("Staged definition does not parse, keeping current");
            return current;
        };

        let changed = current
            .as_ref()
            .map_or(true, |c| definition::canonical_form(c) != definition::canonical_form(&staged));
        if !changed {
            return current;
        }

        if let Err(e) = self.store.save_file(CURRENT_SLOT, &text) {
            log::warn!("Could not promote staged definition: {}", e);
        }
        log::info!("{}", UPDATE_ADOPTED);
        self.emit(OrchestratorEvent::Status(UPDATE_ADOPTED.to_string()));
        Some(staged)
    }

    fn load_cached(&self, source: OrchestrationSource) -> Option<Orchestration> {
        let text = self.store.get_file(CURRENT_SLOT)?;
        definition::load_orchestration(&text, source)
    }

    fn terminate(&mut self, reason: CancelReason) {
        self.clear_playback();
        self.set_state(OrchestratorState::Terminated);
        self.emit(OrchestratorEvent::Cancelled(reason));
    }

    fn clear_playback(&mut self) {
        self.sequence.clear();
        self.now_playing = None;
        self.remaining = None;
    }

    fn set_state(&mut self, state: OrchestratorState) {
        if self.state != state {
            log::debug!("State {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
