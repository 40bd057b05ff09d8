//! Host-facing signals, renderer routes and the cancellation token

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::action::{Action, ActionKind};
use crate::models::Orchestration;

/// Signals sent to the host, in the order they happen
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Playback begins; the host should go full screen
    Started,
    /// A definition was loaded (also on every loop reload)
    Loaded(Orchestration),
    /// Validation finished; the tree is on the orchestration
    ValidationComplete(Orchestration),
    Status(String),
    /// Render this action on the given route
    NextAction { action: Action, route: String },
    Cancelled(CancelReason),
}

/// Why the orchestrator stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The host asked to end
    EndRequested,
    /// Nothing could be loaded; the host should show its setup screen
    NoValidOrchestration,
    ValidationFailed,
    /// The orchestration has no actions
    Empty,
    /// A single-run orchestration played through; the host should exit
    Finished,
}

/// Shared "end requested" flag, polled once per advance step
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }

    /// Read and clear in one step
    pub fn take(&self) -> bool {
        self.0.swap(false, AtomicOrdering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, AtomicOrdering::SeqCst);
    }
}

/// Renderer route per action kind, registered by the host
#[derive(Debug, Clone, Default)]
pub struct ActionRoutes {
    routes: HashMap<ActionKind, String>,
}

impl ActionRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// One route per kind, named after the kind
    pub fn standard() -> Self {
        ActionKind::ALL
            .iter()
            .fold(Self::new(), |routes, kind| routes.with(*kind, kind.tag()))
    }

    pub fn with(mut self, kind: ActionKind, route: &str) -> Self {
        self.routes.insert(kind, route.to_string());
        self
    }

    pub fn route(&self, kind: ActionKind) -> Option<&str> {
        self.routes.get(&kind).map(String::as_str)
    }
}
