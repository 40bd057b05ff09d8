//! Error types shared across the engine

use thiserror::Error;

use crate::action::ActionKind;

#[derive(Debug, Error)]
pub enum KioskError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("content is neither a JSON nor an XML orchestration")]
    Unparseable,

    /// A sequence item has no renderer route. This is a wiring defect in the
    /// host, never a data problem, so the runner stops on it.
    #[error("no renderer route registered for {0} actions")]
    UnmappedAction(ActionKind),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("store unavailable: {0}")]
    Store(String),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KioskError>;
