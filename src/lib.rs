//! Kiosk Orchestrator
//! Playlist engine for unattended displays: loads an orchestration, validates
//! it, plays its actions on a schedule and picks up remote updates between
//! passes.

pub mod action;
pub mod api;
pub mod config;
pub mod definition;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod poller;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{KioskError, Result};
