//! Shared fakes for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::api::{FetchResponse, Fetcher, ProbeOutcome, UriProbe};
use crate::error::{KioskError, Result};

/// Scripted remote. Fetches fail until a response is set; every URI is
/// reachable unless it contains a fragment marked unreachable.
#[derive(Debug, Default)]
pub struct FakeRemote {
    response: Mutex<Option<FetchResponse>>,
    unreachable: Mutex<Vec<String>>,
    fetches: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serving(body: &str) -> Self {
        let remote = Self::new();
        remote.respond(200, body);
        remote
    }

    pub fn respond(&self, status: u16, body: &str) {
        *self.response.lock().unwrap() = Some(FetchResponse {
            status,
            body: body.to_string(),
        });
    }

    pub fn go_offline(&self) {
        *self.response.lock().unwrap() = None;
    }

    pub fn mark_unreachable(&self, fragment: &str) {
        self.unreachable.lock().unwrap().push(fragment.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Fetcher for FakeRemote {
    fn fetch(&self, uri: &str) -> Result<FetchResponse> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| KioskError::Request(format!("{}: connection refused", uri)))
    }
}

impl UriProbe for FakeRemote {
    fn probe(&self, uri: &str, expected_status: u16) -> ProbeOutcome {
        let unreachable = self.unreachable.lock().unwrap();
        if unreachable.iter().any(|fragment| uri.contains(fragment.as_str())) {
            ProbeOutcome::unreachable(&format!("HTTP 404, expected {}", expected_status))
        } else {
            ProbeOutcome::reachable()
        }
    }
}
