//! Remote access: definition fetches and content reachability probes

use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::error::{KioskError, Result};

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Outcome of a reachability probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub message: String,
}

impl ProbeOutcome {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            message: String::new(),
        }
    }

    pub fn unreachable(message: &str) -> Self {
        Self {
            reachable: false,
            message: message.to_string(),
        }
    }
}

/// Fetches an orchestration definition
pub trait Fetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<FetchResponse>;
}

/// Checks that content behind a path answers with the expected status
pub trait UriProbe: Send + Sync {
    fn probe(&self, uri: &str, expected_status: u16) -> ProbeOutcome;
}

/// HTTP settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Attempts per fetch, including the first one
    pub max_retries: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
            user_agent: "KioskOrchestrator/0.2".to_string(),
        }
    }
}

/// ureq-backed implementation of both collaborators
pub struct RemoteClient {
    agent: ureq::Agent,
    config: HttpConfig,
}

impl RemoteClient {
    pub fn new(config: HttpConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.read_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            // Statuses are reported to the caller, not turned into errors
            .http_status_as_error(false)
            .build()
            .new_agent();

        Self { agent, config }
    }

    fn try_fetch(&self, uri: &str) -> Result<FetchResponse> {
        let mut response = self
            .agent
            .get(uri)
            .header("User-Agent", &self.config.user_agent)
            .header("Accept", "application/json, application/xml, text/xml")
            .call()
            .map_err(|e| KioskError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| KioskError::Request(format!("read failed: {}", e)))?;

        Ok(FetchResponse { status, body })
    }

    fn probe_http(&self, uri: &str, expected_status: u16) -> ProbeOutcome {
        match self
            .agent
            .head(uri)
            .header("User-Agent", &self.config.user_agent)
            .call()
        {
            Ok(response) => {
                let status = response.status().as_u16();
                if status == expected_status {
                    ProbeOutcome::reachable()
                } else {
                    ProbeOutcome::unreachable(&format!(
                        "HTTP {}, expected {}",
                        status, expected_status
                    ))
                }
            }
            Err(e) => ProbeOutcome::unreachable(&format!("Request failed: {}", e)),
        }
    }
}

impl Default for RemoteClient {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

impl Fetcher for RemoteClient {
    /// Transport failures are retried; any HTTP status counts as an answer.
    fn fetch(&self, uri: &str) -> Result<FetchResponse> {
        let uri = uri.trim();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.try_fetch(uri) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempts >= self.config.max_retries.max(1) {
                        return Err(KioskError::Request(format!(
                            "{} failed after {} attempts: {}",
                            uri, attempts, e
                        )));
                    }
                    log::debug!("Fetch attempt {} for {} failed: {}", attempts, uri, e);
                    thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
                }
            }
        }
    }
}

impl UriProbe for RemoteClient {
    fn probe(&self, uri: &str, expected_status: u16) -> ProbeOutcome {
        if is_http(uri) {
            self.probe_http(uri, expected_status)
        } else {
            probe_file(uri)
        }
    }
}

fn is_http(uri: &str) -> bool {
    let lower = uri.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `file://` URIs and bare paths are reachable when they exist on disk
fn probe_file(uri: &str) -> ProbeOutcome {
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    if Path::new(path).exists() {
        ProbeOutcome::reachable()
    } else {
        ProbeOutcome::unreachable(&format!("File not found: {}", path))
    }
}
