//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::HttpConfig;
use crate::error::Result;
use crate::models::OrchestrationSource;
use crate::store::JsonFileStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskConfig {
    /// Where definitions come from; seeded into the store on startup
    #[serde(default)]
    pub source: OrchestrationSource,
    #[serde(default)]
    pub orchestration_uri: String,
    /// Store directory; empty means the platform data dir
    #[serde(default)]
    pub data_dir: String,
    // HTTP
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    // Logging
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_user_agent() -> String { HttpConfig::default().user_agent }
fn default_connect_timeout() -> u64 { 30 }
fn default_read_timeout() -> u64 { 60 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay() -> u64 { 2000 }
fn default_log_level() -> String { "info".to_string() }

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            source: OrchestrationSource::default(),
            orchestration_uri: String::new(),
            data_dir: String::new(),
            user_agent: default_user_agent(),
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
            max_retries: 3,
            retry_delay_ms: 2000,
            log_level: default_log_level(),
        }
    }
}

impl KioskConfig {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("kiosk_orchestrator");
        fs::create_dir_all(&path).ok();
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Missing or unreadable files give the defaults
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
                }
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        if let Err(e) = self.save_to(&Self::config_path()) {
            log::warn!("Could not save config: {}", e);
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            max_retries: self.max_retries.max(1),
            retry_delay_ms: self.retry_delay_ms,
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        if self.data_dir.trim().is_empty() {
            JsonFileStore::default_dir()
        } else {
            PathBuf::from(self.data_dir.trim())
        }
    }
}
