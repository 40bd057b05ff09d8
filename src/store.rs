//! Persisted settings and definition slots
//!
//! The orchestrator and the update poller share exactly this state. Each slot
//! has one writer: the poller only writes [`NEXT_SLOT`], the orchestrator owns
//! [`CURRENT_SLOT`] and the polling interval setting.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use crate::error::{KioskError, Result};

/// Definition currently played
pub const CURRENT_SLOT: &str = "orchestration.current";
/// Definition staged by the update poller
pub const NEXT_SLOT: &str = "orchestration.next";

pub const SOURCE_SETTING: &str = "orchestrationSource";
pub const URI_SETTING: &str = "orchestrationUri";
/// Minutes, as on the wire
pub const POLLING_INTERVAL_SETTING: &str = "pollingIntervalMinutes";

/// Keyed settings plus keyed file slots
pub trait Store: Send + Sync {
    fn get_setting(&self, key: &str) -> Option<String>;

    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    fn get_file(&self, key: &str) -> Option<String>;

    fn save_file(&self, key: &str, contents: &str) -> Result<()>;

    /// Typed setting; `None` when missing or unparseable
    fn setting<T: FromStr>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        self.get_setting(key)?.trim().parse().ok()
    }
}

fn poisoned<T>(e: PoisonError<T>) -> KioskError {
    KioskError::Store(e.to_string())
}

/// In-memory store for tests and embedding hosts
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: Mutex<HashMap<String, String>>,
    files: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get_setting(&self, key: &str) -> Option<String> {
        self.settings.lock().ok()?.get(key).cloned()
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.settings
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_file(&self, key: &str) -> Option<String> {
        self.files.lock().ok()?.get(key).cloned()
    }

    fn save_file(&self, key: &str, contents: &str) -> Result<()> {
        self.files
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// Store backed by a directory: `settings.json` plus one `<key>.dat` per slot
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    settings: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Default location under the user's data directory
    pub fn default_dir() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("kiosk_orchestrator");
        path
    }

    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let settings_path = dir.join("settings.json");
        let settings = if settings_path.exists() {
            // A corrupt settings file is treated as empty, like a first run
            fs::read_to_string(&settings_path)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .unwrap_or_default()
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            settings: Mutex::new(settings),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.dat", file_name))
    }
}

impl Store for JsonFileStore {
    fn get_setting(&self, key: &str) -> Option<String> {
        self.settings.lock().ok()?.get(key).cloned()
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let content = {
            let mut settings = self.settings.lock().map_err(poisoned)?;
            settings.insert(key.to_string(), value.to_string());
            serde_json::to_string_pretty(&*settings)?
        };
        fs::write(self.dir.join("settings.json"), content)?;
        Ok(())
    }

    fn get_file(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.slot_path(key)).ok()
    }

    fn save_file(&self, key: &str, contents: &str) -> Result<()> {
        // Write then rename so a reader never sees half a definition
        let path = self.slot_path(key);
        let temp = path.with_extension("tmp");
        fs::write(&temp, contents)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }
}
