//! Data models for the orchestration engine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::validation::ValidationResult;

/// Schema revision written into every orchestration definition
pub const ORCHESTRATION_VERSION: &str = "1.0";

/// Smallest polling interval the update poller accepts
pub const MIN_POLLING_INTERVAL_MINUTES: i64 = 15;

/// Whether a playlist runs once or repeats indefinitely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleBehavior {
    #[default]
    SingleRun,
    ContinuousLoop,
}

/// Play order of the actions within one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Ordering {
    #[default]
    Sequential,
    Random,
}

/// Where the orchestration definition comes from. Never part of the wire
/// format; the loader assigns it from the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OrchestrationSource {
    Url,
    #[default]
    File,
}

/// How an image fills the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum StretchMode {
    None,
    Fill,
    #[default]
    Uniform,
    UniformToFill,
}

/// Error returned when an enum tag cannot be parsed
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownTag(pub String);

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tag '{}'", self.0)
    }
}

impl std::error::Error for UnknownTag {}

/// Case-insensitive tag lookup that also accepts the declaration index,
/// since tool-authored definitions sometimes carry enums as numbers.
fn parse_tag<T: Copy>(s: &str, tags: &[(&str, T)]) -> Result<T, UnknownTag> {
    let wanted = s.trim();
    if let Ok(index) = wanted.parse::<usize>() {
        if let Some((_, value)) = tags.get(index) {
            return Ok(*value);
        }
    }
    tags.iter()
        .find(|(tag, _)| tag.eq_ignore_ascii_case(wanted))
        .map(|(_, value)| *value)
        .ok_or_else(|| UnknownTag(wanted.to_string()))
}

impl FromStr for LifecycleBehavior {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag(s, &[
            ("singleRun", LifecycleBehavior::SingleRun),
            ("continuousLoop", LifecycleBehavior::ContinuousLoop),
        ])
    }
}

impl FromStr for Ordering {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag(s, &[
            ("sequential", Ordering::Sequential),
            ("random", Ordering::Random),
        ])
    }
}

impl FromStr for OrchestrationSource {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag(s, &[
            ("url", OrchestrationSource::Url),
            ("file", OrchestrationSource::File),
        ])
    }
}

impl FromStr for StretchMode {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_tag(s, &[
            ("none", StretchMode::None),
            ("fill", StretchMode::Fill),
            ("uniform", StretchMode::Uniform),
            ("uniformToFill", StretchMode::UniformToFill),
        ])
    }
}

impl fmt::Display for OrchestrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationSource::Url => write!(f, "url"),
            OrchestrationSource::File => write!(f, "file"),
        }
    }
}

/// A named, versioned playlist of actions plus its ordering, lifecycle and
/// polling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Orchestration {
    pub name: String,
    pub version: String,
    pub polling_interval_minutes: i64,
    pub lifecycle: LifecycleBehavior,
    pub order: Ordering,
    #[serde(skip)]
    pub source: OrchestrationSource,
    /// Filled in by the type resolver, never by serde
    #[serde(skip_deserializing)]
    pub actions: Vec<Action>,
    /// Tree from the most recent validation pass
    #[serde(skip)]
    pub validation: Option<ValidationResult>,
}

impl Default for Orchestration {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: ORCHESTRATION_VERSION.to_string(),
            polling_interval_minutes: MIN_POLLING_INTERVAL_MINUTES,
            lifecycle: LifecycleBehavior::default(),
            order: Ordering::default(),
            source: OrchestrationSource::default(),
            actions: Vec::new(),
            validation: None,
        }
    }
}

impl Orchestration {
    /// Validity roll-up of the last validation pass. An orchestration that was
    /// never validated is not valid.
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.is_valid())
    }

    /// Display name, falling back to a generic label
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            "Orchestration"
        } else {
            &self.name
        }
    }
}
