//! Action model
//!
//! An action is one displayable unit of content. The set of variants is
//! closed: images, websites and slideshows of images. Each variant carries the
//! shared identity/name/duration fields plus its own settings, and validates
//! itself against a URL reachability probe.

pub mod resolver;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::api::UriProbe;
use crate::models::{Ordering, StretchMode};
use crate::validation::{self, ValidationResult};

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local action identity. Allocated on construction, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl ActionId {
    pub fn new() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Variant tag, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Image,
    Website,
    Slideshow,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Image, ActionKind::Website, ActionKind::Slideshow];

    /// Lowercase tag, also used as the XML record element name
    pub fn tag(&self) -> &'static str {
        match self {
            ActionKind::Image => "image",
            ActionKind::Website => "website",
            ActionKind::Slideshow => "slideshow",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A still image shown full screen
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageAction {
    #[serde(skip)]
    id: ActionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Seconds on screen; `None` waits for a manual advance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub path: String,
    pub stretch: StretchMode,
}

impl ImageAction {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn validate<P: UriProbe + ?Sized>(&self, probe: &P) -> ValidationResult {
        let label = display_label(self.name.as_deref(), ActionKind::Image, self.id);
        ValidationResult::node(
            &label,
            vec![
                validation::validate_uri(probe, &self.path, 200, "Path"),
                validation::validate_duration(self.duration),
            ],
        )
    }
}

/// A web page, optionally auto-scrolled
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WebsiteAction {
    #[serde(skip)]
    id: ActionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub path: String,
    pub auto_scroll: bool,
    /// Seconds one scroll pass takes
    pub scroll_duration: i64,
    /// Seconds between scroll steps
    pub scroll_interval: i64,
    /// Seconds to hold at the bottom before jumping back to the top
    pub scroll_reset_delay: i64,
}

impl WebsiteAction {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_scrolling(mut self, duration: i64, interval: i64, reset_delay: i64) -> Self {
        self.auto_scroll = true;
        self.scroll_duration = duration;
        self.scroll_interval = interval;
        self.scroll_reset_delay = reset_delay;
        self
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Time left for the page after one scroll pass and its reset delay.
    /// Only meaningful for auto-scrolling pages with a duration.
    pub fn settings_display_time(&self) -> Option<i64> {
        if !self.auto_scroll {
            return None;
        }
        self.duration.map(|d| {
            d.saturating_sub(self.scroll_duration)
                .saturating_sub(self.scroll_reset_delay)
        })
    }

    pub fn validate<P: UriProbe + ?Sized>(&self, probe: &P) -> ValidationResult {
        let label = display_label(self.name.as_deref(), ActionKind::Website, self.id);
        let mut children = vec![
            validation::validate_uri(probe, &self.path, 200, "Path"),
            validation::validate_duration(self.duration),
            validation::non_negative(
                "ScrollingTime",
                self.scroll_duration,
                validation::INVALID_SCROLLING_TIME,
            ),
            validation::non_negative(
                "ScrollingInterval",
                self.scroll_interval,
                validation::INVALID_SCROLLING_INTERVAL,
            ),
            validation::non_negative(
                "ScrollingResetDelay",
                self.scroll_reset_delay,
                validation::INVALID_SCROLLING_RESET_DELAY,
            ),
        ];
        if let Some(remaining) = self.settings_display_time() {
            children.push(validation::non_negative(
                "SettingsDisplayTime",
                remaining,
                validation::INVALID_SETTINGS_DISPLAY_TIME,
            ));
        }
        ValidationResult::node(&label, children)
    }
}

/// An ordered set of images shown as one action
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SlideshowAction {
    #[serde(skip)]
    id: ActionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    pub images: Vec<ImageAction>,
    pub order: Ordering,
}

impl SlideshowAction {
    pub fn new(images: Vec<ImageAction>) -> Self {
        Self {
            images,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn validate<P: UriProbe + ?Sized>(&self, probe: &P) -> ValidationResult {
        let label = display_label(self.name.as_deref(), ActionKind::Slideshow, self.id);
        let mut children = vec![
            validation::validate_duration(self.duration),
            if self.images.is_empty() {
                ValidationResult::invalid(
                    "Images",
                    validation::EMPTY_SLIDESHOW,
                    "Add at least one image to the slideshow.",
                )
            } else {
                ValidationResult::valid("Images")
            },
        ];
        children.extend(self.images.iter().map(|image| image.validate(probe)));
        ValidationResult::node(&label, children)
    }
}

/// One displayable content item
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Action {
    Image(ImageAction),
    Website(WebsiteAction),
    Slideshow(SlideshowAction),
}

impl Action {
    pub fn id(&self) -> ActionId {
        match self {
            Action::Image(a) => a.id,
            Action::Website(a) => a.id,
            Action::Slideshow(a) => a.id,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Image(_) => ActionKind::Image,
            Action::Website(_) => ActionKind::Website,
            Action::Slideshow(_) => ActionKind::Slideshow,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Action::Image(a) => a.name.as_deref(),
            Action::Website(a) => a.name.as_deref(),
            Action::Slideshow(a) => a.name.as_deref(),
        }
    }

    pub fn duration(&self) -> Option<i64> {
        match self {
            Action::Image(a) => a.duration,
            Action::Website(a) => a.duration,
            Action::Slideshow(a) => a.duration,
        }
    }

    /// Name for logs and validation trees
    pub fn label(&self) -> String {
        display_label(self.name(), self.kind(), self.id())
    }

    pub fn validate<P: UriProbe + ?Sized>(&self, probe: &P) -> ValidationResult {
        match self {
            Action::Image(a) => a.validate(probe),
            Action::Website(a) => a.validate(probe),
            Action::Slideshow(a) => a.validate(probe),
        }
    }
}

impl From<ImageAction> for Action {
    fn from(action: ImageAction) -> Self {
        Action::Image(action)
    }
}

impl From<WebsiteAction> for Action {
    fn from(action: WebsiteAction) -> Self {
        Action::Website(action)
    }
}

impl From<SlideshowAction> for Action {
    fn from(action: SlideshowAction) -> Self {
        Action::Slideshow(action)
    }
}

fn display_label(name: Option<&str>, kind: ActionKind, id: ActionId) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{} {}", kind, id),
    }
}
