//! Type resolution for untyped action records
//!
//! Definitions carry no type discriminator, so each record is scored against
//! a static registry of variants: +1 for every declared field the record has,
//! -1 for every declared field it lacks. The highest score wins and ties go to
//! the variant declared first. The winner is default-constructed and every
//! supplied field that converts cleanly is assigned; fields that fail to
//! convert keep their defaults.

use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use super::{Action, ActionKind, ImageAction, SlideshowAction, WebsiteAction};
use crate::models::{LifecycleBehavior, Ordering, StretchMode};

/// Value of one record key: text, or nested records for list fields
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Text(String),
    Records(Vec<PropertyBag>),
}

/// Ordered key/value record with case- and whitespace-insensitive keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    entries: Vec<(String, Property)>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; the last value for a key wins
    pub fn insert(&mut self, key: &str, value: Property) {
        let key = normalize_key(key);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with_text(mut self, key: &str, value: &str) -> Self {
        self.insert(key, Property::Text(value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        let key = normalize_key(key);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Semantic type a field's text converts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    Stretch,
    Order,
    Lifecycle,
    /// Nested image records
    Images,
}

/// One registry entry: tag, declared fields, constructor
pub struct Variant {
    pub kind: ActionKind,
    pub fields: &'static [(&'static str, FieldKind)],
    build: fn(Map<String, Value>) -> Option<Action>,
}

const IMAGE_FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("duration", FieldKind::Integer),
    ("path", FieldKind::Text),
    ("stretch", FieldKind::Stretch),
];

const WEBSITE_FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("duration", FieldKind::Integer),
    ("path", FieldKind::Text),
    ("autoScroll", FieldKind::Boolean),
    ("scrollDuration", FieldKind::Integer),
    ("scrollInterval", FieldKind::Integer),
    ("scrollResetDelay", FieldKind::Integer),
];

const SLIDESHOW_FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("duration", FieldKind::Integer),
    ("images", FieldKind::Images),
    ("order", FieldKind::Order),
];

/// Scalar fields of the orchestration itself. `actions` is resolved
/// separately, record by record.
pub const ORCHESTRATION_FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("version", FieldKind::Text),
    ("pollingIntervalMinutes", FieldKind::Integer),
    ("lifecycle", FieldKind::Lifecycle),
    ("order", FieldKind::Order),
];

/// Variant registry in declaration order. The order is the tie-break.
pub static VARIANTS: [Variant; 3] = [
    Variant {
        kind: ActionKind::Image,
        fields: IMAGE_FIELDS,
        build: build_image,
    },
    Variant {
        kind: ActionKind::Website,
        fields: WEBSITE_FIELDS,
        build: build_website,
    },
    Variant {
        kind: ActionKind::Slideshow,
        fields: SLIDESHOW_FIELDS,
        build: build_slideshow,
    },
];

fn build_image(fields: Map<String, Value>) -> Option<Action> {
    serde_json::from_value::<ImageAction>(Value::Object(fields))
        .ok()
        .map(Action::Image)
}

fn build_website(fields: Map<String, Value>) -> Option<Action> {
    serde_json::from_value::<WebsiteAction>(Value::Object(fields))
        .ok()
        .map(Action::Website)
}

fn build_slideshow(fields: Map<String, Value>) -> Option<Action> {
    serde_json::from_value::<SlideshowAction>(Value::Object(fields))
        .ok()
        .map(Action::Slideshow)
}

/// Match score of a record against a variant
pub fn score(record: &PropertyBag, variant: &Variant) -> i32 {
    variant
        .fields
        .iter()
        .map(|(name, _)| if record.contains(name) { 1 } else { -1 })
        .sum()
}

/// Best-scoring variant; the first declared wins ties
pub fn select_variant(record: &PropertyBag) -> &'static Variant {
    let mut best = &VARIANTS[0];
    let mut best_score = score(record, best);

    for variant in VARIANTS.iter().skip(1) {
        let s = score(record, variant);
        if s > best_score {
            best = variant;
            best_score = s;
        }
    }

    best
}

/// Materialize the action a record most likely describes
pub fn resolve(record: &PropertyBag) -> Option<Action> {
    let variant = select_variant(record);
    let fields = convert_fields(record, variant.fields);
    let action = (variant.build)(fields);
    if action.is_none() {
        log::warn!("Could not build {} action from record", variant.kind);
    }
    action
}

/// Resolve a list of records, dropping any that cannot be built
pub fn resolve_all(records: &[PropertyBag]) -> Vec<Action> {
    records.iter().filter_map(resolve).collect()
}

/// Convert every supplied declared field. Fields that fail to convert are
/// left out so the target keeps its default.
pub fn convert_fields(record: &PropertyBag, fields: &[(&str, FieldKind)]) -> Map<String, Value> {
    let mut converted = Map::new();

    for (name, kind) in fields {
        if let Some(property) = record.get(name) {
            match convert(property, *kind) {
                Some(value) => {
                    converted.insert(name.to_string(), value);
                }
                None => log::debug!("Ignoring field '{}': not a valid {:?}", name, kind),
            }
        }
    }

    converted
}

fn convert(property: &Property, kind: FieldKind) -> Option<Value> {
    match (kind, property) {
        (FieldKind::Text, Property::Text(s)) => Some(Value::String(s.clone())),
        (FieldKind::Integer, Property::Text(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (FieldKind::Boolean, Property::Text(s)) => parse_bool(s).map(Value::Bool),
        (FieldKind::Stretch, Property::Text(s)) => tag_value::<StretchMode>(s),
        (FieldKind::Order, Property::Text(s)) => tag_value::<Ordering>(s),
        (FieldKind::Lifecycle, Property::Text(s)) => tag_value::<LifecycleBehavior>(s),
        (FieldKind::Images, Property::Records(records)) => Some(Value::Array(
            records
                .iter()
                .map(|r| Value::Object(convert_fields(r, IMAGE_FIELDS)))
                .collect(),
        )),
        // An empty list element (e.g. `<images/>`) reads as empty text
        (FieldKind::Images, Property::Text(s)) if s.trim().is_empty() => Some(Value::Array(Vec::new())),
        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse an enum tag and re-serialize it in canonical form
fn tag_value<T>(s: &str) -> Option<Value>
where
    T: FromStr + Serialize,
{
    let tag = s.parse::<T>().ok()?;
    serde_json::to_value(tag).ok()
}
