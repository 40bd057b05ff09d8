//! Validation tree
//!
//! Results are built bottom-up: leaves first, then parents from already-known
//! children. A parent's validity is the AND of its children and is fixed at
//! construction. Every validation pass builds a fresh tree.

use crate::api::UriProbe;
use crate::models::{Orchestration, MIN_POLLING_INTERVAL_MINUTES};

// Fixed messages. Hosts and tests match on these exactly.
pub const INVALID_POLLING_INTERVAL: &str = "The polling interval must be at least 15 minutes.";
pub const INVALID_DURATION: &str = "The duration must not be negative.";
pub const INVALID_SCROLLING_TIME: &str = "The scrolling time must not be negative.";
pub const INVALID_SCROLLING_INTERVAL: &str = "The scrolling interval must not be negative.";
pub const INVALID_SCROLLING_RESET_DELAY: &str = "The scrolling reset delay must not be negative.";
pub const INVALID_SETTINGS_DISPLAY_TIME: &str =
    "The duration is shorter than the scrolling time plus the reset delay.";
pub const MISSING_PATH: &str = "A path is required.";
pub const EMPTY_SLIDESHOW: &str = "The slideshow has no images.";

/// Recursive pass/fail result
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    identifier: String,
    message: String,
    guidance: String,
    valid: bool,
    children: Vec<ValidationResult>,
}

impl ValidationResult {
    pub fn leaf(identifier: &str, valid: bool, message: &str, guidance: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            message: message.to_string(),
            guidance: guidance.to_string(),
            valid,
            children: Vec::new(),
        }
    }

    pub fn valid(identifier: &str) -> Self {
        Self::leaf(identifier, true, "", "")
    }

    pub fn invalid(identifier: &str, message: &str, guidance: &str) -> Self {
        Self::leaf(identifier, false, message, guidance)
    }

    /// Parent node. With no children this is a (valid) leaf.
    pub fn node(identifier: &str, children: Vec<ValidationResult>) -> Self {
        let valid = children.iter().all(ValidationResult::is_valid);
        Self {
            identifier: identifier.to_string(),
            message: String::new(),
            guidance: String::new(),
            valid,
            children,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn guidance(&self) -> &str {
        &self.guidance
    }

    pub fn children(&self) -> &[ValidationResult] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// First node with the given identifier, depth-first, self included
    pub fn find(&self, identifier: &str) -> Option<&ValidationResult> {
        if self.identifier == identifier {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(identifier))
    }

    /// Leaves with the given validity, depth-first
    pub fn leaves(&self, valid: bool) -> Vec<&ValidationResult> {
        let mut found = Vec::new();
        self.collect_leaves(valid, &mut found);
        found
    }

    fn collect_leaves<'a>(&'a self, valid: bool, found: &mut Vec<&'a ValidationResult>) {
        if self.is_leaf() {
            if self.valid == valid {
                found.push(self);
            }
            return;
        }
        for child in &self.children {
            child.collect_leaves(valid, found);
        }
    }

    pub fn count(&self, valid: bool) -> usize {
        self.leaves(valid).len()
    }

    /// "N passed / M failed"
    pub fn summary(&self) -> String {
        format!("{} passed / {} failed", self.count(true), self.count(false))
    }
}

/// Reachability check for a content path, recorded under `property`
pub fn validate_uri<P: UriProbe + ?Sized>(
    probe: &P,
    path: &str,
    expected_status: u16,
    property: &str,
) -> ValidationResult {
    if path.trim().is_empty() {
        return ValidationResult::invalid(property, MISSING_PATH, "Set a URL or file path.");
    }

    let outcome = probe.probe(path.trim(), expected_status);
    if outcome.reachable {
        ValidationResult::leaf(property, true, &outcome.message, "")
    } else {
        ValidationResult::invalid(
            property,
            &outcome.message,
            "Check that the address is correct and reachable from the display.",
        )
    }
}

pub fn validate_duration(duration: Option<i64>) -> ValidationResult {
    match duration {
        Some(d) if d < 0 => ValidationResult::invalid(
            "Duration",
            INVALID_DURATION,
            "Use zero or more seconds, or leave the duration empty.",
        ),
        _ => ValidationResult::valid("Duration"),
    }
}

pub fn non_negative(identifier: &str, value: i64, message: &str) -> ValidationResult {
    if value < 0 {
        ValidationResult::invalid(identifier, message, "Use zero or more seconds.")
    } else {
        ValidationResult::valid(identifier)
    }
}

/// Validate an orchestration and all of its actions. The resulting tree also
/// replaces the one stored on the orchestration.
pub fn validate_orchestration<P: UriProbe + ?Sized>(
    orchestration: &mut Orchestration,
    probe: &P,
) -> ValidationResult {
    let mut children = Vec::with_capacity(orchestration.actions.len() + 1);

    children.push(
        if orchestration.polling_interval_minutes < MIN_POLLING_INTERVAL_MINUTES {
            ValidationResult::invalid(
                "PollingIntervalMinutes",
                INVALID_POLLING_INTERVAL,
                "Raise pollingIntervalMinutes to 15 or more.",
            )
        } else {
            ValidationResult::valid("PollingIntervalMinutes")
        },
    );

    children.extend(orchestration.actions.iter().map(|action| action.validate(probe)));

    let result = ValidationResult::node(orchestration.label(), children);
    orchestration.validation = Some(result.clone());
    result
}
