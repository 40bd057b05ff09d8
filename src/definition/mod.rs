//! Orchestration definitions
//!
//! Definitions arrive as JSON or XML text with no type information on the
//! action records. The loader tries JSON first, then XML; when both fail the
//! content is treated as absent rather than as an error.

pub mod json;
pub mod xml;

use serde_json::Value;

use crate::action::resolver::{self, Property, PropertyBag, ORCHESTRATION_FIELDS};
use crate::action::Action;
use crate::error::Result;
use crate::models::{Orchestration, OrchestrationSource};

/// A parsed definition in whichever encoding it arrived
#[derive(Debug, Clone)]
pub enum Document {
    Json(Value),
    Xml(xml::Element),
}

impl Document {
    /// The top-level record, if the document has one
    pub fn root_record(&self) -> Option<PropertyBag> {
        match self {
            Document::Json(Value::Object(object)) => Some(json::bag_from_object(object)),
            Document::Json(_) => None,
            Document::Xml(root) => Some(root.to_bag()),
        }
    }

    /// Action records: either the `actions` list of an orchestration or a
    /// bare list of records
    pub fn action_records(&self) -> Option<Vec<PropertyBag>> {
        match self {
            Document::Json(Value::Array(items)) => Some(json::records_from_array(items)),
            Document::Json(Value::Object(object)) => match object.get("actions") {
                Some(Value::Array(items)) => Some(json::records_from_array(items)),
                _ => None,
            },
            Document::Json(_) => None,
            Document::Xml(root) => match root.child("actions") {
                Some(actions) => Some(actions.records()),
                None => Some(root.records()),
            },
        }
    }
}

/// Parse as JSON, falling back to XML. `None` when neither works.
pub fn parse_document(content: &str) -> Option<Document> {
    let json_error = match serde_json::from_str::<Value>(content) {
        Ok(value) => return Some(Document::Json(value)),
        Err(e) => e,
    };

    match xml::parse(content) {
        Ok(root) => Some(Document::Xml(root)),
        Err(xml_error) => {
            log::warn!(
                "Definition is not JSON ({}) nor XML ({})",
                json_error,
                xml_error
            );
            None
        }
    }
}

/// Resolve a full orchestration. The source is not part of the wire format
/// and is assigned here.
pub fn load_orchestration(content: &str, source: OrchestrationSource) -> Option<Orchestration> {
    let record = parse_document(content)?.root_record()?;
    let mut orchestration = orchestration_from_record(&record)?;
    orchestration.source = source;
    Some(orchestration)
}

fn orchestration_from_record(record: &PropertyBag) -> Option<Orchestration> {
    let fields = resolver::convert_fields(record, ORCHESTRATION_FIELDS);
    let mut orchestration: Orchestration = serde_json::from_value(Value::Object(fields)).ok()?;

    orchestration.actions = match record.get("actions") {
        Some(Property::Records(records)) => resolver::resolve_all(records),
        _ => Vec::new(),
    };

    Some(orchestration)
}

/// Resolve a list of heterogeneous action records
pub fn resolve_actions(content: &str) -> Option<Vec<Action>> {
    let records = parse_document(content)?.action_records()?;
    Some(resolver::resolve_all(&records))
}

pub fn to_json(orchestration: &Orchestration) -> Result<String> {
    Ok(serde_json::to_string_pretty(orchestration)?)
}

pub fn to_xml(orchestration: &Orchestration) -> Result<String> {
    xml::write(orchestration)
}

/// Compact JSON used to decide whether two definitions differ. Identity,
/// source and validation state are not part of it.
pub fn canonical_form(orchestration: &Orchestration) -> String {
    serde_json::to_string(orchestration).unwrap_or_default()
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
