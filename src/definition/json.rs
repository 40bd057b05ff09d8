//! JSON records

use serde_json::{Map, Value};

use crate::action::resolver::{Property, PropertyBag};

/// Flatten a JSON object into a record. Scalars become text, arrays become
/// nested records and nulls are skipped.
pub fn bag_from_object(object: &Map<String, Value>) -> PropertyBag {
    let mut bag = PropertyBag::new();

    for (key, value) in object {
        let property = match value {
            Value::Null => continue,
            Value::String(s) => Property::Text(s.clone()),
            Value::Bool(b) => Property::Text(b.to_string()),
            Value::Number(n) => Property::Text(n.to_string()),
            Value::Array(items) => Property::Records(records_from_array(items)),
            Value::Object(inner) => Property::Records(vec![bag_from_object(inner)]),
        };
        bag.insert(key, property);
    }

    bag
}

/// Objects in an array become records; anything else is not a record
pub fn records_from_array(items: &[Value]) -> Vec<PropertyBag> {
    items
        .iter()
        .filter_map(|item| item.as_object().map(bag_from_object))
        .collect()
}
