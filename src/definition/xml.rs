//! XML records and writer
//!
//! Element names are field names. An element holding elements is a list of
//! records (the record element names themselves carry no meaning); an element
//! holding text is a scalar.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use serde_json::Value;

use crate::action::resolver::{Property, PropertyBag};
use crate::error::{KioskError, Result};
use crate::models::Orchestration;

/// Element name used for nested image records
const IMAGE_ELEMENT: &str = "image";

/// Parsed element tree
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// This element's children as one record
    pub fn to_bag(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        for child in &self.children {
            bag.insert(&child.name, child.value());
        }
        bag
    }

    /// Each child element as a record
    pub fn records(&self) -> Vec<PropertyBag> {
        self.children.iter().map(Element::to_bag).collect()
    }

    /// Text is kept exactly as written; typed fields trim during conversion
    fn value(&self) -> Property {
        if self.children.is_empty() {
            Property::Text(self.text.clone())
        } else {
            Property::Records(self.records())
        }
    }
}

/// Parse a document into its root element
pub fn parse(content: &str) -> Result<Element> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| KioskError::Xml(format!("at byte {}: {}", position, e)))?;

        match event {
            Event::Start(e) => stack.push(Element::new(element_name(&e))),
            Event::Empty(e) => attach(&mut stack, &mut root, Element::new(element_name(&e)))?,
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| KioskError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::CData(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::GeneralRef(r) => {
                let name = r.decode().map_err(|e| KioskError::Xml(e.to_string()))?;
                let resolved = resolve_entity(&name)
                    .ok_or_else(|| KioskError::Xml(format!("unknown entity &{};", name)))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push(resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(KioskError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| KioskError::Xml("no root element".to_string()))
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(KioskError::Xml("more than one root element".to_string()));
    }
    Ok(())
}

fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Write an orchestration as XML. Action records are named by kind.
pub fn write(orchestration: &Orchestration) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(&mut writer, Event::Start(BytesStart::new("orchestration")))?;

    if let Value::Object(fields) = serde_json::to_value(orchestration)? {
        for key in ["name", "version", "pollingIntervalMinutes", "lifecycle", "order"] {
            if let Some(value) = fields.get(key) {
                write_scalar(&mut writer, key, value)?;
            }
        }
    }

    emit(&mut writer, Event::Start(BytesStart::new("actions")))?;
    for action in &orchestration.actions {
        write_record(&mut writer, action.kind().tag(), &serde_json::to_value(action)?)?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("actions")))?;

    emit(&mut writer, Event::End(BytesEnd::new("orchestration")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| KioskError::Xml(e.to_string()))
}

fn write_record(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;

    if let Value::Object(fields) = value {
        for (key, field) in fields {
            match field {
                Value::Array(items) => {
                    emit(writer, Event::Start(BytesStart::new(key.as_str())))?;
                    for item in items {
                        write_record(writer, IMAGE_ELEMENT, item)?;
                    }
                    emit(writer, Event::End(BytesEnd::new(key.as_str())))?;
                }
                other => write_scalar(writer, key, other)?,
            }
        }
    }

    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_scalar(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    let text = match value {
        Value::Null => return Ok(()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    // A start/end pair with nothing between would pick up indentation
    if text.is_empty() {
        return emit(writer, Event::Empty(BytesStart::new(name)));
    }

    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(&text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| KioskError::Xml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_records() {
        let root = parse(
            r#"<?xml version="1.0"?>
<orchestration>
  <name>Lobby</name>
  <actions>
    <image><path>a.png</path></image>
    <image><path>b.png</path><duration>5</duration></image>
  </actions>
</orchestration>"#,
        )
        .unwrap();

        assert_eq!(root.name, "orchestration");
        let bag = root.to_bag();
        assert_eq!(bag.get("name"), Some(&Property::Text("Lobby".to_string())));
        match bag.get("actions") {
            Some(Property::Records(records)) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].get("duration"), Some(&Property::Text("5".to_string())));
            }
            other => panic!("expected records, got {:?}", other),
        }
    }

    #[test]
    fn test_entities_and_cdata() {
        let root = parse(
            "<r><a>Rock &amp; Roll</a><b>&#60;tag&#x3E;</b><c><![CDATA[x < y]]></c></r>",
        )
        .unwrap();
        let bag = root.to_bag();
        assert_eq!(bag.get("a"), Some(&Property::Text("Rock & Roll".to_string())));
        assert_eq!(bag.get("b"), Some(&Property::Text("<tag>".to_string())));
        assert_eq!(bag.get("c"), Some(&Property::Text("x < y".to_string())));
    }

    #[test]
    fn test_rejects_broken_documents() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a>").is_err());
        assert!(parse("just text").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_scalar_whitespace_is_kept() {
        let root = parse("<r><name> Lobby Display </name><path>\ta.png</path></r>").unwrap();
        let bag = root.to_bag();
        assert_eq!(bag.get("name"), Some(&Property::Text(" Lobby Display ".to_string())));
        assert_eq!(bag.get("path"), Some(&Property::Text("\ta.png".to_string())));
    }

    #[test]
    fn test_empty_element_is_empty_text() {
        let root = parse("<r><images/></r>").unwrap();
        assert_eq!(root.to_bag().get("images"), Some(&Property::Text(String::new())));
    }
}
