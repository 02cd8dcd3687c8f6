//! XML to JSON conversion
//!
//! Produces the familiar attribute/text layout: attributes become `@name`
//! keys, text next to attributes or children becomes `#text`, repeated
//! children collapse into arrays, text-only elements become strings and
//! empty elements become `null`.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

/// Element being assembled while its children stream past
struct OpenElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn start(e: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let mut fields = Map::new();

        for attr in e.attributes() {
            let attr = attr.map_err(|e| Error::xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref());
            let value = attr
                .unescape_value()
                .map_err(|e| Error::xml(e.to_string()))?;
            fields.insert(format!("@{key}"), Value::String(value.to_string()));
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn finish(self) -> (String, Value) {
        let value = match (self.fields.is_empty(), self.text.is_empty()) {
            (true, true) => Value::Null,
            (true, false) => Value::String(self.text),
            (false, _) => {
                let mut fields = self.fields;
                if !self.text.is_empty() {
                    fields.insert("#text".to_string(), Value::String(self.text));
                }
                Value::Object(fields)
            }
        };
        (self.name, value)
    }
}

/// Insert a child, turning repeated names into an array
fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Convert an XML document into a JSON value
pub fn xml_to_json(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = Map::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::xml(format!("at byte {}: {e}", reader.buffer_position())))?;

        match event {
            Event::Start(ref e) => stack.push(OpenElement::start(e)?),
            Event::Empty(ref e) => {
                let (name, value) = OpenElement::start(e)?.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape().map_err(|e| Error::xml(e.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::xml("unexpected closing tag"))?;
                let (name, value) = element.finish();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.fields, name, value),
                    None => insert_child(&mut root, name, value),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::xml(format!("unclosed element <{}>", open.name)));
    }
    if root.is_empty() {
        return Err(Error::xml("document has no root element"));
    }

    Ok(Value::Object(root))
}
