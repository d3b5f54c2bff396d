//! XML to nested JSON document conversion.
//!
//! Attributes become `@name` keys, text becomes `#text` when the element also
//! carries attributes or children, leaf elements map to their text, empty
//! elements map to `null`, and repeated siblings are collected into arrays.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            fields: Map::new(),
            text: String::new(),
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut frame = Self::new(name);
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| err.to_string())?;
            let key = format!("@{}", String::from_utf8_lossy(attribute.key.as_ref()));
            let value = attribute.unescape_value().map_err(|err| err.to_string())?;
            frame.fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(frame)
    }

    fn into_value(self) -> (String, Value) {
        let text = self.text.trim().to_string();
        let value = if self.fields.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            }
        } else {
            let mut fields = self.fields;
            if !text.is_empty() {
                fields.insert("#text".to_string(), Value::String(text));
            }
            Value::Object(fields)
        };
        (self.name, value)
    }
}

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

pub fn xml_to_document(xml: &str) -> Result<Map<String, Value>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Frame::new(String::new())];
    loop {
        match reader.read_event().map_err(|err| err.to_string())? {
            Event::Start(start) => stack.push(Frame::from_start(&start)?),
            Event::Empty(start) => {
                let (name, value) = Frame::from_start(&start)?.into_value();
                let parent = stack.last_mut().ok_or("unbalanced document")?;
                insert_child(&mut parent.fields, name, value);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|err| err.to_string())?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err("unexpected closing tag".to_string());
                }
                let (name, value) = stack.pop().ok_or("unbalanced document")?.into_value();
                let parent = stack.last_mut().ok_or("unbalanced document")?;
                insert_child(&mut parent.fields, name, value);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err("document ended inside an open element".to_string());
    }
    let root = stack.pop().ok_or("unbalanced document")?;
    if root.fields.is_empty() {
        return Err("document has no root element".to_string());
    }
    Ok(root.fields)
}
