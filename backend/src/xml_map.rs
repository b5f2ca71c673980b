//! XML to nested mapping conversion.
//!
//! The Moodle export is read into a tree of string-keyed mappings that
//! mirrors the document 1:1: attribute keys carry a leading `@` marker,
//! element text inside a mapping is stored under `#text`, and repeated
//! sibling elements collapse into an ordered list. Question parsing works
//! against this shape rather than the XML event stream.

use anyhow::Result;
use indexmap::map::Entry;
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::ConvertError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum XmlValue {
    /// An element with no attributes, children or text, e.g. `<text/>`.
    Null,
    /// An element with text content only.
    Text(String),
    /// Repeated sibling elements of the same name, in document order.
    List(Vec<XmlValue>),
    /// An element with attributes and/or child elements.
    Map(IndexMap<String, XmlValue>),
}

impl XmlValue {
    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        match self {
            XmlValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_required(&self, key: &str) -> Result<&XmlValue, ConvertError> {
        self.get(key).ok_or_else(|| ConvertError::missing(key))
    }

    /// An attribute or other field that must hold a plain string.
    pub fn get_str(&self, key: &str) -> Result<&str, ConvertError> {
        match self.get_required(key)? {
            XmlValue::Text(s) => Ok(s),
            _ => Err(ConvertError::mismatch(key.to_string(), "text")),
        }
    }

    /// A rich-text field: the key must exist, but its value may be an empty
    /// element, which reads as `None`.
    pub fn get_text(&self, key: &str) -> Result<Option<&str>, ConvertError> {
        match self.get_required(key)? {
            XmlValue::Null => Ok(None),
            XmlValue::Text(s) => Ok(Some(s)),
            XmlValue::Map(map) => match map.get("#text") {
                Some(XmlValue::Text(s)) => Ok(Some(s)),
                _ => Err(ConvertError::mismatch(key.to_string(), "text")),
            },
            XmlValue::List(_) => Err(ConvertError::mismatch(key.to_string(), "text")),
        }
    }

    /// Normalizes a list-or-single field to a sequence: a repeated element
    /// is already a list, a single mapping is wrapped as one element.
    pub fn as_list(&self, key: &str) -> Result<Vec<&XmlValue>, ConvertError> {
        match self.get_required(key)? {
            XmlValue::List(items) => Ok(items.iter().collect()),
            single => Ok(vec![single]),
        }
    }

    /// JSON rendering of the record, used for malformed-question dumps.
    pub fn dump(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Parse an XML document into the nested mapping shape, keyed by the root
/// element name. No schema validation happens here.
pub fn parse_document(content: &str) -> Result<XmlValue> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let e = e.into_owned();
                let name = element_name(&e)?;
                let value = parse_element(&mut reader, &e)?;
                let mut root = IndexMap::new();
                root.insert(name, value);
                return Ok(XmlValue::Map(root));
            }
            Ok(Event::Empty(e)) => {
                let e = e.into_owned();
                let name = element_name(&e)?;
                let mut root = IndexMap::new();
                root.insert(name, empty_element(&e)?);
                return Ok(XmlValue::Map(root));
            }
            Ok(Event::Eof) => return Err(anyhow::anyhow!("document has no root element")),
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "XML parse error at position {}: {:?}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }
}

fn parse_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<XmlValue> {
    let mut map = attributes_map(start)?;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let e = e.into_owned();
                let name = element_name(&e)?;
                let child = parse_element(reader, &e)?;
                insert_child(&mut map, name, child);
            }
            Ok(Event::Empty(e)) => {
                let e = e.into_owned();
                let name = element_name(&e)?;
                let child = empty_element(&e)?;
                insert_child(&mut map, name, child);
            }
            Ok(Event::Text(e)) => {
                text.push_str(&e.unescape()?);
            }
            Ok(Event::CData(e)) => {
                let bytes = e.into_inner();
                text.push_str(std::str::from_utf8(&bytes)?);
            }
            Ok(Event::End(_)) => break,
            Ok(Event::Eof) => {
                return Err(anyhow::anyhow!("unexpected end of document inside an element"))
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "XML parse error at position {}: {:?}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(finish_element(map, text))
}

fn finish_element(mut map: IndexMap<String, XmlValue>, text: String) -> XmlValue {
    if map.is_empty() {
        if text.is_empty() {
            XmlValue::Null
        } else {
            XmlValue::Text(text)
        }
    } else {
        if !text.is_empty() {
            map.insert("#text".to_string(), XmlValue::Text(text));
        }
        XmlValue::Map(map)
    }
}

fn empty_element(e: &BytesStart) -> Result<XmlValue> {
    let map = attributes_map(e)?;
    Ok(if map.is_empty() {
        XmlValue::Null
    } else {
        XmlValue::Map(map)
    })
}

fn attributes_map(e: &BytesStart) -> Result<IndexMap<String, XmlValue>> {
    let mut map = IndexMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = format!("@{}", std::str::from_utf8(attr.key.as_ref())?);
        let value = attr.unescape_value()?.to_string();
        map.insert(key, XmlValue::Text(value));
    }
    Ok(map)
}

fn element_name(e: &BytesStart) -> Result<String> {
    Ok(std::str::from_utf8(e.name().as_ref())?.to_string())
}

fn insert_child(map: &mut IndexMap<String, XmlValue>, name: String, child: XmlValue) {
    match map.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(child);
        }
        Entry::Occupied(mut slot) => {
            let current = slot.get_mut();
            if let XmlValue::List(items) = current {
                items.push(child);
            } else {
                let previous = std::mem::replace(current, XmlValue::Null);
                *current = XmlValue::List(vec![previous, child]);
            }
        }
    }
}
