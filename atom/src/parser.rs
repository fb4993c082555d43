//! Reads the `m:properties` of an Atom entry.
//!
//! Only the outer entry's properties are taken; anything inside an
//! `m:inline` block belongs to a related entity and is skipped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use waypoint_core::{EngineError, EngineResult, EntityProperties, PropertyValue};

struct PropertyHeader {
    name: String,
    edm_type: Option<String>,
    null: bool,
}

pub fn parse_entry(xml: &str) -> EngineResult<EntityProperties> {
    let mut reader = Reader::from_str(xml);
    let mut properties = EntityProperties::new();
    let mut saw_element = false;
    let mut depth = 0usize;
    let mut inline_depth = 0usize;
    let mut in_properties = false;
    let mut current: Option<PropertyHeader> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                saw_element = true;
                depth += 1;
                let local = local_name(e.local_name().as_ref());
                if local == "inline" {
                    inline_depth += 1;
                } else if inline_depth > 0 {
                    continue;
                } else if local == "properties" {
                    in_properties = true;
                } else if in_properties && current.is_none() {
                    current = Some(header(&e)?);
                    text.clear();
                }
            }
            Event::Empty(e) => {
                saw_element = true;
                if inline_depth == 0 && in_properties && current.is_none() {
                    let header = header(&e)?;
                    let value = to_value(&header, "")?;
                    properties.insert(header.name, value);
                }
            }
            Event::Text(t) => {
                if current.is_some() {
                    text.push_str(&t.unescape().map_err(malformed)?);
                }
            }
            Event::CData(c) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                let local = local_name(e.local_name().as_ref());
                if local == "inline" {
                    inline_depth = inline_depth.saturating_sub(1);
                } else if inline_depth > 0 {
                    continue;
                } else if local == "properties" {
                    in_properties = false;
                } else if let Some(header) = current.take() {
                    let value = to_value(&header, &text)?;
                    properties.insert(header.name, value);
                }
            }
            Event::Eof if depth > 0 => {
                return Err(EngineError::Malformed("unexpected end of document".into()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_element {
        return Err(EngineError::Malformed("document has no root element".into()));
    }
    Ok(properties)
}

fn header(start: &BytesStart<'_>) -> EngineResult<PropertyHeader> {
    let mut header = PropertyHeader {
        name: local_name(start.local_name().as_ref()),
        edm_type: None,
        null: false,
    };
    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let value = attr.unescape_value().map_err(malformed)?;
        match attr.key.local_name().as_ref() {
            b"type" => header.edm_type = Some(value.into_owned()),
            b"null" => header.null = value == "true",
            _ => {}
        }
    }
    Ok(header)
}

fn to_value(header: &PropertyHeader, text: &str) -> EngineResult<PropertyValue> {
    if header.null {
        return Ok(PropertyValue::Null);
    }
    let edm = header.edm_type.as_deref();
    let text = match edm {
        None | Some("Edm.String") => text,
        Some(_) => text.trim(),
    };
    PropertyValue::from_edm(edm, text).ok_or_else(|| {
        EngineError::Malformed(format!(
            "property '{}' is not a valid {}",
            header.name,
            edm.unwrap_or("Edm.String")
        ))
    })
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn malformed(e: impl std::fmt::Display) -> EngineError {
    EngineError::Malformed(e.to_string())
}
