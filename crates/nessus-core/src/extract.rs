//! Generic extraction of tag values from scanner XML replies.
//!
//! Replies are addressed purely by tag name: no namespaces, no attributes.
//! Every element is visited once in document order. Elements whose tag is in
//! the requested set are captured; an optional "unique" tag starts a new
//! record keyed by its text, so list replies come back as a mapping of
//! key -> record.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::api::{ApiError, Result};

/// Number of digits in a Unix timestamp as emitted by the scanner
const UNIX_TIMESTAMP_DIGITS: usize = 10;

/// A captured tag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Time(DateTime<Local>),
}

impl Value {
    /// Build a value for `tag`, converting `*time*` tags holding a 10-digit
    /// epoch second count into a local timestamp.
    pub fn from_tag(tag: &str, text: &str) -> Self {
        if tag.contains("time") && is_unix_timestamp(text) {
            if let Some(time) = text
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
            {
                return Value::Time(time.with_timezone(&Local));
            }
        }
        Value::Text(text.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Time(_) => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Local>> {
        match self {
            Value::Time(t) => Some(*t),
            Value::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

fn is_unix_timestamp(text: &str) -> bool {
    text.len() == UNIX_TIMESTAMP_DIGITS && text.bytes().all(|b| b.is_ascii_digit())
}

/// Tag name -> value for one record.
pub type Record = BTreeMap<String, Value>;

/// Which tags to capture, and optionally which tag separates records.
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<'a> {
    pub tags: &'a [&'a str],
    pub unique: Option<&'a str>,
}

impl<'a> ExtractRequest<'a> {
    pub const fn flat(tags: &'a [&'a str]) -> Self {
        Self { tags, unique: None }
    }

    pub const fn keyed(tags: &'a [&'a str], unique: &'a str) -> Self {
        Self {
            tags,
            unique: Some(unique),
        }
    }

    fn wants(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Extraction {
    /// No unique tag: one mapping, last occurrence of a tag wins.
    Flat(Record),
    /// Unique tag given: records keyed by the unique tag's text.
    Keyed(BTreeMap<String, Record>),
}

impl Extraction {
    pub fn into_flat(self) -> Result<Record> {
        match self {
            Extraction::Flat(record) => Ok(record),
            Extraction::Keyed(_) => Err(ApiError::MalformedResponse(
                "expected a flat extraction, got keyed records".to_string(),
            )),
        }
    }

    pub fn into_keyed(self) -> Result<BTreeMap<String, Record>> {
        match self {
            Extraction::Keyed(records) => Ok(records),
            Extraction::Flat(_) => Err(ApiError::MalformedResponse(
                "expected keyed records, got a flat extraction".to_string(),
            )),
        }
    }
}

/// Text of `node` up to its first child element, skipping comments and
/// processing instructions.
fn leading_text(node: roxmltree::Node<'_, '_>) -> String {
    node.children()
        .take_while(|child| !child.is_element())
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

/// Pull the requested tags out of an XML document.
///
/// With a unique tag configured, each occurrence of that tag opens a fresh,
/// empty record keyed by its text (a repeated key resets the earlier record),
/// and captured tags are stored into the most recently opened record. A
/// captured tag appearing before any unique tag is a `MalformedResponse`.
pub fn extract(xml: &str, request: &ExtractRequest<'_>) -> Result<Extraction> {
    let doc = roxmltree::Document::parse(xml)?;

    let mut flat = Record::new();
    let mut keyed: BTreeMap<String, Record> = BTreeMap::new();
    let mut current_key: Option<String> = None;

    for node in doc.descendants().filter(|n| n.is_element()) {
        let tag = node.tag_name().name();
        let text = leading_text(node);

        if request.unique == Some(tag) {
            keyed.insert(text.clone(), Record::new());
            current_key = Some(text.clone());
        }

        if !request.wants(tag) {
            continue;
        }

        let value = Value::from_tag(tag, &text);
        match request.unique {
            None => {
                flat.insert(tag.to_string(), value);
            }
            Some(unique) => {
                let key = current_key.as_ref().ok_or_else(|| {
                    ApiError::MalformedResponse(format!(
                        "<{}> appeared before any <{}> record marker",
                        tag, unique
                    ))
                })?;
                // The key was inserted when current_key was set
                if let Some(record) = keyed.get_mut(key) {
                    record.insert(tag.to_string(), value);
                }
            }
        }
    }

    Ok(match request.unique {
        None => Extraction::Flat(flat),
        Some(_) => Extraction::Keyed(keyed),
    })
}
