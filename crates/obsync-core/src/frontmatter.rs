//! Typed access to front-matter fields
//!
//! Front matter is parsed into a string-keyed map of [`PropertyValue`]s.
//! Callers read fields through typed getters that fall back to a default
//! instead of failing when a field is missing or has another shape.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::hashing::split_frontmatter;
use crate::util::normalize_text_option;

/// Discriminator for [`PropertyValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Null,
    Text,
    Number,
    Checkbox,
    List,
    Map,
}

/// One front-matter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Null,
    Text(String),
    Number(f64),
    Checkbox(bool),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub const fn kind(&self) -> PropertyKind {
        match self {
            Self::Null => PropertyKind::Null,
            Self::Text(_) => PropertyKind::Text,
            Self::Number(_) => PropertyKind::Number,
            Self::Checkbox(_) => PropertyKind::Checkbox,
            Self::List(_) => PropertyKind::List,
            Self::Map(_) => PropertyKind::Map,
        }
    }

    /// Render scalar values as text; lists and maps have no text form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Number(number) => Some(number.to_string()),
            Self::Checkbox(flag) => Some(flag.to_string()),
            Self::Null | Self::List(_) | Self::Map(_) => None,
        }
    }
}

impl From<serde_yaml::Value> for PropertyValue {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Checkbox(flag),
            Value::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
            Value::String(text) => Self::Text(text),
            Value::Sequence(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Mapping(mapping) => Self::Map(
                mapping
                    .into_iter()
                    .filter_map(|(key, value)| yaml_key(key).map(|key| (key, Self::from(value))))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(text) => Some(text),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Parsed front matter of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    fields: BTreeMap<String, PropertyValue>,
}

impl Frontmatter {
    /// Parse the front-matter block of a document.
    ///
    /// Documents without a block, or with YAML that is not a mapping, yield an
    /// empty field set rather than an error.
    pub fn parse(document: &str) -> Self {
        let (Some(block), _) = split_frontmatter(document) else {
            return Self::default();
        };
        Self::parse_block(block)
    }

    /// Parse the inside of a front-matter block (without markers).
    pub fn parse_block(block: &str) -> Self {
        match serde_yaml::from_str::<serde_yaml::Value>(block) {
            Ok(value @ serde_yaml::Value::Mapping(_)) => match PropertyValue::from(value) {
                PropertyValue::Map(fields) => Self { fields },
                _ => Self::default(),
            },
            Ok(_) => Self::default(),
            Err(error) => {
                tracing::debug!("Ignoring malformed front matter: {error}");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Text value of a field, or `default`.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        normalize_text_option(self.get(key).and_then(PropertyValue::as_text))
            .unwrap_or_else(|| default.to_string())
    }

    /// Integer value of a field, or `default`. Numeric text is accepted.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(PropertyValue::Number(number)) if number.fract() == 0.0 => *number as i64,
            Some(PropertyValue::Text(text)) => text.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Boolean value of a field, or `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(PropertyValue::Checkbox(flag)) => *flag,
            Some(PropertyValue::Text(text)) => {
                match text.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" => false,
                    _ => default,
                }
            }
            _ => default,
        }
    }

    /// Timestamp value of a field.
    ///
    /// Accepts RFC 3339 instants and plain `YYYY-MM-DD` dates (midnight UTC).
    pub fn get_datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        let text = match self.get(key)? {
            PropertyValue::Text(text) => text.trim().to_string(),
            _ => return None,
        };
        if let Ok(instant) = DateTime::parse_from_rfc3339(&text) {
            return Some(instant.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// List of text values. A scalar is returned as a one-item list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(PropertyValue::List(items)) => {
                items.iter().filter_map(PropertyValue::as_text).collect()
            }
            Some(value) => value.as_text().into_iter().collect(),
            None => Vec::new(),
        }
    }
}
