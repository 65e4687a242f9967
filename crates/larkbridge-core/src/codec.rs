//! Value encoding between human input and upstream field representations.
//!
//! The functions here are pure: they work on a [`FieldProfile`] snapshot of a
//! field's type and option table, so the async resolver only has to fetch
//! metadata once per call.

use crate::metadata::{FIELD_TYPE_BOOL, FIELD_TYPE_MULTI_SELECT};
use indexmap::IndexMap;
use serde_json::{Value, json};

/// Delimiters accepted for pseudo multi-select input, in priority order.
pub const DELIMITERS: [&str; 4] = [" / ", ",", ";", "|"];

/// Everything the encoder needs to know about a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldProfile {
    /// Field type key, if the field is known.
    pub field_type_key: Option<String>,
    /// Option label → option value, in upstream order.
    pub options: IndexMap<String, String>,
}

impl FieldProfile {
    /// Profile of a field we know nothing about. Every value passes through.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Profile with a type and no options.
    #[must_use]
    pub fn of_type(field_type_key: impl Into<String>) -> Self {
        Self {
            field_type_key: Some(field_type_key.into()),
            options: IndexMap::new(),
        }
    }

    /// Add an option.
    #[must_use]
    pub fn with_option(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(label.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_multi_select(&self) -> bool {
        self.field_type_key.as_deref() == Some(FIELD_TYPE_MULTI_SELECT)
    }

    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self.field_type_key.as_deref(), Some(FIELD_TYPE_BOOL | "boolean"))
    }

    /// Encode a human value for the create/update endpoints.
    ///
    /// Selects become `{label, value}` objects, lists and delimited strings
    /// become lists, boolean fields accept yes/no style strings. Anything the
    /// profile cannot interpret is returned unchanged.
    #[must_use]
    pub fn encode_for_update(&self, value: &Value) -> Value {
        if self.is_multi_select() && is_blank(value) {
            return Value::Array(Vec::new());
        }

        match value {
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.encode_for_update(item)).collect())
            }
            Value::String(text) if contains_delimiter(text) => {
                if let Some(option_value) = self.options.get(text) {
                    return option_object(text, option_value);
                }
                match split_delimited(text) {
                    Some(parts) => Value::Array(
                        parts
                            .into_iter()
                            .map(|part| self.encode_for_update(&Value::String(part)))
                            .collect(),
                    ),
                    None => self.encode_single(value),
                }
            }
            _ => self.encode_single(value),
        }
    }

    fn encode_single(&self, value: &Value) -> Value {
        let Some(text) = scalar_text(value) else {
            return value.clone();
        };

        if let Some(option_value) = self.options.get(&text) {
            return option_object(&text, option_value);
        }
        if let Some((label, option_value)) = self.options.iter().find(|(_, v)| **v == text) {
            return option_object(label, option_value);
        }
        if self.is_bool() {
            if let Value::String(raw) = value {
                if let Some(flag) = parse_bool(raw) {
                    return Value::Bool(flag);
                }
            }
        }
        value.clone()
    }
}

/// Build the `{label, value}` object the update API expects for selects.
#[must_use]
pub fn option_object(label: &str, value: &str) -> Value {
    json!({ "label": label, "value": value })
}

/// Parse a case-insensitive boolean word.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Whether the text contains any multi-value delimiter.
#[must_use]
pub fn contains_delimiter(text: &str) -> bool {
    DELIMITERS.iter().any(|d| text.contains(d))
}

/// Split on the first delimiter (in priority order) that occurs in `text`.
///
/// Parts are trimmed and empty parts dropped. Returns `None` unless at least
/// two parts remain.
#[must_use]
pub fn split_delimited(text: &str) -> Option<Vec<String>> {
    let delimiter = DELIMITERS.iter().find(|d| text.contains(*d))?;
    let parts: Vec<String> = text
        .split(delimiter)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();
    (parts.len() > 1).then_some(parts)
}

/// Turn a raw upstream field value into something a person can read.
///
/// `{label, value}` becomes the label (then `name`, `name_cn`); a one-element
/// list of objects becomes that object's name; longer lists are converted
/// element by element. Scalars pass through. Display only, never for writes.
#[must_use]
pub fn extract_readable(raw: &Value) -> Value {
    match raw {
        Value::Object(map) => ["label", "name", "name_cn"]
            .iter()
            .find_map(|key| map.get(*key))
            .cloned()
            .unwrap_or_else(|| raw.clone()),
        Value::Array(items) if items.is_empty() => raw.clone(),
        Value::Array(items) if items.len() == 1 && items[0].is_object() => {
            let single = &items[0];
            ["name", "name_cn", "label"]
                .iter()
                .find_map(|key| single.get(*key))
                .cloned()
                .unwrap_or_else(|| single.clone())
        }
        Value::Array(items) => {
            let readable: Vec<Value> = items
                .iter()
                .map(extract_readable)
                .filter(|v| !v.is_null())
                .collect();
            if readable.is_empty() {
                raw.clone()
            } else {
                Value::Array(readable)
            }
        }
        _ => raw.clone(),
    }
}

/// Readable form of a user-typed field value.
///
/// User objects show `name_cn`, then `name`, then `user_key`; bare user keys
/// pass through. Lists keep one entry per user, even a single one.
#[must_use]
pub fn readable_user(raw: &Value) -> Value {
    match raw {
        Value::Array(users) => Value::Array(users.iter().map(readable_user).collect()),
        Value::Object(user) => ["name_cn", "name", "user_key"]
            .iter()
            .find_map(|key| user.get(*key).filter(|v| v.as_str().is_some_and(|s| !s.is_empty())))
            .cloned()
            .unwrap_or_else(|| raw.clone()),
        _ => raw.clone(),
    }
}

/// String form of a scalar, used for option matching.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
