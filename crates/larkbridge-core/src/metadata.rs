//! Metadata models: projects, work item types, and field definitions.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Field type key of multi-select fields.
pub const FIELD_TYPE_MULTI_SELECT: &str = "multi_select";
/// Field type key of boolean fields.
pub const FIELD_TYPE_BOOL: &str = "bool";

/// Field types whose values are user keys.
pub const USER_FIELD_TYPES: &[&str] = &["user", "owner", "creator", "modifier"];
/// Field types whose values are work item ids.
pub const WORK_ITEM_FIELD_TYPES: &[&str] = &["work_item", "work_item_related"];

/// Check that a project, type or field key only uses the characters upstream
/// keys are made of.
///
/// # Errors
/// Returns `CoreError::Validation` for an empty key or any character besides
/// ASCII letters, digits, `_` and `-`.
pub fn validate_key(key: &str, what: &str) -> crate::error::Result<()> {
    if key.is_empty() {
        return Err(CoreError::Validation(format!("{what} must not be empty")));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let preview: String = key.chars().take(20).collect();
        return Err(CoreError::Validation(format!(
            "{what} may only contain letters, digits, '_' and '-': {preview}"
        )));
    }
    Ok(())
}

/// Project details as returned by the detail endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectDetail {
    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Short name, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_name: Option<String>,
}

/// A work item type within a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItemType {
    /// Display name (e.g. "Issue管理").
    #[serde(default)]
    pub name: String,

    /// Type key.
    #[serde(default)]
    pub type_key: String,
}

/// One selectable option of a select or multi-select field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldOption {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

impl FieldOption {
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Definition of a field within a (project, work item type) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Field key.
    #[serde(default)]
    pub field_key: String,

    /// Display name.
    #[serde(default)]
    pub field_name: String,

    /// Optional alias (often an English name for a localized field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_alias: Option<String>,

    /// Type key ("select", "multi_select", "bool", "text", ...).
    #[serde(default)]
    pub field_type_key: String,

    /// Options, in upstream order. Empty for free-form fields.
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<FieldOption>,
}

impl FieldDefinition {
    /// Create a definition without options.
    #[must_use]
    pub fn new(
        field_key: impl Into<String>,
        field_name: impl Into<String>,
        field_type_key: impl Into<String>,
    ) -> Self {
        Self {
            field_key: field_key.into(),
            field_name: field_name.into(),
            field_alias: None,
            field_type_key: field_type_key.into(),
            options: Vec::new(),
        }
    }

    /// Set the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.field_alias = Some(alias.into());
        self
    }

    /// Append an option.
    #[must_use]
    pub fn with_option(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(FieldOption::new(label, value));
        self
    }

    /// Whether this is a multi-select field.
    #[must_use]
    pub fn is_multi_select(&self) -> bool {
        self.field_type_key == FIELD_TYPE_MULTI_SELECT
    }
}

// The upstream sends `"options": null` for fields without options.
fn deserialize_options<'de, D>(deserializer: D) -> Result<Vec<FieldOption>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<FieldOption>>::deserialize(deserializer)?.unwrap_or_default())
}
