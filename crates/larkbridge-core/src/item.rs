//! Work item model.
//!
//! The upstream service returns work items in two shapes: the current one
//! carries a `fields` list, older endpoints use `field_value_pairs`. Both are
//! folded into [`WorkItem`] during deserialization so nothing downstream has
//! to care which one arrived.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single field value attached to a work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldValue {
    /// Field key (opaque upstream identifier).
    pub field_key: String,

    /// Raw value as returned by the upstream service.
    #[serde(default)]
    pub field_value: Value,

    /// Field type (e.g. "select", "multi_select", "user"). Absent for legacy pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type_key: Option<String>,

    /// Field alias, when the upstream includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_alias: Option<String>,
}

impl FieldValue {
    /// Create a field value without type information.
    #[must_use]
    pub fn new(field_key: impl Into<String>, field_value: impl Into<Value>) -> Self {
        Self {
            field_key: field_key.into(),
            field_value: field_value.into(),
            field_type_key: None,
            field_alias: None,
        }
    }

    /// Attach a field type.
    #[must_use]
    pub fn with_type(mut self, field_type_key: impl Into<String>) -> Self {
        self.field_type_key = Some(field_type_key.into());
        self
    }
}

/// A work item in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "WireWorkItem")]
pub struct WorkItem {
    /// Upstream numeric id.
    pub id: i64,

    /// Work item name (title).
    pub name: String,

    /// Field values, in upstream order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldValue>,

    /// Remaining top-level attributes (type key, creator, timestamps, ...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Field list as it appears on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldList {
    /// Current shape: `fields`.
    Fields(Vec<FieldValue>),
    /// Legacy shape: `field_value_pairs`.
    Pairs(Vec<FieldValue>),
    /// Neither list was present.
    Absent,
}

impl FieldList {
    fn into_fields(self) -> Vec<FieldValue> {
        match self {
            Self::Fields(fields) | Self::Pairs(fields) => fields,
            Self::Absent => Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct WireWorkItem {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Option<Vec<FieldValue>>,
    #[serde(default)]
    field_value_pairs: Option<Vec<FieldValue>>,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl WireWorkItem {
    fn field_list(&mut self) -> FieldList {
        match (self.fields.take(), self.field_value_pairs.take()) {
            (Some(fields), _) if !fields.is_empty() => FieldList::Fields(fields),
            (_, Some(pairs)) if !pairs.is_empty() => FieldList::Pairs(pairs),
            (Some(fields), _) => FieldList::Fields(fields),
            (None, Some(pairs)) => FieldList::Pairs(pairs),
            (None, None) => FieldList::Absent,
        }
    }
}

impl From<WireWorkItem> for WorkItem {
    fn from(mut wire: WireWorkItem) -> Self {
        let fields = wire.field_list().into_fields();
        Self {
            id: wire.id,
            name: wire.name,
            fields,
            attributes: wire.attributes,
        }
    }
}

impl WorkItem {
    /// Create a work item with no fields.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            fields: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Add a field value.
    #[must_use]
    pub fn with_field(mut self, field: FieldValue) -> Self {
        self.fields.push(field);
        self
    }

    /// Find a field by key.
    #[must_use]
    pub fn field(&self, field_key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.field_key == field_key)
    }

    /// Readable value of a field, flattened to a string when possible.
    #[must_use]
    pub fn readable_field(&self, field_key: &str) -> Option<String> {
        let raw = &self.field(field_key)?.field_value;
        match crate::codec::extract_readable(raw) {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Whether any field value references the given work item id.
    #[must_use]
    pub fn is_related_to(&self, id: i64) -> bool {
        self.fields.iter().any(|f| match &f.field_value {
            Value::Array(values) => values.iter().any(|v| value_is_id(v, id)),
            other => value_is_id(other, id),
        })
    }
}

fn value_is_id(value: &Value, id: i64) -> bool {
    match value {
        Value::Number(n) => n.as_i64() == Some(id),
        Value::String(s) => s.parse::<i64>().is_ok_and(|parsed| parsed == id),
        _ => false,
    }
}

/// One page of work items.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkItemPage {
    /// Items on this page, in upstream order.
    pub items: Vec<WorkItem>,
    /// Total number of matching items reported by the upstream.
    pub total: u64,
}
