//! Converts human-entered field values into what the API expects, and back.

use crate::resolver::MetadataResolver;
use larkbridge_core::FieldProfile;
use larkbridge_core::codec::scalar_text;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Field names tried, in order, when looking for the owner field.
pub const OWNER_FIELD_CANDIDATES: [&str; 5] = ["owner", "当前负责人", "负责人", "经办人", "Assignee"];

/// Owner field key used when no candidate resolves.
pub const DEFAULT_OWNER_FIELD: &str = "owner";

/// Field value encoder bound to a resolver.
///
/// Encoding is best-effort: when metadata cannot be found the value is
/// logged and passed through unchanged.
#[derive(Clone)]
pub struct FieldValueCodec {
    resolver: Arc<MetadataResolver>,
}

impl FieldValueCodec {
    #[must_use]
    pub const fn new(resolver: Arc<MetadataResolver>) -> Self {
        Self { resolver }
    }

    /// Encode a value for filter/search conditions: an option label becomes
    /// its option value. Anything else comes back unchanged.
    pub async fn resolve_for_search(&self, project_key: &str, type_key: &str, field_key: &str, value: &Value) -> Value {
        let Some(text) = scalar_text(value) else {
            return value.clone();
        };
        match self
            .resolver
            .get_option_value(project_key, type_key, field_key, &text)
            .await
        {
            Ok(option_value) => Value::String(option_value),
            Err(e) => {
                warn!(field = %field_key, error = %e, "Search value left unresolved");
                value.clone()
            }
        }
    }

    /// Encode a value for the create/update endpoints.
    ///
    /// See [`FieldProfile::encode_for_update`] for the rules. An unknown
    /// field is encoded with an empty profile, which passes values through.
    pub async fn resolve_for_update(&self, project_key: &str, type_key: &str, field_key: &str, value: &Value) -> Value {
        let profile = match self.resolver.field_profile(project_key, type_key, field_key).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(field = %field_key, error = %e, "Field metadata unavailable, value passed through");
                FieldProfile::unknown()
            }
        };
        profile.encode_for_update(value)
    }

    /// Readable form of a raw upstream value.
    #[must_use]
    pub fn extract_readable(&self, raw: &Value) -> Value {
        larkbridge_core::extract_readable(raw)
    }

    /// Key of the field holding a work item's owner.
    pub async fn resolve_owner_field_key(&self, project_key: &str, type_key: &str) -> String {
        for candidate in OWNER_FIELD_CANDIDATES {
            if let Ok(key) = self.resolver.get_field_key(project_key, type_key, candidate).await {
                debug!(candidate, field = %key, "Resolved owner field");
                return key;
            }
        }
        DEFAULT_OWNER_FIELD.to_string()
    }
}
