//! Name → key resolution backed by the metadata cache.
//!
//! Every lookup first consults the [`NameKeyCache`]. Projects are re-listed
//! whenever a name is missing, since new projects appear over time. Type and
//! field namespaces are fetched once per scope and then treated as complete
//! until invalidated.
//!
//! Cache locks are only held for synchronous reads and writes, never across
//! an upstream call.

use crate::error::{ApiError, Result};
use crate::openapi::{OpenApi, mask_project_key};
use indexmap::IndexMap;
use larkbridge_core::{DEFAULT_TTL, FieldProfile, NameKeyCache, Namespace, Scope, TtlCache};
use parking_lot::{Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// Resolves human names to upstream keys.
pub struct MetadataResolver {
    api: OpenApi,
    cache: RwLock<NameKeyCache>,
    field_mappings: Mutex<TtlCache<IndexMap<String, String>>>,
}

impl MetadataResolver {
    /// Create a resolver with an empty cache.
    #[must_use]
    pub fn new(api: OpenApi) -> Self {
        Self::with_ttl(api, DEFAULT_TTL)
    }

    /// Create a resolver whose field mapping snapshots live for `ttl`.
    #[must_use]
    pub fn with_ttl(api: OpenApi, ttl: Duration) -> Self {
        Self {
            api,
            cache: RwLock::new(NameKeyCache::new()),
            field_mappings: Mutex::new(TtlCache::new(ttl)),
        }
    }

    /// The underlying API client.
    #[must_use]
    pub const fn api(&self) -> &OpenApi {
        &self.api
    }

    fn cached(&self, scope: &Scope, name: &str) -> Option<String> {
        self.cache.read().get(scope, name).map(String::from)
    }

    /// Resolve a project name to its key.
    ///
    /// A cached name costs nothing. Otherwise the project list and the
    /// details of every listed project are fetched and cached.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` if the list is empty or no project has
    /// this name; transport and upstream errors propagate.
    pub async fn get_project_key(&self, project_name: &str) -> Result<String> {
        if let Some(key) = self.cached(&Scope::Projects, project_name) {
            return Ok(key);
        }

        let keys = self.api.list_projects().await?;
        if keys.is_empty() {
            return Err(ApiError::unresolved(
                Namespace::Project,
                project_name,
                "an empty project list",
            ));
        }

        let details = self.api.project_details(&keys).await?;
        {
            let mut cache = self.cache.write();
            cache.put_all(
                Scope::Projects,
                details
                    .into_iter()
                    .filter(|(_, detail)| !detail.name.is_empty())
                    .map(|(key, detail)| (detail.name, key)),
            );
        }
        info!(projects = keys.len(), "Cached project names");

        self.cached(&Scope::Projects, project_name)
            .ok_or_else(|| ApiError::unresolved(Namespace::Project, project_name, "the project list"))
    }

    /// Resolve a work item type name within a project.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` if the project has no such type.
    pub async fn get_type_key(&self, project_key: &str, type_name: &str) -> Result<String> {
        let scope = Scope::types(project_key);
        if !self.cache.read().is_populated(&scope) {
            let types = self.api.all_types(project_key).await?;
            self.cache.write().put_all(
                scope.clone(),
                types
                    .into_iter()
                    .filter(|t| !t.name.is_empty() && !t.type_key.is_empty())
                    .map(|t| (t.name, t.type_key)),
            );
            debug!(project = %mask_project_key(project_key), "Cached work item types");
        }

        self.cached(&scope, type_name).ok_or_else(|| {
            ApiError::unresolved(
                Namespace::WorkItemType,
                type_name,
                format!("project {}", mask_project_key(project_key)),
            )
        })
    }

    async fn ensure_fields(&self, project_key: &str, type_key: &str) -> Result<()> {
        if self.cache.read().is_populated(&Scope::fields(project_key, type_key)) {
            return Ok(());
        }
        let definitions = self.api.all_fields(project_key, type_key).await?;
        self.cache.write().put_fields(project_key, type_key, definitions);
        Ok(())
    }

    /// Resolve a field by display name, alias, or key.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` if none of the three match.
    pub async fn get_field_key(&self, project_key: &str, type_key: &str, field_name: &str) -> Result<String> {
        self.ensure_fields(project_key, type_key).await?;

        let cache = self.cache.read();
        let names = Scope::fields(project_key, type_key);
        let resolved = cache
            .get(&names, field_name)
            .or_else(|| cache.get(&Scope::field_aliases(project_key, type_key), field_name))
            .or_else(|| cache.field_definition(project_key, type_key, field_name).map(|d| d.field_key.as_str()))
            .map(String::from);
        drop(cache);

        resolved.ok_or_else(|| ApiError::unresolved(Namespace::Field, field_name, format!("type {type_key}")))
    }

    /// Resolve an option label of a field. A known option value is returned
    /// unchanged.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` if the text is neither a label nor a value.
    pub async fn get_option_value(
        &self,
        project_key: &str,
        type_key: &str,
        field_key: &str,
        label: &str,
    ) -> Result<String> {
        self.ensure_fields(project_key, type_key).await?;

        let scope = Scope::options(project_key, type_key, field_key);
        let cache = self.cache.read();
        let resolved = cache
            .get(&scope, label)
            .map(String::from)
            .or_else(|| cache.contains_value(&scope, label).then(|| label.to_string()));
        drop(cache);

        resolved.ok_or_else(|| ApiError::unresolved(Namespace::Option, label, format!("field {field_key}")))
    }

    /// Resolve a user identifier to a user key.
    ///
    /// No user directory is consulted: the identifier is assumed to already
    /// be a user key and is returned as given.
    #[must_use]
    pub fn get_user_key(&self, identifier: &str) -> String {
        debug!("User identifier passed through as user key");
        identifier.to_string()
    }

    /// Field type key of a field.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` for an unknown field key.
    pub async fn get_field_type(&self, project_key: &str, type_key: &str, field_key: &str) -> Result<String> {
        self.ensure_fields(project_key, type_key).await?;
        self.cache
            .read()
            .field_definition(project_key, type_key, field_key)
            .map(|d| d.field_type_key.clone())
            .ok_or_else(|| ApiError::unresolved(Namespace::Field, field_key, format!("type {type_key}")))
    }

    /// Display name of a field, falling back to its alias and then its key.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` for an unknown field key.
    pub async fn get_field_name(&self, project_key: &str, type_key: &str, field_key: &str) -> Result<String> {
        self.ensure_fields(project_key, type_key).await?;
        let cache = self.cache.read();
        let def = cache
            .field_definition(project_key, type_key, field_key)
            .ok_or_else(|| ApiError::unresolved(Namespace::Field, field_key, format!("type {type_key}")))?;

        Ok([Some(def.field_name.as_str()), def.field_alias.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .unwrap_or(field_key)
            .to_string())
    }

    /// Label → value table of a field, in upstream order. Empty for fields
    /// without options.
    ///
    /// # Errors
    /// Returns error if the field namespace cannot be fetched.
    pub async fn list_options(
        &self,
        project_key: &str,
        type_key: &str,
        field_key: &str,
    ) -> Result<IndexMap<String, String>> {
        self.ensure_fields(project_key, type_key).await?;
        Ok(self
            .cache
            .read()
            .entries(&Scope::options(project_key, type_key, field_key))
            .cloned()
            .unwrap_or_default())
    }

    /// Type and options of a field, for value encoding.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` for an unknown field key.
    pub async fn field_profile(&self, project_key: &str, type_key: &str, field_key: &str) -> Result<FieldProfile> {
        self.ensure_fields(project_key, type_key).await?;
        let cache = self.cache.read();
        let def = cache
            .field_definition(project_key, type_key, field_key)
            .ok_or_else(|| ApiError::unresolved(Namespace::Field, field_key, format!("type {type_key}")))?;

        Ok(FieldProfile {
            field_type_key: Some(def.field_type_key.clone()),
            options: cache
                .entries(&Scope::options(project_key, type_key, field_key))
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Field name → field key for a work item type.
    ///
    /// Served from a TTL snapshot, so it may lag behind an invalidation by
    /// up to the snapshot lifetime.
    ///
    /// # Errors
    /// Returns error if the field namespace cannot be fetched.
    pub async fn get_field_mappings(&self, project_key: &str, type_key: &str) -> Result<IndexMap<String, String>> {
        let snapshot_key = format!("{project_key}:{type_key}");
        if let Some(mappings) = self.field_mappings.lock().get(&snapshot_key) {
            return Ok(mappings);
        }

        self.ensure_fields(project_key, type_key).await?;
        let mappings = self
            .cache
            .read()
            .entries(&Scope::fields(project_key, type_key))
            .cloned()
            .unwrap_or_default();
        self.field_mappings.lock().set(snapshot_key, mappings.clone());
        Ok(mappings)
    }

    /// Forget everything cached under a project.
    pub fn invalidate_project(&self, project_key: &str) {
        self.cache.write().invalidate_project(project_key);
        self.field_mappings.lock().clear();
        info!(project = %mask_project_key(project_key), "Invalidated project metadata");
    }

    /// Forget everything.
    pub fn reset(&self) {
        self.cache.write().clear();
        self.field_mappings.lock().clear();
        debug!("Reset metadata cache");
    }
}
