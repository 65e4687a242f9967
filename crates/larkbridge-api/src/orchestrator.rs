//! Work item operations expressed in human terms.
//!
//! The orchestrator owns a default project and work item type, turns names
//! and labels into keys through the resolver and codec, and calls the raw
//! API. Relation filters are applied client-side over a bounded page scan.

use crate::codec::FieldValueCodec;
use crate::config::{ClientConfig, FetchSettings};
use crate::error::{ApiError, Result};
use crate::openapi::{FilterRequest, OpenApi, mask_project_key};
use crate::resolver::MetadataResolver;
use crate::transport::Transport;
use futures::future::join_all;
use indexmap::IndexMap;
use larkbridge_core::metadata::{USER_FIELD_TYPES, WORK_ITEM_FIELD_TYPES};
use larkbridge_core::{FieldValue, Namespace, TtlCache, WorkItem, readable_user};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Page size of each per-type search while resolving a relation by name.
const RELATION_SEARCH_PAGE_SIZE: u32 = 10;

/// The project operations run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    /// Project key, used as-is.
    Key(String),
    /// Project display name, resolved on use.
    Name(String),
}

/// The work item a task filter must be related to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedTo {
    Id(i64),
    /// Work item name, or an id written as text.
    Name(String),
}

impl From<i64> for RelatedTo {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for RelatedTo {
    fn from(raw: &str) -> Self {
        raw.trim()
            .parse()
            .map_or_else(|_| Self::Name(raw.trim().to_string()), Self::Id)
    }
}

/// Filters and paging for [`WorkItemOrchestrator::get_tasks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub name: Option<String>,
    /// Status label or key.
    pub status: Option<String>,
    /// Priority label or option value. Matched client-side.
    pub priority: Option<String>,
    /// Owner user key.
    pub owner: Option<String>,
    /// Matched client-side.
    pub related_to: Option<RelatedTo>,
    pub page_num: u32,
    pub page_size: u32,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            name: None,
            status: None,
            priority: None,
            owner: None,
            related_to: None,
            page_num: 1,
            page_size: 20,
        }
    }
}

impl TaskQuery {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn with_related_to(mut self, related_to: impl Into<RelatedTo>) -> Self {
        self.related_to = Some(related_to.into());
        self
    }

    #[must_use]
    pub const fn with_page(mut self, page_num: u32, page_size: u32) -> Self {
        self.page_num = page_num;
        self.page_size = page_size;
        self
    }

    /// Whether some condition can only be checked on fetched items.
    #[must_use]
    pub const fn needs_scan(&self) -> bool {
        self.related_to.is_some() || self.priority.is_some()
    }
}

/// One page of [`WorkItemOrchestrator::get_tasks`] results.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskPage {
    pub items: Vec<WorkItem>,
    pub total: u64,
    pub page_num: u32,
    pub page_size: u32,
}

/// Compact view of a work item.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkItemSummary {
    pub id: i64,
    pub name: String,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub owner: Option<String>,
}

/// A work item with field values keyed by field name and made readable.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReadableWorkItem {
    pub id: i64,
    pub name: String,
    pub fields: IndexMap<String, Value>,
}

/// High-level work item operations against one project and type.
pub struct WorkItemOrchestrator {
    resolver: Arc<MetadataResolver>,
    codec: FieldValueCodec,
    project: ProjectRef,
    type_name: String,
    fetch: FetchSettings,
    relation_names: Mutex<TtlCache<Option<String>>>,
}

impl WorkItemOrchestrator {
    /// Create an orchestrator for the default "Issue管理" type.
    #[must_use]
    pub fn new(resolver: Arc<MetadataResolver>, project: ProjectRef, fetch: FetchSettings) -> Self {
        let relation_names = Mutex::new(TtlCache::new(fetch.cache_ttl()));
        Self {
            codec: FieldValueCodec::new(Arc::clone(&resolver)),
            resolver,
            project,
            type_name: "Issue管理".to_string(),
            fetch,
            relation_names,
        }
    }

    /// Use another work item type.
    #[must_use]
    pub fn with_work_item_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Build everything from configuration.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if neither a project key nor a project
    /// name is configured.
    pub fn from_config(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let project = match (&config.project.key, &config.project.name) {
            (Some(key), _) if !key.is_empty() => ProjectRef::Key(key.clone()),
            (_, Some(name)) if !name.is_empty() => ProjectRef::Name(name.clone()),
            _ => {
                return Err(ApiError::Config(
                    "no project configured; set a project key or name".to_string(),
                ));
            }
        };

        let api = OpenApi::new(transport, config.user_key.clone()).with_tenant_group_id(config.tenant_group_id);
        let resolver = Arc::new(MetadataResolver::with_ttl(api, config.fetch.cache_ttl()));
        Ok(Self::new(resolver, project, config.fetch.clone()).with_work_item_type(config.project.work_item_type.clone()))
    }

    /// The resolver, for direct metadata lookups.
    #[must_use]
    pub const fn resolver(&self) -> &Arc<MetadataResolver> {
        &self.resolver
    }

    /// The value codec.
    #[must_use]
    pub const fn codec(&self) -> &FieldValueCodec {
        &self.codec
    }

    fn api(&self) -> &OpenApi {
        self.resolver.api()
    }

    /// Key of the configured project.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` if the project name is unknown.
    pub async fn project_key(&self) -> Result<String> {
        match &self.project {
            ProjectRef::Key(key) => Ok(key.clone()),
            ProjectRef::Name(name) => self.resolver.get_project_key(name).await,
        }
    }

    /// Project key and work item type key.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` if either cannot be resolved.
    pub async fn keys(&self) -> Result<(String, String)> {
        let project_key = self.project_key().await?;
        let type_key = self.resolver.get_type_key(&project_key, &self.type_name).await?;
        Ok((project_key, type_key))
    }

    /// Create an issue and return its id.
    ///
    /// Description and assignee go into the create call. The priority is set
    /// by a follow-up update; if that fails the issue still exists, so the
    /// failure is logged and the id returned.
    ///
    /// # Errors
    /// Returns error if the project, type or description field cannot be
    /// resolved, or the create call fails.
    pub async fn create_issue(
        &self,
        name: &str,
        priority: Option<&str>,
        description: Option<&str>,
        assignee: Option<&str>,
    ) -> Result<i64> {
        let (project_key, type_key) = self.keys().await?;

        let mut fields = Vec::new();
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            let field_key = self
                .resolver
                .get_field_key(&project_key, &type_key, "description")
                .await?;
            fields.push(FieldValue::new(field_key, description));
        }
        if let Some(assignee) = assignee.filter(|a| !a.is_empty()) {
            let owner_key = self.codec.resolve_owner_field_key(&project_key, &type_key).await;
            fields.push(FieldValue::new(owner_key, self.resolver.get_user_key(assignee)));
        }

        let id = self.api().create(&project_key, &type_key, name, &fields).await?;

        if let Some(priority) = priority.filter(|p| !p.is_empty()) {
            let updates = [("priority".to_string(), Value::String(priority.to_string()))];
            if let Err(e) = self.update_fields(&project_key, &type_key, id, &updates).await {
                warn!(id, error = %e, "Issue created but priority was not set");
            }
        }

        Ok(id)
    }

    /// Fetch one work item of the configured type.
    ///
    /// # Errors
    /// Returns `ApiError::NotFound` if the query comes back empty.
    pub async fn get_issue_details(&self, id: i64) -> Result<WorkItem> {
        let (project_key, type_key) = self.keys().await?;
        self.api()
            .query(&project_key, &type_key, &[id])
            .await?
            .into_iter()
            .next()
            .ok_or(ApiError::NotFound(id))
    }

    /// Delete one work item.
    ///
    /// # Errors
    /// Returns error on resolution, transport or upstream failure.
    pub async fn delete_issue(&self, id: i64) -> Result<()> {
        let (project_key, type_key) = self.keys().await?;
        self.api().delete(&project_key, &type_key, id).await
    }

    /// Update fields given by name. Names must resolve; values are encoded
    /// best-effort.
    ///
    /// # Errors
    /// Returns `ApiError::Validation` for an empty update, `ApiError::Resolution`
    /// for an unknown field name, or a transport/upstream error.
    pub async fn update_issue(&self, id: i64, updates: &[(String, Value)]) -> Result<()> {
        if updates.is_empty() {
            return Err(ApiError::Validation("no fields to update".to_string()));
        }
        let (project_key, type_key) = self.keys().await?;
        self.update_fields(&project_key, &type_key, id, updates).await
    }

    async fn update_fields(
        &self,
        project_key: &str,
        type_key: &str,
        id: i64,
        updates: &[(String, Value)],
    ) -> Result<()> {
        let mut fields = Vec::with_capacity(updates.len());
        for (field_name, value) in updates {
            let field_key = self.resolver.get_field_key(project_key, type_key, field_name).await?;
            let encoded = self
                .codec
                .resolve_for_update(project_key, type_key, &field_key, value)
                .await;
            fields.push(FieldValue::new(field_key, encoded));
        }
        self.api().update(project_key, type_key, id, &fields).await
    }

    /// Set one field on many work items. Returns the upstream task id.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` for an unknown field name, or a
    /// transport/upstream error.
    pub async fn batch_update_field(&self, ids: &[i64], field_name: &str, value: &Value) -> Result<String> {
        let (project_key, type_key) = self.keys().await?;
        let field_key = self.resolver.get_field_key(&project_key, &type_key, field_name).await?;
        let encoded = self
            .codec
            .resolve_for_update(&project_key, &type_key, &field_key, value)
            .await;
        self.api()
            .batch_update(&project_key, &type_key, ids, &[FieldValue::new(field_key, encoded)])
            .await
    }

    /// List work items.
    ///
    /// Name, status and owner are sent to the filter endpoint. When the query
    /// has a relation or priority condition, pages are scanned in concurrent
    /// batches, matched locally, and paginated locally. A failed page ends
    /// the scan; items already fetched are kept.
    ///
    /// # Errors
    /// Returns error if the project, type or relation target cannot be
    /// resolved, or the unscanned filter call fails.
    pub async fn get_tasks(&self, query: &TaskQuery) -> Result<TaskPage> {
        let (project_key, type_key) = self.keys().await?;

        let mut request = FilterRequest::new(type_key.clone());
        if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
            request = request.with_name(name);
        }
        if let Some(owner) = query.owner.as_deref().filter(|o| !o.is_empty()) {
            request = request.with_user_key(self.resolver.get_user_key(owner));
        }
        if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
            let field_key = self
                .resolver
                .get_field_key(&project_key, &type_key, "status")
                .await
                .unwrap_or_else(|_| "work_item_status".to_string());
            let state = self
                .codec
                .resolve_for_search(&project_key, &type_key, &field_key, &json!(status))
                .await;
            request = request.with_status(state);
        }

        if !query.needs_scan() {
            let page = self
                .api()
                .filter(&project_key, &request.with_page(query.page_num, query.page_size))
                .await?;
            return Ok(TaskPage {
                items: page.items,
                total: page.total,
                page_num: query.page_num,
                page_size: query.page_size,
            });
        }

        let related_id = match &query.related_to {
            Some(related_to) => Some(self.resolve_related_to(related_to, &project_key).await?),
            None => None,
        };
        let priority = match query.priority.as_deref() {
            Some(priority) => Some(self.option_match(&project_key, &type_key, "priority", priority).await?),
            None => None,
        };

        let matched: Vec<WorkItem> = self
            .scan(&project_key, &request)
            .await
            .into_iter()
            .filter(|item| related_id.is_none_or(|id| item.is_related_to(id)))
            .filter(|item| priority.as_ref().is_none_or(|m| m.matches(item)))
            .collect();

        let total = matched.len() as u64;
        let page_size = query.page_size.max(1) as usize;
        let skip = query.page_num.saturating_sub(1) as usize * page_size;
        Ok(TaskPage {
            items: matched.into_iter().skip(skip).take(page_size).collect(),
            total,
            page_num: query.page_num,
            page_size: query.page_size,
        })
    }

    async fn scan(&self, project_key: &str, base: &FilterRequest) -> Vec<WorkItem> {
        let width = self.fetch.page_concurrency.max(1);
        let page_size = self.fetch.scan_page_size.max(1);
        let max_pages = self.fetch.max_scan_pages;

        let mut items = Vec::new();
        let mut first = 1_u32;
        while first <= max_pages {
            let last = first.saturating_add(width - 1).min(max_pages);
            let pages: Vec<u32> = (first..=last).collect();

            let fetches = pages.iter().map(|&page_num| {
                let request = base.clone().with_page(page_num, page_size);
                async move { self.api().filter(project_key, &request).await }
            });
            let results = join_all(fetches).await;

            let mut done = false;
            for (page_num, result) in pages.iter().zip(results) {
                match result {
                    Ok(page) => {
                        done |= page.items.len() < page_size as usize;
                        items.extend(page.items);
                    }
                    Err(e) => {
                        warn!(page = *page_num, error = %e, "Page fetch failed, keeping partial results");
                        done = true;
                    }
                }
            }
            if done {
                return items;
            }
            first = last.saturating_add(1);
        }

        warn!(
            project = %mask_project_key(project_key),
            max_pages,
            "Scan stopped at page limit"
        );
        items
    }

    async fn option_match(&self, project_key: &str, type_key: &str, field_name: &str, input: &str) -> Result<OptionMatch> {
        let field_key = self.resolver.get_field_key(project_key, type_key, field_name).await?;
        let value = self
            .codec
            .resolve_for_search(project_key, type_key, &field_key, &json!(input))
            .await;
        Ok(OptionMatch {
            field_key,
            value: value.as_str().unwrap_or(input).to_string(),
            label: input.to_string(),
        })
    }

    /// Resolve a relation target to a work item id.
    ///
    /// Ids pass through and numeric text is parsed. A name is searched in
    /// every configured candidate type at once; an exact name match wins,
    /// otherwise the first hit. Ties follow the candidate type order.
    ///
    /// # Errors
    /// Returns `ApiError::Resolution` for a blank name or if no candidate
    /// type has a match.
    pub async fn resolve_related_to(&self, related_to: &RelatedTo, project_key: &str) -> Result<i64> {
        let name = match related_to {
            RelatedTo::Id(id) => return Ok(*id),
            RelatedTo::Name(name) => name.trim(),
        };
        if name.is_empty() {
            return Err(ApiError::unresolved(Namespace::WorkItem, name, "the relation search types"));
        }
        if let Ok(id) = name.parse::<i64>() {
            return Ok(id);
        }

        let searches = self
            .fetch
            .relation_search_types
            .iter()
            .map(|type_name| self.search_type_by_name(project_key, type_name, name));
        let results: Vec<Vec<WorkItem>> = join_all(searches).await;

        let found = results
            .iter()
            .flatten()
            .find(|item| item.name == name)
            .or_else(|| results.iter().flatten().next());

        match found {
            Some(item) => {
                debug!(id = item.id, exact = item.name == name, "Resolved related work item");
                Ok(item.id)
            }
            None => Err(ApiError::unresolved(
                Namespace::WorkItem,
                name,
                "the relation search types",
            )),
        }
    }

    async fn search_type_by_name(&self, project_key: &str, type_name: &str, name: &str) -> Vec<WorkItem> {
        match self.try_search_type_by_name(project_key, type_name, name).await {
            Ok(items) => items,
            Err(e) => {
                debug!(type_name = %type_name, error = %e, "Relation search skipped type");
                Vec::new()
            }
        }
    }

    async fn try_search_type_by_name(&self, project_key: &str, type_name: &str, name: &str) -> Result<Vec<WorkItem>> {
        let type_key = self.resolver.get_type_key(project_key, type_name).await?;
        let request = FilterRequest::new(type_key)
            .with_name(name)
            .with_page(1, RELATION_SEARCH_PAGE_SIZE);
        Ok(self.api().filter(project_key, &request).await?.items)
    }

    /// Field values keyed by field name, made readable. Relation fields show
    /// the related work items' names where they can be found; user fields
    /// show user names, or the user key when no name came back.
    ///
    /// # Errors
    /// Returns error if the project or type cannot be resolved.
    pub async fn enhance_with_readable_names(&self, item: &WorkItem) -> Result<ReadableWorkItem> {
        let (project_key, type_key) = self.keys().await?;

        let mut typed = Vec::with_capacity(item.fields.len());
        for field in &item.fields {
            let field_type = match &field.field_type_key {
                Some(t) => Some(t.clone()),
                None => self
                    .resolver
                    .get_field_type(&project_key, &type_key, &field.field_key)
                    .await
                    .ok(),
            };
            typed.push((field, ValueKind::of(field_type.as_deref())));
        }

        let relation_ids: Vec<i64> = typed
            .iter()
            .filter(|(_, kind)| *kind == ValueKind::Relation)
            .flat_map(|(field, _)| relation_ids(&field.field_value))
            .collect();
        let names = self.work_item_names(&project_key, &type_key, &relation_ids).await;

        let mut fields = IndexMap::new();
        for (field, kind) in typed {
            let label = match self
                .resolver
                .get_field_name(&project_key, &type_key, &field.field_key)
                .await
            {
                Ok(name) => name,
                Err(_) => field.field_alias.clone().unwrap_or_else(|| field.field_key.clone()),
            };
            let value = match kind {
                ValueKind::Relation => name_relations(&field.field_value, &names),
                ValueKind::User => readable_user(&field.field_value),
                ValueKind::Plain => self.codec.extract_readable(&field.field_value),
            };
            fields.insert(label, value);
        }

        Ok(ReadableWorkItem {
            id: item.id,
            name: item.name.clone(),
            fields,
        })
    }

    async fn work_item_names(&self, project_key: &str, type_key: &str, ids: &[i64]) -> HashMap<i64, Option<String>> {
        let mut names = HashMap::new();
        let mut missing = Vec::new();
        {
            let mut cache = self.relation_names.lock();
            for &id in ids {
                match cache.get(&id.to_string()) {
                    Some(name) => {
                        names.insert(id, name);
                    }
                    None => missing.push(id),
                }
            }
        }
        missing.sort_unstable();
        missing.dedup();
        if missing.is_empty() {
            return names;
        }

        match self.api().query(project_key, type_key, &missing).await {
            Ok(items) => {
                let mut cache = self.relation_names.lock();
                for item in items {
                    cache.set(item.id.to_string(), Some(item.name.clone()));
                    names.insert(item.id, Some(item.name));
                }
                for id in missing {
                    if let Entry::Vacant(entry) = names.entry(id) {
                        cache.set(id.to_string(), None);
                        entry.insert(None);
                    }
                }
            }
            Err(e) => warn!(count = missing.len(), error = %e, "Related work item names unavailable"),
        }
        names
    }

    /// Compact `{id, name, status, priority, owner}` view.
    ///
    /// # Errors
    /// Returns error if the project or type cannot be resolved.
    pub async fn simplify(&self, item: &WorkItem) -> Result<WorkItemSummary> {
        let (project_key, type_key) = self.keys().await?;
        let status_key = self.field_key_or_name(&project_key, &type_key, "status").await;
        let priority_key = self.field_key_or_name(&project_key, &type_key, "priority").await;
        let owner_key = self.codec.resolve_owner_field_key(&project_key, &type_key).await;

        Ok(WorkItemSummary {
            id: item.id,
            name: item.name.clone(),
            status: item.readable_field(&status_key),
            priority: item.readable_field(&priority_key),
            owner: item.readable_field(&owner_key),
        })
    }

    async fn field_key_or_name(&self, project_key: &str, type_key: &str, name: &str) -> String {
        self.resolver
            .get_field_key(project_key, type_key, name)
            .await
            .unwrap_or_else(|_| name.to_string())
    }
}

/// How a field value is made readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Relation,
    User,
    Plain,
}

impl ValueKind {
    fn of(field_type: Option<&str>) -> Self {
        match field_type {
            Some(t) if WORK_ITEM_FIELD_TYPES.contains(&t) => Self::Relation,
            Some(t) if USER_FIELD_TYPES.contains(&t) => Self::User,
            _ => Self::Plain,
        }
    }
}

/// Client-side match on a select field.
struct OptionMatch {
    field_key: String,
    value: String,
    label: String,
}

impl OptionMatch {
    fn matches(&self, item: &WorkItem) -> bool {
        item.field(&self.field_key)
            .is_some_and(|f| self.matches_value(&f.field_value))
    }

    fn matches_value(&self, value: &Value) -> bool {
        let hit = |s: Option<&str>| s.is_some_and(|s| s == self.value || s == self.label);
        match value {
            Value::Object(map) => {
                hit(map.get("value").and_then(Value::as_str)) || hit(map.get("label").and_then(Value::as_str))
            }
            Value::String(s) => hit(Some(s)),
            Value::Array(items) => items.iter().any(|v| self.matches_value(v)),
            _ => false,
        }
    }
}

fn relation_ids(value: &Value) -> Vec<i64> {
    match value {
        Value::Array(items) => items.iter().filter_map(relation_id).collect(),
        other => relation_id(other).into_iter().collect(),
    }
}

fn relation_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn name_relations(value: &Value, names: &HashMap<i64, Option<String>>) -> Value {
    let name_one = |v: &Value| match relation_id(v).and_then(|id| names.get(&id).cloned().flatten()) {
        Some(name) => Value::String(name),
        None => v.clone(),
    };
    match value {
        Value::Array(items) => Value::Array(items.iter().map(name_one).collect()),
        other => name_one(other),
    }
}

impl std::fmt::Debug for WorkItemOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItemOrchestrator")
            .field("project", &self.project)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FILTER, MockTransport, failure, widgets};
    use crate::transport::Method;
    use pretty_assertions::assert_eq;

    fn orchestrator(mock: &Arc<MockTransport>, project: ProjectRef) -> WorkItemOrchestrator {
        let api = OpenApi::new(mock.clone(), "u1");
        WorkItemOrchestrator::new(Arc::new(MetadataResolver::new(api)), project, FetchSettings::default())
    }

    fn widgets_by_name(mock: &Arc<MockTransport>) -> WorkItemOrchestrator {
        orchestrator(mock, ProjectRef::Name("Widgets".to_string()))
    }

    fn item_page(items: Value) -> Result<Value> {
        Ok(crate::testing::envelope(json!({ "work_items": items, "total": 100 })))
    }

    #[tokio::test]
    async fn test_create_issue() {
        let mock = Arc::new(
            widgets()
                .ok(Method::Post, "/open_api/p1/work_item/create", json!(1001))
                .ok(Method::Put, "/open_api/p1/work_item/issue/1001", Value::Null),
        );
        let id = widgets_by_name(&mock)
            .create_issue("Login broken", Some("High"), Some("steps"), Some("ou_1"))
            .await
            .unwrap();
        assert_eq!(id, 1001);

        let calls = mock.calls();
        let create = calls.iter().find(|c| c.path.ends_with("/create")).unwrap();
        assert_eq!(
            create.body.as_ref().unwrap()["field_value_pairs"],
            json!([
                {"field_key": "description", "field_value": "steps"},
                {"field_key": "owner", "field_value": "ou_1"}
            ])
        );

        let update = calls.iter().find(|c| c.method == Method::Put).unwrap();
        assert_eq!(
            update.body,
            Some(json!({"update_fields": [
                {"field_key": "field_prio", "field_value": {"label": "High", "value": "opt_high"}}
            ]}))
        );
    }

    #[tokio::test]
    async fn test_create_issue_keeps_id_when_priority_fails() {
        let mock = Arc::new(
            widgets()
                .ok(Method::Post, "/open_api/p1/work_item/create", json!(1002))
                .reply(Method::Put, "/open_api/p1/work_item/issue/1002", failure(20006, "invalid value")),
        );
        let id = widgets_by_name(&mock)
            .create_issue("Crash", Some("P0"), None, None)
            .await
            .unwrap();
        assert_eq!(id, 1002);
        assert_eq!(mock.count(Method::Put, "/open_api/p1/work_item/issue/1002"), 1);
    }

    #[tokio::test]
    async fn test_get_issue_details_not_found() {
        let mock = Arc::new(widgets().ok(Method::Post, "/open_api/p1/work_item/issue/query", json!([])));
        let err = widgets_by_name(&mock).get_issue_details(5).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(5)));
    }

    #[tokio::test]
    async fn test_get_issue_details_normalizes_legacy_shape() {
        let mock = Arc::new(widgets().ok(
            Method::Post,
            "/open_api/p1/work_item/issue/query",
            json!([{"id": 5, "name": "Old", "field_value_pairs": [{"field_key": "description", "field_value": "x"}]}]),
        ));
        let item = widgets_by_name(&mock).get_issue_details(5).await.unwrap();
        assert_eq!(item.field("description").unwrap().field_value, json!("x"));
    }

    #[tokio::test]
    async fn test_delete_issue() {
        let mock = Arc::new(widgets().ok(Method::Delete, "/open_api/p1/work_item/issue/9", Value::Null));
        widgets_by_name(&mock).delete_issue(9).await.unwrap();
        assert_eq!(mock.count(Method::Delete, "/open_api/p1/work_item/issue/9"), 1);
    }

    #[tokio::test]
    async fn test_update_issue_requires_known_fields() {
        let mock = Arc::new(widgets().ok(Method::Put, "/open_api/p1/work_item/issue/3", Value::Null));
        let orchestrator = widgets_by_name(&mock);

        let err = orchestrator
            .update_issue(3, &[("Severity".to_string(), json!("x"))])
            .await
            .unwrap_err();
        assert!(err.is_resolution());
        assert_eq!(mock.count(Method::Put, "/open_api/p1/work_item/issue/3"), 0);

        orchestrator
            .update_issue(3, &[("标签".to_string(), json!("A;B")), ("blocked".to_string(), json!("yes"))])
            .await
            .unwrap();
        let update = mock.calls().into_iter().find(|c| c.method == Method::Put).unwrap();
        assert_eq!(
            update.body,
            Some(json!({"update_fields": [
                {"field_key": "tags", "field_value": [{"label": "A", "value": "a"}, {"label": "B", "value": "b"}]},
                {"field_key": "blocked", "field_value": true}
            ]}))
        );
    }

    #[tokio::test]
    async fn test_batch_update_field() {
        let mock = Arc::new(widgets().ok(Method::Post, "/open_api/work_item/batch_update", json!("task-1")));
        let task = widgets_by_name(&mock)
            .batch_update_field(&[1, 2, 3], "priority", &json!("P1"))
            .await
            .unwrap();
        assert_eq!(task, "task-1");

        let call = mock.calls().into_iter().last().unwrap();
        assert_eq!(call.body.as_ref().unwrap()["field_key"], json!("field_prio"));
        assert_eq!(
            call.body.as_ref().unwrap()["after_field_value"],
            json!({"label": "P1", "value": "opt_p1"})
        );
    }

    #[tokio::test]
    async fn test_get_tasks_single_page() {
        let mock = Arc::new(widgets().on(Method::Post, FILTER, |_| {
            item_page(json!([{"id": 1, "name": "a"}]))
        }));
        let query = TaskQuery::default()
            .with_name("a")
            .with_status("Open")
            .with_owner("ou_1")
            .with_page(2, 5);
        let page = widgets_by_name(&mock).get_tasks(&query).await.unwrap();

        assert_eq!(page.total, 100);
        assert_eq!(page.page_num, 2);
        assert_eq!(mock.count(Method::Post, FILTER), 1);

        let body = mock.calls().into_iter().last().unwrap().body.unwrap();
        assert_eq!(body["page_num"], json!(2));
        assert_eq!(body["page_size"], json!(5));
        assert_eq!(body["work_item_name"], json!("a"));
        assert_eq!(body["user_keys"], json!(["ou_1"]));
        assert_eq!(body["work_item_status"], json!([{"state_key": "open"}]));
    }

    #[tokio::test]
    async fn test_get_tasks_stops_after_failed_batch() {
        let mock = Arc::new(widgets().on(Method::Post, FILTER, |call| {
            let page = call.body_i64("page_num").unwrap_or_default();
            let size = call.body_i64("page_size").unwrap_or_default();
            if page == 2 {
                return Err(ApiError::Transport("connection reset".to_string()));
            }
            // Every page is full, so only the failure can end the scan.
            let items: Vec<Value> = (0..size)
                .map(|i| {
                    json!({"id": (page - 1) * size + i, "name": "t", "fields": [{"field_key": "related", "field_value": 999}]})
                })
                .collect();
            item_page(Value::Array(items))
        }));
        let orchestrator = orchestrator(&mock, ProjectRef::Key("p1".to_string()));

        let page = orchestrator
            .get_tasks(&TaskQuery::default().with_related_to(999_i64).with_page(1, 500))
            .await
            .unwrap();

        let expected: Vec<i64> = (0..50).chain(100..150).collect();
        assert_eq!(page.items.iter().map(|i| i.id).collect::<Vec<_>>(), expected);
        assert_eq!(page.total, 100);

        let mut pages: Vec<i64> = mock
            .calls()
            .iter()
            .filter(|c| c.path == FILTER)
            .filter_map(|c| c.body_i64("page_num"))
            .collect();
        pages.sort_unstable();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_tasks_scans_full_batches_and_paginates_locally() {
        let mock = Arc::new(widgets().on(Method::Post, FILTER, |call| {
            let page = call.body_i64("page_num").unwrap_or_default();
            let size = call.body_i64("page_size").unwrap_or_default();
            let items: Vec<Value> = if page <= 4 {
                (0..size)
                    .map(|i| {
                        let id = (page - 1) * size + i;
                        let related = if id % 10 == 0 { 999 } else { 0 };
                        json!({"id": id, "name": "t", "fields": [{"field_key": "related", "field_value": [related]}]})
                    })
                    .collect()
            } else {
                Vec::new()
            };
            item_page(Value::Array(items))
        }));
        let orchestrator = orchestrator(&mock, ProjectRef::Key("p1".to_string()));

        let page = orchestrator
            .get_tasks(&TaskQuery::default().with_related_to("999").with_page(2, 5))
            .await
            .unwrap();

        // 200 scanned items, every tenth related
        assert_eq!(page.total, 20);
        assert_eq!(page.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![50, 60, 70, 80, 90]);
        assert_eq!(mock.count(Method::Post, FILTER), 6);
    }

    #[tokio::test]
    async fn test_get_tasks_priority_filter() {
        let mock = Arc::new(widgets().on(Method::Post, FILTER, |call| {
            if call.body_i64("page_num") != Some(1) {
                return item_page(json!([]));
            }
            item_page(json!([
                {"id": 1, "name": "a", "fields": [{"field_key": "field_prio", "field_value": {"label": "P0", "value": "opt_p0"}}]},
                {"id": 2, "name": "b", "fields": [{"field_key": "field_prio", "field_value": {"label": "P1", "value": "opt_p1"}}]}
            ]))
        }));
        let page = widgets_by_name(&mock)
            .get_tasks(&TaskQuery::default().with_priority("P0"))
            .await
            .unwrap();
        assert_eq!(page.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1]);
    }

    fn relation_search_mock() -> Arc<MockTransport> {
        Arc::new(widgets().on(Method::Post, FILTER, |call| {
            let type_key = call.body.as_ref().and_then(|b| b["work_item_type_keys"][0].as_str().map(String::from));
            let items = match type_key.as_deref() {
                Some("story") => json!([{"id": 5, "name": "Login revamp"}]),
                Some("task") => json!([{"id": 6, "name": "Login"}]),
                _ => json!([]),
            };
            item_page(items)
        }))
    }

    #[tokio::test]
    async fn test_resolve_related_to() {
        let mock = relation_search_mock();
        let orchestrator = widgets_by_name(&mock);

        assert_eq!(orchestrator.resolve_related_to(&RelatedTo::Id(7), "p1").await.unwrap(), 7);
        assert_eq!(orchestrator.resolve_related_to(&"42".into(), "p1").await.unwrap(), 42);
        assert!(mock.calls().is_empty());

        // exact match beats an earlier partial hit
        assert_eq!(orchestrator.resolve_related_to(&"Login".into(), "p1").await.unwrap(), 6);
        // otherwise the first hit in candidate order
        assert_eq!(orchestrator.resolve_related_to(&"Log".into(), "p1").await.unwrap(), 5);

        let err = orchestrator
            .resolve_related_to(&RelatedTo::Name("Nothing".to_string()), "p2")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Resolution { namespace: Namespace::WorkItem, .. }));
    }

    #[tokio::test]
    async fn test_blank_related_to_is_not_searched() {
        let mock = relation_search_mock();
        let orchestrator = widgets_by_name(&mock);

        for blank in ["", "   "] {
            let err = orchestrator
                .get_tasks(&TaskQuery::default().with_related_to(blank))
                .await
                .unwrap_err();
            assert!(err.is_resolution());
        }
        assert_eq!(mock.count(Method::Post, FILTER), 0);
    }

    #[tokio::test]
    async fn test_enhance_with_readable_names() {
        let mock = Arc::new(widgets().ok(
            Method::Post,
            "/open_api/p1/work_item/issue/query",
            json!([{"id": 77, "name": "Parent story"}]),
        ));
        let orchestrator = widgets_by_name(&mock);
        let item = WorkItem::new(1, "Child")
            .with_field(FieldValue::new("field_prio", json!({"label": "P0", "value": "opt_p0"})).with_type("select"))
            .with_field(FieldValue::new("related", json!([77, 78])))
            .with_field(FieldValue::new("owner", json!([{"user_key": "ou_1", "name_cn": "张三"}, "ou_2"])))
            .with_field(FieldValue::new("custom_x", "raw"));

        let readable = orchestrator.enhance_with_readable_names(&item).await.unwrap();
        assert_eq!(readable.fields["优先级"], json!("P0"));
        assert_eq!(readable.fields["当前负责人"], json!(["张三", "ou_2"]));
        assert_eq!(readable.fields["关联需求"], json!(["Parent story", 78]));
        assert_eq!(readable.fields["custom_x"], json!("raw"));

        orchestrator.enhance_with_readable_names(&item).await.unwrap();
        assert_eq!(mock.count(Method::Post, "/open_api/p1/work_item/issue/query"), 1);
    }

    #[tokio::test]
    async fn test_simplify() {
        let mock = Arc::new(widgets());
        let item = WorkItem::new(4, "Fix login")
            .with_field(FieldValue::new("work_item_status", json!({"label": "Open", "value": "open"})))
            .with_field(FieldValue::new("field_prio", json!({"label": "P1", "value": "opt_p1"})))
            .with_field(FieldValue::new("owner", json!([{"name": "Alice", "user_key": "ou_1"}])));

        let summary = widgets_by_name(&mock).simplify(&item).await.unwrap();
        assert_eq!(
            summary,
            WorkItemSummary {
                id: 4,
                name: "Fix login".to_string(),
                status: Some("Open".to_string()),
                priority: Some("P1".to_string()),
                owner: Some("Alice".to_string()),
            }
        );
    }

    #[test]
    fn test_related_to_from_str() {
        assert_eq!(RelatedTo::from(" 12 "), RelatedTo::Id(12));
        assert_eq!(RelatedTo::from("Login"), RelatedTo::Name("Login".to_string()));
    }

    #[test]
    fn test_from_config_requires_project() {
        let transport: Arc<dyn Transport> = Arc::new(MockTransport::new());
        let err = WorkItemOrchestrator::from_config(&ClientConfig::default(), transport.clone()).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        let mut config = ClientConfig::default();
        config.project.name = Some("Widgets".to_string());
        assert!(WorkItemOrchestrator::from_config(&config, transport).is_ok());
    }
}
