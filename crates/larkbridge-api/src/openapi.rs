//! Raw open-API calls.
//!
//! One method per endpoint. Keys are validated before they are spliced into a
//! path, envelopes are unwrapped, and payloads are decoded into core models.
//! No name resolution happens here.

use crate::error::{ApiError, Result};
use crate::transport::{Method, Transport};
use indexmap::IndexMap;
use larkbridge_core::{
    Envelope, FieldDefinition, FieldValue, PageData, ProjectDetail, WorkItem, WorkItemPage,
    WorkItemType,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, error, info};

/// `update_mode` of a batch update that replaces the previous value.
const UPDATE_MODE_REPLACE: u8 = 0;

/// Request body of the filter endpoint.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FilterRequest {
    pub work_item_type_keys: Vec<String>,
    pub page_num: u32,
    pub page_size: u32,

    /// Name substring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_name: Option<String>,

    /// Owner/participant user keys.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_keys: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub work_item_ids: Vec<i64>,

    /// Status conditions, `{"state_key": ...}` objects.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub work_item_status: Vec<Value>,

    pub expand: Map<String, Value>,

    /// Any further filter conditions, sent as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterRequest {
    /// Filter over one work item type.
    #[must_use]
    pub fn new(type_key: impl Into<String>) -> Self {
        Self {
            work_item_type_keys: vec![type_key.into()],
            page_num: 1,
            page_size: 20,
            ..Default::default()
        }
    }

    /// Set the page.
    #[must_use]
    pub const fn with_page(mut self, page_num: u32, page_size: u32) -> Self {
        self.page_num = page_num;
        self.page_size = page_size;
        self
    }

    /// Filter by name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.work_item_name = Some(name.into());
        self
    }

    /// Filter by user key.
    #[must_use]
    pub fn with_user_key(mut self, user_key: impl Into<String>) -> Self {
        self.user_keys.push(user_key.into());
        self
    }

    /// Filter by status key.
    #[must_use]
    pub fn with_status(mut self, state_key: Value) -> Self {
        self.work_item_status.push(json!({ "state_key": state_key }));
        self
    }
}

/// Check that a key is safe to put in a URL path.
///
/// # Errors
/// Returns `ApiError::Validation` if the key is empty or contains anything
/// besides ASCII letters, digits, `_` and `-`.
pub fn validate_key(key: &str, what: &str) -> Result<()> {
    Ok(larkbridge_core::metadata::validate_key(key, what)?)
}

/// Shorten a project key for log output.
#[must_use]
pub fn mask_project_key(project_key: &str) -> String {
    if let Some(rest) = project_key.strip_prefix("project_") {
        return if rest.chars().count() > 4 {
            format!("project_{}***", rest.chars().take(4).collect::<String>())
        } else {
            "project_***".to_string()
        };
    }
    if project_key.chars().count() <= 4 {
        return "***".to_string();
    }
    format!("{}***", project_key.chars().take(4).collect::<String>())
}

/// Client for the open-API endpoints.
#[derive(Clone)]
pub struct OpenApi {
    transport: Arc<dyn Transport>,
    user_key: String,
    tenant_group_id: i64,
}

impl OpenApi {
    /// Create a client acting as `user_key`.
    pub fn new(transport: Arc<dyn Transport>, user_key: impl Into<String>) -> Self {
        Self {
            transport,
            user_key: user_key.into(),
            tenant_group_id: 0,
        }
    }

    /// Set the tenant group id sent with project calls.
    #[must_use]
    pub const fn with_tenant_group_id(mut self, tenant_group_id: i64) -> Self {
        self.tenant_group_id = tenant_group_id;
        self
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let raw = self.transport.request(method, path, body).await?;
        Envelope::from_value(raw)?.into_raw().map_err(|e| {
            error!(method = %method, error = %e, "Open API call failed");
            ApiError::from(e)
        })
    }

    async fn call_data<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match self.call(method, path, body).await? {
            Value::Null => Ok(T::default()),
            data => Ok(serde_json::from_value(data)?),
        }
    }

    /// List the keys of every project the user can see.
    ///
    /// # Errors
    /// Returns error on transport or upstream failure.
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        let body = json!({
            "user_key": self.user_key,
            "tenant_group_id": self.tenant_group_id,
        });
        let keys: Vec<String> = self.call_data(Method::Post, "/open_api/projects", Some(body)).await?;
        debug!(count = keys.len(), "Listed projects");
        Ok(keys)
    }

    /// Fetch details for the given project keys, keyed by project key.
    ///
    /// Entries that are not objects are skipped.
    ///
    /// # Errors
    /// Returns error on transport or upstream failure.
    pub async fn project_details(&self, project_keys: &[String]) -> Result<IndexMap<String, ProjectDetail>> {
        let body = json!({
            "project_keys": project_keys,
            "user_key": self.user_key,
        });
        let raw: IndexMap<String, Value> = self
            .call_data(Method::Post, "/open_api/projects/detail", Some(body))
            .await?;

        let mut details = IndexMap::new();
        for (key, value) in raw {
            if !value.is_object() {
                continue;
            }
            details.insert(key, serde_json::from_value(value)?);
        }
        Ok(details)
    }

    /// List the work item types of a project.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn all_types(&self, project_key: &str) -> Result<Vec<WorkItemType>> {
        validate_key(project_key, "project_key")?;
        let path = format!("/open_api/{project_key}/work_item/all-types");
        let types: Vec<WorkItemType> = self.call_data(Method::Get, &path, None).await?;
        debug!(project = %mask_project_key(project_key), count = types.len(), "Listed work item types");
        Ok(types)
    }

    /// List every field definition of a work item type.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn all_fields(&self, project_key: &str, type_key: &str) -> Result<Vec<FieldDefinition>> {
        validate_keys(project_key, type_key)?;
        let path = format!("/open_api/{project_key}/field/all");
        let body = json!({ "work_item_type_key": type_key });
        let fields: Vec<FieldDefinition> = self.call_data(Method::Post, &path, Some(body)).await?;
        debug!(
            project = %mask_project_key(project_key),
            type_key = %type_key,
            count = fields.len(),
            "Listed fields"
        );
        Ok(fields)
    }

    /// Create a work item and return its id.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure, or when
    /// the response carries no id.
    pub async fn create(
        &self,
        project_key: &str,
        type_key: &str,
        name: &str,
        field_value_pairs: &[FieldValue],
    ) -> Result<i64> {
        validate_keys(project_key, type_key)?;
        info!(
            project = %mask_project_key(project_key),
            type_key = %type_key,
            name_len = name.chars().count(),
            fields = field_value_pairs.len(),
            "Creating work item"
        );

        let path = format!("/open_api/{project_key}/work_item/create");
        let body = json!({
            "work_item_type_key": type_key,
            "name": name,
            "field_value_pairs": field_value_pairs,
        });
        let data = self.call(Method::Post, &path, Some(body)).await?;
        let id = data
            .as_i64()
            .ok_or_else(|| ApiError::UnexpectedShape(format!("create returned {data} instead of an id")))?;

        info!(id, "Created work item");
        Ok(id)
    }

    /// Fetch work items by id.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn query(&self, project_key: &str, type_key: &str, ids: &[i64]) -> Result<Vec<WorkItem>> {
        validate_keys(project_key, type_key)?;
        let path = format!("/open_api/{project_key}/work_item/{type_key}/query");
        let body = json!({ "work_item_ids": ids, "expand": {} });
        let items: Vec<WorkItem> = self.call_data(Method::Post, &path, Some(body)).await?;
        debug!(requested = ids.len(), found = items.len(), "Queried work items");
        Ok(items)
    }

    /// Update fields of one work item.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn update(
        &self,
        project_key: &str,
        type_key: &str,
        id: i64,
        update_fields: &[FieldValue],
    ) -> Result<()> {
        validate_keys(project_key, type_key)?;
        let path = format!("/open_api/{project_key}/work_item/{type_key}/{id}");
        let body = json!({ "update_fields": update_fields });
        self.call(Method::Put, &path, Some(body)).await?;
        info!(id, fields = update_fields.len(), "Updated work item");
        Ok(())
    }

    /// Delete one work item.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn delete(&self, project_key: &str, type_key: &str, id: i64) -> Result<()> {
        validate_keys(project_key, type_key)?;
        let path = format!("/open_api/{project_key}/work_item/{type_key}/{id}");
        self.call(Method::Delete, &path, None).await?;
        info!(id, "Deleted work item");
        Ok(())
    }

    /// Run a filter query. Both the list and page response shapes are accepted.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure, or an
    /// unrecognised payload shape.
    pub async fn filter(&self, project_key: &str, request: &FilterRequest) -> Result<WorkItemPage> {
        validate_key(project_key, "project_key")?;
        for type_key in &request.work_item_type_keys {
            validate_key(type_key, "work_item_type_key")?;
        }
        debug!(
            project = %mask_project_key(project_key),
            page_num = request.page_num,
            page_size = request.page_size,
            "Filtering work items"
        );

        let path = format!("/open_api/{project_key}/work_item/filter");
        let data = self
            .call(Method::Post, &path, Some(serde_json::to_value(request)?))
            .await?;
        Ok(PageData::from_value(data)?.into())
    }

    /// Search with a structured condition group.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn search_params(
        &self,
        project_key: &str,
        type_key: &str,
        search_group: Value,
        page_num: u32,
        page_size: u32,
    ) -> Result<WorkItemPage> {
        validate_keys(project_key, type_key)?;
        let path = format!("/open_api/{project_key}/work_item/{type_key}/search/params");
        let body = json!({
            "search_group": search_group,
            "page_num": page_num,
            "page_size": page_size,
        });
        let data = self.call(Method::Post, &path, Some(body)).await?;
        Ok(PageData::from_value(data)?.into())
    }

    /// Set one field on many work items. Returns the upstream task id.
    ///
    /// # Errors
    /// Returns `ApiError::Validation` unless exactly one field is given, or
    /// error on invalid key, transport or upstream failure.
    pub async fn batch_update(
        &self,
        project_key: &str,
        type_key: &str,
        ids: &[i64],
        update_fields: &[FieldValue],
    ) -> Result<String> {
        validate_keys(project_key, type_key)?;
        let [field] = update_fields else {
            return Err(ApiError::Validation(format!(
                "batch update takes exactly one field, got {}",
                update_fields.len()
            )));
        };

        info!(
            project = %mask_project_key(project_key),
            type_key = %type_key,
            count = ids.len(),
            field = %field.field_key,
            "Batch updating work items"
        );
        let body = json!({
            "project_key": project_key,
            "work_item_type_key": type_key,
            "work_item_ids": ids,
            "field_key": field.field_key,
            "after_field_value": field.field_value,
            "update_mode": UPDATE_MODE_REPLACE,
        });
        let task_id = match self
            .call(Method::Post, "/open_api/work_item/batch_update", Some(body))
            .await?
        {
            Value::String(id) => id,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        info!(task_id = %task_id, "Batch update queued");
        Ok(task_id)
    }

    /// Work items related to one work item, optionally through one relation.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn search_by_relation(
        &self,
        project_key: &str,
        type_key: &str,
        id: i64,
        relation_key: Option<&str>,
        page_num: u32,
        page_size: u32,
    ) -> Result<WorkItemPage> {
        validate_keys(project_key, type_key)?;
        let path = format!("/open_api/{project_key}/work_item/{type_key}/{id}/search_by_relation");
        let mut body = json!({ "page_num": page_num, "page_size": page_size });
        if let Some(relation_key) = relation_key {
            body["relation_key"] = Value::String(relation_key.to_string());
        }
        let data = self.call(Method::Post, &path, Some(body)).await?;
        let page = WorkItemPage::from(PageData::from_value(data)?);
        debug!(id, found = page.items.len(), "Searched by relation");
        Ok(page)
    }

    /// Fields, required flags and defaults needed to create a work item.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn create_meta(&self, project_key: &str, type_key: &str) -> Result<Value> {
        validate_keys(project_key, type_key)?;
        let path = format!("/open_api/{project_key}/work_item/{type_key}/meta");
        debug!(project = %mask_project_key(project_key), type_key = %type_key, "Fetching create meta");
        self.call(Method::Get, &path, None).await
    }

    /// One page of a work item's operation history.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn operate_history(
        &self,
        project_key: &str,
        type_key: &str,
        id: i64,
        page_num: u32,
        page_size: u32,
    ) -> Result<Vec<Value>> {
        validate_keys(project_key, type_key)?;
        let path = format!(
            "/open_api/{project_key}/work_item/{type_key}/{id}/operate-history?page_num={page_num}&page_size={page_size}"
        );
        let records: Vec<Value> = self.call_data(Method::Get, &path, None).await?;
        debug!(id, count = records.len(), "Fetched operate history");
        Ok(records)
    }

    /// Logged man-hours of the given work items.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn query_man_hour(&self, project_key: &str, type_key: &str, ids: &[i64]) -> Result<Value> {
        validate_keys(project_key, type_key)?;
        let body = json!({
            "project_key": project_key,
            "work_item_type_key": type_key,
            "work_item_ids": ids,
        });
        debug!(project = %mask_project_key(project_key), count = ids.len(), "Querying man-hours");
        self.call(Method::Post, "/open_api/work_item/man_hour/query", Some(body))
            .await
    }

    /// Set the actual time spent on a work item, in minutes.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn update_actual_time(
        &self,
        project_key: &str,
        type_key: &str,
        id: i64,
        actual_minutes: u64,
    ) -> Result<Value> {
        validate_keys(project_key, type_key)?;
        info!(
            project = %mask_project_key(project_key),
            type_key = %type_key,
            id,
            actual_minutes,
            "Updating actual time"
        );
        let body = json!({
            "project_key": project_key,
            "work_item_type_key": type_key,
            "work_item_id": id,
            "actual_time": actual_minutes,
        });
        self.call(Method::Post, "/open_api/work_item/actual_time/update", Some(body))
            .await
    }

    /// Roles defined in a project.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn roles(&self, project_key: &str) -> Result<Vec<Value>> {
        validate_key(project_key, "project_key")?;
        let path = format!("/open_api/{project_key}/role/all");
        let roles: Vec<Value> = self.call_data(Method::Get, &path, None).await?;
        debug!(project = %mask_project_key(project_key), count = roles.len(), "Listed roles");
        Ok(roles)
    }

    /// One page of the members holding a role.
    ///
    /// # Errors
    /// Returns error on invalid key, transport or upstream failure.
    pub async fn role_members(
        &self,
        project_key: &str,
        role_key: &str,
        page_num: u32,
        page_size: u32,
    ) -> Result<Value> {
        validate_key(project_key, "project_key")?;
        validate_key(role_key, "role_key")?;
        let path = format!("/open_api/{project_key}/role/member/query");
        let body = json!({
            "role_key": role_key,
            "page_num": page_num,
            "page_size": page_size,
        });
        self.call(Method::Post, &path, Some(body)).await
    }
}

fn validate_keys(project_key: &str, type_key: &str) -> Result<()> {
    validate_key(project_key, "project_key")?;
    validate_key(type_key, "work_item_type_key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, failure};
    use pretty_assertions::assert_eq;

    fn api(mock: &Arc<MockTransport>) -> OpenApi {
        OpenApi::new(mock.clone(), "u1")
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("project_abc-1", "project_key").is_ok());
        assert!(matches!(validate_key("", "project_key"), Err(ApiError::Validation(_))));
        assert!(matches!(validate_key("../etc", "project_key"), Err(ApiError::Validation(_))));
        assert!(matches!(validate_key("a b", "project_key"), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_mask_project_key() {
        assert_eq!(mask_project_key("project_abcdefgh"), "project_abcd***");
        assert_eq!(mask_project_key("project_ab"), "project_***");
        assert_eq!(mask_project_key("p1"), "***");
        assert_eq!(mask_project_key("widgets"), "widg***");
    }

    #[tokio::test]
    async fn test_list_projects_sends_user_key() {
        let mock = Arc::new(MockTransport::new().ok(Method::Post, "/open_api/projects", json!(["p1"])));
        let keys = api(&mock).list_projects().await.unwrap();

        assert_eq!(keys, vec!["p1"]);
        let calls = mock.calls();
        assert_eq!(calls[0].body, Some(json!({"user_key": "u1", "tenant_group_id": 0})));
    }

    #[tokio::test]
    async fn test_project_details_skips_non_objects() {
        let mock = Arc::new(MockTransport::new().ok(
            Method::Post,
            "/open_api/projects/detail",
            json!({"p1": {"name": "Widgets"}, "p2": null}),
        ));
        let details = api(&mock)
            .project_details(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();

        assert_eq!(details.len(), 1);
        assert_eq!(details["p1"].name, "Widgets");
        assert_eq!(
            mock.calls()[0].body,
            Some(json!({"project_keys": ["p1", "p2"], "user_key": "u1"}))
        );
    }

    #[tokio::test]
    async fn test_upstream_failure() {
        let mock = Arc::new(MockTransport::new().reply(
            Method::Get,
            "/open_api/p1/work_item/all-types",
            failure(10001, "no permission"),
        ));
        let err = api(&mock).all_types("p1").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream { code: 10001, ref message } if message == "no permission"));
    }

    #[tokio::test]
    async fn test_invalid_key_makes_no_call() {
        let mock = Arc::new(MockTransport::new());
        let err = api(&mock).query("p1/../x", "issue", &[1]).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_payload_and_id() {
        let mock = Arc::new(MockTransport::new().ok(Method::Post, "/open_api/p1/work_item/create", json!(1001)));
        let id = api(&mock)
            .create("p1", "issue", "Login broken", &[FieldValue::new("description", "steps")])
            .await
            .unwrap();

        assert_eq!(id, 1001);
        assert_eq!(
            mock.calls()[0].body,
            Some(json!({
                "work_item_type_key": "issue",
                "name": "Login broken",
                "field_value_pairs": [{"field_key": "description", "field_value": "steps"}]
            }))
        );
    }

    #[tokio::test]
    async fn test_filter_payload() {
        let mock = Arc::new(MockTransport::new().ok(
            Method::Post,
            "/open_api/p1/work_item/filter",
            json!({"work_items": [{"id": 1, "name": "a"}], "total": 9}),
        ));
        let request = FilterRequest::new("issue").with_page(2, 10).with_name("login");
        let page = api(&mock).filter("p1", &request).await.unwrap();

        assert_eq!(page.total, 9);
        assert_eq!(
            mock.calls()[0].body,
            Some(json!({
                "work_item_type_keys": ["issue"],
                "page_num": 2,
                "page_size": 10,
                "work_item_name": "login",
                "expand": {}
            }))
        );
    }

    #[tokio::test]
    async fn test_batch_update_single_field_only() {
        let mock = Arc::new(MockTransport::new().ok(
            Method::Post,
            "/open_api/work_item/batch_update",
            json!("task-7"),
        ));
        let api = api(&mock);

        let err = api
            .batch_update("p1", "issue", &[1, 2], &[FieldValue::new("a", 1), FieldValue::new("b", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = api.batch_update("p1", "issue", &[1], &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(mock.calls().is_empty());

        let task = api
            .batch_update("p1", "issue", &[1, 2], &[FieldValue::new("priority", "opt_0")])
            .await
            .unwrap();
        assert_eq!(task, "task-7");
        let body = mock.calls()[0].body.clone().unwrap();
        assert_eq!(body["after_field_value"], json!("opt_0"));
        assert_eq!(body["update_mode"], json!(0));
    }

    #[tokio::test]
    async fn test_search_by_relation_optional_key() {
        let mock = Arc::new(MockTransport::new().ok(
            Method::Post,
            "/open_api/p1/work_item/issue/7/search_by_relation",
            json!({"work_items": []}),
        ));
        let api = api(&mock);
        api.search_by_relation("p1", "issue", 7, None, 1, 20).await.unwrap();
        api.search_by_relation("p1", "issue", 7, Some("blocks"), 1, 20).await.unwrap();

        let calls = mock.calls();
        assert!(calls[0].body.as_ref().unwrap().get("relation_key").is_none());
        assert_eq!(calls[1].body.as_ref().unwrap()["relation_key"], json!("blocks"));
    }

    #[tokio::test]
    async fn test_search_params_payload() {
        let mock = Arc::new(MockTransport::new().ok(
            Method::Post,
            "/open_api/p1/work_item/issue/search/params",
            json!({"work_items": [{"id": 3, "name": "a"}], "total": 1}),
        ));
        let group = json!({"conjunction": "AND", "search_params": [{"param_key": "name", "value": "a", "operator": "~"}]});
        let page = api(&mock).search_params("p1", "issue", group.clone(), 2, 10).await.unwrap();

        assert_eq!(page.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(page.total, 1);
        assert_eq!(
            mock.calls()[0].body,
            Some(json!({"search_group": group, "page_num": 2, "page_size": 10}))
        );
    }

    #[tokio::test]
    async fn test_work_item_extras() {
        let history = "/open_api/p1/work_item/issue/7/operate-history?page_num=1&page_size=20";
        let mock = Arc::new(
            MockTransport::new()
                .ok(Method::Get, "/open_api/p1/work_item/issue/meta", json!([{"field_key": "name", "is_required": true}]))
                .ok(Method::Get, history, json!([{"operator": "u1"}, {"operator": "u2"}]))
                .ok(Method::Post, "/open_api/work_item/man_hour/query", json!({"7": 120}))
                .ok(Method::Post, "/open_api/work_item/actual_time/update", Value::Null),
        );
        let api = api(&mock);

        let meta = api.create_meta("p1", "issue").await.unwrap();
        assert_eq!(meta[0]["field_key"], json!("name"));
        assert_eq!(api.operate_history("p1", "issue", 7, 1, 20).await.unwrap().len(), 2);
        assert_eq!(api.query_man_hour("p1", "issue", &[7]).await.unwrap(), json!({"7": 120}));
        api.update_actual_time("p1", "issue", 7, 90).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[1].body, None);
        assert_eq!(
            calls[2].body,
            Some(json!({"project_key": "p1", "work_item_type_key": "issue", "work_item_ids": [7]}))
        );
        assert_eq!(
            calls[3].body,
            Some(json!({"project_key": "p1", "work_item_type_key": "issue", "work_item_id": 7, "actual_time": 90}))
        );

        assert!(matches!(
            api.create_meta("p1", "is/sue").await,
            Err(ApiError::Validation(_))
        ));
        assert_eq!(mock.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_roles_and_members() {
        let mock = Arc::new(
            MockTransport::new()
                .ok(Method::Get, "/open_api/p1/role/all", json!([{"key": "role1", "name": "Reviewer"}]))
                .ok(Method::Post, "/open_api/p1/role/member/query", json!({"members": ["u1"], "total": 1}))
                .reply(Method::Get, "/open_api/p2/role/all", failure(20001, "forbidden")),
        );
        let api = api(&mock);

        assert_eq!(api.roles("p1").await.unwrap()[0]["key"], json!("role1"));
        let members = api.role_members("p1", "role1", 1, 50).await.unwrap();
        assert_eq!(members["members"], json!(["u1"]));
        assert_eq!(
            mock.calls()[1].body,
            Some(json!({"role_key": "role1", "page_num": 1, "page_size": 50}))
        );

        let err = api.roles("p2").await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream { code: 20001, .. }));
    }
}
