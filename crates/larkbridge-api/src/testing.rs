//! Scripted transport and metadata fixtures for tests.

use crate::error::{ApiError, Result};
use crate::transport::{Method, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Call {
    /// Integer field of the request body.
    pub fn body_i64(&self, key: &str) -> Option<i64> {
        self.body.as_ref()?.get(key)?.as_i64()
    }
}

type Handler = Box<dyn Fn(&Call) -> Result<Value> + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// Transport answering from per-route handlers and recording every call.
///
/// Later routes for the same method and path take precedence.
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<Route>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route to a handler that sees the call and returns the whole body.
    pub fn on(
        mut self,
        method: Method,
        path: &str,
        handler: impl Fn(&Call) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(handler),
        });
        self
    }

    /// Route to a fixed body.
    pub fn reply(self, method: Method, path: &str, body: Value) -> Self {
        self.on(method, path, move |_| Ok(body.clone()))
    }

    /// Route to a successful envelope around `data`.
    pub fn ok(self, method: Method, path: &str, data: Value) -> Self {
        self.reply(method, path, envelope(data))
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of calls to one route.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let call = Call {
            method,
            path: path.to_string(),
            body,
        };
        self.calls.lock().push(call.clone());

        self.routes
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .map_or_else(
                || Err(ApiError::Transport(format!("no route for {method} {path}"))),
                |route| (route.handler)(&call),
            )
    }
}

/// Successful envelope.
pub fn envelope(data: Value) -> Value {
    json!({ "err_code": 0, "err_msg": "", "data": data })
}

/// Failed envelope.
pub fn failure(code: i64, message: &str) -> Value {
    json!({ "err_code": code, "err_msg": message, "data": null })
}

pub const PROJECTS: &str = "/open_api/projects";
pub const PROJECT_DETAIL: &str = "/open_api/projects/detail";
pub const TYPES: &str = "/open_api/p1/work_item/all-types";
pub const FIELDS: &str = "/open_api/p1/field/all";
pub const FILTER: &str = "/open_api/p1/work_item/filter";

/// One project "Widgets" (`p1`) with an "Issue管理" type (`issue`) whose
/// fields cover every value shape the codec handles.
pub fn widgets() -> MockTransport {
    MockTransport::new()
        .ok(Method::Post, PROJECTS, json!(["p1"]))
        .ok(Method::Post, PROJECT_DETAIL, json!({"p1": {"name": "Widgets"}}))
        .ok(
            Method::Get,
            TYPES,
            json!([
                {"name": "Issue管理", "type_key": "issue"},
                {"name": "需求管理", "type_key": "story"},
                {"name": "任务", "type_key": "task"}
            ]),
        )
        .ok(
            Method::Post,
            FIELDS,
            json!([
                {
                    "field_key": "field_prio",
                    "field_name": "优先级",
                    "field_alias": "priority",
                    "field_type_key": "select",
                    "options": [
                        {"label": "P0", "value": "opt_p0"},
                        {"label": "P1", "value": "opt_p1"},
                        {"label": "High", "value": "opt_high"}
                    ]
                },
                {"field_key": "description", "field_name": "描述", "field_type_key": "multi_text", "options": null},
                {"field_key": "owner", "field_name": "当前负责人", "field_type_key": "user"},
                {
                    "field_key": "work_item_status",
                    "field_name": "状态",
                    "field_alias": "status",
                    "field_type_key": "work_item_status",
                    "options": [
                        {"label": "Open", "value": "open"},
                        {"label": "Done", "value": "done"}
                    ]
                },
                {
                    "field_key": "tags",
                    "field_name": "标签",
                    "field_type_key": "multi_select",
                    "options": [
                        {"label": "A", "value": "a"},
                        {"label": "B", "value": "b"}
                    ]
                },
                {"field_key": "blocked", "field_name": "阻塞", "field_type_key": "bool"},
                {"field_key": "related", "field_name": "关联需求", "field_type_key": "work_item_related"}
            ]),
        )
}
