//! Response envelope shared by every open-API endpoint.
//!
//! Every response is `{err_code, err_msg?, data}`. A non-zero `err_code` is
//! a failure no matter what HTTP status came with it.

use crate::error::{CoreError, Result};
use crate::item::{WorkItem, WorkItemPage};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Raw response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Zero on success.
    #[serde(default)]
    pub err_code: i64,

    /// Human-readable error message.
    #[serde(default)]
    pub err_msg: Option<String>,

    /// Payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Parse an envelope from a response body.
    ///
    /// # Errors
    /// Returns `CoreError::Json` if the body is not an envelope.
    pub fn from_value(body: Value) -> Result<Self> {
        Ok(serde_json::from_value(body)?)
    }

    /// Whether the upstream reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.err_code == 0
    }

    /// Unwrap the raw payload, failing on a non-zero `err_code`.
    ///
    /// # Errors
    /// Returns `CoreError::Upstream` when `err_code != 0`.
    pub fn into_raw(self) -> Result<Value> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(CoreError::Upstream {
                code: self.err_code,
                message: self.err_msg.unwrap_or_else(|| "Unknown error".to_string()),
            })
        }
    }

    /// Unwrap and decode the payload. A `null` payload decodes as `T::default()`.
    ///
    /// # Errors
    /// Returns `CoreError::Upstream` on failure codes, `CoreError::Json` if the
    /// payload does not match `T`.
    pub fn into_data<T: DeserializeOwned + Default>(self) -> Result<T> {
        match self.into_raw()? {
            Value::Null => Ok(T::default()),
            data => Ok(serde_json::from_value(data)?),
        }
    }
}

/// Payload of the filter/search endpoints, which answer either with a bare
/// list or with a page object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageData {
    /// `data: [WorkItem, ...]`
    List(Vec<WorkItem>),
    /// `data: {work_items, total?, pagination?: {total?}}`
    Page {
        #[serde(default)]
        work_items: Vec<WorkItem>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        pagination: Option<Pagination>,
    },
}

/// Pagination block of a page response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub page_num: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u64>,
}

impl PageData {
    /// Decode a raw payload, treating `null` as an empty page.
    ///
    /// # Errors
    /// Returns `CoreError::UnexpectedShape` when the payload is neither a list
    /// nor a page object.
    pub fn from_value(data: Value) -> Result<Self> {
        if data.is_null() {
            return Ok(Self::List(Vec::new()));
        }
        serde_json::from_value(data).map_err(|e| CoreError::UnexpectedShape(e.to_string()))
    }
}

impl From<PageData> for WorkItemPage {
    fn from(data: PageData) -> Self {
        match data {
            PageData::List(items) => {
                let total = items.len() as u64;
                Self { items, total }
            }
            PageData::Page {
                work_items,
                total,
                pagination,
            } => {
                let total = total
                    .or_else(|| pagination.and_then(|p| p.total))
                    .unwrap_or(work_items.len() as u64);
                Self {
                    items: work_items,
                    total,
                }
            }
        }
    }
}
