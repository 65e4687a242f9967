//! Open-API client for project-tracking metadata and work items.
//!
//! Layers, bottom up:
//! - `transport`: the [`Transport`] seam and its `reqwest` implementation
//! - `openapi`: one method per endpoint, key validation, envelope handling
//! - `resolver`: name → key resolution over the metadata cache
//! - `codec`: human values → upstream field values
//! - `orchestrator`: work item operations in human terms

pub mod codec;
pub mod config;
pub mod error;
pub mod openapi;
pub mod orchestrator;
pub mod resolver;
pub mod transport;

#[cfg(test)]
mod testing;

pub use codec::FieldValueCodec;
pub use config::{ClientConfig, FetchSettings, ProjectSettings};
pub use error::{ApiError, Result};
pub use openapi::{FilterRequest, OpenApi};
pub use orchestrator::{
    ProjectRef, ReadableWorkItem, RelatedTo, TaskPage, TaskQuery, WorkItemOrchestrator,
    WorkItemSummary,
};
pub use resolver::MetadataResolver;
pub use transport::{HttpTransport, Method, Transport};
