//! larkbridge-core: domain models and metadata caches for the project-tracking open API.
//!
//! This crate provides:
//! - `WorkItem`: work items normalized from either upstream field shape
//! - `Envelope` / `PageData`: response envelope and page-shape decoding
//! - `NameKeyCache`: name → key tables for projects, types, fields and options
//! - `TtlCache`: short-lived cache for lookups that may go stale
//! - `FieldProfile`: pure encoding of human values into upstream field values

pub mod cache;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod item;
pub mod metadata;
pub mod ttl;

pub use cache::{NameKeyCache, Namespace, Scope};
pub use codec::{FieldProfile, extract_readable, option_object, parse_bool, readable_user, split_delimited};
pub use envelope::{Envelope, PageData, Pagination};
pub use error::{CoreError, Result};
pub use item::{FieldList, FieldValue, WorkItem, WorkItemPage};
pub use metadata::{FieldDefinition, FieldOption, ProjectDetail, WorkItemType};
pub use ttl::{DEFAULT_TTL, TtlCache};
