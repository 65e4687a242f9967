//! Client configuration.

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding [`ClientConfig::base_url`].
pub const ENV_BASE_URL: &str = "FEISHU_PROJECT_BASE_URL";
/// Environment variable overriding [`ClientConfig::plugin_token`].
pub const ENV_USER_TOKEN: &str = "FEISHU_PROJECT_USER_TOKEN";
/// Environment variable overriding [`ClientConfig::user_key`].
pub const ENV_USER_KEY: &str = "FEISHU_PROJECT_USER_KEY";
/// Environment variable overriding [`ProjectSettings::key`].
pub const ENV_PROJECT_KEY: &str = "FEISHU_PROJECT_KEY";

/// Client configuration, typically stored in `larkbridge.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Open-API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Key of the user the requests act on behalf of.
    #[serde(default)]
    pub user_key: String,

    /// Plugin token sent as `X-PLUGIN-TOKEN`.
    #[serde(default)]
    pub plugin_token: String,

    /// Tenant group id sent with project listing calls.
    #[serde(default)]
    pub tenant_group_id: i64,

    /// Default project and work item type.
    #[serde(default)]
    pub project: ProjectSettings,

    /// Paging and caching knobs.
    #[serde(default)]
    pub fetch: FetchSettings,
}

fn default_base_url() -> String {
    "https://project.feishu.cn".to_string()
}

/// Which project and work item type operations default to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project display name, resolved to a key on first use.
    #[serde(default)]
    pub name: Option<String>,

    /// Project key. Takes precedence over `name`.
    #[serde(default)]
    pub key: Option<String>,

    /// Work item type name issues are created as.
    #[serde(default = "default_work_item_type")]
    pub work_item_type: String,
}

fn default_work_item_type() -> String {
    "Issue管理".to_string()
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: None,
            key: None,
            work_item_type: default_work_item_type(),
        }
    }
}

/// Paging and caching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Pages requested concurrently while scanning.
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: u32,

    /// Page size used while scanning.
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: u32,

    /// Upper bound on pages requested by one scan.
    #[serde(default = "default_max_scan_pages")]
    pub max_scan_pages: u32,

    /// Work item type names searched when resolving a relation by name.
    #[serde(default = "default_relation_search_types")]
    pub relation_search_types: Vec<String>,

    /// Lifetime of cached field mappings and relation names, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

const fn default_page_concurrency() -> u32 {
    3
}

const fn default_scan_page_size() -> u32 {
    50
}

const fn default_max_scan_pages() -> u32 {
    100
}

fn default_relation_search_types() -> Vec<String> {
    ["项目管理", "需求管理", "Issue管理", "任务", "Epic", "事务管理"]
        .into_iter()
        .map(String::from)
        .collect()
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_concurrency: default_page_concurrency(),
            scan_page_size: default_scan_page_size(),
            max_scan_pages: default_max_scan_pages(),
            relation_search_types: default_relation_search_types(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl FetchSettings {
    /// Cache TTL as a duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_key: String::new(),
            plugin_token: String::new(),
            tenant_group_id: 0,
            project: ProjectSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load a config file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded client config");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(url) = get(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(token) = get(ENV_USER_TOKEN) {
            self.plugin_token = token;
        }
        if let Some(user_key) = get(ENV_USER_KEY) {
            self.user_key = user_key;
        }
        if let Some(project_key) = get(ENV_PROJECT_KEY) {
            self.project.key = Some(project_key);
        }
        self
    }

    /// Check the settings every request depends on.
    ///
    /// # Errors
    /// Returns `ApiError::Config` naming the first missing setting.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ApiError::Config("base_url is empty".to_string()));
        }
        if self.plugin_token.is_empty() {
            return Err(ApiError::Config(format!(
                "plugin token is not set (use {ENV_USER_TOKEN})"
            )));
        }
        if self.user_key.is_empty() {
            return Err(ApiError::Config(format!(
                "user key is not set (use {ENV_USER_KEY})"
            )));
        }
        Ok(())
    }
}
