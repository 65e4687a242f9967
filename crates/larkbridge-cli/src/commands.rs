//! CLI command implementations.

use crate::output::{self, FieldRow, OutputFormat, Resolved, TaskList};
use anyhow::{Context, Result, bail};
use console::style;
use larkbridge_api::{
    ClientConfig, HttpTransport, MetadataResolver, OpenApi, RelatedTo, TaskQuery, Transport, WorkItemOrchestrator,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Config file picked up from the working directory when none is given.
const DEFAULT_CONFIG_FILE: &str = "larkbridge.yml";

/// Global options that shape the session.
#[derive(Debug, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub project_key: Option<String>,
    pub project: Option<String>,
    pub work_item_type: Option<String>,
}

/// A configured client.
///
/// Metadata lookups that need no project work without one; work item
/// commands fail with a hint to set it.
pub struct Session {
    resolver: Arc<MetadataResolver>,
    orchestrator: Option<WorkItemOrchestrator>,
}

impl Session {
    /// Load configuration and build the client stack.
    pub fn open(settings: &Settings) -> Result<Self> {
        let config = apply_settings(load_config(settings.config.as_deref())?.with_env(), settings);
        config.validate().context("Incomplete configuration")?;

        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config).context("Failed to build HTTP client")?);

        if has_project(&config) {
            let orchestrator =
                WorkItemOrchestrator::from_config(&config, transport).context("Failed to set up project")?;
            return Ok(Self {
                resolver: Arc::clone(orchestrator.resolver()),
                orchestrator: Some(orchestrator),
            });
        }

        let api = OpenApi::new(transport, config.user_key.clone()).with_tenant_group_id(config.tenant_group_id);
        Ok(Self {
            resolver: Arc::new(MetadataResolver::with_ttl(api, config.fetch.cache_ttl())),
            orchestrator: None,
        })
    }

    fn orchestrator(&self) -> Result<&WorkItemOrchestrator> {
        self.orchestrator
            .as_ref()
            .context("No project configured (use --project, --project-key or FEISHU_PROJECT_KEY)")
    }

    async fn keys(&self) -> Result<(String, String)> {
        self.orchestrator()?
            .keys()
            .await
            .context("Failed to resolve project and work item type")
    }

    pub async fn resolve_project(&self, name: &str, format: OutputFormat) -> Result<()> {
        let key = self.resolver.get_project_key(name).await?;
        output::print(&Resolved { kind: "project", name: name.to_string(), key }, format)
    }

    pub async fn resolve_type(&self, name: &str, format: OutputFormat) -> Result<()> {
        let project_key = self.orchestrator()?.project_key().await?;
        let key = self.resolver.get_type_key(&project_key, name).await?;
        output::print(&Resolved { kind: "type", name: name.to_string(), key }, format)
    }

    pub async fn resolve_field(&self, name: &str, format: OutputFormat) -> Result<()> {
        let (project_key, type_key) = self.keys().await?;
        let key = self.resolver.get_field_key(&project_key, &type_key, name).await?;
        output::print(&Resolved { kind: "field", name: name.to_string(), key }, format)
    }

    pub async fn resolve_option(&self, field: &str, label: &str, format: OutputFormat) -> Result<()> {
        let (project_key, type_key) = self.keys().await?;
        let field_key = self.resolver.get_field_key(&project_key, &type_key, field).await?;
        let key = self
            .resolver
            .get_option_value(&project_key, &type_key, &field_key, label)
            .await?;
        output::print(&Resolved { kind: "option", name: label.to_string(), key }, format)
    }

    pub async fn fields(&self, format: OutputFormat) -> Result<()> {
        let (project_key, type_key) = self.keys().await?;
        let mappings = self.resolver.get_field_mappings(&project_key, &type_key).await?;

        let mut rows = Vec::with_capacity(mappings.len());
        for (name, key) in mappings {
            let field_type = self
                .resolver
                .get_field_type(&project_key, &type_key, &key)
                .await
                .unwrap_or_default();
            rows.push(FieldRow { name, key, field_type });
        }
        output::print(rows.as_slice(), format)
    }

    pub async fn create(
        &self,
        name: &str,
        priority: Option<&str>,
        description: Option<&str>,
        assignee: Option<&str>,
        format: OutputFormat,
    ) -> Result<()> {
        let id = self
            .orchestrator()?
            .create_issue(name, priority, description, assignee)
            .await
            .context("Failed to create issue")?;
        output::print_success(&format!("Created {} {}", style(id).bold(), name), format)
    }

    pub async fn get(&self, id: i64, readable: bool, format: OutputFormat) -> Result<()> {
        let orchestrator = self.orchestrator()?;
        let item = orchestrator
            .get_issue_details(id)
            .await
            .with_context(|| format!("Failed to fetch work item {id}"))?;
        if readable {
            let readable = orchestrator.enhance_with_readable_names(&item).await?;
            output::print(&readable, format)
        } else {
            output::print(&item, format)
        }
    }

    pub async fn update(&self, id: i64, assignments: &[String], format: OutputFormat) -> Result<()> {
        let updates = assignments
            .iter()
            .map(|a| parse_assignment(a))
            .collect::<Result<Vec<_>>>()?;
        self.orchestrator()?
            .update_issue(id, &updates)
            .await
            .with_context(|| format!("Failed to update work item {id}"))?;
        output::print_success(&format!("Updated {id}"), format)
    }

    pub async fn batch_update(&self, ids: &[i64], assignment: &str, format: OutputFormat) -> Result<()> {
        let (field, value) = parse_assignment(assignment)?;
        let task_id = self
            .orchestrator()?
            .batch_update_field(ids, &field, &value)
            .await
            .context("Failed to submit batch update")?;
        debug!(task_id = %task_id, count = ids.len(), "Batch update submitted");
        output::print_success(&format!("Batch update submitted (task {task_id})"), format)
    }

    pub async fn delete(&self, id: i64, format: OutputFormat) -> Result<()> {
        self.orchestrator()?
            .delete_issue(id)
            .await
            .with_context(|| format!("Failed to delete work item {id}"))?;
        output::print_success(&format!("Deleted {id}"), format)
    }

    pub async fn tasks(&self, query: &TaskQuery, format: OutputFormat) -> Result<()> {
        let orchestrator = self.orchestrator()?;
        let page = orchestrator.get_tasks(query).await.context("Failed to list work items")?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in &page.items {
            items.push(orchestrator.simplify(item).await?);
        }
        output::print(
            &TaskList {
                items,
                total: page.total,
                page_num: page.page_num,
                page_size: page.page_size,
            },
            format,
        )
    }
}

fn has_project(config: &ClientConfig) -> bool {
    let set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
    set(&config.project.key) || set(&config.project.name)
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => {
            ClientConfig::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            ClientConfig::load(DEFAULT_CONFIG_FILE).context("Failed to load larkbridge.yml")
        }
        None => Ok(ClientConfig::default()),
    }
}

/// Command-line flags win over file and environment. A project name given on
/// the command line replaces any configured key.
fn apply_settings(mut config: ClientConfig, settings: &Settings) -> ClientConfig {
    if let Some(name) = &settings.project {
        config.project.name = Some(name.clone());
        config.project.key = None;
    }
    if let Some(key) = &settings.project_key {
        config.project.key = Some(key.clone());
    }
    if let Some(type_name) = &settings.work_item_type {
        config.project.work_item_type = type_name.clone();
    }
    config
}

/// Build a task query from command-line filters.
#[must_use]
pub fn task_query(
    name: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    owner: Option<String>,
    related_to: Option<&str>,
    page: u32,
    page_size: u32,
) -> TaskQuery {
    TaskQuery {
        name,
        status,
        priority,
        owner,
        related_to: related_to.filter(|r| !r.trim().is_empty()).map(RelatedTo::from),
        page_num: page.max(1),
        page_size: page_size.max(1),
    }
}

/// Parse `name=value`. The value is read as JSON when it parses, otherwise
/// it is taken as a string.
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Invalid assignment '{raw}': expected name=value");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid assignment '{raw}': field name is empty");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
