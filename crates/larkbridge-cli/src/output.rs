//! Output formatting for the CLI.

use anyhow::Result;
use console::style;
use larkbridge_api::{ReadableWorkItem, WorkItemSummary};
use larkbridge_core::{WorkItem, extract_readable};
use serde::Serialize;
use serde_json::Value;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Print output in the specified format.
pub fn print<T: Serialize + HumanDisplay + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{}", value.human_display()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => println!("{}", style(message).green()),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({"status": "ok", "message": message}))?
            );
        }
        OutputFormat::Yaml => println!("status: ok\nmessage: {message}"),
    }
    Ok(())
}

/// Trait for human-readable display.
pub trait HumanDisplay {
    fn human_display(&self) -> String;
}

impl HumanDisplay for WorkItem {
    fn human_display(&self) -> String {
        let mut out = format!("ID:    {}\nName:  {}\n", self.id, self.name);
        if !self.fields.is_empty() {
            out.push_str("Fields:\n");
            for field in &self.fields {
                out.push_str(&format!(
                    "  {}: {}\n",
                    field.field_key,
                    display_value(&extract_readable(&field.field_value))
                ));
            }
        }
        out
    }
}

impl HumanDisplay for ReadableWorkItem {
    fn human_display(&self) -> String {
        let mut out = format!("ID:    {}\nName:  {}\n", self.id, self.name);
        let width = self.fields.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        for (name, value) in &self.fields {
            let pad = width - name.chars().count();
            out.push_str(&format!("  {name}{}  {}\n", " ".repeat(pad), display_value(value)));
        }
        out
    }
}

/// A resolved name.
#[derive(Debug, Serialize)]
pub struct Resolved {
    pub kind: &'static str,
    pub name: String,
    pub key: String,
}

impl HumanDisplay for Resolved {
    fn human_display(&self) -> String {
        format!("{} {} → {}", self.kind, self.name, style(&self.key).bold())
    }
}

/// One row of the field listing.
#[derive(Debug, Serialize)]
pub struct FieldRow {
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl HumanDisplay for [FieldRow] {
    fn human_display(&self) -> String {
        if self.is_empty() {
            return "No fields found.".to_string();
        }
        let name_w = self.iter().map(|r| r.name.chars().count()).max().unwrap_or(4).max(4);
        let key_w = self.iter().map(|r| r.key.len()).max().unwrap_or(3).max(3);

        let mut out = format!("{}  {}  TYPE\n", pad("NAME", name_w), pad("KEY", key_w));
        for row in self {
            out.push_str(&format!("{}  {}  {}\n", pad(&row.name, name_w), pad(&row.key, key_w), row.field_type));
        }
        out
    }
}

/// One page of task summaries.
#[derive(Debug, Serialize)]
pub struct TaskList {
    pub items: Vec<WorkItemSummary>,
    pub total: u64,
    pub page_num: u32,
    pub page_size: u32,
}

impl HumanDisplay for TaskList {
    fn human_display(&self) -> String {
        if self.items.is_empty() {
            return "No work items found.".to_string();
        }

        let id_w = self.items.iter().map(|i| i.id.to_string().len()).max().unwrap_or(2).max(2);
        let status_w = column_width(self.items.iter().map(|i| i.status.as_deref()), 6);
        let priority_w = column_width(self.items.iter().map(|i| i.priority.as_deref()), 8);
        let owner_w = column_width(self.items.iter().map(|i| i.owner.as_deref()), 5);

        let mut out = format!(
            "{}  {}  {}  {}  NAME\n",
            pad("ID", id_w),
            pad("STATUS", status_w),
            pad("PRIORITY", priority_w),
            pad("OWNER", owner_w)
        );
        out.push_str(&"-".repeat(id_w + status_w + priority_w + owner_w + 20));
        out.push('\n');
        for item in &self.items {
            out.push_str(&format!(
                "{}  {}  {}  {}  {}\n",
                pad(&item.id.to_string(), id_w),
                pad(item.status.as_deref().unwrap_or("-"), status_w),
                pad(item.priority.as_deref().unwrap_or("-"), priority_w),
                pad(item.owner.as_deref().unwrap_or("-"), owner_w),
                item.name
            ));
        }
        out.push_str(&format!(
            "{}",
            style(format!("page {} · {} of {} total", self.page_num, self.items.len(), self.total)).dim()
        ));
        out
    }
}

fn column_width<'a>(values: impl Iterator<Item = Option<&'a str>>, header: usize) -> usize {
    values
        .map(|v| v.map_or(1, |s| s.chars().count()))
        .max()
        .unwrap_or(1)
        .max(header)
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{text}{}", " ".repeat(width.saturating_sub(len)))
}

/// Render a readable value on one line.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
