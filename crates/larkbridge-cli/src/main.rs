//! larkbridge CLI - project metadata and work items from the command line.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "larkbridge")]
#[command(author, version, about = "Project-tracking open API client")]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human")]
    format: output::OutputFormat,

    /// Config file (YAML)
    #[arg(long, short = 'c', global = true, env = "LARKBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Project key (overrides config and environment)
    #[arg(long, global = true)]
    project_key: Option<String>,

    /// Project name, resolved to a key
    #[arg(long, short = 'p', global = true)]
    project: Option<String>,

    /// Work item type name
    #[arg(long, short = 't', global = true)]
    work_item_type: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a name to its key
    #[command(subcommand)]
    Resolve(ResolveCommands),

    /// List the fields of the work item type
    Fields,

    /// Create an issue
    Create {
        /// Issue name
        name: String,

        /// Priority label
        #[arg(long)]
        priority: Option<String>,

        /// Description
        #[arg(long, short = 'd')]
        description: Option<String>,

        /// Assignee user key
        #[arg(long, short = 'a')]
        assignee: Option<String>,
    },

    /// Get a work item by id
    Get {
        /// Work item id
        id: i64,

        /// Show fields by name with readable values
        #[arg(long, short = 'r')]
        readable: bool,
    },

    /// Set field values on a work item
    Update {
        /// Work item id
        id: i64,

        /// Field assignments (name=value)
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Set one field on several work items
    BatchUpdate {
        /// Field assignment (name=value)
        assignment: String,

        /// Work item ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Delete a work item
    Delete {
        /// Work item id
        id: i64,
    },

    /// List work items
    #[command(alias = "ls")]
    Tasks {
        /// Name contains
        #[arg(long)]
        name: Option<String>,

        /// Status label
        #[arg(long, short = 's')]
        status: Option<String>,

        /// Priority label
        #[arg(long)]
        priority: Option<String>,

        /// Owner user key
        #[arg(long, short = 'o')]
        owner: Option<String>,

        /// Related work item id or name
        #[arg(long, short = 'r')]
        related_to: Option<String>,

        /// Page number
        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size
        #[arg(long, default_value = "20")]
        page_size: u32,
    },
}

#[derive(Subcommand)]
enum ResolveCommands {
    /// Project name → project key
    Project { name: String },

    /// Work item type name → type key
    Type { name: String },

    /// Field name or alias → field key
    Field { name: String },

    /// Option label → option value
    Option {
        /// Field name, alias or key
        field: String,
        /// Option label
        label: String,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = commands::Settings {
        config: cli.config,
        project_key: cli.project_key,
        project: cli.project,
        work_item_type: cli.work_item_type,
    };
    let format = cli.format;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let session = commands::Session::open(&settings)?;
        match cli.command {
            Commands::Resolve(ResolveCommands::Project { name }) => session.resolve_project(&name, format).await,
            Commands::Resolve(ResolveCommands::Type { name }) => session.resolve_type(&name, format).await,
            Commands::Resolve(ResolveCommands::Field { name }) => session.resolve_field(&name, format).await,
            Commands::Resolve(ResolveCommands::Option { field, label }) => {
                session.resolve_option(&field, &label, format).await
            }
            Commands::Fields => session.fields(format).await,
            Commands::Create {
                name,
                priority,
                description,
                assignee,
            } => {
                session
                    .create(&name, priority.as_deref(), description.as_deref(), assignee.as_deref(), format)
                    .await
            }
            Commands::Get { id, readable } => session.get(id, readable, format).await,
            Commands::Update { id, assignments } => session.update(id, &assignments, format).await,
            Commands::BatchUpdate { assignment, ids } => session.batch_update(&ids, &assignment, format).await,
            Commands::Delete { id } => session.delete(id, format).await,
            Commands::Tasks {
                name,
                status,
                priority,
                owner,
                related_to,
                page,
                page_size,
            } => {
                let query = commands::task_query(name, status, priority, owner, related_to.as_deref(), page, page_size);
                session.tasks(&query, format).await
            }
        }
    })
}
