//! kubectl-hub: A kubectl plugin for inspecting hub Projects
//!
//! This plugin provides convenient commands to interact with Project resources:
//! - `kubectl hub list` - List all Project resources
//! - `kubectl hub status [name]` - Get backend sync status of Project(s)

use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use kube::{api::Api, Client, ResourceExt};
use serde::Serialize;

use hub_operator::crd::Project;
use hub_operator::error::{Error, Result};

#[derive(Parser)]
#[command(name = "kubectl-hub")]
#[command(about = "A kubectl plugin for inspecting hub Projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to "default")
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// List all Project resources
    List {
        /// Show all namespaces
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },
    /// Get backend sync status of Project(s)
    Status {
        /// Name of a specific Project (optional, shows all if omitted)
        name: Option<String>,
        /// Show all namespaces
        #[arg(short = 'A', long)]
        all_namespaces: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// Flattened view of a Project's sync state
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncSummary {
    name: String,
    namespace: String,
    display_name: String,
    synced: bool,
    retry_count: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_synced_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_retry_at: Option<DateTime<Utc>>,
}

impl From<&Project> for SyncSummary {
    fn from(project: &Project) -> Self {
        let status = project.current_status();
        Self {
            name: project.name_any(),
            namespace: project.namespace_or_default(),
            display_name: project.spec.name.clone(),
            synced: status.synced,
            retry_count: status.retry_count,
            error: status.error,
            last_synced_at: status.last_synced_at,
            last_retry_at: status.last_retry_at,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = Client::try_default().await.map_err(Error::KubeError)?;

    match cli.command {
        Commands::List { all_namespaces } => {
            let projects =
                fetch_projects(&client, None, all_namespaces, cli.namespace.as_deref()).await?;
            print_projects(&projects, all_namespaces, cli.output)
        }
        Commands::Status {
            name,
            all_namespaces,
        } => {
            let projects = fetch_projects(
                &client,
                name.as_deref(),
                all_namespaces,
                cli.namespace.as_deref(),
            )
            .await?;
            let show_namespace = all_namespaces || (name.is_none() && cli.namespace.is_none());
            print_status(&projects, show_namespace, cli.output)
        }
    }
}

/// Fetch one named Project, or every Project in scope
async fn fetch_projects(
    client: &Client,
    name: Option<&str>,
    all_namespaces: bool,
    namespace: Option<&str>,
) -> Result<Vec<Project>> {
    let ns = namespace.unwrap_or("default");

    if let Some(name) = name {
        let api: Api<Project> = Api::namespaced(client.clone(), ns);
        let project = api.get(name).await.map_err(Error::KubeError)?;
        return Ok(vec![project]);
    }

    let api: Api<Project> = if all_namespaces {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), ns)
    };
    let list = api
        .list(&Default::default())
        .await
        .map_err(Error::KubeError)?;
    Ok(list.items)
}

fn print_projects(projects: &[Project], show_namespace: bool, output: OutputFormat) -> Result<()> {
    if projects.is_empty() && output == OutputFormat::Table {
        println!("No Project resources found.");
        return Ok(());
    }

    let rendered = match output {
        OutputFormat::Json => format_json(projects)?,
        OutputFormat::Yaml => format_yaml(projects)?,
        OutputFormat::Table => format_projects_table(projects, show_namespace),
    };
    println!("{}", rendered);
    Ok(())
}

fn print_status(projects: &[Project], show_namespace: bool, output: OutputFormat) -> Result<()> {
    if projects.is_empty() && output == OutputFormat::Table {
        println!("No Project resources found.");
        return Ok(());
    }

    let summaries: Vec<SyncSummary> = projects.iter().map(SyncSummary::from).collect();
    let rendered = match output {
        OutputFormat::Json => format_json(&summaries)?,
        OutputFormat::Yaml => format_yaml(&summaries)?,
        OutputFormat::Table => format_status_table(&summaries, show_namespace),
    };
    println!("{}", rendered);
    Ok(())
}

/// Helper function to format values as JSON
fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| Error::ConfigError(format!("JSON serialization error: {}", e)))
}

/// Helper function to format values as YAML
fn format_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_yaml::to_string(value)
        .map_err(|e| Error::ConfigError(format!("YAML serialization error: {}", e)))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Shorten `text` to at most `max` characters, marking the cut
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn format_projects_table(projects: &[Project], show_namespace: bool) -> String {
    let mut lines = Vec::with_capacity(projects.len() + 2);
    if show_namespace {
        lines.push(format!(
            "{:<30} {:<15} {:<25} {:<35} {:<8}",
            "NAME", "NAMESPACE", "DISPLAY NAME", "URL", "SYNCED"
        ));
        lines.push("-".repeat(117));
    } else {
        lines.push(format!(
            "{:<30} {:<25} {:<35} {:<8}",
            "NAME", "DISPLAY NAME", "URL", "SYNCED"
        ));
        lines.push("-".repeat(101));
    }

    for project in projects {
        let name = project.name_any();
        let display_name = truncate(&project.spec.name, 25);
        let url = truncate(&project.spec.url, 35);
        let synced = yes_no(project.current_status().synced);
        if show_namespace {
            lines.push(format!(
                "{:<30} {:<15} {:<25} {:<35} {:<8}",
                name,
                project.namespace_or_default(),
                display_name,
                url,
                synced
            ));
        } else {
            lines.push(format!(
                "{:<30} {:<25} {:<35} {:<8}",
                name, display_name, url, synced
            ));
        }
    }

    lines.join("\n")
}

fn format_status_table(summaries: &[SyncSummary], show_namespace: bool) -> String {
    let mut lines = Vec::with_capacity(summaries.len() + 2);
    if show_namespace {
        lines.push(format!(
            "{:<30} {:<15} {:<8} {:<8} {:<22} {:<30}",
            "NAME", "NAMESPACE", "SYNCED", "RETRIES", "LAST SYNCED", "ERROR"
        ));
        lines.push("-".repeat(118));
    } else {
        lines.push(format!(
            "{:<30} {:<8} {:<8} {:<22} {:<30}",
            "NAME", "SYNCED", "RETRIES", "LAST SYNCED", "ERROR"
        ));
        lines.push("-".repeat(102));
    }

    for summary in summaries {
        let last_synced = summary
            .last_synced_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Never".to_string());
        let error = truncate(&summary.error, 30);
        if show_namespace {
            lines.push(format!(
                "{:<30} {:<15} {:<8} {:<8} {:<22} {:<30}",
                summary.name,
                summary.namespace,
                yes_no(summary.synced),
                summary.retry_count,
                last_synced,
                error
            ));
        } else {
            lines.push(format!(
                "{:<30} {:<8} {:<8} {:<22} {:<30}",
                summary.name,
                yes_no(summary.synced),
                summary.retry_count,
                last_synced,
                error
            ));
        }
    }

    lines.join("\n")
}
