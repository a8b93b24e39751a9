//! CLI Tooling
//!
//! Command-line front end over [`DataSourceClient`]. Every command returns the
//! text to print; the binary decides how to report errors.

use crate::cluster::ClusterNode;
use crate::config::{ConfigLoader, LagoonConfig};
use crate::datasource::client::list_datasources;
use crate::datasource::{DataSourceClient, DeleteChildrenReport, NodeDetails};
use crate::error::ApiError;
use crate::filter;
use crate::logging::LoggingConfig;
use crate::transport::ReqwestTransport;
use crate::types::{ClusterState, DataSourceHeader, EntryPointRecord, PATH_SEPARATOR};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Lagoon CLI - explore keyspace data sources
#[derive(Parser)]
#[command(name = "lagoon")]
#[command(about = "Browse, inspect and prune keyspace data sources through the Lagoon API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory searched for lagoon.toml
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Data source id (overrides datasource.id)
    #[arg(long, short = 'd')]
    pub datasource: Option<String>,

    /// API root (overrides server.api_root)
    #[arg(long)]
    pub api_root: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// `base` with the logging flags given on the command line applied.
    pub fn logging_overrides(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut logging = base.clone();
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the data sources served by the API
    Datasources {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List entrypoints below a prefix
    List {
        /// Colon-delimited prefix; the root when omitted
        prefix: Option<String>,
        /// Free-text glob filter (defaults to datasource.filter)
        #[arg(long, short = 'f')]
        filter: Option<String>,
        /// List every level below the prefix instead of one
        #[arg(long, short = 'r')]
        recursive: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the info and content of an entrypoint
    Show {
        path: String,
        /// Glob applied to set and hash members
        #[arg(long, short = 'f')]
        filter: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete an entrypoint
    Delete {
        path: String,
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Delete every entrypoint below a path
    DeleteChildren {
        path: String,
        /// Skip confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Forward a raw command to the data source
    Command {
        /// Cluster node the command is sent to
        #[arg(long)]
        node: Option<String>,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show the cluster topology
    ClusterNodes {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show runtime state sections of the cluster and its nodes
    ClusterState {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the server filter for a prefix and free-text filter
    Filter {
        /// Free-text glob filter
        #[arg(default_value = "")]
        filter: String,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

/// Resolved configuration and the runtime driving the async client.
pub struct CliContext {
    config: LagoonConfig,
    datasource: Option<String>,
    runtime: tokio::runtime::Runtime,
}

impl CliContext {
    pub fn new(
        dir: PathBuf,
        config_path: Option<PathBuf>,
        datasource: Option<String>,
        api_root: Option<String>,
    ) -> Result<Self, ApiError> {
        let mut config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&dir)?,
        };
        if let Some(api_root) = api_root {
            config.server.api_root = api_root;
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to start async runtime: {}", e)))?;
        Ok(Self {
            config,
            datasource,
            runtime,
        })
    }

    pub fn config(&self) -> &LagoonConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Datasources { format } => self.handle_datasources(format),
            Commands::List {
                prefix,
                filter,
                recursive,
                format,
            } => self.handle_list(prefix.as_deref(), filter.as_deref(), *recursive, format),
            Commands::Show {
                path,
                filter,
                format,
            } => self.handle_show(path, filter.as_deref(), format),
            Commands::Delete { path, yes } => self.handle_delete(path, *yes),
            Commands::DeleteChildren { path, yes } => self.handle_delete_children(path, *yes),
            Commands::Command { node, args } => self.handle_command(args, node.as_deref()),
            Commands::ClusterNodes { format } => self.handle_cluster_nodes(format),
            Commands::ClusterState { format } => self.handle_cluster_state(format),
            Commands::Filter { filter, prefix } => {
                Ok(filter::compile(prefix.as_deref(), filter))
            }
            Commands::Config => self.config.to_toml(),
        }
    }

    fn client(&self) -> Result<DataSourceClient, ApiError> {
        DataSourceClient::connect(&self.config, self.datasource.as_deref())
    }

    fn handle_datasources(&self, format: &str) -> Result<String, ApiError> {
        let http = ReqwestTransport::new(
            &self.config.server.api_root,
            Duration::from_secs(self.config.server.request_timeout_secs),
        )?;
        let sources = self.runtime.block_on(list_datasources(&http))?;
        if format == "json" {
            return to_json(&sources);
        }
        Ok(format_datasources(&sources))
    }

    fn handle_list(
        &self,
        prefix: Option<&str>,
        raw_filter: Option<&str>,
        recursive: bool,
        format: &str,
    ) -> Result<String, ApiError> {
        let client = self.client()?;
        let prefix = prefix.filter(|p| !p.is_empty());
        let min = prefix.map_or(0, |p| p.split(PATH_SEPARATOR).count() as u32);
        let max = (!recursive).then_some(min);
        let raw_filter = raw_filter.unwrap_or(&client.source().filter).to_string();

        let records = self
            .runtime
            .block_on(client.list_entrypoints(prefix, &raw_filter, min, max))?;
        info!(count = records.len(), "Listed entrypoints");
        if format == "json" {
            return to_json(&records);
        }
        Ok(format_records(prefix, &records))
    }

    fn handle_show(
        &self,
        path: &str,
        content_filter: Option<&str>,
        format: &str,
    ) -> Result<String, ApiError> {
        let client = self.client()?;
        let details = self
            .runtime
            .block_on(client.fetch_node_details(path, content_filter))?;
        if format == "json" {
            return to_json(&details);
        }
        format_details(path, &details)
    }

    fn handle_delete(&self, path: &str, yes: bool) -> Result<String, ApiError> {
        let client = self.client()?;
        if !yes && !client.source().readonly && !confirm(&format!("Delete '{}'?", path))? {
            return Ok("Deletion cancelled".to_string());
        }
        let pruned = self.runtime.block_on(client.delete_node(path))?;
        let mut output = format!("Deleted '{}'", path);
        for branch in pruned.iter().filter(|p| p.as_str() != path) {
            output.push_str(&format!("\nRemoved empty branch '{}'", branch));
        }
        Ok(output)
    }

    fn handle_delete_children(&self, path: &str, yes: bool) -> Result<String, ApiError> {
        let client = self.client()?;
        if !yes
            && !client.source().readonly
            && !confirm(&format!("Delete every entrypoint below '{}'?", path))?
        {
            return Ok("Deletion cancelled".to_string());
        }
        let report = self.runtime.block_on(client.delete_children(path))?;
        Ok(format_delete_children(path, &report))
    }

    fn handle_command(&self, args: &[String], node: Option<&str>) -> Result<String, ApiError> {
        let client = self.client()?;
        let value = self.runtime.block_on(client.execute_command(args, node))?;
        match value {
            Value::String(text) => Ok(text),
            other => to_json(&other),
        }
    }

    fn handle_cluster_nodes(&self, format: &str) -> Result<String, ApiError> {
        let client = self.client()?;
        let nodes = self.runtime.block_on(client.cluster_nodes())?;
        if format == "json" {
            return to_json(&nodes);
        }
        Ok(format_cluster_nodes(&nodes))
    }

    fn handle_cluster_state(&self, format: &str) -> Result<String, ApiError> {
        let client = self.client()?;
        let state = self.runtime.block_on(client.cluster_state())?;
        if format == "json" {
            return to_json(&state);
        }
        Ok(format_cluster_state(&state))
    }
}

fn confirm(prompt: &str) -> Result<bool, ApiError> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn format_datasources(sources: &[DataSourceHeader]) -> String {
    if sources.is_empty() {
        return "No data sources".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Id", "Name", "Vendor", "Read-only", "Description"]);
    for source in sources {
        table.add_row(vec![
            source.id.as_str(),
            source.name.as_str(),
            source.vendor.as_str(),
            if source.readonly { "yes" } else { "no" },
            source.description.as_str(),
        ]);
    }
    table.to_string()
}

fn format_records(prefix: Option<&str>, records: &[EntryPointRecord]) -> String {
    if records.is_empty() {
        return "No entrypoints".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Path", "Content", "Length"]);
    for record in records {
        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, PATH_SEPARATOR, record.path),
            None => record.path.clone(),
        };
        let content = if record.has_content { "yes" } else { "-" };
        table.add_row(vec![path, content.to_string(), record.length.to_string()]);
    }
    table.to_string()
}

fn format_details(path: &str, details: &NodeDetails) -> Result<String, ApiError> {
    let ttl = match details.info.time_to_live {
        Some(ms) if ms >= 0 => format!("{} ms", ms),
        _ => "none".to_string(),
    };
    let mut output = format!(
        "{}\n  Type: {:?}\n  Length: {}\n  TTL: {}\n\n",
        path, details.info.kind, details.info.length, ttl
    );
    output.push_str(&to_json(&details.content.data)?);
    Ok(output)
}

fn format_delete_children(path: &str, report: &DeleteChildrenReport) -> String {
    let mut output = format!("Deleted children of '{}'", path);
    if !report.notices.is_empty() {
        output.push_str(&format!("\n{} problem(s) reported:", report.notices.len()));
        for notice in &report.notices {
            output.push_str(&format!("\n  - {}", notice.message));
        }
    }
    output
}

fn format_cluster_nodes(nodes: &[ClusterNode]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Id", "Address", "Role", "Master"]);
    for node in nodes {
        table.add_row(vec![
            node.id.as_str(),
            node.ip.as_str(),
            node.role.as_str(),
            node.master.as_deref().unwrap_or("-"),
        ]);
    }
    table.to_string()
}

fn format_cluster_state(state: &ClusterState) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Node", "Section", "Key", "Value"]);
    let cluster = state.sections.iter().map(|section| ("cluster", section));
    let nodes = state.node_states.iter().flat_map(|node| {
        let id = if node.node_id.is_empty() { "-" } else { node.node_id.as_str() };
        node.sections.iter().map(move |section| (id, section))
    });
    for (node, section) in cluster.chain(nodes) {
        for (key, value) in &section.values {
            let value = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            table.add_row(vec![
                node.to_string(),
                section.name.clone(),
                key.clone(),
                value,
            ]);
        }
    }
    format!("State at {}\n{}", state.timestamp.to_rfc3339(), table)
}
