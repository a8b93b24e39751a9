//! Data Source Client
//!
//! Sequences the filter compiler, deferred exchanges, the keyspace tree and the
//! selection state for one data source. It is the only writer of the tree.
//!
//! Locks are taken for short synchronous sections and never held across an
//! await, so a deletion may land while a listing for the same node is still
//! streaming. Results for nodes that vanished meanwhile are dropped silently.

use super::error_log::{ErrorLog, ErrorReport};
use super::DataSource;
use crate::channel::{ChannelKind, ChannelTransport, Exchange, StreamChannel, WsChannelTransport};
use crate::cluster::{parse_topology, ClusterNode};
use crate::config::LagoonConfig;
use crate::error::{ApiError, DomainError};
use crate::filter;
use crate::selection::SelectionState;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::tree::NodeTree;
use crate::types::{
    ClusterInfos, ClusterState, DataSourceCatalogue, DataSourceHeader, EntryPointInfo, EntryPointRecord,
    NodeContent,
};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Info and content of one entrypoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDetails {
    pub info: EntryPointInfo,
    pub content: NodeContent,
}

/// Outcome of a successful `delete_children`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteChildrenReport {
    /// Notices streamed by the server, also pushed to the error log.
    pub notices: Vec<ErrorReport>,
    /// Full paths removed from the tree while collapsing, deepest first.
    pub collapsed: Vec<String>,
}

pub struct DataSourceClient {
    source: DataSource,
    http: Arc<dyn HttpTransport>,
    channels: Arc<dyn ChannelTransport>,
    tree: RwLock<NodeTree>,
    selection: RwLock<SelectionState>,
    errors: RwLock<ErrorLog>,
    idle_timeout: Option<Duration>,
}

impl DataSourceClient {
    pub fn new(
        source: DataSource,
        http: Arc<dyn HttpTransport>,
        channels: Arc<dyn ChannelTransport>,
    ) -> Self {
        Self {
            source,
            http,
            channels,
            tree: RwLock::new(NodeTree::new()),
            selection: RwLock::new(SelectionState::new()),
            errors: RwLock::new(ErrorLog::new()),
            idle_timeout: None,
        }
    }

    /// Client over HTTP and websockets for the source selected by `config` (or `id`).
    pub fn connect(config: &LagoonConfig, id: Option<&str>) -> Result<Self, ApiError> {
        let source = DataSource::from_config(config, id)?;
        let http = ReqwestTransport::new(
            &source.api_root,
            Duration::from_secs(config.server.request_timeout_secs),
        )?;
        let idle = config
            .server
            .channel_idle_timeout_secs
            .map(Duration::from_secs);
        Ok(Self::new(source, Arc::new(http), Arc::new(WsChannelTransport::new())).with_idle_timeout(idle))
    }

    /// Reject deferred channels that stay silent for longer than `limit`.
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn tree(&self) -> RwLockReadGuard<'_, NodeTree> {
        self.tree.read()
    }

    pub fn selection(&self) -> RwLockReadGuard<'_, SelectionState> {
        self.selection.read()
    }

    pub fn errors(&self) -> RwLockReadGuard<'_, ErrorLog> {
        self.errors.read()
    }

    pub fn dismiss_error(&self, index: usize) -> Option<ErrorReport> {
        self.errors.write().dismiss(index)
    }

    // ---- listing and details -------------------------------------------------

    /// List the entrypoints below `prefix` matching `raw_filter`.
    ///
    /// Records come back sorted by path, relative to `min_level`, and are merged
    /// under the prefix node. `None` for `max_level` means unbounded.
    pub async fn list_entrypoints(
        &self,
        prefix: Option<&str>,
        raw_filter: &str,
        min_level: u32,
        max_level: Option<u32>,
    ) -> Result<Vec<EntryPointRecord>, ApiError> {
        let result = self
            .try_list_entrypoints(prefix, raw_filter, min_level, max_level)
            .await;
        self.record("list", prefix.unwrap_or_default(), result)
    }

    async fn try_list_entrypoints(
        &self,
        prefix: Option<&str>,
        raw_filter: &str,
        min_level: u32,
        max_level: Option<u32>,
    ) -> Result<Vec<EntryPointRecord>, ApiError> {
        let compiled = filter::compile(prefix, raw_filter);
        let (base, created) = {
            let mut tree = self.tree.write();
            match prefix.filter(|p| !p.is_empty()) {
                Some(path) => {
                    let created = tree.find(path).is_none();
                    (tree.ensure_path(path), created)
                }
                None => (tree.root(), false),
            }
        };

        let mut request =
            HttpRequest::get(self.source.entrypoints_route()).with_query("min", min_level);
        if let Some(max) = max_level {
            request = request.with_query("max", max);
        }
        let request = request.with_query("filter", &compiled);
        info!(
            datasource = %self.source.id,
            filter = %compiled,
            min = min_level,
            max = ?max_level,
            "Listing entrypoints"
        );

        let records = match self.exchange(ChannelKind::Data, request).await {
            Ok(Exchange::Immediate(body)) => inline_values(body).and_then(decode_records),
            Ok(Exchange::Streamed(output)) => decode_records(output.data),
            Err(e) => Err(e),
        };
        let mut records = match records {
            Ok(records) => records,
            Err(e) => {
                if created {
                    self.tree.write().prune_upwards(base);
                }
                return Err(e);
            }
        };
        records.sort_by(|a, b| a.path.cmp(&b.path));

        let mut tree = self.tree.write();
        let merged = tree.merge_records(base, &records);
        if merged == 0 && created {
            tree.prune_upwards(base);
        }
        debug!(records = records.len(), merged, "Listing merged");
        Ok(records)
    }

    /// Fetch info, then content, of the entrypoint at `path`.
    ///
    /// `content_filter` is a glob the server applies when scanning set and hash
    /// members; without it the whole value is returned. Info and content are
    /// stored on the node only when both stages succeed.
    pub async fn fetch_node_details(
        &self,
        path: &str,
        content_filter: Option<&str>,
    ) -> Result<NodeDetails, ApiError> {
        let result = self.try_fetch_node_details(path, content_filter).await;
        self.record("fetch details", path, result)
    }

    async fn try_fetch_node_details(
        &self,
        path: &str,
        content_filter: Option<&str>,
    ) -> Result<NodeDetails, ApiError> {
        let info_request = HttpRequest::get(self.source.entrypoint_route(path, Some("info")));
        let body = expect_success(self.http.send(info_request).await?)?;
        let info: EntryPointInfo = serde_json::from_value(body)?;

        let mut content_request =
            HttpRequest::get(self.source.entrypoint_route(path, Some("content")));
        if let Some(pattern) = content_filter.filter(|p| !p.is_empty()) {
            content_request = content_request.with_query("filter", pattern);
        }
        let content = match self.exchange(ChannelKind::Data, content_request).await? {
            Exchange::Immediate(Value::Array(values)) => NodeContent::from_values(values),
            Exchange::Immediate(body) => serde_json::from_value(body)?,
            Exchange::Streamed(output) => NodeContent::from_values(output.data),
        };

        let mut tree = self.tree.write();
        match tree.find(path) {
            Some(id) => {
                tree.set_details(id, info.clone(), content.clone());
            }
            None => debug!(path, "Details fetched for a node no longer in the tree"),
        }
        Ok(NodeDetails { info, content })
    }

    /// Drop the loaded children and content of `path` so it is fetched again.
    pub fn clear_node(&self, path: &str) -> Result<(), ApiError> {
        let result = {
            let mut tree = self.tree.write();
            match tree.find(path) {
                Some(id) => {
                    tree.clear(id);
                    Ok(())
                }
                None => Err(DomainError::NodeNotFound {
                    path: path.to_string(),
                }
                .into()),
            }
        };
        self.record("clear", path, result)
    }

    // ---- deletion ------------------------------------------------------------

    /// Delete the value at `path`, prune the emptied branch and forget its selection.
    ///
    /// Returns the full paths pruned from the tree, deepest first.
    pub async fn delete_node(&self, path: &str) -> Result<Vec<String>, ApiError> {
        let result = self.try_delete_node(path).await;
        self.record("delete", path, result)
    }

    async fn try_delete_node(&self, path: &str) -> Result<Vec<String>, ApiError> {
        self.ensure_writable()?;
        let request = HttpRequest::delete(self.source.entrypoint_route(path, None));
        expect_success(self.http.send(request).await?)?;
        info!(datasource = %self.source.id, path, "Entrypoint deleted");

        let pruned = {
            let mut tree = self.tree.write();
            match tree.find(path) {
                Some(id) => {
                    tree.mark_content_deleted(id);
                    tree.prune_upwards(id)
                }
                None => Vec::new(),
            }
        };
        let mut selection = self.selection.write();
        selection.delete_node(path);
        for pruned_path in &pruned {
            selection.delete_node(pruned_path);
        }
        Ok(pruned)
    }

    /// Delete every child of `path` server-side, streaming deletion notices.
    ///
    /// Notices are pushed to the error log as they are not failures of the
    /// operation itself. On completion the node is collapsed, emptied ancestors
    /// are pruned up to the root, and the selection below `path` is cleared.
    pub async fn delete_children(&self, path: &str) -> Result<DeleteChildrenReport, ApiError> {
        let result = self.try_delete_children(path).await;
        self.record("delete children", path, result)
    }

    async fn try_delete_children(&self, path: &str) -> Result<DeleteChildrenReport, ApiError> {
        self.ensure_writable()?;
        let request = HttpRequest::delete(self.source.entrypoint_route(path, Some("children")));
        let raw_notices = match self.exchange(ChannelKind::Notices, request).await? {
            Exchange::Immediate(_) => Vec::new(),
            Exchange::Streamed(output) => output.notices,
        };

        let notices: Vec<ErrorReport> = raw_notices
            .iter()
            .map(|notice| notice_report(path, notice))
            .collect();
        if !notices.is_empty() {
            warn!(path, notices = notices.len(), "Children deletion reported problems");
            let mut errors = self.errors.write();
            for notice in &notices {
                errors.push(notice.clone());
            }
        }

        let collapsed = {
            let mut tree = self.tree.write();
            match tree.find(path) {
                Some(id) => {
                    tree.clear_children(id);
                    tree.prune_upwards(id)
                }
                None => Vec::new(),
            }
        };
        let mut selection = self.selection.write();
        selection.delete_subtree(path);
        for collapsed_path in &collapsed {
            selection.delete_node(collapsed_path);
        }
        info!(path, collapsed = collapsed.len(), "Children deleted");
        Ok(DeleteChildrenReport { notices, collapsed })
    }

    // ---- administration ------------------------------------------------------

    pub async fn list_datasources(&self) -> Result<Vec<DataSourceHeader>, ApiError> {
        let result = list_datasources(self.http.as_ref()).await;
        self.record("list datasources", "", result)
    }

    /// Forward a raw command; the server applies its own read-only policy.
    pub async fn execute_command(
        &self,
        args: &[String],
        node_id: Option<&str>,
    ) -> Result<Value, ApiError> {
        let result = self.try_execute_command(args, node_id).await;
        self.record("command", &args.join(" "), result)
    }

    async fn try_execute_command(
        &self,
        args: &[String],
        node_id: Option<&str>,
    ) -> Result<Value, ApiError> {
        let body = json!({ "args": args, "nodeId": node_id });
        let request = HttpRequest::post(self.source.command_route(), body);
        debug!(datasource = %self.source.id, command = ?args, "Executing command");
        let mut body = expect_success(self.http.send(request).await?)?;
        if let Some(data) = body.get_mut("data") {
            return Ok(data.take());
        }
        Ok(body)
    }

    /// Run `CLUSTER NODES` and parse the answer.
    pub async fn cluster_nodes(&self) -> Result<Vec<ClusterNode>, ApiError> {
        let args = ["cluster".to_string(), "nodes".to_string()];
        let result = match self.try_execute_command(&args, None).await {
            Ok(Value::String(text)) => Ok(parse_topology(&text)),
            Ok(other) => Err(ApiError::ProtocolError(format!(
                "Expected topology text, got {}",
                other
            ))),
            Err(e) => Err(e),
        };
        self.record("cluster nodes", "", result)
    }

    pub async fn cluster_infos(&self) -> Result<ClusterInfos, ApiError> {
        let result = async {
            let request = HttpRequest::get(self.source.infos_route());
            let body = expect_success(self.http.send(request).await?)?;
            Ok::<ClusterInfos, ApiError>(serde_json::from_value(body)?)
        }
        .await;
        self.record("cluster infos", "", result)
    }

    /// Runtime state of the source: cluster sections and per-node sections.
    pub async fn cluster_state(&self) -> Result<ClusterState, ApiError> {
        let result = async {
            let request = HttpRequest::get(self.source.state_route());
            let body = expect_success(self.http.send(request).await?)?;
            Ok::<ClusterState, ApiError>(serde_json::from_value(body)?)
        }
        .await;
        self.record("cluster state", "", result)
    }

    // ---- selection -----------------------------------------------------------

    pub fn select(&self, path: &str) {
        self.selection.write().select(path);
    }

    pub fn unselect(&self, path: &str) {
        self.selection.write().unselect(path);
    }

    pub fn toggle_pin(&self, path: &str) -> bool {
        self.selection.write().toggle_pin(path)
    }

    pub fn close_others(&self, keep: &str) {
        self.selection.write().close_others(keep);
    }

    pub fn close_all_but_pinned(&self) {
        self.selection.write().close_all_but_pinned();
    }

    // ---- internals -----------------------------------------------------------

    fn ensure_writable(&self) -> Result<(), ApiError> {
        if self.source.readonly {
            return Err(DomainError::ReadOnly {
                datasource: self.source.id.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn exchange(&self, kind: ChannelKind, request: HttpRequest) -> Result<Exchange, ApiError> {
        let source = &self.source;
        StreamChannel::new(kind)
            .with_idle_timeout(self.idle_timeout)
            .exchange(self.http.as_ref(), request, self.channels.as_ref(), |link| {
                source.channel_url(link)
            })
            .await
    }

    /// Attach context to a failure, log it and append it to the error log.
    fn record<T>(
        &self,
        operation: &'static str,
        path: &str,
        result: Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        result.map_err(|err| {
            let err = err.in_operation(operation, path);
            warn!(datasource = %self.source.id, operation, path, error = %err, "Operation failed");
            self.errors.write().push(&err);
            err
        })
    }
}

/// Fetch the data source catalogue.
pub async fn list_datasources(http: &dyn HttpTransport) -> Result<Vec<DataSourceHeader>, ApiError> {
    let body = expect_success(http.send(HttpRequest::get(["datasource"])).await?)?;
    match body {
        Value::Array(_) => Ok(serde_json::from_value(body)?),
        other => {
            let catalogue: DataSourceCatalogue = serde_json::from_value(other)?;
            Ok(catalogue.datasources)
        }
    }
}

fn expect_success(response: HttpResponse) -> Result<Value, ApiError> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(response.into_error())
    }
}

/// Inline listings are either a bare array or `{data: [...]}`.
fn inline_values(body: Value) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(values) => Ok(values),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(values)) => Ok(values),
            _ => Err(ApiError::ProtocolError(
                "Inline listing carries no data array".to_string(),
            )),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(ApiError::ProtocolError(format!(
            "Unexpected inline listing: {}",
            other
        ))),
    }
}

fn decode_records(values: Vec<Value>) -> Result<Vec<EntryPointRecord>, ApiError> {
    Ok(serde_json::from_value(Value::Array(values))?)
}

fn notice_report(path: &str, notice: &Value) -> ErrorReport {
    let message = match notice {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| notice.to_string()),
        other => other.to_string(),
    };
    ErrorReport::new(message).with_cause(format!("delete children of '{}'", path))
}
