//! Wire types exchanged with the Lagoon data source API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Separator between the segments of an entrypoint path.
pub const PATH_SEPARATOR: char = ':';

/// One entry of a listing: a node of the keyspace tree.
///
/// `path` is relative to the tree level requested as `min`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPointRecord {
    pub path: String,
    #[serde(default)]
    pub has_content: bool,
    #[serde(default)]
    pub length: u64,
}

/// Kind of value stored behind an entrypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryPointType {
    Value,
    Set,
    ScoredSet,
    List,
    Hash,
    Stream,
    #[serde(other)]
    Unknown,
}

/// Metadata returned by `GET …/entrypoint/{path}/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPointInfo {
    #[serde(rename = "type")]
    pub kind: EntryPointType,
    #[serde(default)]
    pub length: u64,
    /// Milliseconds; negative when the entry never expires.
    #[serde(default)]
    pub time_to_live: Option<i64>,
}

/// Content of an entrypoint, inline or reassembled from a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContent {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl NodeContent {
    pub fn from_values(data: Vec<Value>) -> Self {
        Self {
            size: data.len() as u64,
            data,
        }
    }
}

/// Message envelope of a streaming channel.
///
/// A truthy `size` means more data follows; absent, null or zero marks the terminator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelEnvelope {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub data: Option<Vec<Value>>,
}

impl ChannelEnvelope {
    pub fn is_terminator(&self) -> bool {
        !matches!(self.size, Some(size) if size > 0)
    }
}

/// Body of a `202 Accepted` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeferredLink {
    pub link: String,
}

/// Entry of the data source catalogue (`GET /datasource`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceHeader {
    #[serde(alias = "uuid")]
    pub id: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub readonly: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataSourceCatalogue {
    #[serde(default)]
    pub datasources: Vec<DataSourceHeader>,
}

/// Node of a clustered data source, as reported by `GET …/infos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub masters: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfos {
    #[serde(default)]
    pub nodes: Vec<ClusterMember>,
}

/// Accept `null` where a collection is expected.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Named group of runtime values, as in one section of `INFO`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSection {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub values: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    #[serde(default)]
    pub node_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sections: Vec<StateSection>,
}

/// Snapshot returned by `GET …/state`: cluster-level sections plus one state per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterState {
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub node_states: Vec<NodeState>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sections: Vec<StateSection>,
}
