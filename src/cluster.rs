//! Cluster topology parsing.
//!
//! `CLUSTER NODES` answers one line per node:
//!
//! ```text
//! <id> <ip:port@busport> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> [slots...]
//! ```

use crate::error::ApiError;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterNode {
    pub id: String,
    /// Address without the bus port, e.g. `10.0.0.1:6379`.
    pub ip: String,
    /// Address field as reported, e.g. `10.0.0.1:6379@16379`.
    pub server: String,
    /// Last flag, so `myself,master` reads as `master`.
    pub role: String,
    /// Master id, for replicas only.
    pub master: Option<String>,
}

/// Parse every well-formed line, in order. Malformed lines are dropped.
pub fn parse_topology(text: &str) -> Vec<ClusterNode> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_line(line) {
            Ok(node) => Some(node),
            Err(e) => {
                debug!(error = %e, "Dropping topology line");
                None
            }
        })
        .collect()
}

pub fn parse_line(line: &str) -> Result<ClusterNode, ApiError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(ApiError::ParseError(format!(
            "Expected at least 3 fields, got {}: '{}'",
            fields.len(),
            line
        )));
    }

    let server = fields[1];
    let ip = server.split('@').next().unwrap_or(server);
    let role = fields[2].rsplit(',').next().unwrap_or(fields[2]);
    let master = match (role, fields.get(3)) {
        ("slave" | "replica", Some(id)) if *id != "-" => Some(id.to_string()),
        _ => None,
    };

    Ok(ClusterNode {
        id: fields[0].to_string(),
        ip: ip.to_string(),
        server: server.to_string(),
        role: role.to_string(),
        master,
    })
}
