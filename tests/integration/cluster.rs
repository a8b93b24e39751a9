use crate::integration::support::{client, ScriptedChannels, ScriptedHttp};
use lagoon::datasource::client::list_datasources;
use lagoon::transport::Method;
use serde_json::json;

const TOPOLOGY: &str = "\
a1 10.0.0.1:6379@16379 myself,master - 0 0 1 connected 0-5460
a2 10.0.0.2:6379@16379 master - 0 1426238316232 2 connected 5461-10922
a3 10.0.0.3:6379@16379 master - 0 1426238318243 3 connected 10923-16383
b1 10.0.0.4:6379@16379 slave a1 0 1426238317239 4 connected
b2 10.0.0.5:6379@16379 slave a2 0 1426238316232 5 connected
b3 10.0.0.6:6379@16379 slave a3 0 1426238317741 6 connected
";

#[tokio::test]
async fn cluster_nodes_runs_the_command_and_parses() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(Method::Post, "data/ds/command", 200, json!({"data": TOPOLOGY}));

    let client = client(&http, &channels);
    let nodes = client.cluster_nodes().await.unwrap();

    assert_eq!(nodes.len(), 6);
    assert_eq!(nodes[0].role, "master");
    assert_eq!(nodes[0].ip, "10.0.0.1:6379");
    assert_eq!(nodes[3].master.as_deref(), Some("a1"));
    assert_eq!(
        http.requests.lock()[0].body,
        Some(json!({"args": ["cluster", "nodes"], "nodeId": null}))
    );
}

#[tokio::test]
async fn command_passthrough_returns_data() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(Method::Post, "data/ds/command", 200, json!({"data": ["v1", "v2"]}));

    let client = client(&http, &channels);
    let args = vec!["lrange".to_string(), "jobs".to_string(), "0".to_string(), "-1".to_string()];
    let data = client.execute_command(&args, Some("a2")).await.unwrap();

    assert_eq!(data, json!(["v1", "v2"]));
    assert_eq!(
        http.requests.lock()[0].body,
        Some(json!({"args": ["lrange", "jobs", "0", "-1"], "nodeId": "a2"}))
    );
}

#[tokio::test]
async fn rejected_command_is_logged_with_its_arguments() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(
        Method::Post,
        "data/ds/command",
        403,
        json!({"error": "command not allowed on a read-only source"}),
    );

    let client = client(&http, &channels);
    let err = client
        .execute_command(&["flushall".to_string()], None)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("command failed for 'flushall'"));
    assert_eq!(client.errors().len(), 1);
}

#[tokio::test]
async fn cluster_infos_and_catalogue() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(
        Method::Get,
        "data/ds/infos",
        200,
        json!({"nodes": [{"id": "a1", "server": "10.0.0.1:6379", "name": "10.0.0.1", "role": "master"}]}),
    );
    http.expect(
        Method::Get,
        "datasource",
        200,
        json!({"datasources": [{"id": "ds", "vendor": "redis", "name": "cache", "description": "", "readonly": true}]}),
    );

    let client = client(&http, &channels);
    let infos = client.cluster_infos().await.unwrap();
    assert_eq!(infos.nodes.len(), 1);
    assert_eq!(infos.nodes[0].role, "master");

    let sources = list_datasources(http.as_ref()).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].readonly);
}

#[tokio::test]
async fn cluster_state_reads_node_sections() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(
        Method::Get,
        "data/ds/state",
        200,
        json!({
            "timestamp": "2024-03-01T10:15:30.5+01:00",
            "nodeStates": [
                {"nodeId": "a1", "sections": [{"name": "Memory", "values": {"used_memory": "1024"}}]},
                {"nodeId": "a2", "sections": null}
            ],
            "sections": [{"name": "Cluster", "values": {"cluster_state": "ok", "cluster_size": 3}}]
        }),
    );

    let client = client(&http, &channels);
    let state = client.cluster_state().await.unwrap();

    assert_eq!(state.timestamp.to_rfc3339(), "2024-03-01T09:15:30.500+00:00");
    assert_eq!(state.node_states.len(), 2);
    assert_eq!(state.node_states[0].sections[0].name, "Memory");
    assert!(state.node_states[1].sections.is_empty());
    assert_eq!(state.sections[0].values["cluster_size"], json!(3));
    assert!(client.errors().is_empty());
}

#[tokio::test]
async fn cluster_state_failure_is_logged() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(Method::Get, "data/ds/state", 502, json!({"error": "node a2 unreachable"}));

    let client = client(&http, &channels);
    let err = client.cluster_state().await.unwrap_err();

    assert!(err.to_string().contains("node a2 unreachable"));
    assert_eq!(client.errors().len(), 1);
}
