use crate::integration::support::{
    client, client_with, ScriptedChannels, ScriptedHttp, API_ROOT, WS_ROOT,
};
use lagoon::transport::Method;
use lagoon::{DataSource, DataSourceClient};
use serde_json::{json, Value};

async fn seed(http: &ScriptedHttp, client: &DataSourceClient, records: Value) {
    http.expect(Method::Get, "data/ds/entrypoint", 200, records);
    client.list_entrypoints(None, "", 0, None).await.unwrap();
}

#[tokio::test]
async fn read_only_source_refuses_without_network() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let source = DataSource::new("ds", API_ROOT).unwrap().with_readonly(true);
    let client = client_with(source, &http, &channels);

    let err = client.delete_node("a").await.unwrap_err();
    assert!(err.is_read_only());
    let err = client.delete_children("a").await.unwrap_err();
    assert!(err.is_read_only());

    assert_eq!(http.request_count(), 0);
    assert!(channels.opened.lock().is_empty());
    let errors = client.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.entries()[0].message.contains("read-only"));
}

#[tokio::test]
async fn delete_prunes_emptied_branch_and_selection() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let client = client(&http, &channels);
    seed(
        &http,
        &client,
        json!([
            {"path": "a:b", "hasContent": true, "length": 0},
            {"path": "c", "hasContent": true, "length": 0}
        ]),
    )
    .await;
    client.select("a:b");
    client.toggle_pin("a:b");
    client.select("c");

    http.expect(Method::Delete, "data/ds/entrypoint/a:b", 200, Value::Null);
    let pruned = client.delete_node("a:b").await.unwrap();

    assert_eq!(pruned, vec!["a:b".to_string(), "a".to_string()]);
    assert!(client.tree().find("a").is_none());
    assert!(client.tree().find("c").is_some());
    let selection = client.selection();
    assert_eq!(selection.selected(), ["c".to_string()]);
    assert!(selection.pinned().is_empty());
}

#[tokio::test]
async fn failed_delete_keeps_tree_and_selection() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let client = client(&http, &channels);
    seed(
        &http,
        &client,
        json!([{"path": "a", "hasContent": true, "length": 0}]),
    )
    .await;
    client.select("a");

    http.expect(
        Method::Delete,
        "data/ds/entrypoint/a",
        403,
        json!({"error": "forbidden"}),
    );
    assert!(client.delete_node("a").await.is_err());

    assert!(client.tree().find("a").is_some());
    assert!(client.selection().is_selected("a"));
    assert_eq!(client.errors().len(), 1);
}

#[tokio::test]
async fn delete_children_surfaces_notices_and_collapses() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let client = client(&http, &channels);
    seed(
        &http,
        &client,
        json!([
            {"path": "a:x", "hasContent": true, "length": 0},
            {"path": "a:y", "hasContent": true, "length": 0},
            {"path": "b", "hasContent": true, "length": 0}
        ]),
    )
    .await;
    client.select("a:x");
    client.select("b");

    http.expect(
        Method::Delete,
        "data/ds/entrypoint/a/children",
        202,
        json!({"link": "/ws/D"}),
    );
    let url = format!("{}/ws/D", WS_ROOT);
    channels.script(&url, vec![json!("cannot delete a:y: key is locked")]);

    let report = client.delete_children("a").await.unwrap();

    assert_eq!(report.notices.len(), 1);
    assert_eq!(report.notices[0].message, "cannot delete a:y: key is locked");
    assert_eq!(report.collapsed, vec!["a".to_string()]);

    let errors = client.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.entries()[0].message, "cannot delete a:y: key is locked");
    drop(errors);

    assert!(client.tree().find("a").is_none());
    assert!(client.tree().find("b").is_some());
    assert_eq!(client.selection().selected(), ["b".to_string()]);
    assert_eq!(channels.closed.lock().as_slice(), [url]);
}

#[tokio::test]
async fn delete_children_keeps_node_with_content() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let client = client(&http, &channels);
    seed(
        &http,
        &client,
        json!([
            {"path": "a", "hasContent": true, "length": 1},
            {"path": "a:x", "hasContent": true, "length": 0}
        ]),
    )
    .await;

    http.expect(
        Method::Delete,
        "data/ds/entrypoint/a/children",
        202,
        json!({"link": "/ws/K"}),
    );
    channels.script(&format!("{}/ws/K", WS_ROOT), Vec::new());

    let report = client.delete_children("a").await.unwrap();
    assert!(report.notices.is_empty());
    assert!(report.collapsed.is_empty());

    let tree = client.tree();
    let a = tree.get(tree.find("a").unwrap()).unwrap();
    assert!(!a.has_loaded_children());
    assert_eq!(a.length(), Some(0));
    assert!(client.errors().is_empty());
}
