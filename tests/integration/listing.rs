use crate::integration::support::{client, Gate, ScriptedChannels, ScriptedHttp, WS_ROOT};
use lagoon::transport::Method;
use lagoon::ApiError;
use serde_json::json;

fn query(http: &ScriptedHttp, index: usize) -> Vec<(String, String)> {
    http.requests.lock()[index].query.clone()
}

#[tokio::test]
async fn deferred_listing_is_merged_under_prefix() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(Method::Get, "data/ds/entrypoint", 202, json!({"link": "/ws/L"}));
    let url = format!("{}/ws/L", WS_ROOT);
    channels.script(
        &url,
        vec![
            json!({"size": 2, "data": [
                {"path": "b", "hasContent": true, "length": 0},
                {"path": "a", "hasContent": false, "length": 2}
            ]}),
            json!({"size": 1, "data": [{"path": "c", "hasContent": true, "length": 0}]}),
            json!({}),
        ],
    );

    let client = client(&http, &channels);
    let records = client
        .list_entrypoints(Some("user"), "", 1, Some(1))
        .await
        .unwrap();

    let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, ["a", "b", "c"]);
    assert_eq!(
        query(&http, 0),
        vec![
            ("min".to_string(), "1".to_string()),
            ("max".to_string(), "1".to_string()),
            ("filter".to_string(), "user:*".to_string()),
        ]
    );

    let tree = client.tree();
    let prefix = tree.find("user").unwrap();
    let names: Vec<_> = tree.get(prefix).unwrap().children().map(|(name, _)| name).collect();
    assert_eq!(names, ["a", "b", "c"]);
    let a = tree.find("user:a").unwrap();
    assert_eq!(tree.full_path(a), Some("user:a"));
    assert_eq!(tree.get(a).unwrap().level(), 2);
    assert_eq!(tree.get(a).unwrap().length(), Some(2));

    assert_eq!(channels.opened.lock().as_slice(), [url.clone()]);
    assert_eq!(channels.closed.lock().as_slice(), [url]);
}

#[tokio::test]
async fn inline_listing_creates_intermediate_segments() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(
        Method::Get,
        "data/ds/entrypoint",
        200,
        json!([
            {"path": "session:9f:token", "hasContent": true, "length": 0},
            {"path": "config", "hasContent": true, "length": 0}
        ]),
    );

    let client = client(&http, &channels);
    client.list_entrypoints(None, "o", 0, None).await.unwrap();

    let filter = query(&http, 0);
    assert_eq!(filter[0], ("min".to_string(), "0".to_string()));
    assert_eq!(filter[1], ("filter".to_string(), "*o*".to_string()));

    let tree = client.tree();
    let session = tree.find("session").unwrap();
    assert!(!tree.get(session).unwrap().has_content());
    assert!(tree.get(tree.find("session:9f:token").unwrap()).unwrap().has_content());
    assert!(tree.find("config").is_some());
    assert!(channels.opened.lock().is_empty());
}

#[tokio::test]
async fn failed_listing_is_logged_and_leaves_no_empty_prefix() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(
        Method::Get,
        "data/ds/entrypoint",
        500,
        json!({"error": "scan aborted"}),
    );

    let client = client(&http, &channels);
    let err = client
        .list_entrypoints(Some("orders"), "", 1, Some(1))
        .await
        .unwrap_err();

    assert!(matches!(err.root(), ApiError::Http { status: 500, .. }));
    assert!(client.tree().find("orders").is_none());

    let errors = client.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.entries()[0].message.contains("list failed for 'orders'"));
    assert!(errors.entries()[0]
        .cause
        .as_deref()
        .unwrap_or_default()
        .contains("scan aborted"));
}

#[tokio::test]
async fn channel_error_delivers_no_partial_listing() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(Method::Get, "data/ds/entrypoint", 202, json!({"link": "/ws/E"}));
    channels.script_raw(
        &format!("{}/ws/E", WS_ROOT),
        vec![
            Ok(json!({"size": 1, "data": [{"path": "a", "hasContent": true, "length": 0}]})
                .to_string()),
            Err(ApiError::ChannelError("connection reset".to_string())),
        ],
    );

    let client = client(&http, &channels);
    let err = client.list_entrypoints(None, "", 0, None).await.unwrap_err();

    assert!(matches!(err.root(), ApiError::ChannelError(_)));
    assert!(client.tree().find("a").is_none());
    assert_eq!(client.errors().len(), 1);
}

#[tokio::test]
async fn malformed_records_leave_no_empty_prefix() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(Method::Get, "data/ds/entrypoint", 200, json!([{"nopath": 1}]));

    let client = client(&http, &channels);
    let err = client
        .list_entrypoints(Some("orders"), "", 1, Some(1))
        .await
        .unwrap_err();

    assert!(matches!(err.root(), ApiError::ProtocolError(_)));
    assert!(client.tree().find("orders").is_none());
    assert_eq!(client.tree().len(), 1);
    assert_eq!(client.errors().len(), 1);
}

#[tokio::test]
async fn malformed_streamed_records_leave_no_empty_prefix() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    http.expect(Method::Get, "data/ds/entrypoint", 202, json!({"link": "/ws/M"}));
    channels.script(
        &format!("{}/ws/M", WS_ROOT),
        vec![json!({"size": 1, "data": [{"length": "many"}]}), json!({"size": 0})],
    );

    let client = client(&http, &channels);
    assert!(client
        .list_entrypoints(Some("orders:eu"), "", 2, Some(2))
        .await
        .is_err());

    assert!(client.tree().find("orders").is_none());
    assert_eq!(client.tree().len(), 1);
}

#[tokio::test]
async fn delete_during_streamed_listing_keeps_node_gone() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let gate = Gate::new();
    http.expect(Method::Get, "data/ds/entrypoint", 202, json!({"link": "/ws/R"}));
    http.expect(Method::Delete, "data/ds/entrypoint/a", 200, json!(null));
    channels.script_gated(
        &format!("{}/ws/R", WS_ROOT),
        gate.clone(),
        vec![
            json!({"size": 1, "data": [{"path": "b", "hasContent": true, "length": 0}]}),
            json!({"size": 0}),
        ],
    );

    let client = client(&http, &channels);
    let listing = client.list_entrypoints(Some("a"), "", 1, Some(1));
    let deletion = async {
        gate.reached().await;
        let pruned = client.delete_node("a").await;
        gate.release();
        pruned
    };
    let (records, pruned) = tokio::join!(listing, deletion);

    assert_eq!(pruned.unwrap(), vec!["a".to_string()]);
    let records = records.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path, "b");

    let tree = client.tree();
    assert!(tree.find("a").is_none());
    assert!(tree.find("a:b").is_none());
    assert_eq!(tree.len(), 1);
    assert!(client.errors().is_empty());
}
