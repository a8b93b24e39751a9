use crate::integration::support::{client, ScriptedChannels, ScriptedHttp};

#[test]
fn tab_operations_through_the_client() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let client = client(&http, &channels);

    client.select("y");
    assert!(client.toggle_pin("y"));
    client.select("z");
    client.close_others("x");
    assert_eq!(client.selection().selected(), ["x".to_string(), "y".to_string()]);

    client.unselect("y");
    client.close_all_but_pinned();
    assert!(client.selection().selected().is_empty());
    assert_eq!(http.request_count(), 0);
}

#[test]
fn errors_are_dismissed_by_index() {
    let http = ScriptedHttp::new();
    let channels = ScriptedChannels::new();
    let client = client(&http, &channels);

    assert!(client.clear_node("missing").is_err());
    assert!(client.clear_node("gone").is_err());
    assert_eq!(client.errors().len(), 2);

    let dismissed = client.dismiss_error(0).unwrap();
    assert!(dismissed.message.contains("missing"));
    assert!(client.dismiss_error(5).is_none());
    assert_eq!(client.errors().len(), 1);
    assert!(client.errors().entries()[0].message.contains("gone"));
}
