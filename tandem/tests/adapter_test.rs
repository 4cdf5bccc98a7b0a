//! Document adapter behavior against a scripted transport: request
//! shapes, error mapping, and the scroll release protocol.

mod common;

use serde_json::{json, Value};

use common::{bulk_item, bulk_response, hit, hits_page, FakeTransport};
use tandem::client::{BulkAction, DocumentAdapter, UpdateParams};
use tandem::transport::Method;
use tandem::Error;

fn adapter(transport: &std::sync::Arc<FakeTransport>) -> DocumentAdapter {
    DocumentAdapter::new(
        transport.clone(),
        "users",
        "user",
        "users",
        json!({"properties": {"name": {"type": "text"}}}),
    )
    .unwrap()
}

#[test]
fn index_puts_the_transformed_source() {
    let transport = FakeTransport::new();
    transport.queue_ok(json!({"result": "created"}));
    adapter(&transport)
        .index(&json!({"_id": "u1", "name": "milo"}), true)
        .unwrap();

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Put);
    assert_eq!(calls[0].path, "users/user/u1");
    assert_eq!(calls[0].params, vec![("refresh".to_string(), "true".to_string())]);
    // _id moved out of band, mirrored into doc_id
    assert_eq!(
        calls[0].body,
        Some(json!({"name": "milo", "doc_id": "u1"}))
    );
}

#[test]
fn index_rejects_bad_documents_before_any_network_call() {
    let transport = FakeTransport::new();
    let err = adapter(&transport)
        .index(&json!({"name": "no id here"}), false)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(transport.calls().is_empty());
}

#[test]
fn get_maps_missing_documents_to_not_found() {
    let transport = FakeTransport::new();
    transport.queue_err(FakeTransport::not_found("no such doc"));
    let err = adapter(&transport).get("u1", None).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn get_injects_the_id_into_the_source() {
    let transport = FakeTransport::new();
    transport.queue_ok(json!({"name": "milo", "doc_id": "u1"}));
    let doc = adapter(&transport).get("u1", None).unwrap();
    assert_eq!(doc, json!({"name": "milo", "doc_id": "u1", "_id": "u1"}));
}

#[test]
fn exists_is_a_head_request() {
    let transport = FakeTransport::new();
    transport.queue_ok(Value::Null);
    transport.queue_err(FakeTransport::not_found("gone"));
    let adapter = adapter(&transport);
    assert!(adapter.exists("u1").unwrap());
    assert!(!adapter.exists("u2").unwrap());
    assert_eq!(transport.count_calls(Method::Head, "users/user/u1"), 1);
}

#[test]
fn update_uses_the_version_gated_source_param() {
    let transport = FakeTransport::with_version("5.6.16");
    transport.queue_ok(json!({"get": {"_source": {"name": "milo", "age": 9}}}));
    let params = UpdateParams {
        return_doc: true,
        ..UpdateParams::default()
    };
    let doc = adapter(&transport)
        .update("u1", &json!({"age": 9}), &params)
        .unwrap();
    assert_eq!(doc, Some(json!({"name": "milo", "age": 9})));

    let update_call = transport
        .request_calls()
        .into_iter()
        .find(|call| call.path == "users/user/u1/_update")
        .unwrap();
    assert!(update_call
        .params
        .contains(&("_source".to_string(), "true".to_string())));
    assert_eq!(update_call.body, Some(json!({"doc": {"age": 9}})));
}

#[test]
fn update_with_return_doc_fails_on_unsupported_versions() {
    let transport = FakeTransport::with_version("2.4.6");
    let params = UpdateParams {
        return_doc: true,
        ..UpdateParams::default()
    };
    let err = adapter(&transport)
        .update("u1", &json!({"age": 9}), &params)
        .unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
}

#[test]
fn update_rejects_a_conflicting_embedded_id() {
    let transport = FakeTransport::new();
    let err = adapter(&transport)
        .update("u1", &json!({"_id": "u2", "age": 9}), &UpdateParams::default())
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(transport.calls().is_empty());
}

#[test]
fn search_raises_on_partial_shard_failure() {
    let transport = FakeTransport::new();
    transport.queue_ok(json!({
        "_shards": {"total": 5, "successful": 4, "failed": 1},
        "hits": {"total": 0, "hits": []},
    }));
    let err = adapter(&transport).search(&json!({"query": {"match_all": {}}})).unwrap_err();
    assert!(matches!(err, Error::ShardFailure(_)));
}

#[test]
fn scroll_yields_all_documents_and_releases_the_context_once() {
    let transport = FakeTransport::new();
    transport.queue_ok(hits_page(Some("scroll-1"), &[hit("1", json!({"doc_id": "1"}))]));
    transport.queue_ok(hits_page(Some("scroll-2"), &[hit("2", json!({"doc_id": "2"}))]));
    transport.queue_ok(hits_page(Some("scroll-3"), &[hit("3", json!({"doc_id": "3"}))]));
    transport.queue_ok(hits_page(Some("scroll-4"), &[]));
    transport.queue_ok(json!({"succeeded": true}));

    let adapter = adapter(&transport);
    let scroll = adapter
        .scroll(&json!({"query": {"match_all": {}}}), None, Some(1))
        .unwrap();
    let ids: Vec<String> = scroll
        .map(|hit| hit.unwrap()["_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(transport.count_calls(Method::Delete, "_search/scroll"), 1);

    // sort order injected for efficiency, size passed as a parameter
    let first = &transport.request_calls()[0];
    assert_eq!(first.body.as_ref().unwrap()["sort"], json!("_doc"));
    assert!(first.params.contains(&("size".to_string(), "1".to_string())));
}

#[test]
fn dropping_a_scroll_early_still_releases_the_context_once() {
    let transport = FakeTransport::new();
    transport.queue_ok(hits_page(
        Some("scroll-1"),
        &[hit("1", json!({})), hit("2", json!({}))],
    ));
    transport.queue_ok(json!({"succeeded": true}));

    let adapter = adapter(&transport);
    let mut scroll = adapter
        .scroll(&json!({"query": {"match_all": {}}}), None, None)
        .unwrap();
    scroll.next().unwrap().unwrap();
    drop(scroll);
    assert_eq!(transport.count_calls(Method::Delete, "_search/scroll"), 1);
}

#[test]
fn first_page_shard_failure_still_releases_the_context() {
    let transport = FakeTransport::new();
    let mut page = hits_page(Some("scroll-1"), &[hit("1", json!({}))]);
    page["_shards"]["failed"] = json!(1);
    transport.queue_ok(page);
    transport.queue_ok(json!({"succeeded": true}));

    let adapter = adapter(&transport);
    let err = adapter
        .scroll(&json!({"query": {"match_all": {}}}), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::ShardFailure(_)));
    assert_eq!(transport.count_calls(Method::Delete, "_search/scroll"), 1);
}

#[test]
fn scroll_size_in_both_places_is_ambiguous() {
    let transport = FakeTransport::new();
    let adapter = adapter(&transport);
    let err = adapter
        .scroll(&json!({"query": {"match_all": {}}, "size": 10}), None, Some(5))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(transport.calls().is_empty());
}

#[test]
fn bulk_renders_every_action_before_sending() {
    let transport = FakeTransport::new();
    let adapter = adapter(&transport);
    let actions = vec![
        BulkAction::index(json!({"_id": "u1", "name": "milo"})),
        // invalid: no _id
        BulkAction::index(json!({"name": "nameless"})),
    ];
    assert!(adapter.bulk(&actions, false, true).is_err());
    // the first action rendered fine, but nothing went on the wire
    assert!(transport.calls().is_empty());
}

#[test]
fn bulk_reports_successes_and_failures() {
    let transport = FakeTransport::new();
    transport.queue_ok(bulk_response(vec![
        bulk_item("index", "users", "u1", 201),
        bulk_item("index", "users", "u2", 500),
    ]));
    let adapter = adapter(&transport);
    let docs = vec![
        json!({"_id": "u1", "name": "a"}),
        json!({"_id": "u2", "name": "b"}),
    ];
    let (ok, errors) = adapter.bulk_index(&docs, false, false).unwrap();
    assert_eq!(ok, 1);
    assert_eq!(errors.len(), 1);
}
