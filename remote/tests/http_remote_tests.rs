use alm_core::{
    CollectionAddr, CollectionKind, EntityId, FieldSpec, FieldValue, RemoteId, RemoteRecord,
    RemoteStore, Schema, Timestamp,
};
use remote::HttpRemoteStore;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record_json(id: &str, ref_id: Option<&str>, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "ref_id": ref_id,
        "last_edited_time": 1_700_000_000_000_i64,
        "fields": {
            "name": { "kind": "text", "value": name }
        }
    })
}

#[tokio::test]
async fn test_list_all_follows_cursor_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/containers/c-1/records"))
        .and(query_param("limit", "100"))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [record_json("r-2", Some("2"), "Second")],
            "next_cursor": null
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/containers/c-1/records"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [record_json("r-1", Some("1"), "First")],
            "next_cursor": "page-2"
        })))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let records = store.list_all(&RemoteId::new("c-1")).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].remote_id, RemoteId::new("r-1"));
    assert_eq!(records[0].ref_id, Some(EntityId::from_index(1)));
    assert_eq!(records[1].remote_id, RemoteId::new("r-2"));
    assert_eq!(records[1].text("name").unwrap().as_deref(), Some("Second"));
}

#[tokio::test]
async fn test_malformed_ref_id_reads_as_unassigned() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/containers/c-1/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                record_json("r-1", Some("not-a-number"), "Scribbled over"),
                record_json("r-2", Some("0"), "Explicit sentinel"),
            ],
            "next_cursor": null
        })))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let records = store.list_all(&RemoteId::new("c-1")).await.unwrap();

    assert_eq!(records[0].ref_id, None);
    assert_eq!(records[1].ref_id, None);
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/containers/c-1/records"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "bad-token").unwrap();
    let err = store.list_all(&RemoteId::new("c-1")).await.unwrap_err();
    assert!(matches!(err, alm_core::RemoteError::Auth(_)));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/containers/c-1/records"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let err = store.list_all(&RemoteId::new("c-1")).await.unwrap_err();
    match err {
        alm_core::RemoteError::RateLimited { retry_after_secs } => {
            assert_eq!(retry_after_secs, 30);
        }
        other => panic!("expected rate limit error, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_delete_missing_record_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/containers/c-1/records/r-9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let err = store
        .delete(&RemoteId::new("c-1"), &RemoteId::new("r-9"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_round_trips_ref_id_and_fields() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/containers/c-1/records"))
        .respond_with(ResponseTemplate::new(201).set_body_json(record_json(
            "r-assigned",
            Some("7"),
            "Buy a tent",
        )))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let mut record = RemoteRecord::new(RemoteId::new(""), Timestamp::now());
    record.ref_id = Some(EntityId::from_index(7));
    record.set("name", FieldValue::text("Buy a tent"));

    let created = store.create(&RemoteId::new("c-1"), record).await.unwrap();
    assert_eq!(created.remote_id, RemoteId::new("r-assigned"));
    assert_eq!(created.ref_id, Some(EntityId::from_index(7)));
    assert_eq!(created.text("name").unwrap().as_deref(), Some("Buy a tent"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["ref_id"], "7");
    assert_eq!(body["fields"]["name"]["value"], "Buy a tent");
}

#[tokio::test]
async fn test_find_container_returns_none_when_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/containers"))
        .and(query_param("kind", "vacations"))
        .and(query_param("parent", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "containers": [] })))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let addr = CollectionAddr::new(CollectionKind::Vacations, EntityId::from_index(1));
    assert!(store.find_container(&addr).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_container_posts_schema_and_parses_views() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/containers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "c-new",
            "views": { "database": "v-1", "kanban": "v-2" },
            "schema": { "fields": { "name": { "kind": "text" } } }
        })))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let addr = CollectionAddr::new(CollectionKind::Projects, EntityId::from_index(1));
    let schema = Schema::new().with_field("name", FieldSpec::Text);

    let handle = store.create_container(&addr, &schema).await.unwrap();
    assert_eq!(handle.container_id, RemoteId::new("c-new"));
    assert_eq!(handle.view_ids.len(), 2);
    assert_eq!(handle.view_ids["database"], RemoteId::new("v-1"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["kind"], "projects");
    assert_eq!(body["parent_ref_id"], "1");
    assert_eq!(body["title"], "Projects");
}

#[tokio::test]
async fn test_known_id_listings_come_from_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/containers/c-1/links"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "links": [
                { "record_id": "r-1", "ref_id": "1" },
                { "record_id": "r-2", "ref_id": null },
            ]
        })))
        .mount(&server)
        .await;

    let store = HttpRemoteStore::new(server.uri(), "token").unwrap();
    let container = RemoteId::new("c-1");

    let remote_ids = store.list_known_remote_ids(&container).await.unwrap();
    assert_eq!(remote_ids, vec![RemoteId::new("r-1"), RemoteId::new("r-2")]);

    let ref_ids = store.list_known_ref_ids(&container).await.unwrap();
    assert_eq!(ref_ids, vec![EntityId::from_index(1)]);
}
