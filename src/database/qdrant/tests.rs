use super::*;
use crate::database::{Payload, PointId};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_for(server: &MockServer) -> QdrantStore {
    let mut config = Config::default();
    config.vector_store.url = server.uri();
    QdrantStore::new(&config).expect("store should build")
}

fn collections_response(names: &[&str]) -> ResponseTemplate {
    let collections: Vec<_> = names.iter().map(|name| json!({ "name": name })).collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "result": { "collections": collections },
        "status": "ok",
        "time": 0.0001
    }))
}

#[test]
fn invalid_url_is_config_error() {
    let mut config = Config::default();
    config.vector_store.url = "not a url".to_string();
    assert!(matches!(
        QdrantStore::new(&config),
        Err(RagError::Config(_))
    ));
}

#[test]
fn url_segments_are_escaped() {
    let mut config = Config::default();
    config.vector_store.url = "http://localhost:6333/prefix".to_string();
    let store = QdrantStore::new(&config).expect("store should build");

    let url = store
        .url(&["collections", "my docs", "points"])
        .expect("url should build");
    assert_eq!(
        url.as_str(),
        "http://localhost:6333/prefix/collections/my%20docs/points"
    );
}

#[test]
fn distance_wire_names() {
    assert_eq!(qdrant_distance(Distance::Cosine), "Cosine");
    assert_eq!(qdrant_distance(Distance::Euclid), "Euclid");
    assert_eq!(qdrant_distance(Distance::Dot), "Dot");
}

#[tokio::test(flavor = "multi_thread")]
async fn creates_missing_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(collections_response(&["other"]))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/gemini-embeddings"))
        .and(body_json(json!({ "vectors": { "size": 768, "distance": "Cosine" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": true, "status": "ok" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let created = store
        .ensure_collection("gemini-embeddings", 768, Distance::Cosine)
        .await
        .expect("collection should be created");

    assert!(created);
}

#[tokio::test(flavor = "multi_thread")]
async fn existing_collection_is_left_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(collections_response(&["gemini-embeddings"]))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server);
    for _ in 0..2 {
        let created = store
            .ensure_collection("gemini-embeddings", 768, Distance::Cosine)
            .await
            .expect("existence check should succeed");
        assert!(!created);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn upsert_sends_points_and_waits() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/collections/docs/points"))
        .and(query_param("wait", "true"))
        .and(body_json(json!({
            "points": [
                { "id": 97, "vector": [0.5, 0.25], "payload": { "text": "first" } },
                { "id": 98, "vector": [0.0, 1.0], "payload": { "text": "second" } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "operation_id": 1, "status": "completed" },
            "status": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let points = vec![
        Point {
            id: PointId::Num(97),
            vector: vec![0.5, 0.25],
            payload: Payload::new("first"),
        },
        Point {
            id: PointId::Num(98),
            vector: vec![0.0, 1.0],
            payload: Payload::new("second"),
        },
    ];

    store.upsert("docs", points).await.expect("upsert should succeed");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_upsert_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    store_for(&server)
        .upsert("docs", Vec::new())
        .await
        .expect("empty upsert is a no-op");
}

#[tokio::test(flavor = "multi_thread")]
async fn query_returns_scored_points_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/query"))
        .and(body_json(json!({ "query": [1.0, 0.0], "limit": 2, "with_payload": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "points": [
                    { "id": 98, "version": 3, "score": 0.99, "payload": { "text": "best" } },
                    { "id": "0d2c8f5e-0d7c-5d1e-8a57-2b1f9d3c4e5f", "version": 3, "score": 0.5, "payload": { "text": "next" } }
                ]
            },
            "status": "ok"
        })))
        .mount(&server)
        .await;

    let results = store_for(&server)
        .query("docs", &[1.0, 0.0], 2)
        .await
        .expect("query should succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, PointId::Num(98));
    assert_eq!(results[0].payload.text, "best");
    assert!(results[0].score > results[1].score);
    assert!(matches!(results[1].id, PointId::Uuid(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn count_is_exact() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/count"))
        .and(body_json(json!({ "exact": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "result": { "count": 42 }, "status": "ok" })),
        )
        .mount(&server)
        .await;

    let count = store_for(&server).count("docs").await.expect("count");
    assert_eq!(count, 42);
}

#[tokio::test(flavor = "multi_thread")]
async fn api_key_header_is_sent_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .and(header("api-key", "qdrant-secret"))
        .respond_with(collections_response(&[]))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.vector_store.url = server.uri();
    config.vector_store.api_key = Some("qdrant-secret".to_string());
    let store = QdrantStore::new(&config).expect("store should build");

    assert!(store.is_reachable().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_collection_is_vector_store_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/missing/points/query"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "status": { "error": "Not found: Collection `missing` doesn't exist!" },
            "time": 0.0
        })))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .query("missing", &[1.0], 5)
        .await
        .expect_err("missing collection");
    assert!(matches!(err, RagError::VectorStore(message) if message.contains("404")));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_network_error() {
    let mut config = Config::default();
    config.vector_store.url = "http://127.0.0.1:9".to_string();
    let store = QdrantStore::new(&config).expect("store should build");

    let err = store.count("docs").await.expect_err("nothing listens there");
    assert!(matches!(err, RagError::Network(_)));
    assert!(!store.is_reachable().await);
}
