use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use swarm_search_index::{
    record_id, IndexedChunkRecord, SearchIndexClient, SearchIndexConfig, SearchIndexError,
};
use tokio_util::sync::CancellationToken;

const COLLECTION: &str = "test-chunks";
const DIM: usize = 3;

/// In-memory stand-in for the search backend's HTTP API.
#[derive(Default)]
struct MockTypesense {
    requests: AtomicUsize,
    collection_exists: AtomicBool,
    creates: AtomicUsize,
    import_sizes: Mutex<Vec<usize>>,
    fail_import_call: Mutex<Option<usize>>,
    documents: Mutex<BTreeMap<String, serde_json::Value>>,
    searches: Mutex<Vec<serde_json::Value>>,
}

impl MockTypesense {
    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn handle(
    State(mock): State<Arc<MockTypesense>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, String) {
    mock.requests.fetch_add(1, Ordering::SeqCst);
    let collection_path = format!("/collections/{COLLECTION}");
    let path = uri.path();

    match (method, path) {
        (Method::GET, p) if p == collection_path => {
            if mock.collection_exists.load(Ordering::SeqCst) {
                (StatusCode::OK, format!(r#"{{"name":"{COLLECTION}"}}"#))
            } else {
                (StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#.to_string())
            }
        }
        (Method::POST, "/collections") => {
            let schema: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(schema["name"], COLLECTION);
            mock.creates.fetch_add(1, Ordering::SeqCst);
            mock.collection_exists.store(true, Ordering::SeqCst);
            (StatusCode::CREATED, body)
        }
        (Method::POST, p) if p == format!("{collection_path}/documents/import") => {
            assert_eq!(params.get("action").map(String::as_str), Some("upsert"));
            let call = {
                let mut sizes = mock.import_sizes.lock().unwrap();
                let lines: Vec<&str> = body.lines().filter(|l| !l.is_empty()).collect();
                sizes.push(lines.len());
                sizes.len() - 1
            };
            if *mock.fail_import_call.lock().unwrap() == Some(call) {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    r#"{"message":"disk full"}"#.to_string(),
                );
            }
            let mut docs = mock.documents.lock().unwrap();
            let mut acks = Vec::new();
            for line in body.lines().filter(|l| !l.is_empty()) {
                let doc: serde_json::Value = serde_json::from_str(line).unwrap();
                let id = doc["id"].as_str().unwrap().to_string();
                docs.insert(id, doc);
                acks.push(r#"{"success":true}"#);
            }
            (StatusCode::OK, acks.join("\n"))
        }
        (Method::POST, "/multi_search") => {
            let request: serde_json::Value = serde_json::from_str(&body).unwrap();
            let search = request["searches"][0].clone();
            mock.searches.lock().unwrap().push(search.clone());
            let q = search["q"].as_str().unwrap_or("*").to_string();
            let per_page = search["per_page"].as_u64().unwrap_or(10) as usize;
            let docs = mock.documents.lock().unwrap();
            let hits: Vec<_> = docs
                .values()
                .filter(|doc| q == "*" || doc["content"].as_str().unwrap().contains(&q))
                .take(per_page)
                .map(|doc| {
                    let mut doc = doc.clone();
                    doc.as_object_mut().unwrap().remove("embedding");
                    serde_json::json!({ "document": doc, "text_match": 100 })
                })
                .collect();
            (
                StatusCode::OK,
                serde_json::json!({ "results": [{ "hits": hits, "found": hits.len() }] })
                    .to_string(),
            )
        }
        (Method::DELETE, p) if p == format!("{collection_path}/documents") => {
            let filter = params.get("filter_by").cloned().unwrap_or_default();
            let (root, path) = filter
                .strip_prefix("project_root:=`")
                .and_then(|rest| rest.strip_suffix('`'))
                .and_then(|rest| rest.split_once("` && path:=`"))
                .unwrap();
            let mut docs = mock.documents.lock().unwrap();
            let before = docs.len();
            docs.retain(|_, doc| !(doc["project_root"] == root && doc["path"] == path));
            let deleted = before - docs.len();
            (
                StatusCode::OK,
                serde_json::json!({ "num_deleted": deleted }).to_string(),
            )
        }
        _ => (StatusCode::NOT_FOUND, r#"{"message":"no route"}"#.to_string()),
    }
}

async fn spawn_mock(mock: Arc<MockTypesense>) -> String {
    let app = Router::new().fallback(handle).with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock");
    });
    format!("http://{addr}")
}

fn client(base_url: &str, batch_size: usize) -> SearchIndexClient {
    SearchIndexClient::new(
        SearchIndexConfig::new(base_url, "test-key")
            .with_collection(COLLECTION)
            .with_embedding_dim(DIM)
            .with_batch_size(batch_size),
    )
    .expect("client")
}

fn record(path: &str, start_line: u32, content: &str) -> IndexedChunkRecord {
    record_under("/repo", path, start_line, content)
}

fn record_under(root: &str, path: &str, start_line: u32, content: &str) -> IndexedChunkRecord {
    IndexedChunkRecord {
        id: record_id(root, path, start_line),
        path: path.to_string(),
        project_root: root.to_string(),
        project_type: "rust".to_string(),
        language: "rust".to_string(),
        chunk_type: "function".to_string(),
        content: content.to_string(),
        embedding: vec![0.1, 0.2, 0.3],
        start_line,
        end_line: start_line + 2,
        indexed_at: 1_700_000_000,
    }
}

fn records(count: u32) -> Vec<IndexedChunkRecord> {
    (0..count)
        .map(|i| record(&format!("src/file_{i}.rs"), 1, &format!("fn f{i}() {{}}")))
        .collect()
}

#[tokio::test]
async fn ensure_schema_creates_once_then_is_a_no_op() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 100);
    let cancel = CancellationToken::new();

    client.ensure_schema(&cancel).await.expect("create");
    client.ensure_schema(&cancel).await.expect("already present");

    assert_eq!(mock.creates.load(Ordering::SeqCst), 1);
    assert_eq!(mock.requests(), 3);
}

#[tokio::test]
async fn upsert_splits_into_groups_in_input_order() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);

    let written = client
        .upsert_batch(&CancellationToken::new(), &records(12))
        .await
        .expect("upsert");

    assert_eq!(written, 12);
    assert_eq!(mock.import_sizes.lock().unwrap().clone(), vec![5, 5, 2]);
    assert_eq!(mock.documents.lock().unwrap().len(), 12);
}

#[tokio::test]
async fn empty_upsert_makes_no_request() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);

    let written = client
        .upsert_batch(&CancellationToken::new(), &[])
        .await
        .expect("no-op");

    assert_eq!(written, 0);
    assert_eq!(mock.requests(), 0);
}

#[tokio::test]
async fn reupserting_a_chunk_overwrites_it() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);
    let cancel = CancellationToken::new();

    client
        .upsert_batch(&cancel, &[record("src/lib.rs", 10, "fn old() {}")])
        .await
        .expect("first");
    client
        .upsert_batch(&cancel, &[record("src/lib.rs", 10, "fn new() {}")])
        .await
        .expect("second");

    let docs = mock.documents.lock().unwrap();
    assert_eq!(docs.len(), 1);
    let doc = docs.get(&record_id("/repo", "src/lib.rs", 10)).expect("stored");
    assert_eq!(doc["content"], "fn new() {}");
}

#[tokio::test]
async fn failed_group_reports_index_and_keeps_earlier_groups() {
    let mock = Arc::new(MockTypesense::default());
    *mock.fail_import_call.lock().unwrap() = Some(1);
    let client = client(&spawn_mock(mock.clone()).await, 5);

    let err = client
        .upsert_batch(&CancellationToken::new(), &records(12))
        .await
        .expect_err("second group fails");

    match err {
        SearchIndexError::BatchFailed {
            group,
            written,
            source,
        } => {
            assert_eq!(group, 1);
            assert_eq!(written, 5);
            assert!(matches!(*source, SearchIndexError::Api { status: 500, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(mock.documents.lock().unwrap().len(), 5);
    // The failing group aborts the call; the third group is never sent.
    assert_eq!(mock.import_sizes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn wrong_embedding_dimension_is_rejected_locally() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);
    let mut bad = record("src/lib.rs", 1, "fn a() {}");
    bad.embedding = vec![1.0];

    let err = client
        .upsert_batch(&CancellationToken::new(), &[bad])
        .await
        .expect_err("dimension mismatch");

    assert!(matches!(err, SearchIndexError::InvalidInput(_)));
    assert_eq!(mock.requests(), 0);
}

#[tokio::test]
async fn search_adds_vector_leg_only_when_vector_given() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);
    let cancel = CancellationToken::new();
    client
        .upsert_batch(
            &cancel,
            &[
                record("src/a.rs", 1, "fn parse_config() {}"),
                record("src/b.rs", 1, "fn render() {}"),
            ],
        )
        .await
        .expect("seed");

    let hits = client
        .search(&cancel, "parse_config", &[0.1, 0.2, 0.3], 10)
        .await
        .expect("hybrid search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.path, "src/a.rs");
    assert!(hits[0].record.embedding.is_empty());
    assert_eq!(hits[0].score, 100.0);

    client
        .search(&cancel, "render", &[], 10)
        .await
        .expect("text search");

    let searches = mock.searches.lock().unwrap().clone();
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[0]["query_by"], "content");
    assert_eq!(searches[0]["vector_query"], "embedding:([0.1,0.2,0.3], k:10)");
    assert!(searches[1].get("vector_query").is_none());
}

#[tokio::test]
async fn search_without_matches_is_empty_not_an_error() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);

    let hits = client
        .search(&CancellationToken::new(), "nothing here", &[], 5)
        .await
        .expect("search");

    assert!(hits.is_empty());
}

#[tokio::test]
async fn delete_by_path_is_exact_scoped_and_idempotent() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);
    let cancel = CancellationToken::new();
    client
        .upsert_batch(
            &cancel,
            &[
                record("src/lib.rs", 1, "fn a() {}"),
                record("src/lib.rs", 20, "fn b() {}"),
                record("src/lib.rs.bak", 1, "fn c() {}"),
                record_under("/other", "src/lib.rs", 1, "fn d() {}"),
            ],
        )
        .await
        .expect("seed");

    let deleted = client
        .delete_by_path(&cancel, "/repo", "src/lib.rs")
        .await
        .expect("delete");
    assert_eq!(deleted, 2);
    let remaining: Vec<(String, String)> = mock
        .documents
        .lock()
        .unwrap()
        .values()
        .map(|doc| {
            (
                doc["project_root"].as_str().unwrap().to_string(),
                doc["path"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&("/repo".to_string(), "src/lib.rs.bak".to_string())));
    assert!(remaining.contains(&("/other".to_string(), "src/lib.rs".to_string())));

    let deleted = client
        .delete_by_path(&cancel, "/repo", "src/lib.rs")
        .await
        .expect("delete again");
    assert_eq!(deleted, 0);

    for (root, path) in [("/repo", ""), ("", "src/lib.rs")] {
        let err = client
            .delete_by_path(&cancel, root, path)
            .await
            .expect_err("empty filter value");
        assert!(matches!(err, SearchIndexError::InvalidInput(_)));
    }
}

#[tokio::test]
async fn cancelled_token_stops_upsert_before_sending() {
    let mock = Arc::new(MockTypesense::default());
    let client = client(&spawn_mock(mock.clone()).await, 5);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client
        .upsert_batch(&cancel, &records(3))
        .await
        .expect_err("cancelled");

    assert!(err.is_cancelled());
    assert_eq!(mock.requests(), 0);
}
