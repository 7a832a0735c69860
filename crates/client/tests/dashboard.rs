use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use api_types::{
    Resource,
    account::{AccountNew, AccountType},
    transaction::{TransactionNew, TransactionType},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::Utc;
use client::{Client, ClientError, messages};
use query_cache::{CacheConfig, Filters, KeyFactory};
use serde_json::{Value, json};
use server::{PublicConfig, ServerConfig};

/// Requests the mock backend received, as `(method, path?query, body)`.
#[derive(Clone, Default)]
struct Backend {
    hits: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl Backend {
    fn record(&self, method: &Method, uri: &Uri, body: &[u8]) {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        self.hits.lock().unwrap().push((
            method.to_string(),
            target,
            String::from_utf8_lossy(body).to_string(),
        ));
    }

    fn count(&self, method: &str, target: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, t, _)| m == method && t == target)
            .count()
    }

    fn last_body(&self, method: &str, target: &str) -> Option<String> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, t, _)| m == method && t == target)
            .map(|(_, _, body)| body.clone())
    }
}

fn account_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "checking",
        "currency": "USD",
        "balanceMinor": 0,
        "isArchived": false,
        "createdAt": "2026-01-01T00:00:00Z",
        "updatedAt": "2026-01-01T00:00:00Z",
    })
}

fn ok(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

fn failure(status: StatusCode, message: &str, code: &str) -> impl IntoResponse {
    (
        status,
        Json(json!({
            "success": false,
            "error": { "message": message, "code": code },
            "data": null,
        })),
    )
}

async fn list_accounts(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
) -> impl IntoResponse {
    backend.record(&method, &uri, b"");
    ok(json!([account_json("42", "Checking")]))
}

async fn create_account(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    backend.record(&method, &uri, &body);
    let payload: Value = serde_json::from_slice(&body).unwrap_or_default();
    let name = payload["name"].as_str().unwrap_or_default().to_string();
    (StatusCode::CREATED, ok(account_json("43", &name)))
}

async fn account_detail(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    Path(id): Path<String>,
) -> impl IntoResponse {
    backend.record(&method, &uri, b"");
    ok(account_json(&id, "Checking"))
}

async fn delete_account(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    backend.record(&method, &uri, &body);
    ok(Value::Null)
}

async fn empty_list(State(backend): State<Backend>, method: Method, uri: Uri) -> impl IntoResponse {
    backend.record(&method, &uri, b"");
    ok(json!([]))
}

async fn summary(State(backend): State<Backend>, method: Method, uri: Uri) -> impl IntoResponse {
    backend.record(&method, &uri, b"");
    ok(json!({ "netWorthMinor": 0 }))
}

async fn reject_transaction(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    backend.record(&method, &uri, &body);
    failure(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Insufficient funds",
        "VALIDATION_ERROR",
    )
}

/// Fails twice with 503, then answers.
async fn flaky_reports(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
) -> axum::response::Response {
    backend.record(&method, &uri, b"");
    if backend.count("GET", "/v1/reports") <= 2 {
        return failure(StatusCode::SERVICE_UNAVAILABLE, "warming up", "UNAVAILABLE")
            .into_response();
    }
    ok(json!([])).into_response()
}

async fn missing_bills(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
) -> impl IntoResponse {
    backend.record(&method, &uri, b"");
    failure(StatusCode::NOT_FOUND, "Bills not found", "NOT_FOUND")
}

/// Accepts the write with a plain-text body.
async fn delete_goal(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> impl IntoResponse {
    backend.record(&method, &uri, &body);
    (StatusCode::OK, "OK")
}

async fn report_download(
    State(backend): State<Backend>,
    method: Method,
    uri: Uri,
) -> impl IntoResponse {
    backend.record(&method, &uri, b"");
    (
        StatusCode::FOUND,
        [(axum::http::header::LOCATION, "/v1/files/r7.pdf")],
        "moved",
    )
}

async fn spawn_backend(backend: Backend) -> String {
    let app = Router::new()
        .route("/v1/accounts", get(list_accounts).post(create_account))
        .route(
            "/v1/accounts/{id}",
            get(account_detail).delete(delete_account),
        )
        .route("/v1/transactions", get(empty_list).post(reject_transaction))
        .route("/v1/budgets", get(empty_list))
        .route("/v1/goals", get(empty_list))
        .route("/v1/goals/{id}", delete(delete_goal))
        .route("/v1/analytics/summary", get(summary))
        .route("/v1/reports", get(flaky_reports))
        .route("/v1/reports/{id}", get(report_download))
        .route("/v1/bills", get(missing_bills))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

async fn spawn_proxy(backend_url: String) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server::spawn_with_listener(
        ServerConfig {
            backend_base_url: backend_url,
            public: PublicConfig {
                site_url: "http://localhost:3000".to_string(),
                features: BTreeMap::new(),
                ..PublicConfig::default()
            },
        },
        listener,
    )
    .unwrap();
    format!("http://{addr}")
}

fn cache_config() -> CacheConfig {
    CacheConfig {
        stale_time: Duration::from_secs(60),
        gc_time: Duration::from_secs(300),
        retry: 3,
        retry_delay: Duration::ZERO,
    }
}

async fn setup() -> (Client, Backend) {
    let backend = Backend::default();
    let proxy = spawn_proxy(spawn_backend(backend.clone()).await).await;
    let client = Client::new(&proxy, cache_config()).unwrap();
    (client, backend)
}

/// Fills the cache with the views the account scenarios care about.
async fn warm(client: &Client) {
    client.accounts(&Filters::new()).await.unwrap();
    client.transactions(&Filters::new()).await.unwrap();
    client
        .list::<Vec<Value>>(Resource::Budgets, &Filters::new())
        .await
        .unwrap();
    client
        .list::<Vec<Value>>(Resource::Goals, &Filters::new())
        .await
        .unwrap();
    client
        .scoped::<Value>(Resource::Analytics, "summary", &Filters::new())
        .await
        .unwrap();
}

async fn stale(client: &Client, resource: Resource) -> bool {
    let key = match resource {
        Resource::Analytics => resource.keys().scoped("summary", &Filters::new()),
        _ => resource.keys().list(&Filters::new()),
    };
    client.cache().is_stale(&key).await
}

#[tokio::test]
async fn fresh_reads_are_served_from_cache() {
    let (client, backend) = setup().await;

    let first = client.accounts(&Filters::new()).await.unwrap();
    let second = client.accounts(&Filters::new()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].name, "Checking");
    assert_eq!(backend.count("GET", "/v1/accounts"), 1);
}

#[tokio::test]
async fn filters_become_query_string_and_separate_cache_entries() {
    let (client, backend) = setup().await;

    let savings = Filters::new().with("type", "savings");
    client.accounts(&savings).await.unwrap();
    client.accounts(&Filters::new()).await.unwrap();

    assert_eq!(backend.count("GET", "/v1/accounts?type=savings"), 1);
    assert_eq!(backend.count("GET", "/v1/accounts"), 1);
}

#[tokio::test]
async fn creating_an_account_invalidates_accounts_and_analytics() {
    let (client, backend) = setup().await;
    warm(&client).await;

    let created = client
        .create_account(&AccountNew {
            name: "Checking".to_string(),
            account_type: AccountType::Checking,
            currency: "USD".to_string(),
            initial_balance_minor: None,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "43");

    let sent: Value =
        serde_json::from_str(&backend.last_body("POST", "/v1/accounts").unwrap()).unwrap();
    assert_eq!(
        sent,
        json!({ "name": "Checking", "type": "checking", "currency": "USD" })
    );

    assert!(stale(&client, Resource::Accounts).await);
    assert!(stale(&client, Resource::Analytics).await);
    assert!(!stale(&client, Resource::Transactions).await);
    assert!(!stale(&client, Resource::Budgets).await);
    assert!(!stale(&client, Resource::Goals).await);

    client.accounts(&Filters::new()).await.unwrap();
    assert_eq!(backend.count("GET", "/v1/accounts"), 2);
}

#[tokio::test]
async fn deleting_an_account_invalidates_dependent_views() {
    let (client, backend) = setup().await;
    warm(&client).await;
    client.account("42").await.unwrap();

    client.delete_account("42", None).await.unwrap();
    assert_eq!(backend.count("DELETE", "/v1/accounts/42"), 1);

    assert!(stale(&client, Resource::Accounts).await);
    assert!(stale(&client, Resource::Transactions).await);
    assert!(stale(&client, Resource::Analytics).await);
    assert!(stale(&client, Resource::Budgets).await);
    assert!(!stale(&client, Resource::Goals).await);
    assert!(
        client
            .cache()
            .is_stale(&Resource::Accounts.keys().detail("42"))
            .await
    );
}

#[tokio::test]
async fn delete_with_transfer_target_keeps_query() {
    let (client, backend) = setup().await;

    client.delete_account("42", Some("7")).await.unwrap();
    assert_eq!(backend.count("DELETE", "/v1/accounts/42?transferTo=7"), 1);
}

#[tokio::test]
async fn transfer_target_is_query_encoded() {
    let (client, backend) = setup().await;

    client
        .delete_account("42", Some("7&force=true"))
        .await
        .unwrap();
    assert_eq!(
        backend.count("DELETE", "/v1/accounts/42?transferTo=7%26force%3Dtrue"),
        1
    );
}

#[tokio::test]
async fn detail_id_stays_one_path_segment() {
    let (client, backend) = setup().await;

    let account = client.account("4/2").await.unwrap();
    assert_eq!(account.id, "4/2");
    assert_eq!(backend.count("GET", "/v1/accounts/4%2F2"), 1);
}

#[tokio::test]
async fn accepted_write_invalidates_even_when_body_is_not_json() {
    let (client, backend) = setup().await;
    warm(&client).await;

    let err = client
        .mutate::<Value, Value>(Method::DELETE, &["goals", "7"], None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
    assert_eq!(backend.count("DELETE", "/v1/goals/7"), 1);

    assert!(stale(&client, Resource::Goals).await);
    assert!(stale(&client, Resource::Analytics).await);
    assert!(!stale(&client, Resource::Accounts).await);
}

#[tokio::test]
async fn redirect_from_proxy_is_a_server_error() {
    let (client, backend) = setup().await;

    let err = client
        .detail::<Value>(Resource::Reports, "7")
        .await
        .unwrap_err();
    match err {
        ClientError::Server { status, .. } => assert_eq!(status, StatusCode::FOUND),
        other => panic!("unexpected {other:?}"),
    }
    // not followed, not retried
    assert_eq!(backend.count("GET", "/v1/reports/7"), 1);
    assert_eq!(backend.count("GET", "/v1/files/r7.pdf"), 0);
    assert!(
        client
            .cache()
            .get(&Resource::Reports.keys().detail("7"))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn rejected_write_surfaces_translated_message_and_keeps_cache() {
    let (client, backend) = setup().await;
    warm(&client).await;

    let err = client
        .create_transaction(&TransactionNew {
            account_id: "42".to_string(),
            transaction_type: TransactionType::Expense,
            amount_minor: 1_000_000,
            description: None,
            category_id: None,
            transfer_account_id: None,
            occurred_at: Utc::now(),
        })
        .await
        .unwrap_err();

    match err {
        ClientError::Validation(message) => assert_eq!(message, messages::INSUFFICIENT_FUNDS),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(backend.count("POST", "/v1/transactions"), 1);
    assert!(!stale(&client, Resource::Transactions).await);
    assert!(!stale(&client, Resource::Accounts).await);
}

#[tokio::test]
async fn reads_retry_server_errors() {
    let (client, backend) = setup().await;

    let reports = client
        .list::<Vec<Value>>(Resource::Reports, &Filters::new())
        .await
        .unwrap();
    assert!(reports.is_empty());
    assert_eq!(backend.count("GET", "/v1/reports"), 3);
}

#[tokio::test]
async fn reads_do_not_retry_client_errors() {
    let (client, backend) = setup().await;

    let err = client
        .list::<Vec<Value>>(Resource::Bills, &Filters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(message) if message == "Bills not found"));
    assert_eq!(backend.count("GET", "/v1/bills"), 1);
}

#[tokio::test]
async fn unreachable_backend_maps_to_proxy_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let proxy = spawn_proxy(dead).await;
    let client = Client::new(
        &proxy,
        CacheConfig {
            retry: 1,
            ..cache_config()
        },
    )
    .unwrap();

    let err = client.accounts(&Filters::new()).await.unwrap_err();
    match err {
        ClientError::Proxy(message) => assert_eq!(message, messages::UNREACHABLE),
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.cache().is_empty().await);
}
