//! Black-box tests for the transport client and response normalizer,
//! driven against a mock backend on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::{Value, json};

use vitrina_client::ApiClient;
use vitrina_core::error::{
    EXCEPTION_NETWORK, EXCEPTION_TIMEOUT, MSG_ACCOUNT_DISABLED, MSG_INVALID_CREDENTIALS,
    MSG_NO_CONNECTION, MSG_NOT_FOUND, MSG_SERVER_ERROR, MSG_TIMEOUT, MSG_VALIDATION,
};
use vitrina_core::{BearerSource, Envelope};

struct FixedBearer(Option<String>);

impl BearerSource for FixedBearer {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn client(&self, token: Option<&str>) -> ApiClient {
        ApiClient::new(
            self.base_url.clone(),
            Arc::new(FixedBearer(token.map(str::to_string))),
        )
        .expect("failed to build client")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn error_body(status: StatusCode, body: Value) -> (StatusCode, axum::Json<Value>) {
    (status, axum::Json(body))
}

#[tokio::test]
async fn success_envelope_passes_through_unreshaped() {
    let app = Router::new().route(
        "/products",
        get(|| async {
            axum::Json(json!({
                "success": true,
                "message": "listed",
                "data": { "products": [{ "id": 1, "name": "Café molido" }] },
                "status": 200,
                "details": {},
                "validationErrors": []
            }))
        }),
    );
    let server = TestServer::spawn(app).await;

    let envelope = server.client(None).get("/products").await;
    assert!(envelope.success);
    assert_eq!(envelope.message, "listed");
    assert_eq!(
        envelope.data.unwrap()["products"][0]["name"],
        json!("Café molido")
    );
}

#[tokio::test]
async fn status_table_messages_are_exact() {
    let app = Router::new()
        .route(
            "/auth/login",
            post(|| async {
                error_body(StatusCode::UNAUTHORIZED, json!({ "message": "bad creds" }))
            }),
        )
        .route(
            "/forbidden",
            get(|| async { error_body(StatusCode::FORBIDDEN, json!({})) }),
        )
        .route(
            "/missing",
            get(|| async { error_body(StatusCode::NOT_FOUND, json!({})) }),
        )
        .route(
            "/broken",
            get(|| async { error_body(StatusCode::INTERNAL_SERVER_ERROR, json!({})) }),
        )
        .route(
            "/teapot",
            get(|| async { error_body(StatusCode::IM_A_TEAPOT, json!({})) }),
        );
    let server = TestServer::spawn(app).await;
    let client = server.client(None);

    let login = client.post("/auth/login", &json!({ "email": "x" })).await;
    assert!(!login.success);
    assert_eq!(login.status, 401);
    assert_eq!(login.message, MSG_INVALID_CREDENTIALS);
    // The backend's own text is preserved for diagnostics, not display.
    assert_eq!(login.details["error_message"], json!("bad creds"));

    assert_eq!(client.get("/forbidden").await.message, MSG_ACCOUNT_DISABLED);
    assert_eq!(client.get("/missing").await.message, MSG_NOT_FOUND);
    assert_eq!(client.get("/broken").await.message, MSG_SERVER_ERROR);

    let teapot = client.get("/teapot").await;
    assert_eq!(teapot.status, 418);
    assert_eq!(teapot.message, "Error 418: I'm a teapot");
}

#[tokio::test]
async fn validation_errors_flatten_in_field_order() {
    let app = Router::new().route(
        "/products",
        post(|| async {
            error_body(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "message": "invalid product",
                    "errors": {
                        "email": ["required", "invalid"],
                        "sku": ["already taken"]
                    }
                }),
            )
        }),
    );
    let server = TestServer::spawn(app).await;

    let envelope = server.client(None).post("/products", &json!({})).await;
    assert_eq!(envelope.status, 422);
    assert_eq!(envelope.message, MSG_VALIDATION);
    assert_eq!(
        envelope.validation_errors,
        vec!["email: required", "email: invalid", "sku: already taken"]
    );
}

#[tokio::test]
async fn backend_details_are_preserved_on_failures() {
    let app = Router::new().route(
        "/broken",
        get(|| async {
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "details": { "trace_id": "abc-123" } }),
            )
        }),
    );
    let server = TestServer::spawn(app).await;

    let envelope = server.client(None).get("/broken").await;
    assert_eq!(envelope.details["trace_id"], json!("abc-123"));
}

#[tokio::test]
async fn timeout_is_distinct_from_connectivity_failure() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            axum::Json(json!({ "success": true }))
        }),
    );
    let server = TestServer::spawn(app).await;

    let client = ApiClient::with_timeout(
        server.base_url.clone(),
        Arc::new(FixedBearer(None)),
        Duration::from_millis(50),
    )
    .unwrap();

    let envelope = client.get("/slow").await;
    assert_eq!(envelope.status, 0);
    assert_eq!(envelope.message, MSG_TIMEOUT);
    assert_eq!(envelope.details["exception"], json!(EXCEPTION_TIMEOUT));
}

#[tokio::test]
async fn no_connectivity_maps_to_status_zero() {
    // Nothing listens on this port.
    let client = ApiClient::new("http://127.0.0.1:1", Arc::new(FixedBearer(None))).unwrap();

    let envelope = client.get("/anything").await;
    assert_eq!(envelope.status, 0);
    assert_eq!(envelope.message, MSG_NO_CONNECTION);
    assert_eq!(envelope.details["exception"], json!(EXCEPTION_NETWORK));
}

#[tokio::test]
async fn bearer_token_is_attached_when_present() {
    let app = Router::new().route(
        "/whoami",
        get(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            axum::Json(json!({
                "success": true,
                "message": "",
                "data": { "authorization": auth }
            }))
        }),
    );
    let server = TestServer::spawn(app).await;

    let with_token = server.client(Some("tok-123")).get("/whoami").await;
    assert_eq!(
        with_token.data.unwrap()["authorization"],
        json!("Bearer tok-123")
    );

    let without = server.client(None).get("/whoami").await;
    assert_eq!(without.data.unwrap()["authorization"], json!(""));
}

#[tokio::test]
async fn opaque_payloads_pass_through_as_raw_bytes() {
    let payload: &[u8] = &[0x89, 0x50, 0x4e, 0x47, 0x00, 0xff];
    let app = Router::new()
        .route("/export", get(move || async move { payload.to_vec() }))
        .route(
            "/export/missing",
            get(|| async { error_body(StatusCode::NOT_FOUND, json!({})) }),
        );
    let server = TestServer::spawn(app).await;
    let client = server.client(None);

    assert_eq!(client.get_bytes("/export").await.unwrap(), payload);

    let err: Envelope = client.get_bytes("/export/missing").await.unwrap_err();
    assert_eq!(err.status, 404);
    assert_eq!(err.message, MSG_NOT_FOUND);
}
