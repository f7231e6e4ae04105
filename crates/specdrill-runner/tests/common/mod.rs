//! In-process HTTP service used as the system under test

use std::net::SocketAddr;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use serde_json::json;

pub const WIDGETS_SPEC: &str = r#"{
  "openapi": "3.0.3",
  "info": {"title": "Widgets", "version": "1.0"},
  "paths": {
    "/widgets": {
      "get": {"summary": "List widgets", "responses": {"200": {"description": "OK"}}},
      "post": {"summary": "Create widget", "responses": {"201": {"description": "Created"}}}
    },
    "/widgets/{id}": {
      "get": {"responses": {"200": {"description": "OK"}}},
      "put": {"responses": {"200": {"description": "OK"}}},
      "delete": {"responses": {"204": {"description": "Deleted"}}}
    }
  }
}"#;

pub const WIDGETS_SPEC_YAML: &str = "openapi: 3.0.3
info:
  title: Widgets
  version: '1.0'
paths:
  /widgets:
    get:
      responses:
        200:
          description: OK
";

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<serde_json::Value> {
    Json(json!({
        "method": method.as_str(),
        "accept": header(&headers, "accept"),
        "content_type": header(&headers, "content-type"),
        "body": body,
    }))
}

async fn widget(Path(id): Path<String>) -> axum::response::Response {
    if id == "1" {
        Json(json!({"id": 1, "name": "sprocket"})).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

pub fn widgets_router() -> Router {
    Router::new()
        .route(
            "/widgets",
            get(|| async { Json(json!([{"id": 1}])) })
                .post(|body: String| async move { (StatusCode::CREATED, body) }),
        )
        .route(
            "/widgets/{id}",
            get(widget)
                .put(|Path(id): Path<String>| async move { Json(json!({"id": id})) })
                .delete(|| async { StatusCode::NO_CONTENT }),
        )
        .route("/echo", any(echo))
        .route("/text", get(|| async { "plain text" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        )
        .route("/openapi.json", get(|| async { WIDGETS_SPEC }))
        .route("/docs/openapi.yaml", get(|| async { WIDGETS_SPEC_YAML }))
        .route("/broken.json", get(|| async { "{\"openapi\": " }))
}

/// Serve `router` on an ephemeral port from a helper thread. Returns the
/// base URL, e.g. `http://127.0.0.1:41234`.
pub fn spawn(router: Router) -> String {
    let (tx, rx) = std::sync::mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind test listener");
            tx.send(listener.local_addr().expect("local addr"))
                .expect("report address");
            axum::serve(listener, router).await.expect("serve");
        });
    });
    format!("http://{}", rx.recv().expect("server address"))
}

/// An address nothing listens on.
pub const UNREACHABLE: &str = "http://127.0.0.1:1";
