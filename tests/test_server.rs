//! Integration test: Server API endpoints

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ml_builder::config::AppConfig;
use ml_builder::export::ArtifactPersister;
use ml_builder::server::{create_router, AppState};
use ml_builder::session::SessionStore;
use ml_builder::workflow::WorkflowService;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "----mlbuilderboundary";

fn test_app(debug_sessions: bool) -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::local(dir.path()).with_debug_sessions(debug_sessions);
    let workflow = WorkflowService::new(
        Arc::new(SessionStore::local_only()),
        ArtifactPersister::new(dir.path()),
    );
    let state = Arc::new(AppState::new(config, Arc::new(workflow)));
    (create_router(state), dir)
}

fn csv_dataset() -> String {
    let mut csv = String::from("width,length,color,label\n");
    for i in 0..40 {
        let class = i % 2;
        let color = if i % 3 == 0 { "red" } else { "blue" };
        csv.push_str(&format!(
            "{},{},{},{}\n",
            class as f64 * 5.0 + (i % 4) as f64 * 0.1,
            10.0 - class as f64 * 4.0,
            color,
            if class == 0 { "cat" } else { "dog" }
        ));
    }
    csv
}

fn multipart_request(field: &str, file_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\nContent-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field,
        n = file_name,
        c = content
    );
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _dir) = test_app(false);
    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_full_workflow_over_http() {
    let (app, dir) = test_app(false);

    let (status, body) = send(&app, multipart_request("file", "pets.csv", &csv_dataset())).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["num_rows"], 40);
    assert_eq!(body["num_cols"], 4);
    assert_eq!(body["columns"], json!(["width", "length", "color", "label"]));
    assert_eq!(body["preview"].as_array().unwrap().len(), 5);
    let sid = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        post_json("/api/preprocess", json!({"session_id": sid, "method": "OneHot", "target_column": "label"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Preprocessing configured.");
    assert_eq!(body["summary"]["method"], "onehot");
    assert_eq!(body["summary"]["categorical_columns"], json!(["color"]));
    assert!(body["summary"].get("dropped_rows_with_missing_target").is_none());

    let (status, body) = send(
        &app,
        post_json(
            "/api/train",
            json!({"session_id": sid, "model_type": "MLP", "test_size": "0.25", "hidden_layers": "8 4", "max_iter": 50}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["model_type"], "mlp");
    assert_eq!(body["metrics"]["n_test"], 10);
    assert_eq!(body["metrics"]["test_size"], 0.25);

    let (status, body) = send(
        &app,
        get(&format!("/api/confusion_matrix?session_id={}&model_type=mlp", sid)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confusion_matrix"].as_array().unwrap().len(), 2);
    assert!(body["confusion_matrix_html"].as_str().unwrap().starts_with("<table"));

    let (status, body) = send(
        &app,
        get(&format!("/api/confusion_matrix?session_id={}&model_type=mlp&format=html", sid)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_object().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        post_json("/api/save_model", json!({"session_id": sid, "model_type": "mlp", "model_name": "pets_v1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Model saved.");
    assert!(dir.path().join("pets_v1.json").exists());
}

#[tokio::test]
async fn test_missing_field() {
    let (app, _dir) = test_app(false);
    let (status, body) = send(&app, post_json("/api/preprocess", json!({"session_id": "x", "method": "onehot"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing field: target_column");

    let (status, body) = send(&app, post_json("/api/train", json!({"model_type": "mlp"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing field: session_id");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (app, _dir) = test_app(false);
    let (status, body) = send(
        &app,
        post_json("/api/train", json!({"session_id": "missing", "model_type": "perceptron"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid session_id. Upload a dataset first.");
}

#[tokio::test]
async fn test_train_before_preprocess() {
    let (app, _dir) = test_app(false);
    let (_, body) = send(&app, multipart_request("file", "pets.csv", &csv_dataset())).await;
    let sid = body["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, post_json("/api/train", json!({"session_id": sid, "model_type": "perceptron"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Preprocessing not configured yet.");
}

#[tokio::test]
async fn test_upload_rejections() {
    let (app, _dir) = test_app(false);

    let (status, body) = send(&app, multipart_request("data", "pets.csv", &csv_dataset())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file part named 'file' in request.");

    let (status, body) = send(&app, multipart_request("file", "pets.xlsx", "abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Unsupported file type"));
}

#[tokio::test]
async fn test_confusion_matrix_query_validation() {
    let (app, _dir) = test_app(false);
    let (status, body) = send(&app, get("/api/confusion_matrix?session_id=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing session_id or model_type query parameter.");
}

#[tokio::test]
async fn test_debug_sessions_gated() {
    let (app, _dir) = test_app(false);
    let (status, body) = send(&app, get("/api/debug/sessions")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Debug sessions endpoint not allowed.");

    let (app, _dir) = test_app(true);
    let (_, uploaded) = send(&app, multipart_request("file", "pets.csv", &csv_dataset())).await;
    let sid = uploaded["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get("/api/debug/sessions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[&sid]["rows"], 40);
    assert_eq!(body[&sid]["has_preprocessor"], false);
    assert_eq!(body[&sid]["num_models"], 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _dir) = test_app(false);
    let (status, body) = send(&app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
