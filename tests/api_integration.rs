//! End-to-end tests for the matter API.
//!
//! Most tests drive the router in-process with `tower::ServiceExt::oneshot`
//! against a temp-file libSQL store and a temp-dir file store. One test starts
//! a real server on a random port and talks to it over HTTP.
#![cfg(feature = "libsql")]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use matterdesk::channels::web::server::{self, GatewayState, build_router, start_server};
use matterdesk::db::libsql::LibSqlBackend;
use matterdesk::db::{NewProfileRecord, ProfileStore, RecordStore};
use matterdesk::storage::LocalFileStore;

const AUTH_TOKEN: &str = "test-token-12345";
const BUCKET: &str = "corporate-matters";

struct Harness {
    app: Router,
    store: Arc<dyn RecordStore>,
    files_root: std::path::PathBuf,
    _db_dir: tempfile::TempDir,
    _files_dir: tempfile::TempDir,
}

async fn harness() -> Harness {
    let db_dir = tempfile::tempdir().expect("db dir");
    let backend = LibSqlBackend::new_local(&db_dir.path().join("api.db"))
        .await
        .expect("backend");
    backend.run_migrations().await.expect("migrations");
    let store: Arc<dyn RecordStore> = Arc::new(backend);

    let files_dir = tempfile::tempdir().expect("files dir");
    let files = Arc::new(LocalFileStore::new(files_dir.path().to_path_buf()));
    let state = Arc::new(GatewayState::new(
        Arc::clone(&store),
        files,
        BUCKET.to_string(),
    ));
    let addr: SocketAddr = "127.0.0.1:8787".parse().expect("addr");
    Harness {
        app: build_router(state, addr, AUTH_TOKEN.to_string()),
        store,
        files_root: files_dir.path().to_path_buf(),
        _db_dir: db_dir,
        _files_dir: files_dir,
    }
}

fn authed(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {AUTH_TOKEN}"))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(request).await.expect("response");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = authed(method, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, authed(Method::GET, uri).body(Body::empty()).expect("request")).await
}

fn intake_body() -> Value {
    json!({
        "type_of_matter": "Legal Advice",
        "request_form": "Email",
        "requester_name": "Sione Fifita",
        "requesting_division": "Lands",
        "date_requested": "2024-03-01",
        "date_received": "2024-03-04",
        "request_type": "Legal Opinion"
    })
}

async fn create_matter(app: &Router) -> String {
    let (status, body) = send_json(app, Method::POST, "/api/matters", intake_body()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().expect("matter id").to_string()
}

#[tokio::test]
async fn intake_computes_due_date_and_lists_newest_first() {
    let h = harness().await;

    let (status, body) = send_json(&h.app, Method::POST, "/api/matters", intake_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["due_date"], "2024-03-18");
    // Received long ago and still open.
    assert_eq!(body["is_overdue"], true);
    assert_eq!(body["is_due_soon"], false);

    let mut second = intake_body();
    second["requester_name"] = json!("Ana Vea");
    second["requesting_division"] = json!("Treasury");
    let (status, _) = send_json(&h.app, Method::POST, "/api/matters", second).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = get(&h.app, "/api/matters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 2);
    assert_eq!(list["matters"][0]["requester_name"], "Ana Vea");

    let (_, found) = get(&h.app, "/api/matters?search=treasury").await;
    assert_eq!(found["total"], 1);
    assert_eq!(found["matters"][0]["requester_name"], "Ana Vea");

    let (_, none) = get(&h.app, "/api/matters?status=Completed").await;
    assert_eq!(none["total"], 0);
}

#[tokio::test]
async fn intake_validation_errors_are_bad_requests() {
    let h = harness().await;
    let mut body = intake_body();
    body["requester_name"] = json!("  ");
    let (status, _) = send_json(&h.app, Method::POST, "/api/matters", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = intake_body();
    body["request_type"] = json!("Horoscope");
    let (status, _) = send_json(&h.app, Method::POST, "/api/matters", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_matter_is_not_found() {
    let h = harness().await;
    let (status, _) = get(&h.app, &format!("/api/matters/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_rollup_moves_matter_through_its_lifecycle() {
    let h = harness().await;
    let matter_id = create_matter(&h.app).await;
    let tasks_uri = format!("/api/matters/{matter_id}/tasks");

    // Rule A: first task escalates Pending to In Progress.
    let (status, added) = send_json(
        &h.app,
        Method::POST,
        &tasks_uri,
        json!({ "description": "Review lease", "task_type": "Research" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{added}");
    assert_eq!(added["escalated"], true);
    assert_eq!(added["matter_status"], "In Progress");
    let first = added["task"]["id"].as_str().expect("task id").to_string();

    let (_, added) = send_json(
        &h.app,
        Method::POST,
        &tasks_uri,
        json!({ "description": "Draft opinion" }),
    )
    .await;
    assert_eq!(added["escalated"], false);
    let second = added["task"]["id"].as_str().expect("task id").to_string();

    // Completing one of two tasks does not prompt.
    let (status, changed) = send_json(
        &h.app,
        Method::PATCH,
        &format!("{tasks_uri}/{first}"),
        json!({ "status": "Completed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["rollup"], "not_triggered");
    assert_eq!(changed["completion_prompted"], false);
    assert!(changed["task"]["completed_at"].is_string());

    // Completing the last task with confirmation completes the matter.
    let (status, changed) = send_json(
        &h.app,
        Method::PATCH,
        &format!("{tasks_uri}/{second}"),
        json!({ "status": "Completed", "confirm_matter_completion": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["rollup"], "matter_completed");
    assert_eq!(changed["completion_prompted"], true);

    let (_, matter) = get(&h.app, &format!("/api/matters/{matter_id}")).await;
    assert_eq!(matter["status"], "Completed");
    assert_eq!(matter["is_overdue"], false);

    let (_, tasks) = get(&h.app, &tasks_uri).await;
    assert_eq!(tasks["tasks"].as_array().map(Vec::len), Some(2));
    assert_eq!(tasks["tasks"][0]["id"], second.as_str());

    // A completed task cannot be changed again.
    let (status, _) = send_json(
        &h.app,
        Method::PATCH,
        &format!("{tasks_uri}/{first}"),
        json!({ "status": "Pending" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn declined_completion_leaves_matter_in_progress() {
    let h = harness().await;
    let matter_id = create_matter(&h.app).await;
    let tasks_uri = format!("/api/matters/{matter_id}/tasks");
    let (_, added) = send_json(
        &h.app,
        Method::POST,
        &tasks_uri,
        json!({ "description": "Only task" }),
    )
    .await;
    let task_id = added["task"]["id"].as_str().expect("task id").to_string();

    let (status, changed) = send_json(
        &h.app,
        Method::PATCH,
        &format!("{tasks_uri}/{task_id}"),
        json!({ "status": "Completed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["rollup"], "declined");
    assert_eq!(changed["completion_prompted"], true);

    let (_, matter) = get(&h.app, &format!("/api/matters/{matter_id}")).await;
    assert_eq!(matter["status"], "In Progress");

    // The client asked its user and closes the matter with a manual edit.
    let (status, edited) = send_json(
        &h.app,
        Method::PATCH,
        &format!("/api/matters/{matter_id}"),
        json!({ "status": "Completed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["status"], "Completed");
    assert_eq!(edited["due_date"], "2024-03-18");
}

#[tokio::test]
async fn task_must_belong_to_matter_in_path() {
    let h = harness().await;
    let first = create_matter(&h.app).await;
    let other = create_matter(&h.app).await;
    let (_, added) = send_json(
        &h.app,
        Method::POST,
        &format!("/api/matters/{first}/tasks"),
        json!({ "description": "Review" }),
    )
    .await;
    let task_id = added["task"]["id"].as_str().expect("task id").to_string();

    let (status, _) = send_json(
        &h.app,
        Method::PATCH,
        &format!("/api/matters/{other}/tasks/{task_id}"),
        json!({ "status": "In Progress" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assignment_resolves_officer_and_officers_are_listed() {
    let h = harness().await;
    let officer = h
        .store
        .create_profile(&NewProfileRecord {
            id: None,
            email: "lo@example.gov".to_string(),
            full_name: Some("Losaline Officer".to_string()),
            role: Some("legal_officer".to_string()),
            division: Some("Legal".to_string()),
        })
        .await
        .expect("officer");
    h.store
        .create_profile(&NewProfileRecord {
            id: None,
            email: "clerk@example.gov".to_string(),
            full_name: Some("Clerk".to_string()),
            role: Some("clerk".to_string()),
            division: None,
        })
        .await
        .expect("clerk");

    let (status, officers) = get(&h.app, "/api/officers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(officers["officers"].as_array().map(Vec::len), Some(1));
    assert_eq!(officers["officers"][0]["full_name"], "Losaline Officer");

    let matter_id = create_matter(&h.app).await;
    let (status, edited) = send_json(
        &h.app,
        Method::PATCH,
        &format!("/api/matters/{matter_id}"),
        json!({ "assigned_officer": officer.id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["assigned_officer_name"], "Losaline Officer");
    assert!(edited["assigned_date"].is_string());

    let (_, cleared) = send_json(
        &h.app,
        Method::PATCH,
        &format!("/api/matters/{matter_id}"),
        json!({ "assigned_officer": null }),
    )
    .await;
    assert_eq!(cleared["assigned_officer"], Value::Null);
    assert_eq!(cleared["assigned_date"], Value::Null);
}

fn multipart_body(boundary: &str, file_name: &str, bytes: &[u8], doc_type: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nSigned lease\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"doc_type\"\r\n\r\n{doc_type}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn document_upload_download_and_delete() {
    let h = harness().await;
    let matter_id = create_matter(&h.app).await;
    let docs_uri = format!("/api/matters/{matter_id}/documents");
    let boundary = "matterdesk-boundary";
    let payload = b"%PDF-1.7 signed lease";

    let request = authed(Method::POST, &docs_uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body(
            boundary,
            "lease.pdf",
            payload,
            "Final Contract",
        )))
        .expect("request");
    let (status, doc) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{doc}");
    assert_eq!(doc["title"], "Signed lease");
    assert_eq!(doc["doc_type"], "Final Contract");
    assert_eq!(doc["mime_type"], "application/pdf");
    assert_eq!(doc["file_size"], payload.len());
    let doc_id = doc["id"].as_str().expect("doc id").to_string();
    let storage_path = doc["storage_path"].as_str().expect("path").to_string();
    assert!(storage_path.starts_with(&format!("{matter_id}/")));
    assert!(h.files_root.join(BUCKET).join(&storage_path).exists());

    let (_, listed) = get(&h.app, &docs_uri).await;
    assert_eq!(listed["documents"][0]["id"], doc_id.as_str());

    let resp = h
        .app
        .clone()
        .oneshot(
            authed(Method::GET, &format!("{docs_uri}/{doc_id}/download"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&bytes[..], payload);

    let (status, deleted) = send(
        &h.app,
        authed(Method::DELETE, &format!("{docs_uri}/{doc_id}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["success"], true);
    assert!(!h.files_root.join(BUCKET).join(&storage_path).exists());

    let (_, listed) = get(&h.app, &docs_uri).await;
    assert_eq!(listed["documents"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn upload_with_unknown_doc_type_stores_nothing() {
    let h = harness().await;
    let matter_id = create_matter(&h.app).await;
    let boundary = "matterdesk-boundary";
    let request = authed(Method::POST, &format!("/api/matters/{matter_id}/documents"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body(
            boundary,
            "lease.pdf",
            b"data",
            "Napkin Sketch",
        )))
        .expect("request");
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!h.files_root.join(BUCKET).exists());
}

#[tokio::test]
async fn dashboard_counts_statuses() {
    let h = harness().await;
    let first = create_matter(&h.app).await;
    create_matter(&h.app).await;
    send_json(
        &h.app,
        Method::POST,
        &format!("/api/matters/{first}/tasks"),
        json!({ "description": "Review" }),
    )
    .await;

    let (status, stats) = get(&h.app, "/api/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["in_progress"], 1);
    assert_eq!(stats["completed"], 0);
    assert_eq!(stats["overdue"], 2);
    assert_eq!(stats["recent"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn server_serves_over_tcp_and_shuts_down() {
    let h = harness().await;
    let state = Arc::new(GatewayState::new(
        Arc::clone(&h.store),
        Arc::new(LocalFileStore::new(h.files_root.clone())),
        BUCKET.to_string(),
    ));
    let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let bound = start_server(addr, Arc::clone(&state), AUTH_TOKEN.to_string())
        .await
        .expect("server should start");

    let client = reqwest::Client::new();
    let health = client
        .get(format!("http://{bound}/api/health"))
        .send()
        .await
        .expect("health");
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    let denied = client
        .get(format!("http://{bound}/api/dashboard"))
        .send()
        .await
        .expect("dashboard");
    assert_eq!(denied.status(), reqwest::StatusCode::UNAUTHORIZED);

    let allowed = client
        .get(format!("http://{bound}/api/dashboard"))
        .bearer_auth(AUTH_TOKEN)
        .send()
        .await
        .expect("dashboard");
    assert_eq!(allowed.status(), reqwest::StatusCode::OK);

    server::shutdown(&state).await;
}
