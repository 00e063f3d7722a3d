//! Axum HTTP server for the web gateway.
//!
//! Serves the matter API: dashboard, matters, tasks, documents, officers and health.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::oneshot;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::channels::web::auth::{Actor, AuthState, auth_middleware};
use crate::channels::web::types::*;
use crate::db::{MatterDocumentStore, MatterTaskStore, ProfileStore, RecordStore};
use crate::error::{ChannelError, DatabaseError, MatterError, StorageError};
use crate::matters::documents::{self, Upload};
use crate::matters::intake::{self, DashboardStats};
use crate::matters::rollup::{self, TaskAdded};
use crate::matters::{
    MatterEdit, MatterIntake, MatterQuery, MatterView, NewTaskInput, PresetAnswer, TaskView,
};
use crate::storage::FileStore;

/// Per-request cap on document uploads (10 MiB).
pub const UPLOAD_FILE_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub store: Arc<dyn RecordStore>,
    pub files: Arc<dyn FileStore>,
    /// Bucket holding matter attachments.
    pub bucket: String,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
    /// Server startup time for uptime calculation.
    pub startup_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(store: Arc<dyn RecordStore>, files: Arc<dyn FileStore>, bucket: String) -> Self {
        Self {
            store,
            files,
            bucket,
            shutdown_tx: tokio::sync::RwLock::new(None),
            startup_time: std::time::Instant::now(),
        }
    }
}

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; frame-ancestors 'none'; base-uri 'none'; form-action 'none'";

type ApiError = (StatusCode, String);

/// Map a matter action failure onto an HTTP status.
pub fn matter_error_response(err: MatterError) -> ApiError {
    let status = match &err {
        MatterError::Validation(_) => StatusCode::BAD_REQUEST,
        MatterError::Database(db) => match db {
            DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
            DatabaseError::UnknownColumn { .. } => StatusCode::BAD_REQUEST,
            DatabaseError::Remote { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        MatterError::Storage(storage) => match storage {
            StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
            StorageError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            StorageError::AlreadyExists { .. } => StatusCode::CONFLICT,
            StorageError::Remote { .. } | StorageError::Request(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        MatterError::Consistency { .. } => StatusCode::CONFLICT,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "matter request failed");
    }
    (status, err.to_string())
}

fn db_error_response(err: DatabaseError) -> ApiError {
    matter_error_response(MatterError::Database(err))
}

/// Build the gateway router. `addr` is the listen address used for the CORS
/// allow-list.
pub fn build_router(state: Arc<GatewayState>, addr: SocketAddr, auth_token: String) -> Router {
    // Public routes (no auth)
    let public = Router::new().route("/api/health", get(health_handler));

    // Protected routes (require auth)
    let auth_state = AuthState { token: auth_token };
    let protected = Router::new()
        .route("/api/dashboard", get(dashboard_handler))
        // Matters
        .route(
            "/api/matters",
            get(matters_list_handler).post(matters_create_handler),
        )
        .route(
            "/api/matters/{id}",
            get(matter_detail_handler).patch(matter_edit_handler),
        )
        // Tasks
        .route(
            "/api/matters/{id}/tasks",
            get(tasks_list_handler).post(tasks_create_handler),
        )
        .route(
            "/api/matters/{id}/tasks/{task_id}",
            patch(task_status_handler),
        )
        // Documents
        .route(
            "/api/matters/{id}/documents",
            get(documents_list_handler)
                .post(documents_upload_handler)
                .layer(DefaultBodyLimit::max(UPLOAD_FILE_SIZE_LIMIT)),
        )
        .route(
            "/api/matters/{id}/documents/{doc_id}",
            axum::routing::delete(documents_delete_handler),
        )
        .route(
            "/api/matters/{id}/documents/{doc_id}/download",
            get(documents_download_handler),
        )
        // Officers
        .route("/api/officers", get(officers_list_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    // CORS: only the gateway's own origins are allowed.
    let origins: Vec<HeaderValue> = [
        format!("http://{}:{}", addr.ip(), addr.port()),
        format!("http://localhost:{}", addr.port()),
    ]
    .iter()
    .filter_map(|origin| HeaderValue::from_str(origin).ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(crate::channels::web::auth::PROFILE_HEADER),
        ]))
        .allow_credentials(true);

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<GatewayState>,
    auth_token: String,
) -> Result<SocketAddr, ChannelError> {
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "gateway".to_string(),
                reason: format!("Failed to bind to {}: {}", addr, e),
            })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("Failed to get local addr: {}", e),
        })?;

    let app = build_router(Arc::clone(&state), bound_addr, auth_token);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Web gateway shutting down");
            })
            .await
        {
            tracing::error!("Web gateway server error: {}", e);
        }
    });

    tracing::info!(%bound_addr, "Web gateway listening");
    Ok(bound_addr)
}

/// Signal a running server to stop. No-op if it was never started.
pub async fn shutdown(state: &GatewayState) {
    if let Some(tx) = state.shutdown_tx.write().await.take() {
        let _ = tx.send(());
    }
}

// --- Health ---

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        channel: "gateway",
        uptime_secs: state.startup_time.elapsed().as_secs(),
    })
}

// --- Dashboard ---

async fn dashboard_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<DashboardStats>, ApiError> {
    intake::dashboard(state.store.as_ref(), Utc::now())
        .await
        .map(Json)
        .map_err(matter_error_response)
}

// --- Matters ---

async fn matters_list_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<MatterQuery>,
) -> Result<Json<MattersListResponse>, ApiError> {
    let matters = intake::list_matters(state.store.as_ref(), &query, Utc::now())
        .await
        .map_err(matter_error_response)?;
    Ok(Json(MattersListResponse {
        total: matters.len(),
        matters,
    }))
}

async fn matters_create_handler(
    State(state): State<Arc<GatewayState>>,
    Actor(actor): Actor,
    Json(body): Json<MatterIntake>,
) -> Result<(StatusCode, Json<MatterView>), ApiError> {
    let now = Utc::now();
    let matter = intake::create_matter(state.store.as_ref(), body, actor, now.date_naive())
        .await
        .map_err(matter_error_response)?;
    Ok((StatusCode::CREATED, Json(MatterView::new(matter, now))))
}

async fn matter_detail_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatterView>, ApiError> {
    intake::matter_detail(state.store.as_ref(), id, Utc::now())
        .await
        .map(Json)
        .map_err(matter_error_response)
}

async fn matter_edit_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<MatterEdit>,
) -> Result<Json<MatterView>, ApiError> {
    let now = Utc::now();
    intake::edit_matter(state.store.as_ref(), id, body, now.date_naive())
        .await
        .map_err(matter_error_response)?;
    intake::matter_detail(state.store.as_ref(), id, now)
        .await
        .map(Json)
        .map_err(matter_error_response)
}

// --- Tasks ---

async fn tasks_list_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TasksListResponse>, ApiError> {
    let now = Utc::now();
    let tasks = state
        .store
        .list_matter_tasks(id)
        .await
        .map_err(db_error_response)?;
    Ok(Json(TasksListResponse {
        matter_id: id,
        tasks: tasks.into_iter().map(|t| TaskView::new(t, now)).collect(),
    }))
}

async fn tasks_create_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<NewTaskInput>,
) -> Result<(StatusCode, Json<TaskAdded>), ApiError> {
    rollup::add_task(state.store.as_ref(), id, body)
        .await
        .map(|added| (StatusCode::CREATED, Json(added)))
        .map_err(matter_error_response)
}

async fn task_status_handler(
    State(state): State<Arc<GatewayState>>,
    Path((id, task_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<TaskStatusRequest>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let now = Utc::now();
    let answer = PresetAnswer(body.confirm_matter_completion.unwrap_or(false));
    let changed = rollup::set_task_status(
        state.store.as_ref(),
        &answer,
        Some(id),
        task_id,
        body.status,
        now,
    )
    .await
    .map_err(matter_error_response)?;
    Ok(Json(TaskStatusResponse {
        completion_prompted: changed.rollup.prompted(),
        rollup: changed.rollup,
        task: TaskView::new(changed.task, now),
    }))
}

// --- Documents ---

async fn documents_list_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentsListResponse>, ApiError> {
    let documents = state
        .store
        .list_matter_documents(id)
        .await
        .map_err(db_error_response)?;
    Ok(Json(DocumentsListResponse {
        matter_id: id,
        documents,
    }))
}

async fn documents_upload_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<Uuid>,
    Actor(actor): Actor,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<crate::db::DocumentRecord>), ApiError> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut title = None;
    let mut doc_type = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Multipart read error: {e}"),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                // Basename only; the stored object key is generated separately.
                let file_name = field
                    .file_name()
                    .and_then(|n| n.rsplit(['/', '\\']).next())
                    .unwrap_or("upload")
                    .to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read upload body: {e}"),
                    )
                })?;
                file = Some((file_name, content_type, data));
            }
            "title" | "doc_type" => {
                let text = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read field '{name}': {e}"),
                    )
                })?;
                if name == "title" {
                    title = Some(text);
                } else {
                    doc_type = Some(text);
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown upload field"),
        }
    }

    let (file_name, content_type, bytes) = file.ok_or((
        StatusCode::BAD_REQUEST,
        "Missing 'file' field".to_string(),
    ))?;
    let upload = Upload {
        file_name,
        content_type,
        bytes,
        title,
        doc_type,
    };
    documents::upload_document(
        state.store.as_ref(),
        state.files.as_ref(),
        &state.bucket,
        id,
        upload,
        actor,
        Utc::now(),
    )
    .await
    .map(|doc| (StatusCode::CREATED, Json(doc)))
    .map_err(matter_error_response)
}

/// Quote-safe `filename` for Content-Disposition.
fn attachment_name(title: &str, storage_path: &str) -> String {
    let ext = std::path::Path::new(storage_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let stem: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect();
    let stem = stem.trim();
    let stem = if stem.is_empty() { "document" } else { stem };
    if stem.to_ascii_lowercase().ends_with(&format!(".{ext}")) {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

async fn documents_download_handler(
    State(state): State<Arc<GatewayState>>,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiError> {
    let (document, bytes) = documents::download_document(
        state.store.as_ref(),
        state.files.as_ref(),
        &state.bucket,
        id,
        doc_id,
    )
    .await
    .map_err(matter_error_response)?;

    let content_type = document
        .mime_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_name(&document.title, &document.storage_path)
    );
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}

async fn documents_delete_handler(
    State(state): State<Arc<GatewayState>>,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ActionResponse>, ApiError> {
    documents::delete_document(
        state.store.as_ref(),
        state.files.as_ref(),
        &state.bucket,
        id,
        doc_id,
    )
    .await
    .map_err(matter_error_response)?;
    Ok(Json(ActionResponse::ok(format!("Document {doc_id} deleted"))))
}

// --- Officers ---

async fn officers_list_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<OfficersResponse>, ApiError> {
    let officers = state
        .store
        .list_officers()
        .await
        .map_err(db_error_response)?;
    Ok(Json(OfficersResponse {
        officers: officers.into_iter().map(OfficerInfo::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::db::RecordKind;
    use crate::storage::LocalFileStore;
    use crate::testing::test_db;

    const TOKEN: &str = "test-token";

    async fn test_router() -> (Router, tempfile::TempDir, tempfile::TempDir) {
        let (db, db_dir) = test_db().await;
        let files_dir = tempfile::tempdir().expect("files dir");
        let files = Arc::new(LocalFileStore::new(files_dir.path().to_path_buf()));
        let state = Arc::new(GatewayState::new(db, files, "corporate-matters".to_string()));
        let addr: SocketAddr = "127.0.0.1:8787".parse().expect("addr");
        (build_router(state, addr, TOKEN.to_string()), db_dir, files_dir)
    }

    #[test]
    fn error_mapping_covers_each_layer() {
        let id = Uuid::nil();
        let cases = [
            (MatterError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                MatterError::Database(DatabaseError::NotFound {
                    kind: RecordKind::Matter,
                    id,
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                MatterError::Storage(StorageError::NotFound {
                    bucket: "b".to_string(),
                    path: "p".to_string(),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                MatterError::Consistency {
                    applied: "task created".to_string(),
                    failed_step: "matter update".to_string(),
                    source: DatabaseError::Query("down".to_string()),
                },
                StatusCode::CONFLICT,
            ),
            (
                MatterError::Database(DatabaseError::Query("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(matter_error_response(err).0, expected);
        }
    }

    #[test]
    fn attachment_name_keeps_extension_once() {
        assert_eq!(attachment_name("Lease.pdf", "m/1.pdf"), "Lease.pdf");
        assert_eq!(attachment_name("Lease draft", "m/1.pdf"), "Lease draft.pdf");
        assert_eq!(attachment_name("\"';", "m/1.docx"), "document.docx");
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _db, _files) = test_router().await;
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::X_CONTENT_TYPE_OPTIONS),
            Some(&HeaderValue::from_static("nosniff"))
        );
        let body = resp.into_body().collect().await.expect("body").to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let (app, _db, _files) = test_router().await;
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/matters")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/matters")
                    .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_profile_header_is_rejected() {
        let (app, _db, _files) = test_router().await;
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/matters")
                    .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-profile-id", "not-a-uuid")
                    .body(Body::from("{}"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
