#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use quill_adapter::{
    AdapterRuntime, ApiError, FinalizeRequest, PlaceMarkRequest, ShareDocumentRequest,
    UploadDocumentRequest,
};

type Shared = Arc<Mutex<AdapterRuntime>>;
type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("QUILL_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let mut runtime = AdapterRuntime::default_from_env()?;
    bootstrap_seed_user(&mut runtime)?;
    let runtime = Arc::new(Mutex::new(runtime));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/documents", post(upload_document).get(list_documents))
        .route("/v1/documents/:document_id", get(get_document))
        .route("/v1/documents/:document_id/share", post(share_document))
        .route("/v1/public/:token", get(public_document))
        .route("/v1/marks", post(place_mark))
        .route("/v1/marks/:document_id", get(list_marks))
        .route("/v1/finalize", post(finalize_document))
        .route("/v1/audit/:document_id", get(audit_trail))
        .with_state(runtime);

    println!("quill_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Optional bootstrap identity: `QUILL_SEED_USER=<id>:<display name>[:<email>]`.
/// Prints a session token for it so a fresh process is immediately usable.
fn bootstrap_seed_user(runtime: &mut AdapterRuntime) -> Result<(), String> {
    let Ok(spec) = env::var("QUILL_SEED_USER") else {
        return Ok(());
    };
    let mut parts = spec.splitn(3, ':');
    let user_id = parts.next().unwrap_or_default();
    let display_name = parts.next().unwrap_or_default();
    let email = parts.next().filter(|e| !e.is_empty());
    if user_id.is_empty() || display_name.is_empty() {
        return Err("QUILL_SEED_USER must be <id>:<display name>[:<email>]".to_string());
    }
    runtime.seed_identity(user_id, display_name, email)?;
    let token = runtime.issue_session_token(user_id)?;
    println!("seeded identity {user_id}; session token: {token}");
    Ok(())
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}

fn peer_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

fn api_err(e: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = StatusCode::from_u16(e.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(e))
}

fn lock_poisoned() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            status: 500,
            reason: "adapter runtime lock poisoned".to_string(),
        }),
    )
}

async fn healthz(State(runtime): State<Shared>) -> ApiResult<quill_adapter::AdapterHealthResponse> {
    let runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    Ok(Json(runtime.health_report()))
}

async fn upload_document(
    State(runtime): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<UploadDocumentRequest>,
) -> ApiResult<quill_adapter::DocumentResponse> {
    let mut runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .upload_document(bearer(&headers).as_deref(), request, peer_ip(&headers).as_deref())
        .map(Json)
        .map_err(api_err)
}

async fn list_documents(
    State(runtime): State<Shared>,
    headers: HeaderMap,
) -> ApiResult<quill_adapter::DocumentListResponse> {
    let runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .list_documents(bearer(&headers).as_deref())
        .map(Json)
        .map_err(api_err)
}

async fn get_document(
    State(runtime): State<Shared>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> ApiResult<quill_adapter::DocumentResponse> {
    let runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .get_document(bearer(&headers).as_deref(), &document_id)
        .map(Json)
        .map_err(api_err)
}

async fn share_document(
    State(runtime): State<Shared>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
    Json(request): Json<ShareDocumentRequest>,
) -> ApiResult<quill_adapter::ShareDocumentResponse> {
    let mut runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .share_document(
            bearer(&headers).as_deref(),
            &document_id,
            request,
            peer_ip(&headers).as_deref(),
        )
        .map(Json)
        .map_err(api_err)
}

async fn public_document(
    State(runtime): State<Shared>,
    Path(token): Path<String>,
) -> ApiResult<quill_adapter::PublicDocumentResponse> {
    let runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime.public_document(&token).map(Json).map_err(api_err)
}

async fn place_mark(
    State(runtime): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<PlaceMarkRequest>,
) -> ApiResult<quill_adapter::MarkResponse> {
    let mut runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .place_mark(bearer(&headers).as_deref(), request, peer_ip(&headers).as_deref())
        .map(Json)
        .map_err(api_err)
}

async fn list_marks(
    State(runtime): State<Shared>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> ApiResult<quill_adapter::MarkListResponse> {
    let runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .list_marks(bearer(&headers).as_deref(), &document_id)
        .map(Json)
        .map_err(api_err)
}

async fn finalize_document(
    State(runtime): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<FinalizeRequest>,
) -> ApiResult<quill_adapter::FinalizeResponse> {
    let mut runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .finalize_document(bearer(&headers).as_deref(), request, peer_ip(&headers).as_deref())
        .map(Json)
        .map_err(api_err)
}

async fn audit_trail(
    State(runtime): State<Shared>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> ApiResult<quill_adapter::AuditTrailResponse> {
    let runtime = runtime.lock().map_err(|_| lock_poisoned())?;
    runtime
        .audit_trail(bearer(&headers).as_deref(), &document_id)
        .map(Json)
        .map_err(api_err)
}
