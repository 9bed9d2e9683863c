//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Body / Query | Response |
//! |--------|------|--------------|----------|
//! | `GET` | `/healthz` | | `{status, version}` |
//! | `POST` | `/ingest` | `{files: [{filename, content_base64}]}` | `{document_ids, message, documents}` |
//! | `POST` | `/ask` | `{question, document_ids?, top_k?}` | `{answer, citations}` |
//! | `POST` | `/extract` | `{document_id}` | extracted fields |
//! | `POST` | `/audit` | `{document_id}` | `{document_id, findings}` |
//! | `GET` | `/documents/{id}` | `?text=true` | document, pages, passages |
//! | `GET` | `/stats` | | index statistics |
//! | `POST` | `/webhook/events` | webhook event | receipt (demo receiver) |
//!
//! # Errors
//!
//! Every error is returned as `{"error": {"code", "message"}}`:
//!
//! | Status | Code | Cause |
//! |--------|------|-------|
//! | 400 | `bad_request` | invalid request body, non-PDF upload, bad base64 |
//! | 400 | `malformed_input` | unreadable PDF or PDF without pages |
//! | 404 | `not_found` | unknown document id |
//! | 503 | `embedding_unavailable` | embedding provider failed or disabled |
//! | 500 | `offset_out_of_range`, `invalid_configuration`, `store_error`, `internal_error` | |

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use contract_intel_core::CoreError;

use crate::analysis::{self, ExtractResponse};
use crate::ask::{self, AskResponse};
use crate::audit::AuditReport;
use crate::config::Config;
use crate::context::AppContext;
use crate::get::{get_document, DocumentResponse};
use crate::ingest::{ingest_bytes, IngestOutcome};
use crate::stats::{index_stats, IndexStats};
use crate::webhook::WebhookEvent;

/// Base64 inflates uploads by a third; this admits PDFs of roughly 48 MiB.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

type AppState = Arc<AppContext>;

pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/ask", post(handle_ask))
        .route("/extract", post(handle_extract))
        .route("/audit", post(handle_audit))
        .route("/documents/{id}", get(handle_get_document))
        .route("/stats", get(handle_stats))
        .route("/webhook/events", post(handle_webhook_event))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(ctx)
}

/// Serve the API on `[server] bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = Arc::new(AppContext::open(config).await?);
    let app = router(ctx);

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "server listening");
    println!("Contract Intelligence API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Map core error variants anywhere in the chain to a status code.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        let Some(core) = err.chain().find_map(|e| e.downcast_ref::<CoreError>()) else {
            return AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message);
        };

        let (status, code) = match core {
            CoreError::MalformedInput(_) => (StatusCode::BAD_REQUEST, "malformed_input"),
            CoreError::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::EmbeddingUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable")
            }
            CoreError::InvalidConfiguration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "invalid_configuration")
            }
            CoreError::OffsetOutOfRange { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "offset_out_of_range")
            }
            CoreError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        };
        AppError::new(status, code, message)
    }
}

// ============ GET /healthz ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct UploadedFile {
    filename: String,
    content_base64: String,
}

#[derive(Deserialize)]
struct IngestRequest {
    files: Vec<UploadedFile>,
}

#[derive(Serialize)]
struct IngestResponse {
    document_ids: Vec<String>,
    message: String,
    documents: Vec<IngestOutcome>,
}

async fn handle_ingest(
    State(ctx): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if req.files.is_empty() {
        return Err(bad_request("no files provided"));
    }

    // Validate every upload before ingesting any of them.
    let mut decoded = Vec::with_capacity(req.files.len());
    for file in req.files {
        if !file.filename.to_lowercase().ends_with(".pdf") {
            return Err(bad_request(format!(
                "File {} is not a PDF",
                file.filename
            )));
        }
        let bytes = STANDARD
            .decode(file.content_base64.trim())
            .map_err(|e| bad_request(format!("{}: invalid base64: {}", file.filename, e)))?;
        decoded.push((file.filename, bytes));
    }

    let mut documents = Vec::with_capacity(decoded.len());
    for (filename, bytes) in decoded {
        documents.push(ingest_bytes(&ctx, &filename, bytes).await?);
    }

    Ok(Json(IngestResponse {
        document_ids: documents
            .iter()
            .map(|d| d.report.document_id.clone())
            .collect(),
        message: format!("Successfully ingested {} document(s)", documents.len()),
        documents,
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    document_ids: Vec<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_ask(
    State(ctx): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let response = ask::ask(&ctx, &req.question, &req.document_ids, req.top_k).await?;
    Ok(Json(response))
}

// ============ POST /extract, POST /audit ============

#[derive(Deserialize)]
struct DocumentRequest {
    document_id: String,
}

async fn handle_extract(
    State(ctx): State<AppState>,
    Json(req): Json<DocumentRequest>,
) -> Result<Json<ExtractResponse>, AppError> {
    Ok(Json(analysis::extract_fields(&ctx, &req.document_id).await?))
}

async fn handle_audit(
    State(ctx): State<AppState>,
    Json(req): Json<DocumentRequest>,
) -> Result<Json<AuditReport>, AppError> {
    Ok(Json(analysis::audit(&ctx, &req.document_id).await?))
}

// ============ GET /documents/{id} ============

#[derive(Deserialize)]
struct DocumentQuery {
    #[serde(default)]
    text: bool,
}

async fn handle_get_document(
    State(ctx): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<DocumentResponse>, AppError> {
    Ok(Json(get_document(&ctx, &id, query.text).await?))
}

// ============ GET /stats ============

async fn handle_stats(State(ctx): State<AppState>) -> Result<Json<IndexStats>, AppError> {
    Ok(Json(index_stats(&ctx, 10).await?))
}

// ============ POST /webhook/events ============

#[derive(Serialize)]
struct WebhookReceipt {
    status: String,
    event_type: String,
    document_id: String,
    timestamp: DateTime<Utc>,
}

/// Demo receiver: acknowledges a delivered event without storing it.
async fn handle_webhook_event(Json(event): Json<WebhookEvent>) -> Json<WebhookReceipt> {
    tracing::info!(
        event_type = %event.event_type,
        document_id = %event.document_id,
        status = %event.status,
        "webhook event received"
    );
    Json(WebhookReceipt {
        status: "received".to_string(),
        event_type: event.event_type,
        document_id: event.document_id,
        timestamp: event.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ask::NO_ANSWER;
    use crate::context::testing::memory_context;
    use crate::extract::fixtures::pdf_with_pages;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app(dir: &std::path::Path) -> Router {
        router(Arc::new(memory_context(dir).await))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn upload(filename: &str, bytes: &[u8]) -> Value {
        json!({ "files": [{ "filename": filename, "content_base64": STANDARD.encode(bytes) }] })
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let (status, body) = call(&app, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_ingest_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let (status, body) =
            call(&app, Method::POST, "/ingest", Some(upload("notes.txt", b"hello"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_ingest_unreadable_pdf_is_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let (status, body) =
            call(&app, Method::POST, "/ingest", Some(upload("broken.pdf", b"%PDF-garbage"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "malformed_input");
    }

    #[tokio::test]
    async fn test_ingest_then_ask_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let pdf = pdf_with_pages(&[
            "Fees are payable monthly.",
            "The liability cap is one million dollars.",
        ]);

        let (status, body) = call(&app, Method::POST, "/ingest", Some(upload("msa.pdf", &pdf))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully ingested 1 document(s)");
        let id = body["document_ids"][0].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            "/ask",
            Some(json!({ "question": "What is the liability cap?", "document_ids": [id] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["answer"].as_str().unwrap().contains("liability cap"));
        let citations = body["citations"].as_array().unwrap();
        assert!(citations.iter().any(|c| c["page"] == 2));
        assert!(citations.iter().all(|c| c["document_id"] == id.as_str()));

        let (status, body) = call(&app, Method::GET, &format!("/documents/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pages"].as_array().unwrap().len(), 2);
        assert!(body.get("text").is_none());

        let (status, body) = call(&app, Method::GET, "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents"], 1);
    }

    #[tokio::test]
    async fn test_ask_with_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let (status, body) =
            call(&app, Method::POST, "/ask", Some(json!({ "question": "Who signs?" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], NO_ANSWER);
        assert_eq!(body["citations"], json!([]));

        let (status, _) = call(&app, Method::POST, "/ask", Some(json!({ "question": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let (status, body) = call(&app, Method::GET, "/documents/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");

        let (status, _) = call(
            &app,
            Method::POST,
            "/audit",
            Some(json!({ "document_id": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_receiver_echoes_event() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path()).await;
        let event = json!({
            "event_type": "audit_complete",
            "document_id": "doc-1",
            "status": "success",
            "message": "Audit completed with 2 findings",
            "timestamp": "2024-05-01T12:00:00Z"
        });
        let (status, body) = call(&app, Method::POST, "/webhook/events", Some(event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "received");
        assert_eq!(body["event_type"], "audit_complete");
        assert_eq!(body["document_id"], "doc-1");
    }
}
