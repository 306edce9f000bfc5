// src/server.rs

use crate::config::Config;
use crate::error::{DocParseError, Result};
use crate::heuristics::ParseResult;
use crate::pipeline::Pipeline;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

const PDF_MIME: &str = "application/pdf";

/// Document AI's online processing limit.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    id: i64,
    filename: String,
    created_at: Option<String>,
    result: ParseResult,
}

/// JSON `{"error": ...}` with a status picked from the error kind.
struct ApiError(StatusCode, String);

impl From<DocParseError> for ApiError {
    fn from(e: DocParseError) -> Self {
        let status = match e {
            DocParseError::NotPdf(_) | DocParseError::NoFile => StatusCode::BAD_REQUEST,
            DocParseError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            warn!(status = %self.0, error = %self.1, "Request failed");
        }
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/parse", post(parse_upload))
        .route("/api/history", get(list_history))
        .route("/api/history/:id", get(get_history))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

pub async fn serve(cfg: &Config, pipeline: Arc<Pipeline>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&cfg.server.bind).await?;
    info!(bind = %cfg.server.bind, "docuparse backend listening");
    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn parse_upload(
    State(pipeline): State<Arc<Pipeline>>,
    mut multipart: Multipart,
) -> std::result::Result<Json<ParseResult>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.content_type() != Some(PDF_MIME) {
            let got = field.content_type().unwrap_or("none").to_string();
            return Err(DocParseError::NotPdf(format!("content type {got}")).into());
        }

        let filename = field.file_name().unwrap_or("upload.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?;
        info!(filename = %filename, bytes = bytes.len(), "PDF upload received");

        let result = pipeline.parse(&filename, &bytes).await?;
        return Ok(Json(result));
    }
    Err(DocParseError::NoFile.into())
}

async fn list_history(
    State(pipeline): State<Arc<Pipeline>>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let list = pipeline
        .store()
        .lock()
        .await
        .list_documents()
        .map_err(DocParseError::from)?;
    Ok(Json(list))
}

async fn get_history(
    State(pipeline): State<Arc<Pipeline>>,
    Path(id): Path<i64>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let doc = pipeline
        .store()
        .lock()
        .await
        .get_document(id)
        .map_err(DocParseError::from)?
        .ok_or(DocParseError::NotFound(id))?;
    Ok(Json(HistoryEntry {
        id,
        filename: doc.filename,
        created_at: doc.created_at,
        result: doc.result,
    }))
}
