//! Document API endpoints
//!
//! Session lifecycle and history:
//! - Upload a PDF and open a session
//! - Session info and disposal
//! - Undo / redo
//! - Download the edited PDF

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};

use crate::document::{CreatedSession, SessionInfo};
use crate::error::{AppError, Result};
use crate::state::AppState;

use super::params::SessionPath;
use super::StatusResponse;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_pdf))
        .route("/documents/:id", get(get_info).delete(dispose))
        .route("/documents/:id/undo", post(undo))
        .route("/documents/:id/redo", post(redo))
        .route("/documents/:id/download", get(download))
}

/// Upload a PDF and open an editing session
async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CreatedSession>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(AppError::BadRequest("Only PDF files are accepted".to_string()));
        }

        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }

        tracing::debug!(filename = %filename, bytes = data.len(), "Received PDF upload");
        let created = state.sessions().create(data.to_vec()).await?;
        tracing::info!(
            session_id = %created.session_id,
            filename = %filename,
            pages = created.page_count,
            "PDF uploaded"
        );
        return Ok(Json(created));
    }

    Err(AppError::BadRequest("Missing 'file' field".to_string()))
}

async fn get_info(
    State(state): State<AppState>,
    SessionPath(id): SessionPath,
) -> Result<Json<SessionInfo>> {
    Ok(Json(state.sessions().info(&id).await?))
}

async fn dispose(State(state): State<AppState>, SessionPath(id): SessionPath) -> Result<StatusCode> {
    state.sessions().dispose(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn undo(
    State(state): State<AppState>,
    SessionPath(id): SessionPath,
) -> Result<Json<StatusResponse>> {
    state.sessions().undo(&id).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn redo(
    State(state): State<AppState>,
    SessionPath(id): SessionPath,
) -> Result<Json<StatusResponse>> {
    state.sessions().redo(&id).await?;
    Ok(Json(StatusResponse::ok()))
}

/// Serialize the current document as an attachment
async fn download(State(state): State<AppState>, SessionPath(id): SessionPath) -> Result<Response> {
    let pdf = state.sessions().export(&id).await?;
    tracing::debug!(session_id = %id, bytes = pdf.len(), "Exporting document");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}.pdf\"", id),
        )
        .body(Body::from(pdf))?;

    Ok(response)
}
