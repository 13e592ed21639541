//! Error types for the EditPDF server

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::document::EditError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),

    #[error("Invalid path: {0}")]
    Path(#[from] PathRejection),

    #[error("Invalid query: {0}")]
    Query(#[from] QueryRejection),

    #[error("Response error: {0}")]
    Http(#[from] axum::http::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Edit(e) => edit_parts(e),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Multipart(e) => (e.status(), "bad_request", e.body_text()),
            AppError::Json(e) => (e.status(), "bad_request", e.body_text()),
            AppError::Path(e) => (e.status(), "bad_request", e.body_text()),
            AppError::Query(e) => (e.status(), "bad_request", e.body_text()),
            AppError::Http(e) => {
                tracing::error!("Failed to build response: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

fn edit_parts(e: &EditError) -> (StatusCode, &'static str, String) {
    match e {
        EditError::InvalidDocument(_)
        | EditError::InvalidSessionId(_)
        | EditError::InvalidGeometry(_)
        | EditError::InvalidColor(_)
        | EditError::InvalidSize(_)
        | EditError::InvalidImage(_)
        | EditError::EmptyText => (StatusCode::BAD_REQUEST, "bad_request", e.to_string()),
        EditError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "too_large", e.to_string()),
        EditError::NotFound(_) | EditError::PageOutOfRange { .. } => {
            (StatusCode::NOT_FOUND, "not_found", e.to_string())
        }
        EditError::StaleIndex { .. } => (StatusCode::NOT_FOUND, "stale_index", e.to_string()),
        EditError::NothingToUndo | EditError::NothingToRedo => {
            (StatusCode::NOT_FOUND, "no_history", e.to_string())
        }
        EditError::TooManySessions(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "too_many_sessions", e.to_string())
        }
        EditError::RenderUnavailable => {
            (StatusCode::NOT_IMPLEMENTED, "render_unavailable", e.to_string())
        }
        EditError::Render(msg) => {
            tracing::error!("Render error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "render_error",
                "Failed to render page".to_string(),
            )
        }
        EditError::Pdf(msg) => {
            tracing::error!("PDF error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "pdf_error",
                "Failed to process PDF".to_string(),
            )
        }
        EditError::Internal(msg) => {
            tracing::error!("Internal error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, detail) = self.parts();
        (status, Json(ErrorResponse { error, detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: EditError) -> StatusCode {
        AppError::from(e).parts().0
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(EditError::EmptyText), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(EditError::InvalidSessionId("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(EditError::TooLarge { size: 2, max: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status_of(EditError::stale_span(3, 1)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(EditError::NothingToRedo), StatusCode::NOT_FOUND);
        assert_eq!(status_of(EditError::TooManySessions(1)), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(EditError::RenderUnavailable), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn test_internal_detail_is_generic() {
        let (status, _, detail) = AppError::from(EditError::Pdf("xref 12 broken".into())).parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!detail.contains("xref"));
    }
}
