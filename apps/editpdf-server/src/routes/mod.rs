//! Route modules for the EditPDF server

pub mod documents;
pub mod health;
pub mod pages;
mod params;

use axum::{extract::DefaultBodyLimit, Router};
use serde::Serialize;

use crate::state::AppState;

/// Room for multipart boundaries and form fields around an upload
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Body of every successful mutation
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}

/// Every `/api` route, with the body limit derived from the upload ceiling
/// (`0` lifts the limit).
pub fn api_router(max_upload_size: usize) -> Router<AppState> {
    let limit = if max_upload_size == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(max_upload_size.saturating_add(MULTIPART_OVERHEAD))
    };

    Router::new()
        .merge(documents::router())
        .merge(pages::router())
        .layer(limit)
}
