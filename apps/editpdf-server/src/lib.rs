//! EditPDF Server Library
//!
//! In-place PDF editing over HTTP. The main server binary is in main.rs.
//!
//! # Modules
//!
//! - `document`: Edit engine (sessions, text and image edits, history)
//! - `routes`: HTTP endpoints
//! - `mupdf`: Page rasterization via MuPDF

pub mod config;
pub mod document;
pub mod error;
#[cfg(feature = "mupdf")]
pub mod mupdf;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::document::PageRasterizer;
use crate::state::AppState;

/// Rasterizer compiled into this build
pub fn default_rasterizer() -> Arc<dyn PageRasterizer> {
    #[cfg(feature = "mupdf")]
    {
        Arc::new(crate::mupdf::MupdfRasterizer)
    }
    #[cfg(not(feature = "mupdf"))]
    {
        Arc::new(crate::document::NoRasterizer)
    }
}

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", routes::api_router(state.config().engine.max_upload_size));

    // The browser overlay is served last so it never shadows the API.
    if let Some(dir) = &state.config().server.static_dir {
        let index = dir.join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
