//! Page API endpoints
//!
//! Everything addressed by `/documents/:id/pages/:page`:
//! - Render the page to PNG
//! - Enumerate text spans and image placements
//! - Text and image edits

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Multipart, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::document::{
    ImageDelete, ImageMove, ImageResize, PageImages, PageText, SpanEdit, TextInsert,
};
use crate::error::{AppError, Result};
use crate::state::AppState;

use super::params::{JsonBody, PagePath};
use super::StatusResponse;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/documents/:id/pages/:page/image", get(render_page))
        .route("/documents/:id/pages/:page/text", get(get_text))
        .route("/documents/:id/pages/:page/images", get(get_images))
        .route("/documents/:id/pages/:page/edit", post(edit_span))
        .route("/documents/:id/pages/:page/add", post(add_text))
        .route("/documents/:id/pages/:page/add-image", post(add_image))
        .route("/documents/:id/pages/:page/move-image", post(move_image))
        .route("/documents/:id/pages/:page/resize-image", post(resize_image))
        .route("/documents/:id/pages/:page/delete-image", post(delete_image))
}

/// Query parameters for page rendering
#[derive(Debug, Deserialize)]
pub struct PageRenderQuery {
    /// Pixels per point, clamped to the supported range
    pub scale: Option<f32>,
}

/// Render a page to PNG
async fn render_page(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
    query: std::result::Result<Query<PageRenderQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query?;
    let scale = query.scale.unwrap_or(state.config().render.default_scale);

    let png = state.sessions().render_page(&id, page, scale).await?;

    // Edits change the page in place, so clients must revalidate.
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(png.to_vec()))?;

    Ok(response)
}

async fn get_text(State(state): State<AppState>, PagePath { id, page }: PagePath) -> Result<Json<PageText>> {
    Ok(Json(state.sessions().page_text(&id, page).await?))
}

async fn get_images(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
) -> Result<Json<PageImages>> {
    Ok(Json(state.sessions().page_images(&id, page).await?))
}

/// Replace or delete a text span
async fn edit_span(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
    JsonBody(edit): JsonBody<SpanEdit>,
) -> Result<Json<StatusResponse>> {
    tracing::debug!(session_id = %id, page, index = edit.span_index, "Editing span");
    state.sessions().edit_span(&id, page, edit).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn add_text(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
    JsonBody(insert): JsonBody<TextInsert>,
) -> Result<Json<StatusResponse>> {
    state.sessions().add_text(&id, page, insert).await?;
    Ok(Json(StatusResponse::ok()))
}

/// Insert an uploaded image
///
/// Multipart fields: `file` (image/*), `x`, `y`, and optionally `width` and
/// `height`. Without a positive width and height the image is auto-sized.
async fn add_image(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
    mut multipart: Multipart,
) -> Result<Json<StatusResponse>> {
    let mut data = None;
    let mut x = None;
    let mut y = None;
    let mut width = None;
    let mut height = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let is_image = field
                    .content_type()
                    .is_some_and(|content_type| content_type.starts_with("image/"));
                if !is_image {
                    return Err(AppError::BadRequest("Only image files are accepted".to_string()));
                }
                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
                }
                data = Some(bytes.to_vec());
            }
            "x" => x = Some(number_field(&name, &field.text().await?)?),
            "y" => y = Some(number_field(&name, &field.text().await?)?),
            "width" => width = Some(number_field(&name, &field.text().await?)?),
            "height" => height = Some(number_field(&name, &field.text().await?)?),
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::BadRequest("Missing 'file' field".to_string()))?;
    let x = x.ok_or_else(|| AppError::BadRequest("Missing 'x' field".to_string()))?;
    let y = y.ok_or_else(|| AppError::BadRequest("Missing 'y' field".to_string()))?;
    let size = match (width, height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some((w, h)),
        _ => None,
    };

    tracing::debug!(session_id = %id, page, bytes = data.len(), x, y, "Adding image");
    state.sessions().add_image(&id, page, data, x, y, size).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn move_image(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
    JsonBody(request): JsonBody<ImageMove>,
) -> Result<Json<StatusResponse>> {
    state.sessions().move_image(&id, page, request).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn resize_image(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
    JsonBody(request): JsonBody<ImageResize>,
) -> Result<Json<StatusResponse>> {
    state.sessions().resize_image(&id, page, request).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn delete_image(
    State(state): State<AppState>,
    PagePath { id, page }: PagePath,
    JsonBody(request): JsonBody<ImageDelete>,
) -> Result<Json<StatusResponse>> {
    state.sessions().delete_image(&id, page, request).await?;
    Ok(Json(StatusResponse::ok()))
}

fn number_field(name: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Field '{}' must be a number, got '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_field() {
        assert_eq!(number_field("x", " 12.5 ").unwrap(), 12.5);
        assert!(matches!(number_field("x", "left"), Err(AppError::BadRequest(_))));
    }
}
