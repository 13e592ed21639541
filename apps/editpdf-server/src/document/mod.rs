//! PDF edit engine
//!
//! Loads a PDF into memory, enumerates the text spans and image placements
//! of its pages, and applies edits to them with per-document undo/redo.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    SessionManager                       │
//! │   (session table, idle eviction, spawn_blocking)        │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   DocumentSession                       │
//! │   RwLock { PdfDocument, History }  +  render LRU        │
//! └─────────────────────────────────────────────────────────┘
//!           │                │                 │
//!           ▼                ▼                 ▼
//!   ┌──────────────┐ ┌──────────────┐ ┌──────────────────┐
//!   │  text_edit   │ │  image_edit  │ │     extract      │
//!   └──────────────┘ └──────────────┘ └──────────────────┘
//!           │                │                 │
//!           └────────────────┼─────────────────┘
//!                            ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │   content (interpreter)  ·  fonts  ·  classifier     │
//!   └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use editpdf_server::document::{SessionManager, EngineSettings, SpanEdit};
//!
//! let manager = SessionManager::new(EngineSettings::default());
//! let created = manager.create(pdf_bytes).await?;
//!
//! let text = manager.page_text(&created.session_id, 0).await?;
//! manager.edit_span(&created.session_id, 0, SpanEdit {
//!     span_index: 0,
//!     new_text: "Goodbye".into(),
//!     font: None,
//!     size: None,
//!     color: None,
//! }).await?;
//! manager.undo(&created.session_id).await?;
//! ```

pub mod classifier;
pub mod content;
mod encoding;
mod error;
pub mod extract;
pub mod fonts;
pub mod geometry;
pub mod history;
pub mod image_edit;
pub mod model;
pub mod render;
pub mod session;
pub mod text_edit;
mod types;

pub use classifier::{classify, CanonicalFont, FontFamily};
pub use error::{EditError, Result};
pub use geometry::{Matrix, PageGeometry, Rect};
pub use model::PdfDocument;
pub use render::{clamp_scale, NoRasterizer, PageRasterizer, DEFAULT_RENDER_SCALE};
pub use session::{DocumentSession, EngineSettings, SessionManager};
pub use types::{
    CreatedSession, ImageBox, ImageDelete, ImageMove, ImagePlacement, ImageResize, PageImages,
    PageText, Rgb, SessionInfo, SpanEdit, TextInsert, TextSpan, DEFAULT_FONT_SIZE,
    LINE_HEIGHT_FACTOR, MAX_FONT_SIZE,
};
