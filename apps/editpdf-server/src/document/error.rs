//! Edit engine error types
//!
//! Every failure an engine operation can report. A failed mutation always
//! leaves the session's document exactly as it was before the call.

use thiserror::Error;

/// Unified edit engine error type
#[derive(Debug, Error)]
pub enum EditError {
    /// Uploaded bytes are not a usable PDF
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Upload exceeds the configured ceiling
    #[error("Document too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// Unknown session id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session id is not in the expected format
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Live session ceiling reached
    #[error("Too many open documents (max {0})")]
    TooManySessions(usize),

    /// Page index outside the document
    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    /// Span or image index no longer matches the page's enumeration
    #[error("{kind} index {index} out of range ({count} on page); re-fetch the page")]
    StaleIndex {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Text must not be empty")]
    EmptyText,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    /// Server built without a rasterizer
    #[error("Page rendering is not available in this build")]
    RenderUnavailable,

    #[error("Render error: {0}")]
    Render(String),

    /// Structural problem inside the PDF object graph
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EditError {
    pub fn stale_span(index: usize, count: usize) -> Self {
        EditError::StaleIndex {
            kind: "Span",
            index,
            count,
        }
    }

    pub fn stale_image(index: usize, count: usize) -> Self {
        EditError::StaleIndex {
            kind: "Image",
            index,
            count,
        }
    }
}

impl From<lopdf::Error> for EditError {
    fn from(err: lopdf::Error) -> Self {
        EditError::Pdf(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EditError {
    fn from(err: tokio::task::JoinError) -> Self {
        EditError::Internal(format!("Task join error: {}", err))
    }
}

#[cfg(feature = "mupdf")]
impl From<mupdf::Error> for EditError {
    fn from(err: mupdf::Error) -> Self {
        EditError::Render(err.to_string())
    }
}

/// Result type alias for edit engine operations
pub type Result<T> = std::result::Result<T, EditError>;
