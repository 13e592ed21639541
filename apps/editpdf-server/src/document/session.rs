//! Document Session Manager
//!
//! Owns every open document. Each session pairs one parsed PDF with its
//! undo/redo history behind a reader/writer lock:
//! - edits, undo and redo take the write lock and are atomic
//! - extraction, rendering and export share the read lock
//!
//! Engine work is CPU bound and runs on the blocking thread pool.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::error::{EditError, Result};
use super::extract;
use super::history::History;
use super::image_edit;
use super::model::PdfDocument;
use super::render::{clamp_scale, NoRasterizer, PageRasterizer};
use super::text_edit;
use super::types::{
    CreatedSession, ImageDelete, ImageMove, ImageResize, PageImages, PageText, SessionInfo,
    SpanEdit, TextInsert,
};

/// Length of a session id in hex characters.
pub const SESSION_ID_LEN: usize = 16;

/// How often idle sessions are looked for.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Engine limits
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Largest accepted upload in bytes (0 = unlimited)
    pub max_document_bytes: usize,
    /// Undo depth per session (0 = unlimited)
    pub max_undo: usize,
    /// Live session ceiling (0 = unlimited)
    pub max_sessions: usize,
    /// Sessions idle this long are evicted (`None` = never)
    pub idle_timeout: Option<Duration>,
    /// Rendered pages kept per session
    pub render_cache_pages: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_document_bytes: 50 * 1024 * 1024,
            max_undo: 20,
            max_sessions: 64,
            idle_timeout: Some(Duration::from_secs(120 * 60)),
            render_cache_pages: 32,
        }
    }
}

// ============================================================================
// Document Session
// ============================================================================

/// Render cache key: page and scale in hundredths
type RenderKey = (usize, u32);

struct SessionState {
    document: PdfDocument,
    history: History,
}

/// One open document and its history
pub struct DocumentSession {
    id: String,
    page_count: usize,
    created_at: DateTime<Utc>,
    last_accessed: Mutex<DateTime<Utc>>,
    state: RwLock<SessionState>,
    renders: Mutex<LruCache<RenderKey, Arc<Vec<u8>>>>,
}

impl DocumentSession {
    fn new(id: String, document: PdfDocument, settings: &EngineSettings) -> Self {
        let now = Utc::now();
        let capacity = NonZeroUsize::new(settings.render_cache_pages).unwrap_or(NonZeroUsize::MIN);
        Self {
            id,
            page_count: document.page_count(),
            created_at: now,
            last_accessed: Mutex::new(now),
            state: RwLock::new(SessionState {
                document,
                history: History::new(settings.max_undo),
            }),
            renders: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        *self.last_accessed.lock()
    }

    fn touch(&self) {
        *self.last_accessed.lock() = Utc::now();
    }

    fn check_page(&self, page: usize) -> Result<()> {
        if page >= self.page_count {
            return Err(EditError::PageOutOfRange {
                page,
                count: self.page_count,
            });
        }
        Ok(())
    }

    /// Run `f` with exclusive access. A snapshot is taken first; if `f`
    /// fails the document and history are restored exactly.
    pub fn mutate<T>(
        &self,
        page: Option<usize>,
        label: &str,
        f: impl FnOnce(&mut PdfDocument) -> Result<T>,
    ) -> Result<T> {
        if let Some(page) = page {
            self.check_page(page)?;
        }
        let mut state = self.state.write();
        let SessionState { document, history } = &mut *state;

        let checkpoint = history.snapshot_before(document, page, label);
        match f(document) {
            Ok(value) => {
                self.renders.lock().clear();
                tracing::debug!(
                    session_id = %self.id,
                    page = ?page,
                    operation = label,
                    undo_depth = history.undo_depth(),
                    "Mutation applied"
                );
                Ok(value)
            }
            Err(e) => {
                history.rollback(checkpoint, document);
                tracing::debug!(
                    session_id = %self.id,
                    page = ?page,
                    operation = label,
                    error = %e,
                    "Mutation rolled back"
                );
                Err(e)
            }
        }
    }

    /// Run `f` with shared access.
    pub fn read<T>(&self, page: Option<usize>, f: impl FnOnce(&PdfDocument) -> Result<T>) -> Result<T> {
        if let Some(page) = page {
            self.check_page(page)?;
        }
        let state = self.state.read();
        f(&state.document)
    }

    pub fn undo(&self) -> Result<String> {
        let mut state = self.state.write();
        let SessionState { document, history } = &mut *state;
        let label = history.undo(document)?;
        self.renders.lock().clear();
        tracing::info!(session_id = %self.id, operation = %label, "Undo");
        Ok(label)
    }

    pub fn redo(&self) -> Result<String> {
        let mut state = self.state.write();
        let SessionState { document, history } = &mut *state;
        let label = history.redo(document)?;
        self.renders.lock().clear();
        tracing::info!(session_id = %self.id, operation = %label, "Redo");
        Ok(label)
    }

    /// Serialize the current state.
    pub fn export(&self) -> Result<Vec<u8>> {
        self.read(None, PdfDocument::save)
    }

    pub fn info(&self) -> SessionInfo {
        let state = self.state.read();
        SessionInfo {
            session_id: self.id.clone(),
            page_count: self.page_count,
            can_undo: state.history.can_undo(),
            can_redo: state.history.can_redo(),
            undo_depth: state.history.undo_depth(),
            redo_depth: state.history.redo_depth(),
            created_at: self.created_at,
            last_accessed: self.last_accessed(),
        }
    }

    /// PNG of one page of the current state, cached until the next mutation.
    pub fn render_page(&self, page: usize, scale: f32, rasterizer: &dyn PageRasterizer) -> Result<Arc<Vec<u8>>> {
        self.check_page(page)?;
        let scale = clamp_scale(scale);
        let key = (page, (scale * 100.0).round() as u32);

        // Held until the result is cached so a mutation cannot slip in between
        let state = self.state.read();
        let cached = self.renders.lock().get(&key).cloned();
        if let Some(png) = cached {
            tracing::trace!(session_id = %self.id, page, "Render cache hit");
            return Ok(png);
        }

        let pdf = state.document.save()?;
        let png = Arc::new(rasterizer.render_png(&pdf, page, scale)?);
        self.renders.lock().put(key, png.clone());
        tracing::debug!(
            session_id = %self.id,
            page,
            scale,
            bytes = png.len(),
            renderer = rasterizer.name(),
            "Page rendered"
        );
        Ok(png)
    }
}

// ============================================================================
// Session Manager
// ============================================================================

/// Manages document sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    /// Open sessions indexed by id
    sessions: tokio::sync::RwLock<HashMap<String, Arc<DocumentSession>>>,
    settings: EngineSettings,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl SessionManager {
    /// Create a session manager without a rendering backend
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_rasterizer(settings, Arc::new(NoRasterizer))
    }

    pub fn with_rasterizer(settings: EngineSettings, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                sessions: tokio::sync::RwLock::new(HashMap::new()),
                settings,
                rasterizer,
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Open a document from uploaded bytes
    pub async fn create(&self, bytes: Vec<u8>) -> Result<CreatedSession> {
        let max = self.inner.settings.max_document_bytes;
        if max > 0 && bytes.len() > max {
            return Err(EditError::TooLarge {
                size: bytes.len(),
                max,
            });
        }
        let size = bytes.len();

        let (document, digest) = tokio::task::spawn_blocking(move || {
            let document = PdfDocument::load(&bytes)?;
            Ok::<_, EditError>((document, hex::encode(Sha256::digest(&bytes))))
        })
        .await??;

        let mut sessions = self.inner.sessions.write().await;
        let max_sessions = self.inner.settings.max_sessions;
        if max_sessions > 0 && sessions.len() >= max_sessions {
            tracing::warn!(open = sessions.len(), "Session limit reached");
            return Err(EditError::TooManySessions(max_sessions));
        }

        let id = loop {
            let candidate = new_session_id(&digest);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = Arc::new(DocumentSession::new(id.clone(), document, &self.inner.settings));
        let page_count = session.page_count();
        sessions.insert(id.clone(), session);

        tracing::info!(session_id = %id, size, page_count, "Opened document session");

        Ok(CreatedSession {
            session_id: id,
            page_count,
        })
    }

    /// Look up a session and mark it as used
    pub async fn get(&self, id: &str) -> Result<Arc<DocumentSession>> {
        if !is_valid_session_id(id) {
            return Err(EditError::InvalidSessionId(id.to_string()));
        }
        let sessions = self.inner.sessions.read().await;
        let session = sessions
            .get(id)
            .cloned()
            .ok_or_else(|| EditError::NotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Close a session, releasing its document and history
    pub async fn dispose(&self, id: &str) -> Result<()> {
        if !is_valid_session_id(id) {
            return Err(EditError::InvalidSessionId(id.to_string()));
        }
        let removed = self.inner.sessions.write().await.remove(id);
        match removed {
            Some(_) => {
                tracing::info!(session_id = %id, "Disposed document session");
                Ok(())
            }
            None => Err(EditError::NotFound(id.to_string())),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// Run a mutation atomically with exclusive access to the document
    pub async fn with_mutable_access<T, F>(
        &self,
        id: &str,
        page: Option<usize>,
        label: &'static str,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut PdfDocument) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let session = self.get(id).await?;
        tokio::task::spawn_blocking(move || session.mutate(page, label, f)).await?
    }

    /// Run a read with shared access to the document
    pub async fn with_read_access<T, F>(&self, id: &str, page: Option<usize>, f: F) -> Result<T>
    where
        F: FnOnce(&PdfDocument) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let session = self.get(id).await?;
        tokio::task::spawn_blocking(move || session.read(page, f)).await?
    }

    pub async fn info(&self, id: &str) -> Result<SessionInfo> {
        Ok(self.get(id).await?.info())
    }

    pub async fn export(&self, id: &str) -> Result<Vec<u8>> {
        self.with_read_access(id, None, |doc| doc.save()).await
    }

    pub async fn undo(&self, id: &str) -> Result<()> {
        let session = self.get(id).await?;
        tokio::task::spawn_blocking(move || session.undo()).await??;
        Ok(())
    }

    pub async fn redo(&self, id: &str) -> Result<()> {
        let session = self.get(id).await?;
        tokio::task::spawn_blocking(move || session.redo()).await??;
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn render_page(&self, id: &str, page: usize, scale: f32) -> Result<Arc<Vec<u8>>> {
        let session = self.get(id).await?;
        let rasterizer = self.inner.rasterizer.clone();
        tokio::task::spawn_blocking(move || session.render_page(page, scale, rasterizer.as_ref())).await?
    }

    pub async fn page_text(&self, id: &str, page: usize) -> Result<PageText> {
        self.with_read_access(id, Some(page), move |doc| extract::page_text(doc, page))
            .await
    }

    pub async fn page_images(&self, id: &str, page: usize) -> Result<PageImages> {
        self.with_read_access(id, Some(page), move |doc| extract::page_images(doc, page))
            .await
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub async fn edit_span(&self, id: &str, page: usize, edit: SpanEdit) -> Result<()> {
        let label = if edit.new_text.is_empty() { "delete_text" } else { "edit_text" };
        self.with_mutable_access(id, Some(page), label, move |doc| {
            text_edit::edit_span(doc, page, &edit)
        })
        .await
    }

    pub async fn add_text(&self, id: &str, page: usize, insert: TextInsert) -> Result<()> {
        self.with_mutable_access(id, Some(page), "add_text", move |doc| {
            text_edit::add_text(doc, page, &insert)
        })
        .await
    }

    pub async fn add_image(
        &self,
        id: &str,
        page: usize,
        data: Vec<u8>,
        x: f64,
        y: f64,
        size: Option<(f64, f64)>,
    ) -> Result<()> {
        self.with_mutable_access(id, Some(page), "add_image", move |doc| {
            image_edit::add_image(doc, page, &data, x, y, size)
        })
        .await
    }

    pub async fn move_image(&self, id: &str, page: usize, request: ImageMove) -> Result<()> {
        self.with_mutable_access(id, Some(page), "move_image", move |doc| {
            image_edit::move_image(doc, page, &request)
        })
        .await
    }

    pub async fn resize_image(&self, id: &str, page: usize, request: ImageResize) -> Result<()> {
        self.with_mutable_access(id, Some(page), "resize_image", move |doc| {
            image_edit::resize_image(doc, page, &request)
        })
        .await
    }

    pub async fn delete_image(&self, id: &str, page: usize, request: ImageDelete) -> Result<()> {
        self.with_mutable_access(id, Some(page), "delete_image", move |doc| {
            image_edit::delete_image(doc, page, &request)
        })
        .await
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Dispose sessions idle longer than the configured timeout
    ///
    /// Returns the number of sessions evicted
    pub async fn cleanup_expired(&self) -> usize {
        let Some(timeout) = self.inner.settings.idle_timeout else {
            return 0;
        };
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return 0;
        };
        self.evict_idle_before(Utc::now() - timeout).await
    }

    /// Dispose sessions last used before `cutoff`
    pub async fn evict_idle_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.inner.sessions.write().await;
        let idle: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.last_accessed() < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &idle {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "Evicted idle session");
        }

        if !idle.is_empty() {
            tracing::info!(count = idle.len(), "Cleaned up idle document sessions");
        }
        idle.len()
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        })
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

/// Content hash prefix plus random suffix.
fn new_session_id(digest: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}{}", &digest[..12], &random[..SESSION_ID_LEN - 12])
}

pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

// ============================================================================
// Tests
// ============================================================================
