//! Undo/redo history
//!
//! Snapshots are whole-document captures. The undo stack is bounded; the
//! oldest entry is dropped once it is full.

use std::collections::VecDeque;
use std::mem;

use chrono::{DateTime, Utc};

use super::error::{EditError, Result};
use super::model::PdfDocument;

/// One captured document state
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub document: PdfDocument,
    /// Page the operation that produced this entry touched
    pub page: Option<usize>,
    pub label: String,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    fn trace(&self, message: &str) {
        let age_ms = (Utc::now() - self.taken_at).num_milliseconds();
        tracing::debug!(page = ?self.page, operation = %self.label, age_ms, "{}", message);
    }
}

/// Token returned by [`History::snapshot_before`] so a failed mutation can
/// be rolled back.
#[must_use]
#[derive(Debug)]
pub struct Checkpoint {
    redo: Vec<Snapshot>,
    dropped: Option<Snapshot>,
}

#[derive(Debug)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    /// Undo capacity, `0` for unbounded
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_depth,
        }
    }

    /// Record `current` as the state before a mutation and clear redo.
    pub fn snapshot_before(&mut self, current: &PdfDocument, page: Option<usize>, label: &str) -> Checkpoint {
        self.undo.push_back(Snapshot {
            document: current.clone(),
            page,
            label: label.to_string(),
            taken_at: Utc::now(),
        });
        let dropped = if self.max_depth > 0 && self.undo.len() > self.max_depth {
            self.undo.pop_front()
        } else {
            None
        };
        Checkpoint {
            redo: mem::take(&mut self.redo),
            dropped,
        }
    }

    /// Undo a [`Self::snapshot_before`]: pop its entry, restore it into
    /// `current`, and bring back the redo stack it cleared.
    pub fn rollback(&mut self, checkpoint: Checkpoint, current: &mut PdfDocument) {
        if let Some(snapshot) = self.undo.pop_back() {
            *current = snapshot.document;
        }
        if let Some(dropped) = checkpoint.dropped {
            self.undo.push_front(dropped);
        }
        self.redo = checkpoint.redo;
    }

    /// Restore the previous state. Returns the label of the undone operation.
    pub fn undo(&mut self, current: &mut PdfDocument) -> Result<String> {
        let snapshot = self.undo.pop_back().ok_or(EditError::NothingToUndo)?;
        snapshot.trace("Restoring snapshot");
        let previous = mem::replace(current, snapshot.document);
        self.redo.push(Snapshot {
            document: previous,
            page: snapshot.page,
            label: snapshot.label.clone(),
            taken_at: Utc::now(),
        });
        Ok(snapshot.label)
    }

    /// Reapply the last undone state. Returns its label.
    pub fn redo(&mut self, current: &mut PdfDocument) -> Result<String> {
        let snapshot = self.redo.pop().ok_or(EditError::NothingToRedo)?;
        snapshot.trace("Reapplying snapshot");
        let previous = mem::replace(current, snapshot.document);
        self.undo.push_back(Snapshot {
            document: previous,
            page: snapshot.page,
            label: snapshot.label.clone(),
            taken_at: Utc::now(),
        });
        if self.max_depth > 0 && self.undo.len() > self.max_depth {
            self.undo.pop_front();
        }
        Ok(snapshot.label)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::model::fixtures::*;
    use super::*;

    fn doc_with(text: &str) -> PdfDocument {
        PdfDocument::load(&pdf_with_pages(&[vec![("F1", 12.0, 72.0, 700.0, text)]])).unwrap()
    }

    fn content(doc: &PdfDocument) -> Vec<u8> {
        doc.page_content(0).unwrap()
    }

    /// Snapshot, then replace the document, as a successful edit would.
    fn apply(history: &mut History, current: &mut PdfDocument, next: PdfDocument) {
        let _checkpoint = history.snapshot_before(current, Some(0), "edit");
        *current = next;
    }

    #[test]
    fn test_undo_redo_walk() {
        let mut history = History::new(0);
        let mut current = doc_with("v0");
        apply(&mut history, &mut current, doc_with("v1"));
        apply(&mut history, &mut current, doc_with("v2"));
        let v2 = content(&current);

        history.undo(&mut current).unwrap();
        history.undo(&mut current).unwrap();
        assert_eq!(content(&current), content(&doc_with("v0")));
        assert!(matches!(history.undo(&mut current), Err(EditError::NothingToUndo)));

        history.redo(&mut current).unwrap();
        history.redo(&mut current).unwrap();
        assert_eq!(content(&current), v2);
        assert!(matches!(history.redo(&mut current), Err(EditError::NothingToRedo)));
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = History::new(0);
        let mut current = doc_with("v0");
        apply(&mut history, &mut current, doc_with("v1"));
        history.undo(&mut current).unwrap();
        assert!(history.can_redo());

        apply(&mut history, &mut current, doc_with("v2"));
        assert!(!history.can_redo());
        assert!(matches!(history.redo(&mut current), Err(EditError::NothingToRedo)));
    }

    #[test]
    fn test_rollback_restores_everything() {
        let mut history = History::new(0);
        let mut current = doc_with("v0");
        apply(&mut history, &mut current, doc_with("v1"));
        history.undo(&mut current).unwrap();
        let before = content(&current);

        let checkpoint = history.snapshot_before(&current, Some(0), "failing");
        current = doc_with("half-applied");
        history.rollback(checkpoint, &mut current);

        assert_eq!(content(&current), before);
        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.redo_depth(), 1);
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut history = History::new(2);
        let mut current = doc_with("v0");
        for i in 1..=4 {
            apply(&mut history, &mut current, doc_with(&format!("v{}", i)));
        }
        assert_eq!(history.undo_depth(), 2);
        history.undo(&mut current).unwrap();
        history.undo(&mut current).unwrap();
        assert_eq!(content(&current), content(&doc_with("v2")));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_rollback_when_full_keeps_oldest() {
        let mut history = History::new(1);
        let mut current = doc_with("v0");
        apply(&mut history, &mut current, doc_with("v1"));

        let checkpoint = history.snapshot_before(&current, None, "failing");
        history.rollback(checkpoint, &mut current);

        assert_eq!(history.undo_depth(), 1);
        history.undo(&mut current).unwrap();
        assert_eq!(content(&current), content(&doc_with("v0")));
    }
}
