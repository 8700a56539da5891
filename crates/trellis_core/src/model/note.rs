//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record shared by all core subsystems.
//! - Provide lifecycle helpers for soft-delete semantics.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `active` is the source of truth for soft-delete state.
//! - `parent_note_id` is a weak reference: it may dangle or form a cycle in
//!   corrupted data, and readers must tolerate both.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::page::PageId;

/// Stable identifier for a note.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NoteId = Uuid;

/// Canonical note record.
///
/// Notes belong to exactly one page and form a forest within it through
/// `parent_note_id`. Sibling order is carried by `order_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable global ID used for parent links and batch results.
    pub id: NoteId,
    /// Owning page.
    pub page_id: PageId,
    /// Parent note, `None` for page-level roots. Weak reference.
    pub parent_note_id: Option<NoteId>,
    /// Raw note text. Parsing into properties happens outside the core.
    pub content: String,
    /// Stable order key among siblings.
    pub order_index: i64,
    /// UI fold state.
    pub collapsed: bool,
    /// Soft delete flag. `false` means tombstoned.
    pub active: bool,
    /// UI-visibility hint. Distinct from property internality.
    pub internal: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Note {
    /// Creates a new root-level note with a generated stable ID.
    ///
    /// # Invariants
    /// - `parent_note_id` starts as `None`.
    /// - `active` starts as `true`.
    pub fn new(page_id: PageId, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), page_id, content)
    }

    /// Creates a new note with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(id: NoteId, page_id: PageId, content: impl Into<String>) -> Self {
        Self {
            id,
            page_id,
            parent_note_id: None,
            content: content.into(),
            order_index: 0,
            collapsed: false,
            active: true,
            internal: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Marks this note as softly deleted (tombstoned).
    pub fn soft_delete(&mut self) {
        self.active = false;
    }

    /// Clears the soft delete flag.
    pub fn restore(&mut self) {
        self.active = true;
    }

    /// Returns whether this note should be considered visible.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Partial update for one note.
///
/// `None` fields are left unchanged by the store. `parent_note_id` is doubly
/// optional: `Some(None)` reparents the note to page root, `None` keeps the
/// current parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub content: Option<String>,
    pub parent_note_id: Option<Option<NoteId>>,
    pub order_index: Option<i64>,
    pub collapsed: Option<bool>,
    pub active: Option<bool>,
}

impl NotePatch {
    /// Returns whether the patch carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.parent_note_id.is_none()
            && self.order_index.is_none()
            && self.collapsed.is_none()
            && self.active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_starts_active_at_page_root() {
        let note = Note::new(Uuid::new_v4(), "hello");
        assert!(note.is_active());
        assert_eq!(note.parent_note_id, None);
        assert_eq!(note.order_index, 0);
        assert!(!note.collapsed);
        assert!(!note.internal);
    }

    #[test]
    fn soft_delete_and_restore_toggle_active() {
        let mut note = Note::new(Uuid::new_v4(), "x");
        note.soft_delete();
        assert!(!note.is_active());
        note.restore();
        assert!(note.is_active());
    }

    #[test]
    fn empty_patch_reports_empty() {
        assert!(NotePatch::default().is_empty());
        let patch = NotePatch {
            content: Some("y".to_string()),
            ..NotePatch::default()
        };
        assert!(!patch.is_empty());
    }
}
