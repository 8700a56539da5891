//! Page domain model.
//!
//! # Responsibility
//! - Define the top-level container record owning notes.
//!
//! # Invariants
//! - `name` is unique across all pages and never blank.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a page.
pub type PageId = Uuid;

/// Errors from page model validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageValidationError {
    /// Page name is blank after trim.
    BlankName,
}

impl std::fmt::Display for PageValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "page name must not be blank"),
        }
    }
}

impl std::error::Error for PageValidationError {}

/// Top-level container owning zero or more notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Stable page ID referenced by notes and page-level properties.
    pub id: PageId,
    /// Unique user-facing name.
    pub name: String,
    /// Free-form page body.
    pub content: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Page {
    /// Creates a new page with a generated stable ID.
    ///
    /// # Errors
    /// - `BlankName` when the trimmed name is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, PageValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PageValidationError::BlankName);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            content: String::new(),
            created_at: 0,
            updated_at: 0,
        })
    }
}
