//! Domain model for the hierarchical note store.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep page/note/property shapes independent of storage details.
//!
//! # Invariants
//! - Every domain object is identified by a stable uuid.
//! - Deletion is represented by the `active` flag, not hard delete.
//! - A property is owned by exactly one note or one page, never both.

pub mod note;
pub mod page;
pub mod property;
