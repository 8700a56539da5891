//! Core domain logic for the Trellis hierarchical note store.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteId, NotePatch};
pub use model::page::{Page, PageId, PageValidationError};
pub use model::property::{
    weight_class, DuplicateHandling, Property, PropertyId, PropertyOwner, WeightClass,
};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::page_repo::{PageRepository, SqlitePageRepository};
pub use repo::property_repo::{PropertyRepository, SqlitePropertyRepository};
pub use repo::{RepoError, RepoResult};
pub use service::batch_service::{
    BatchFatalError, BatchOperation, BatchRequest, BatchResponse, BatchService, CreateNote,
    DeleteNote, NoteContentListener, NoteView, OperationError, OperationKind, OperationResult,
    OperationStatus, UpdateNote,
};
pub use service::property_service::{ParentProperties, PropertyResolver, PropertyValue};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
