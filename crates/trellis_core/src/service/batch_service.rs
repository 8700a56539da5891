//! Batch mutation engine over the note store.
//!
//! # Responsibility
//! - Execute an ordered list of create/update/delete operations inside one
//!   atomic transaction.
//! - Resolve intra-batch client-temp-id parent references.
//! - Capture per-operation failures without aborting sibling operations.
//! - Notify registered listeners about committed content changes.
//!
//! # Invariants
//! - `results[i]` always corresponds to `operations[i]`, also when the call
//!   mixes successes and failures.
//! - The temp-id map is owned by one `execute_batch` call and never shared.
//! - Listeners fire only after commit; a rolled-back batch emits nothing.
//! - Only store-level failures that threaten transaction consistency abort
//!   the batch; everything else is a per-operation error entry.

use crate::model::note::{Note, NoteId, NotePatch};
use crate::model::page::PageId;
use crate::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use crate::repo::page_repo::{PageRepository, SqlitePageRepository};
use crate::repo::property_repo::SqlitePropertyRepository;
use crate::repo::{ensure_schema_ready, RepoError, RepoResult};
use crate::service::property_service::{ParentProperties, PropertyResolver};
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Receives committed note content changes, e.g. an external search indexer.
///
/// `new_content` is `None` for deletions.
pub trait NoteContentListener: Send + Sync {
    fn note_content_changed(&self, note_id: NoteId, new_content: Option<&str>);
}

/// Create payload. `parent_note_id` accepts either a persisted note uuid or
/// a client temp token emitted by an earlier create in the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNote {
    pub page_id: PageId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_note_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    /// Opaque caller-chosen token for intra-batch references. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_temp_id: Option<String>,
}

/// Partial update payload. Absent fields are left unchanged; an explicit
/// `"parent_note_id": null` moves the note to page root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNote {
    pub id: NoteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_note_id: Option<Option<NoteId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Delete payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteNote {
    pub id: NoteId,
}

/// One batch operation in wire shape `{"type": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BatchOperation {
    Create(CreateNote),
    Update(UpdateNote),
    Delete(DeleteNote),
}

impl BatchOperation {
    fn kind(&self) -> OperationKind {
        match self {
            Self::Create(_) => OperationKind::Create,
            Self::Update(_) => OperationKind::Update,
            Self::Delete(_) => OperationKind::Delete,
        }
    }
}

/// Operation discriminator echoed into each result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// Per-entry result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Error,
}

/// Per-operation failure kept inside the results list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Malformed or missing payload field.
    Validation(String),
    /// Unresolved temp token or absent referenced note/page id.
    Reference(String),
    /// Store-level integrity violation that left the transaction usable.
    Constraint(String),
}

impl Display for OperationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation_error: {message}"),
            Self::Reference(message) => write!(f, "reference_error: {message}"),
            Self::Constraint(message) => write!(f, "constraint_error: {message}"),
        }
    }
}

impl Error for OperationError {}

impl Serialize for OperationError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Note snapshot returned per successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteView {
    pub id: NoteId,
    pub page_id: PageId,
    pub parent_note_id: Option<NoteId>,
    pub content: String,
    pub order_index: i64,
    pub collapsed: bool,
    pub active: bool,
    pub internal: bool,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_properties: Option<ParentProperties>,
}

impl NoteView {
    fn from_note(note: Note, parent_properties: Option<ParentProperties>) -> Self {
        Self {
            id: note.id,
            page_id: note.page_id,
            parent_note_id: note.parent_note_id,
            content: note.content,
            order_index: note.order_index,
            collapsed: note.collapsed,
            active: note.active,
            internal: note.internal,
            created_at: note.created_at,
            updated_at: note.updated_at,
            parent_properties,
        }
    }
}

/// One entry of the ordered results list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    #[serde(rename = "type")]
    pub op_type: OperationKind,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<NoteView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl OperationResult {
    fn success(op_type: OperationKind, note: Option<NoteView>) -> Self {
        Self {
            op_type,
            status: OperationStatus::Success,
            note,
            error: None,
        }
    }

    fn failure(op_type: OperationKind, error: OperationError) -> Self {
        Self {
            op_type,
            status: OperationStatus::Error,
            note: None,
            error: Some(error),
        }
    }
}

/// Caller-facing request envelope for the external transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub operations: Vec<BatchOperation>,
    #[serde(default)]
    pub include_parent_properties: bool,
}

/// Caller-facing response envelope on partial-or-full success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub results: Vec<OperationResult>,
}

/// Transaction-fatal batch failure. The whole batch rolled back and no
/// results list exists.
#[derive(Debug)]
pub enum BatchFatalError {
    /// Store-level failure that threatened transaction consistency.
    Repo(RepoError),
    /// Write/read-back mismatch inside the transaction.
    InconsistentState(&'static str),
}

impl Display for BatchFatalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent batch state: {details}"),
        }
    }
}

impl Error for BatchFatalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InconsistentState(_) => None,
        }
    }
}

/// Outcome of one operation before result assembly.
enum OperationFailure {
    /// Captured into the result entry; siblings continue.
    PerOp(OperationError),
    /// Aborts the batch.
    Fatal(BatchFatalError),
}

impl From<RepoError> for OperationFailure {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Constraint(message) => Self::PerOp(OperationError::Constraint(message)),
            RepoError::NoteNotFound(id) => {
                Self::PerOp(OperationError::Reference(format!("note not found: {id}")))
            }
            RepoError::PageNotFound(id) => {
                Self::PerOp(OperationError::Reference(format!("page not found: {id}")))
            }
            other => Self::Fatal(BatchFatalError::Repo(other)),
        }
    }
}

/// Pending post-commit notification for one affected note.
struct ContentChange {
    note_id: NoteId,
    new_content: Option<String>,
}

/// Batch mutation engine bound to one migrated SQLite connection.
pub struct BatchService<'conn> {
    conn: &'conn Connection,
    listeners: Vec<Arc<dyn NoteContentListener>>,
}

impl<'conn> BatchService<'conn> {
    /// Creates the engine from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self {
            conn,
            listeners: Vec::new(),
        })
    }

    /// Registers one content-change listener, e.g. a search indexer hook.
    pub fn register_listener(&mut self, listener: Arc<dyn NoteContentListener>) {
        self.listeners.push(listener);
    }

    /// Executes the operations in input order inside one atomic transaction.
    ///
    /// # Contract
    /// - Returns one result per input operation, in input order, mixing
    ///   success and per-operation error entries.
    /// - `include_parent_properties` attaches resolved ancestor properties
    ///   to each surviving note view, honoring `include_internal`.
    /// - Returns `Err(BatchFatalError)` only when the transaction itself
    ///   failed; nothing is persisted in that case.
    pub fn execute_batch(
        &self,
        operations: Vec<BatchOperation>,
        include_parent_properties: bool,
        include_internal: bool,
    ) -> Result<Vec<OperationResult>, BatchFatalError> {
        let started_at = Instant::now();
        let op_count = operations.len();
        info!("event=batch_execute module=batch status=start op_count={op_count}");

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(|err| BatchFatalError::Repo(err.into()))?;

        // Scoped to this call only: concurrent batches never share tokens.
        let mut temp_ids: HashMap<String, NoteId> = HashMap::new();
        let mut results: Vec<OperationResult> = Vec::with_capacity(op_count);
        let mut changes: Vec<ContentChange> = Vec::new();

        for operation in operations {
            let kind = operation.kind();
            let outcome = self.apply_operation(
                &tx,
                operation,
                &mut temp_ids,
                &mut changes,
                include_parent_properties,
                include_internal,
            );
            match outcome {
                Ok(note) => results.push(OperationResult::success(kind, note)),
                Err(OperationFailure::PerOp(err)) => {
                    results.push(OperationResult::failure(kind, err))
                }
                Err(OperationFailure::Fatal(err)) => {
                    let _ = tx.rollback();
                    error!(
                        "event=batch_execute module=batch status=error op_count={op_count} duration_ms={} error_code=batch_fatal error={err}",
                        started_at.elapsed().as_millis()
                    );
                    return Err(err);
                }
            }
        }

        tx.commit()
            .map_err(|err| BatchFatalError::Repo(err.into()))?;

        for change in &changes {
            for listener in &self.listeners {
                listener.note_content_changed(change.note_id, change.new_content.as_deref());
            }
        }

        let error_count = results
            .iter()
            .filter(|entry| entry.status == OperationStatus::Error)
            .count();
        info!(
            "event=batch_execute module=batch status=ok op_count={op_count} error_count={error_count} duration_ms={}",
            started_at.elapsed().as_millis()
        );

        Ok(results)
    }

    fn apply_operation(
        &self,
        tx: &Transaction<'_>,
        operation: BatchOperation,
        temp_ids: &mut HashMap<String, NoteId>,
        changes: &mut Vec<ContentChange>,
        include_parent_properties: bool,
        include_internal: bool,
    ) -> Result<Option<NoteView>, OperationFailure> {
        match operation {
            BatchOperation::Create(payload) => self
                .apply_create(
                    tx,
                    payload,
                    temp_ids,
                    changes,
                    include_parent_properties,
                    include_internal,
                )
                .map(Some),
            BatchOperation::Update(payload) => self
                .apply_update(
                    tx,
                    payload,
                    changes,
                    include_parent_properties,
                    include_internal,
                )
                .map(Some),
            BatchOperation::Delete(payload) => {
                self.apply_delete(tx, payload, changes).map(|_| None)
            }
        }
    }

    fn apply_create(
        &self,
        tx: &Transaction<'_>,
        payload: CreateNote,
        temp_ids: &mut HashMap<String, NoteId>,
        changes: &mut Vec<ContentChange>,
        include_parent_properties: bool,
        include_internal: bool,
    ) -> Result<NoteView, OperationFailure> {
        let notes = SqliteNoteRepository::new(tx);
        let pages = SqlitePageRepository::new(tx);

        let temp_token = match payload.client_temp_id.as_deref() {
            Some(token) => {
                let trimmed = token.trim();
                if trimmed.is_empty() {
                    return Err(OperationFailure::PerOp(OperationError::Validation(
                        "client_temp_id must not be blank".to_string(),
                    )));
                }
                if temp_ids.contains_key(trimmed) {
                    return Err(OperationFailure::PerOp(OperationError::Validation(
                        format!("duplicate client_temp_id `{trimmed}` in batch"),
                    )));
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        if !pages.page_exists(payload.page_id)? {
            return Err(OperationFailure::PerOp(OperationError::Reference(format!(
                "page not found: {}",
                payload.page_id
            ))));
        }

        let parent_note_id = match payload.parent_note_id.as_deref() {
            Some(raw) => Some(resolve_parent_reference(&notes, raw, temp_ids)?),
            None => None,
        };

        let order_index = match payload.order_index {
            Some(order_index) => order_index,
            None => notes.next_order_index(payload.page_id, parent_note_id)?,
        };

        let mut note = Note::new(payload.page_id, payload.content);
        note.parent_note_id = parent_note_id;
        note.order_index = order_index;
        note.collapsed = payload.collapsed.unwrap_or(false);

        let note_id = notes.create_note(&note)?;
        let persisted = notes
            .get_note(note_id, false)?
            .ok_or(OperationFailure::Fatal(BatchFatalError::InconsistentState(
                "created note not found in read-back",
            )))?;

        if let Some(token) = temp_token {
            temp_ids.insert(token, note_id);
        }

        changes.push(ContentChange {
            note_id,
            new_content: Some(persisted.content.clone()),
        });

        let parent_properties = if include_parent_properties {
            Some(self.resolve_within(tx, note_id, include_internal)?)
        } else {
            None
        };

        Ok(NoteView::from_note(persisted, parent_properties))
    }

    fn apply_update(
        &self,
        tx: &Transaction<'_>,
        payload: UpdateNote,
        changes: &mut Vec<ContentChange>,
        include_parent_properties: bool,
        include_internal: bool,
    ) -> Result<NoteView, OperationFailure> {
        let notes = SqliteNoteRepository::new(tx);

        let patch = NotePatch {
            content: payload.content,
            parent_note_id: payload.parent_note_id,
            order_index: payload.order_index,
            collapsed: payload.collapsed,
            active: payload.active,
        };

        if patch.is_empty() {
            return Err(OperationFailure::PerOp(OperationError::Validation(
                "update carries no fields".to_string(),
            )));
        }

        if let Some(Some(parent_id)) = patch.parent_note_id {
            if notes.get_note(parent_id, false)?.is_none() {
                return Err(OperationFailure::PerOp(OperationError::Reference(
                    format!("parent note not found: {parent_id}"),
                )));
            }
        }

        // An inactive target cannot be updated except to restore it.
        if notes.get_note(payload.id, false)?.is_none() && patch.active != Some(true) {
            return Err(OperationFailure::PerOp(OperationError::Reference(format!(
                "note not found: {}",
                payload.id
            ))));
        }

        notes.update_note(payload.id, &patch)?;
        let persisted = notes
            .get_note(payload.id, true)?
            .ok_or(OperationFailure::Fatal(BatchFatalError::InconsistentState(
                "updated note not found in read-back",
            )))?;

        changes.push(ContentChange {
            note_id: payload.id,
            new_content: Some(persisted.content.clone()),
        });

        // Enrichment applies only to notes that are still live.
        let parent_properties = if include_parent_properties && persisted.is_active() {
            Some(self.resolve_within(tx, payload.id, include_internal)?)
        } else {
            None
        };

        Ok(NoteView::from_note(persisted, parent_properties))
    }

    fn apply_delete(
        &self,
        tx: &Transaction<'_>,
        payload: DeleteNote,
        changes: &mut Vec<ContentChange>,
    ) -> Result<(), OperationFailure> {
        let notes = SqliteNoteRepository::new(tx);
        let deactivated = notes.delete_note(payload.id)?;

        for note_id in deactivated {
            changes.push(ContentChange {
                note_id,
                new_content: None,
            });
        }

        Ok(())
    }

    fn resolve_within(
        &self,
        tx: &Transaction<'_>,
        note_id: NoteId,
        include_internal: bool,
    ) -> Result<ParentProperties, OperationFailure> {
        let resolver = PropertyResolver::new(
            SqliteNoteRepository::new(tx),
            SqlitePropertyRepository::new(tx),
        );
        resolver
            .resolve_ancestor_properties(note_id, include_internal)
            .map_err(OperationFailure::from)
    }
}

/// Resolves a create payload's parent reference.
///
/// Lookup order: batch temp-id map first, then persisted uuid. Anything
/// else is an unresolved temp token (covers forward references to creates
/// that have not executed yet).
fn resolve_parent_reference(
    notes: &SqliteNoteRepository<'_>,
    raw: &str,
    temp_ids: &HashMap<String, NoteId>,
) -> Result<NoteId, OperationFailure> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(OperationFailure::PerOp(OperationError::Validation(
            "parent_note_id must not be blank".to_string(),
        )));
    }

    if let Some(real_id) = temp_ids.get(trimmed) {
        return Ok(*real_id);
    }

    if let Ok(note_id) = Uuid::parse_str(trimmed) {
        if notes.get_note(note_id, false)?.is_none() {
            return Err(OperationFailure::PerOp(OperationError::Reference(format!(
                "parent note not found: {note_id}"
            ))));
        }
        return Ok(note_id);
    }

    Err(OperationFailure::PerOp(OperationError::Reference(format!(
        "unresolved client temp id `{trimmed}`"
    ))))
}
