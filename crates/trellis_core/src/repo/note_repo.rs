//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `notes` storage.
//! - Own soft-delete cascade behavior for note subtrees.
//!
//! # Invariants
//! - Only active (`is_active=1`) notes are returned by default.
//! - `parent_of` treats a missing or soft-deleted note as "no further
//!   ancestors", never as an error.
//! - Subtree cascade must terminate even when parent pointers are cyclic.

use crate::model::note::{Note, NoteId, NotePatch};
use crate::model::page::PageId;
use crate::repo::property_repo::{PropertyRepository, SqlitePropertyRepository};
use crate::repo::{bool_to_int, parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const NOTE_SELECT_SQL: &str = "SELECT
    uuid,
    page_uuid,
    parent_uuid,
    content,
    order_index,
    collapsed,
    internal,
    is_active,
    created_at,
    updated_at
FROM notes";

/// Repository interface for note CRUD operations.
pub trait NoteRepository {
    /// Persists one note row.
    fn create_note(&self, note: &Note) -> RepoResult<NoteId>;
    /// Applies a partial update; `None` fields are left unchanged.
    fn update_note(&self, id: NoteId, patch: &NotePatch) -> RepoResult<()>;
    /// Soft-deletes the note, its own properties, and its active descendant
    /// subtree. Returns the ids of all deactivated notes, target first.
    fn delete_note(&self, id: NoteId) -> RepoResult<Vec<NoteId>>;
    /// Loads one note by id.
    fn get_note(&self, id: NoteId, include_inactive: bool) -> RepoResult<Option<Note>>;
    /// Returns `Some(parent)` for an active note, `None` when the note is
    /// absent or soft-deleted. The inner `None` marks a page-level root.
    fn parent_of(&self, id: NoteId) -> RepoResult<Option<Option<NoteId>>>;
    /// Returns the next free order index among active siblings.
    fn next_order_index(&self, page_id: PageId, parent: Option<NoteId>) -> RepoResult<i64>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, note: &Note) -> RepoResult<NoteId> {
        self.conn.execute(
            "INSERT INTO notes (
                uuid,
                page_uuid,
                parent_uuid,
                content,
                order_index,
                collapsed,
                internal,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                note.id.to_string(),
                note.page_id.to_string(),
                note.parent_note_id.map(|value| value.to_string()),
                note.content.as_str(),
                note.order_index,
                bool_to_int(note.collapsed),
                bool_to_int(note.internal),
                bool_to_int(note.active),
            ],
        )?;

        Ok(note.id)
    }

    fn update_note(&self, id: NoteId, patch: &NotePatch) -> RepoResult<()> {
        let mut assignments: Vec<&'static str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(content) = &patch.content {
            assignments.push("content = ?");
            bind_values.push(Value::Text(content.clone()));
        }
        if let Some(parent) = &patch.parent_note_id {
            assignments.push("parent_uuid = ?");
            bind_values.push(match parent {
                Some(parent_id) => Value::Text(parent_id.to_string()),
                None => Value::Null,
            });
        }
        if let Some(order_index) = patch.order_index {
            assignments.push("order_index = ?");
            bind_values.push(Value::Integer(order_index));
        }
        if let Some(collapsed) = patch.collapsed {
            assignments.push("collapsed = ?");
            bind_values.push(Value::Integer(bool_to_int(collapsed)));
        }
        if let Some(active) = patch.active {
            assignments.push("is_active = ?");
            bind_values.push(Value::Integer(bool_to_int(active)));
        }
        assignments.push("updated_at = (strftime('%s', 'now') * 1000)");

        // Renumber positional params after the leading uuid.
        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(index, assignment)| assignment.replace('?', &format!("?{}", index + 2)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut all_values: Vec<Value> = vec![Value::Text(id.to_string())];
        all_values.extend(bind_values);

        let changed = self.conn.execute(
            &format!(
                "UPDATE notes
                 SET {set_clause}
                 WHERE uuid = ?1;"
            ),
            params_from_iter(all_values),
        )?;

        if changed == 0 {
            return Err(RepoError::NoteNotFound(id));
        }

        Ok(())
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<Vec<NoteId>> {
        if self.get_note(id, false)?.is_none() {
            return Err(RepoError::NoteNotFound(id));
        }

        // UNION (not UNION ALL) deduplicates visited rows, so a cyclic
        // parent chain cannot keep the recursion alive.
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE subtree(uuid) AS (
                SELECT uuid
                FROM notes
                WHERE uuid = ?1
                  AND is_active = 1
                UNION
                SELECT child.uuid
                FROM notes child
                INNER JOIN subtree parent ON child.parent_uuid = parent.uuid
                WHERE child.is_active = 1
            )
            SELECT uuid FROM subtree;",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        let mut deactivated = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            deactivated.push(parse_uuid(&value, "notes.uuid")?);
        }

        // Target first, descendants after, for stable notification order.
        deactivated.sort_by_key(|note_id| *note_id != id);

        let properties = SqlitePropertyRepository::new(self.conn);
        for note_id in &deactivated {
            self.conn.execute(
                "UPDATE notes
                 SET is_active = 0,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1
                   AND is_active = 1;",
                [note_id.to_string()],
            )?;
            properties.deactivate_note_properties(*note_id)?;
        }

        Ok(deactivated)
    }

    fn get_note(&self, id: NoteId, include_inactive: bool) -> RepoResult<Option<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_active = 1);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_inactive)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }

        Ok(None)
    }

    fn parent_of(&self, id: NoteId) -> RepoResult<Option<Option<NoteId>>> {
        let parent_text: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT parent_uuid
                 FROM notes
                 WHERE uuid = ?1
                   AND is_active = 1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match parent_text {
            None => Ok(None),
            Some(None) => Ok(Some(None)),
            Some(Some(value)) => Ok(Some(Some(parse_uuid(&value, "notes.parent_uuid")?))),
        }
    }

    fn next_order_index(&self, page_id: PageId, parent: Option<NoteId>) -> RepoResult<i64> {
        let next = if let Some(parent) = parent {
            self.conn.query_row(
                "SELECT COALESCE(MAX(order_index), -1) + 1
                 FROM notes
                 WHERE page_uuid = ?1
                   AND parent_uuid = ?2
                   AND is_active = 1;",
                params![page_id.to_string(), parent.to_string()],
                |row| row.get(0),
            )?
        } else {
            self.conn.query_row(
                "SELECT COALESCE(MAX(order_index), -1) + 1
                 FROM notes
                 WHERE page_uuid = ?1
                   AND parent_uuid IS NULL
                   AND is_active = 1;",
                [page_id.to_string()],
                |row| row.get(0),
            )?
        };
        Ok(next)
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "notes.uuid")?;

    let page_text: String = row.get("page_uuid")?;
    let page_id = parse_uuid(&page_text, "notes.page_uuid")?;

    let parent_note_id = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "notes.parent_uuid"))
        .transpose()?;

    Ok(Note {
        id,
        page_id,
        parent_note_id,
        content: row.get("content")?,
        order_index: row.get("order_index")?,
        collapsed: parse_bool(row.get("collapsed")?, "notes.collapsed")?,
        internal: parse_bool(row.get("internal")?, "notes.internal")?,
        active: parse_bool(row.get("is_active")?, "notes.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
