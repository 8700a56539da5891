//! Property repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist already-parsed property rows for notes and pages.
//! - Apply the weight table's replace/append duplicate handling on writes.
//!
//! # Invariants
//! - Exactly one of `note_uuid`/`page_uuid` is set per row (SQL CHECK).
//! - A replace-weight write leaves exactly one active row for the name on
//!   its owner, also when earlier append-weight writes accumulated several.
//! - Property listing is deterministic: `name ASC, value ASC, uuid ASC`.
//! - Writes never consult weight values directly; policy comes from
//!   `weight_class`.

use crate::model::note::NoteId;
use crate::model::page::PageId;
use crate::model::property::{weight_class, DuplicateHandling, Property, PropertyId, PropertyOwner};
use crate::repo::{parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROPERTY_SELECT_SQL: &str = "SELECT
    uuid,
    note_uuid,
    page_uuid,
    name,
    value,
    weight,
    is_active,
    created_at,
    updated_at
FROM properties";

/// Repository interface for property rows.
pub trait PropertyRepository {
    /// Persists one property, honoring the weight bucket's replace/append
    /// duplicate handling for same-name rows on the same owner.
    fn save_property(&self, property: &Property) -> RepoResult<PropertyId>;
    /// Lists active properties attached to one note.
    fn active_note_properties(&self, note_id: NoteId) -> RepoResult<Vec<Property>>;
    /// Lists active properties attached directly to one page.
    fn active_page_properties(&self, page_id: PageId) -> RepoResult<Vec<Property>>;
    /// Soft-deletes all active properties of one note. Returns row count.
    fn deactivate_note_properties(&self, note_id: NoteId) -> RepoResult<usize>;
}

/// SQLite-backed property repository.
pub struct SqlitePropertyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePropertyRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn insert_property(&self, property: &Property) -> RepoResult<PropertyId> {
        let (note_uuid, page_uuid) = owner_columns(property.owner);
        self.conn.execute(
            "INSERT INTO properties (
                uuid,
                note_uuid,
                page_uuid,
                name,
                value,
                weight,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1);",
            params![
                property.id.to_string(),
                note_uuid,
                page_uuid,
                property.name.as_str(),
                property.value.as_str(),
                property.weight,
            ],
        )?;
        Ok(property.id)
    }

    fn replace_property(&self, property: &Property) -> RepoResult<PropertyId> {
        let (note_uuid, page_uuid) = owner_columns(property.owner);
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT uuid
                 FROM properties
                 WHERE name = ?3
                   AND is_active = 1
                   AND (note_uuid IS ?1 AND page_uuid IS ?2)
                 ORDER BY uuid ASC
                 LIMIT 1;",
                params![note_uuid, page_uuid, property.name.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(target_uuid) = existing else {
            return self.insert_property(property);
        };

        self.conn.execute(
            "UPDATE properties
             SET value = ?2,
                 weight = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                target_uuid.as_str(),
                property.value.as_str(),
                property.weight,
            ],
        )?;

        // Same-name rows accumulated under an earlier append weight are
        // retired so the name carries exactly one active value.
        self.conn.execute(
            "UPDATE properties
             SET is_active = 0,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE name = ?3
               AND is_active = 1
               AND uuid <> ?4
               AND (note_uuid IS ?1 AND page_uuid IS ?2);",
            params![
                note_uuid,
                page_uuid,
                property.name.as_str(),
                target_uuid.as_str(),
            ],
        )?;

        parse_uuid(&target_uuid, "properties.uuid")
    }
}

impl PropertyRepository for SqlitePropertyRepository<'_> {
    fn save_property(&self, property: &Property) -> RepoResult<PropertyId> {
        match weight_class(property.weight).duplicates {
            DuplicateHandling::Replace => self.replace_property(property),
            DuplicateHandling::Append => self.insert_property(property),
        }
    }

    fn active_note_properties(&self, note_id: NoteId) -> RepoResult<Vec<Property>> {
        list_active(self.conn, "note_uuid", note_id.to_string())
    }

    fn active_page_properties(&self, page_id: PageId) -> RepoResult<Vec<Property>> {
        list_active(self.conn, "page_uuid", page_id.to_string())
    }

    fn deactivate_note_properties(&self, note_id: NoteId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE properties
             SET is_active = 0,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE note_uuid = ?1
               AND is_active = 1;",
            [note_id.to_string()],
        )?;
        Ok(changed)
    }
}

fn owner_columns(owner: PropertyOwner) -> (Option<String>, Option<String>) {
    match owner {
        PropertyOwner::Note(id) => (Some(id.to_string()), None),
        PropertyOwner::Page(id) => (None, Some(id.to_string())),
    }
}

fn list_active(conn: &Connection, column: &str, owner_uuid: String) -> RepoResult<Vec<Property>> {
    let mut stmt = conn.prepare(&format!(
        "{PROPERTY_SELECT_SQL}
         WHERE {column} = ?1
           AND is_active = 1
         ORDER BY name ASC, value ASC, uuid ASC;"
    ))?;

    let mut rows = stmt.query([owner_uuid])?;
    let mut properties = Vec::new();
    while let Some(row) = rows.next()? {
        properties.push(parse_property_row(row)?);
    }
    Ok(properties)
}

fn parse_property_row(row: &Row<'_>) -> RepoResult<Property> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "properties.uuid")?;

    let note_uuid = row
        .get::<_, Option<String>>("note_uuid")?
        .map(|value| parse_uuid(&value, "properties.note_uuid"))
        .transpose()?;
    let page_uuid = row
        .get::<_, Option<String>>("page_uuid")?
        .map(|value| parse_uuid(&value, "properties.page_uuid"))
        .transpose()?;

    let owner = match (note_uuid, page_uuid) {
        (Some(note_id), None) => PropertyOwner::Note(note_id),
        (None, Some(page_id)) => PropertyOwner::Page(page_id),
        _ => {
            return Err(RepoError::InvalidData(format!(
                "property {id} must have exactly one owner"
            )));
        }
    };

    Ok(Property {
        id,
        owner,
        name: row.get("name")?,
        value: row.get("value")?,
        weight: row.get("weight")?,
        active: parse_bool(row.get("is_active")?, "properties.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
