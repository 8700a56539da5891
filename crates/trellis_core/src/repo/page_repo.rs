//! Page repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide persistence APIs for top-level page containers.
//!
//! # Invariants
//! - Page names are unique; violations surface as `RepoError::Constraint`.

use crate::model::page::{Page, PageId};
use crate::repo::{parse_uuid, RepoResult};
use rusqlite::{params, Connection, Row};

const PAGE_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    content,
    created_at,
    updated_at
FROM pages";

/// Repository interface for page operations.
pub trait PageRepository {
    /// Persists one page row.
    fn create_page(&self, page: &Page) -> RepoResult<PageId>;
    /// Loads one page by id.
    fn get_page(&self, id: PageId) -> RepoResult<Option<Page>>;
    /// Loads one page by its unique name.
    fn get_page_by_name(&self, name: &str) -> RepoResult<Option<Page>>;
    /// Returns whether a page with this id exists.
    fn page_exists(&self, id: PageId) -> RepoResult<bool>;
}

/// SQLite-backed page repository.
pub struct SqlitePageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn create_page(&self, page: &Page) -> RepoResult<PageId> {
        self.conn.execute(
            "INSERT INTO pages (uuid, name, content) VALUES (?1, ?2, ?3);",
            params![page.id.to_string(), page.name.as_str(), page.content.as_str()],
        )?;
        Ok(page.id)
    }

    fn get_page(&self, id: PageId) -> RepoResult<Option<Page>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PAGE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_page_row(row)?));
        }
        Ok(None)
    }

    fn get_page_by_name(&self, name: &str) -> RepoResult<Option<Page>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PAGE_SELECT_SQL} WHERE name = ?1;"))?;
        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_page_row(row)?));
        }
        Ok(None)
    }

    fn page_exists(&self, id: PageId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM pages WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_page_row(row: &Row<'_>) -> RepoResult<Page> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Page {
        id: parse_uuid(&uuid_text, "pages.uuid")?,
        name: row.get("name")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
