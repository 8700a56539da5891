use rusqlite::Connection;
use trellis_core::db::migrations::latest_version;
use trellis_core::db::{open_db, open_db_in_memory};

fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        let column_name: String = row.get(1).unwrap();
        columns.push(column_name);
    }
    columns
}

#[test]
fn migration_creates_core_tables() {
    let conn = open_db_in_memory().unwrap();

    for table in ["pages", "notes", "properties"] {
        let exists: i64 = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
                );",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(exists, 1, "missing table {table}");
    }

    let note_columns = table_columns(&conn, "notes");
    for column in [
        "uuid",
        "page_uuid",
        "parent_uuid",
        "content",
        "order_index",
        "collapsed",
        "internal",
        "is_active",
        "created_at",
        "updated_at",
    ] {
        assert!(note_columns.contains(&column.to_string()), "missing notes.{column}");
    }

    let property_columns = table_columns(&conn, "properties");
    for column in ["uuid", "note_uuid", "page_uuid", "name", "value", "weight", "is_active"] {
        assert!(
            property_columns.contains(&column.to_string()),
            "missing properties.{column}"
        );
    }
}

#[test]
fn migration_sets_user_version() {
    let conn = open_db_in_memory().unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
}

#[test]
fn reopening_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("core.db");

    {
        let conn = open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO pages (uuid, name) VALUES ('11111111-1111-1111-1111-111111111111', 'inbox');",
            [],
        )
        .unwrap();
    }

    let conn = open_db(&path).unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());

    let name: String = conn
        .query_row(
            "SELECT name FROM pages WHERE uuid = '11111111-1111-1111-1111-111111111111';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(name, "inbox");
}

#[test]
fn property_rows_require_exactly_one_owner() {
    let conn = open_db_in_memory().unwrap();

    conn.execute(
        "INSERT INTO pages (uuid, name) VALUES ('11111111-1111-1111-1111-111111111111', 'p');",
        [],
    )
    .unwrap();

    let neither = conn.execute(
        "INSERT INTO properties (uuid, note_uuid, page_uuid, name, value)
         VALUES ('22222222-2222-2222-2222-222222222222', NULL, NULL, 'a', 'b');",
        [],
    );
    assert!(neither.is_err());

    let both = conn.execute(
        "INSERT INTO properties (uuid, note_uuid, page_uuid, name, value)
         VALUES (
            '33333333-3333-3333-3333-333333333333',
            '44444444-4444-4444-4444-444444444444',
            '11111111-1111-1111-1111-111111111111',
            'a',
            'b'
         );",
        [],
    );
    assert!(both.is_err());
}
