use rusqlite::Connection;
use trellis_core::db::open_db_in_memory;
use trellis_core::{
    Note, NotePatch, Page, PageRepository, Property, PropertyOwner, PropertyRepository, RepoError,
    NoteRepository, SqliteNoteRepository, SqlitePageRepository, SqlitePropertyRepository,
};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn insert_page(conn: &Connection, name: &str) -> Page {
    let repo = SqlitePageRepository::new(conn);
    let page = Page::new(name).unwrap();
    repo.create_page(&page).unwrap();
    page
}

fn insert_note(conn: &Connection, page: &Page, content: &str, parent: Option<Uuid>) -> Note {
    let repo = SqliteNoteRepository::new(conn);
    let mut note = Note::new(page.id, content);
    note.parent_note_id = parent;
    note.order_index = repo.next_order_index(page.id, parent).unwrap();
    repo.create_note(&note).unwrap();
    repo.get_note(note.id, false).unwrap().unwrap()
}

#[test]
fn note_create_and_get_round_trip() {
    let conn = setup();
    let page = insert_page(&conn, "inbox");
    let note = insert_note(&conn, &page, "hello", None);

    assert_eq!(note.page_id, page.id);
    assert_eq!(note.content, "hello");
    assert!(note.active);
    assert!(note.created_at > 0);
}

#[test]
fn page_names_are_unique() {
    let conn = setup();
    insert_page(&conn, "inbox");

    let repo = SqlitePageRepository::new(&conn);
    let duplicate = Page::new("inbox").unwrap();
    let err = repo.create_page(&duplicate).unwrap_err();
    assert!(matches!(err, RepoError::Constraint(_)));
}

#[test]
fn page_lookup_by_name_and_id() {
    let conn = setup();
    let page = insert_page(&conn, "journal");

    let repo = SqlitePageRepository::new(&conn);
    assert_eq!(repo.get_page(page.id).unwrap().unwrap().name, "journal");
    assert_eq!(repo.get_page_by_name("journal").unwrap().unwrap().id, page.id);
    assert!(repo.get_page_by_name("missing").unwrap().is_none());
    assert!(repo.page_exists(page.id).unwrap());
    assert!(!repo.page_exists(Uuid::new_v4()).unwrap());
}

#[test]
fn content_only_patch_leaves_structure_unchanged() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let parent = insert_note(&conn, &page, "parent", None);

    let repo = SqliteNoteRepository::new(&conn);
    let mut child = Note::new(page.id, "child");
    child.parent_note_id = Some(parent.id);
    child.order_index = 5;
    child.collapsed = true;
    repo.create_note(&child).unwrap();

    let patch = NotePatch {
        content: Some("edited".to_string()),
        ..NotePatch::default()
    };
    repo.update_note(child.id, &patch).unwrap();

    let reloaded = repo.get_note(child.id, false).unwrap().unwrap();
    assert_eq!(reloaded.content, "edited");
    assert_eq!(reloaded.parent_note_id, Some(parent.id));
    assert_eq!(reloaded.order_index, 5);
    assert!(reloaded.collapsed);
}

#[test]
fn patch_can_reparent_to_page_root() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let parent = insert_note(&conn, &page, "parent", None);
    let child = insert_note(&conn, &page, "child", Some(parent.id));

    let repo = SqliteNoteRepository::new(&conn);
    let patch = NotePatch {
        parent_note_id: Some(None),
        ..NotePatch::default()
    };
    repo.update_note(child.id, &patch).unwrap();

    let reloaded = repo.get_note(child.id, false).unwrap().unwrap();
    assert_eq!(reloaded.parent_note_id, None);
}

#[test]
fn update_of_missing_note_reports_not_found() {
    let conn = setup();
    let repo = SqliteNoteRepository::new(&conn);
    let patch = NotePatch {
        content: Some("x".to_string()),
        ..NotePatch::default()
    };
    let err = repo.update_note(Uuid::new_v4(), &patch).unwrap_err();
    assert!(matches!(err, RepoError::NoteNotFound(_)));
}

#[test]
fn next_order_index_appends_after_active_siblings() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let repo = SqliteNoteRepository::new(&conn);

    assert_eq!(repo.next_order_index(page.id, None).unwrap(), 0);
    let first = insert_note(&conn, &page, "a", None);
    let second = insert_note(&conn, &page, "b", None);
    assert_eq!(first.order_index, 0);
    assert_eq!(second.order_index, 1);
    assert_eq!(repo.next_order_index(page.id, None).unwrap(), 2);

    // Children count separately per parent.
    assert_eq!(repo.next_order_index(page.id, Some(first.id)).unwrap(), 0);
}

#[test]
fn delete_note_cascades_to_subtree_and_properties() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let root = insert_note(&conn, &page, "root", None);
    let child = insert_note(&conn, &page, "child", Some(root.id));
    let grandchild = insert_note(&conn, &page, "grandchild", Some(child.id));
    let bystander = insert_note(&conn, &page, "bystander", None);

    let properties = SqlitePropertyRepository::new(&conn);
    properties
        .save_property(&Property::new(PropertyOwner::Note(child.id), "tag", "x", 1))
        .unwrap();

    let notes = SqliteNoteRepository::new(&conn);
    let deactivated = notes.delete_note(root.id).unwrap();

    assert_eq!(deactivated.len(), 3);
    assert_eq!(deactivated[0], root.id);
    assert!(deactivated.contains(&child.id));
    assert!(deactivated.contains(&grandchild.id));

    assert!(notes.get_note(root.id, false).unwrap().is_none());
    assert!(notes.get_note(child.id, false).unwrap().is_none());
    assert!(notes.get_note(grandchild.id, false).unwrap().is_none());
    assert!(notes.get_note(root.id, true).unwrap().is_some());
    assert!(notes.get_note(bystander.id, false).unwrap().is_some());

    assert!(properties.active_note_properties(child.id).unwrap().is_empty());
}

#[test]
fn delete_cascade_terminates_on_cyclic_parents() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let first = insert_note(&conn, &page, "a", None);
    let second = insert_note(&conn, &page, "b", Some(first.id));

    // Corrupt the forest into a two-note cycle.
    conn.execute(
        "UPDATE notes SET parent_uuid = ?2 WHERE uuid = ?1;",
        [first.id.to_string(), second.id.to_string()],
    )
    .unwrap();

    let notes = SqliteNoteRepository::new(&conn);
    let deactivated = notes.delete_note(first.id).unwrap();
    assert_eq!(deactivated.len(), 2);
    assert!(notes.get_note(second.id, false).unwrap().is_none());
}

#[test]
fn parent_of_distinguishes_root_and_missing() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let root = insert_note(&conn, &page, "root", None);
    let child = insert_note(&conn, &page, "child", Some(root.id));

    let repo = SqliteNoteRepository::new(&conn);
    assert_eq!(repo.parent_of(root.id).unwrap(), Some(None));
    assert_eq!(repo.parent_of(child.id).unwrap(), Some(Some(root.id)));
    assert_eq!(repo.parent_of(Uuid::new_v4()).unwrap(), None);

    repo.delete_note(child.id).unwrap();
    assert_eq!(repo.parent_of(child.id).unwrap(), None);
}

#[test]
fn replace_weight_overwrites_same_name_value() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let note = insert_note(&conn, &page, "n", None);

    let repo = SqlitePropertyRepository::new(&conn);
    let owner = PropertyOwner::Note(note.id);
    repo.save_property(&Property::new(owner, "status", "draft", 0)).unwrap();
    repo.save_property(&Property::new(owner, "status", "final", 0)).unwrap();

    let rows = repo.active_note_properties(note.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, "final");
}

#[test]
fn replace_weight_collapses_earlier_append_rows() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let note = insert_note(&conn, &page, "n", None);

    let repo = SqlitePropertyRepository::new(&conn);
    let owner = PropertyOwner::Note(note.id);
    repo.save_property(&Property::new(owner, "tag", "alpha", 1)).unwrap();
    repo.save_property(&Property::new(owner, "tag", "beta", 1)).unwrap();

    // Rewriting the name under a replace weight must leave one active row,
    // not rewrite every accumulated row in place.
    repo.save_property(&Property::new(owner, "tag", "final", 0)).unwrap();

    let rows = repo.active_note_properties(note.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, "final");
    assert_eq!(rows[0].weight, 0);
}

#[test]
fn deactivate_note_properties_reports_retired_rows() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let note = insert_note(&conn, &page, "n", None);

    let repo = SqlitePropertyRepository::new(&conn);
    let owner = PropertyOwner::Note(note.id);
    repo.save_property(&Property::new(owner, "tag", "alpha", 1)).unwrap();
    repo.save_property(&Property::new(owner, "status", "open", 0)).unwrap();

    assert_eq!(repo.deactivate_note_properties(note.id).unwrap(), 2);
    assert!(repo.active_note_properties(note.id).unwrap().is_empty());
    // Idempotent on an already-clean note.
    assert_eq!(repo.deactivate_note_properties(note.id).unwrap(), 0);
}

#[test]
fn append_weight_accumulates_same_name_values() {
    let conn = setup();
    let page = insert_page(&conn, "p");
    let note = insert_note(&conn, &page, "n", None);

    let repo = SqlitePropertyRepository::new(&conn);
    let owner = PropertyOwner::Note(note.id);
    repo.save_property(&Property::new(owner, "tag", "alpha", 1)).unwrap();
    repo.save_property(&Property::new(owner, "tag", "beta", 1)).unwrap();

    let rows = repo.active_note_properties(note.id).unwrap();
    assert_eq!(rows.len(), 2);
    let values: Vec<&str> = rows.iter().map(|row| row.value.as_str()).collect();
    assert_eq!(values, vec!["alpha", "beta"]);
}

#[test]
fn page_properties_attach_without_note() {
    let conn = setup();
    let page = insert_page(&conn, "p");

    let repo = SqlitePropertyRepository::new(&conn);
    repo.save_property(&Property::new(PropertyOwner::Page(page.id), "icon", "star", 0))
        .unwrap();

    let rows = repo.active_page_properties(page.id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].owner, PropertyOwner::Page(page.id));
}
