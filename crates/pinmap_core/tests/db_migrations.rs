use pinmap_core::db::migrations::latest_version;
use pinmap_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "frames");
    assert_table_exists(&conn, "notes");
    assert_table_exists(&conn, "connections");
    assert_table_exists(&conn, "image_assets");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pinmap.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "notes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unusable_parent_directory_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let err = open_db(blocker.join("pinmap.sqlite3")).unwrap_err();
    assert!(matches!(err, DbError::CreateDir { path, .. } if path == blocker));
}

#[test]
fn deleting_project_row_cascades_to_children() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO projects (id, name, type, created_at) VALUES ('p', 'P', 'image', 1);
         INSERT INTO notes (project_id, id, text, created_at, board_x, board_y, sort_order)
             VALUES ('p', 'a', 'a', 1, 0, 0, 0), ('p', 'b', 'b', 1, 10, 0, 1);
         INSERT INTO connections (project_id, id, from_note_id, to_note_id, sort_order)
             VALUES ('p', 'c', 'a', 'b', 0);
         DELETE FROM projects WHERE id = 'p';",
    )
    .unwrap();

    assert_eq!(row_count(&conn, "notes"), 0);
    assert_eq!(row_count(&conn, "connections"), 0);
}

#[test]
fn notes_table_rejects_mixed_placement() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO projects (id, name, type, created_at) VALUES ('p', 'P', 'map', 1);",
        [],
    )
    .unwrap();

    let result = conn.execute(
        "INSERT INTO notes (project_id, id, text, created_at, lat, lng, board_x, board_y, sort_order)
         VALUES ('p', 'a', 'a', 1, 1.0, 2.0, 3.0, 4.0, 0);",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
