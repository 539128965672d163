use rusqlite::Connection;
use unitwork_core::db::migrations::latest_version;
use unitwork_core::db::{open_db, open_db_in_memory, DbError};
use unitwork_core::{RepoError, SqliteSession};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "aggregates");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unitwork.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "aggregates");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

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
fn session_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteSession::try_new(conn).err().unwrap();
    assert!(matches!(err, RepoError::Configuration(_)));
}

#[test]
fn session_rejects_connection_without_aggregates_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE aggregates;").unwrap();

    let err = SqliteSession::try_new(conn).err().unwrap();
    assert!(err.to_string().contains("aggregates"));
}

#[test]
fn aggregates_table_rejects_invalid_json_and_duplicate_identity() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO aggregates (kind, key, body) VALUES ('customer', 'a', '{}');",
        [],
    )
    .unwrap();

    assert!(conn
        .execute(
            "INSERT INTO aggregates (kind, key, body) VALUES ('customer', 'a', '{}');",
            [],
        )
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO aggregates (kind, key, body) VALUES ('customer', 'b', 'not json');",
            [],
        )
        .is_err());
    conn.execute(
        "INSERT INTO aggregates (kind, key, body) VALUES ('order', 'a', '{}');",
        [],
    )
    .unwrap();
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
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
