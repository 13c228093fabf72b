//! Connection handler: file-backed databases, materialization, cursor writes

use crate::common;
use dblayer::config::ConnectionConfig;
use dblayer::db::{CellValue, Cursor, Database, SqliteHandler};
use dblayer::error::DbError;
use dblayer::sql::{Collation, OrderSpec};
use tempfile::TempDir;

fn file_config(dir: &TempDir) -> ConnectionConfig {
    ConnectionConfig::sqlite(dir.path().join("test.db").to_string_lossy())
}

#[test]
fn test_data_persists_across_connections() {
    let dir = TempDir::new().unwrap();
    {
        let db = SqliteHandler::connect(&file_config(&dir)).unwrap();
        db.execute("CREATE TABLE t (a integer)").unwrap();
        db.execute("INSERT INTO t VALUES (1), (2), (3)").unwrap();
        db.close().unwrap();
    }
    let db = SqliteHandler::connect(&file_config(&dir)).unwrap();
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM t"),
        Some(3)
    );
}

#[test]
fn test_vacuum_runs_on_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    let db = SqliteHandler::connect(&file_config(&dir)).unwrap();
    db.execute("CREATE TABLE t (payload text)").unwrap();
    db.execute(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 2000) \
         INSERT INTO t SELECT printf('%0500d', i) FROM n",
    )
    .unwrap();
    db.close().unwrap();
    let full = std::fs::metadata(&path).unwrap().len();

    let db = SqliteHandler::connect(&file_config(&dir)).unwrap();
    db.execute("DELETE FROM t").unwrap();
    db.vacuum(None);
    // An open transaction must not prevent the vacuum
    db.begin().unwrap();
    db.close().unwrap();
    let vacuumed = std::fs::metadata(&path).unwrap().len();

    assert!(vacuumed < full, "{} >= {}", vacuumed, full);
}

#[test]
fn test_results_outlive_the_connection() {
    let db = common::memory();
    db.execute("CREATE TABLE t (a integer, b text)").unwrap();
    db.execute("INSERT INTO t VALUES (1, 'x'), (2, NULL)").unwrap();
    let results = db.select("SELECT a, b FROM t ORDER BY a").unwrap();
    db.close().unwrap();

    assert_eq!(results.row_count, 2);
    assert_eq!(results.get(1, "b"), Some(&CellValue::Null));
    assert_eq!(results.get(0, "A"), Some(&CellValue::Integer(1)));
}

#[test]
fn test_connect_from_url() {
    let config = ConnectionConfig::from_url("sqlite::memory:").unwrap();
    let db = SqliteHandler::connect(&config).unwrap();
    assert_eq!(db.driver(), "sqlite");
    assert!(db.version().unwrap().starts_with('3'));

    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/my%20db.sqlite", dir.path().display());
    let config = ConnectionConfig::from_url(&url).unwrap();
    assert!(config.database.ends_with("my db.sqlite"));
    SqliteHandler::connect(&config).unwrap().close().unwrap();
    assert!(dir.path().join("my db.sqlite").exists());
}

#[test]
fn test_connect_failure_is_typed() {
    let config = ConnectionConfig::sqlite("/definitely/not/here/x.db");
    assert!(matches!(
        SqliteHandler::connect(&config),
        Err(DbError::ConnectFailed(_))
    ));
}

#[test]
fn test_collation_ordering() {
    let config = ConnectionConfig::memory().with_collation(Some(Collation::UnicodeCi));
    let db = SqliteHandler::connect(&config).unwrap();
    db.execute("CREATE TABLE t (name text)").unwrap();
    db.execute("INSERT INTO t VALUES ('b'), ('B'), ('a')").unwrap();

    let sql = format!(
        "SELECT name FROM t{}",
        db.order_by(&[OrderSpec::asc("name").collated(), OrderSpec::asc("name")])
    );
    let names: Vec<String> = db
        .select(&sql)
        .unwrap()
        .rows
        .iter()
        .map(|r| r.values[0].display_string(10))
        .collect();
    assert_eq!(names, vec!["a", "B", "b"]);

    let grouped = format!(
        "SELECT {} AS k, COUNT(*) AS n FROM t GROUP BY k",
        db.lexical_fields(&["name"])
    );
    assert_eq!(db.select(&grouped).unwrap().row_count, 2);
}

#[test]
fn test_cursor_round_trip() {
    let db = common::memory();
    db.execute("CREATE TABLE post (id integer primary key, title text, created text)")
        .unwrap();

    let mut cur = Cursor::new(&db, "post");
    cur.set("title", "first").set_expression("created", "now()");
    cur.insert().unwrap();
    let id = db.last_insert_id();

    cur.clean();
    cur.set("title", "renamed");
    assert_eq!(cur.update(&format!("WHERE id = {}", id)).unwrap(), 1);
    assert_eq!(db.changes(), 1);

    let results = db.select("SELECT title, created FROM post").unwrap();
    assert_eq!(
        results.get(0, "title"),
        Some(&CellValue::Text("renamed".into()))
    );
    assert!(results.get(0, "created").is_some_and(|c| !c.is_null()));
}

#[test]
fn test_lock_guard_scopes_a_transaction() {
    let db = common::memory();
    db.execute("CREATE TABLE t (a integer)").unwrap();
    {
        let _guard = db.lock("t").unwrap();
        db.execute("INSERT INTO t VALUES (1)").unwrap();
        assert!(db.in_transaction());
    }
    assert!(!db.in_transaction());
    assert_eq!(
        common::scalar(&db, "SELECT COUNT(*) AS n FROM t"),
        Some(1)
    );
}

#[test]
fn test_in_list_and_limit_fragments() {
    let db = common::memory();
    db.execute("CREATE TABLE t (a integer)").unwrap();
    db.execute("INSERT INTO t VALUES (1), (2), (3), (4)").unwrap();

    let sql = format!(
        "SELECT COUNT(*) AS n FROM t WHERE a{}",
        db.in_list(&[CellValue::Integer(2), CellValue::Integer(4)])
    );
    assert_eq!(common::scalar(&db, &sql), Some(2));

    let sql = format!("SELECT COUNT(*) AS n FROM t WHERE a{}", db.in_list(&[]));
    assert_eq!(common::scalar(&db, &sql), Some(0));

    let sql = format!("SELECT a FROM t ORDER BY a{}", db.limit(Some(1), 2));
    let results = db.select(&sql).unwrap();
    assert_eq!(results.row_count, 2);
    assert_eq!(results.get(0, "a"), Some(&CellValue::Integer(2)));
}
